use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// One stored file of a flat-versioned package version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub registry_id: i64,
    pub image_name: String,
    pub version: String,
    pub name: String,
    pub digest: Digest,
    #[serde(default)]
    pub size: u64,
    pub created_at: DateTime<Utc>,
}
