use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// A stored manifest. The payload is the raw document exactly as pushed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRow {
    pub id: i64,
    pub registry_id: i64,
    pub image_name: String,
    pub digest: Digest,
    pub media_type: String,
    pub payload: String,
    pub total_size: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub download_count: u64,
}
