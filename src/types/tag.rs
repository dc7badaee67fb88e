use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reference::TagName;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRow {
    pub id: i64,
    pub registry_id: i64,
    pub image_name: String,
    pub name: TagName,
    pub manifest_id: i64,
    pub created_at: DateTime<Utc>,
    /// Moves every time the tag is repointed.
    pub updated_at: DateTime<Utc>,
}
