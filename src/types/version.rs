use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An immutable version of a flat-versioned package (maven, npm, pypi, ...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub registry_id: i64,
    pub image_name: String,
    pub version: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub file_count: u64,
    #[serde(default)]
    pub download_count: u64,
    #[serde(default)]
    pub artifact_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VersionRecord {
    pub fn description(&self) -> Option<&str> {
        self.metadata.get("description").and_then(|d| d.as_str())
    }
}
