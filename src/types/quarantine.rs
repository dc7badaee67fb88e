use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Natural key of a quarantine entry.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuarantineKey {
    pub artifact: String,
    pub version: String,
    pub registry: String,
}

impl QuarantineKey {
    pub fn new(
        artifact: impl Into<String>,
        version: impl Into<String>,
        registry: impl Into<String>,
    ) -> Self {
        Self {
            artifact: artifact.into(),
            version: version.into(),
            registry: registry.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantineInfo {
    pub reason: String,
    pub created_at: DateTime<Utc>,
}
