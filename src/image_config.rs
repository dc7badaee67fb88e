use anyhow::Context;
use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::{
    context::RequestContext,
    digest::Digest,
    error::ResolveResult,
    manifest::Platform,
    paths::ContentPaths,
    store::BlobStore,
};

/// Treat an explicit `null` the same as a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Timestamps are kept as written, builders do not agree on a format.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub created_by: String,
    #[serde(default, deserialize_with = "nullable")]
    pub empty_layer: bool,
    #[serde(default)]
    pub comment: Option<String>,
}

/// The parts of an image configuration blob the resolver reads. Unknown fields
/// are ignored and missing ones default, so a partial document still decodes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ImageConfig {
    #[serde(default, deserialize_with = "nullable")]
    pub os: String,
    #[serde(default, deserialize_with = "nullable")]
    pub architecture: String,
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub history: Vec<HistoryEntry>,
}

impl ImageConfig {
    pub fn decode(content: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(content)
    }

    /// `os/architecture`, falling back to a platform hint for whichever half is empty.
    pub fn os_arch(&self, hint: Option<&Platform>) -> String {
        let os = match (self.os.as_str(), hint) {
            ("", Some(hint)) => hint.os.as_str(),
            (os, _) => os,
        };
        let arch = match (self.architecture.as_str(), hint) {
            ("", Some(hint)) => hint.architecture.as_str(),
            (arch, _) => arch,
        };

        format!("{os}/{arch}")
    }
}

/// Fetch and decode the configuration blob `digest` stored under `root`.
///
/// `Ok(None)` means the blob backend has nothing at the resolved path.
pub async fn resolve_config(
    ctx: &RequestContext,
    blobs: &dyn BlobStore,
    paths: &ContentPaths,
    root: &str,
    digest: &Digest,
) -> ResolveResult<Option<ImageConfig>> {
    let path = paths.resolve_path(root, digest)?;
    debug!(%digest, path = ?path, "Resolving manifest config");

    let Some(content) = ctx.guard(blobs.get_content(&path)).await? else {
        return Ok(None);
    };

    let config = ImageConfig::decode(&content)
        .with_context(|| format!("Unable to decode manifest config {digest}"))?;

    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use test_log::test;

    use super::*;
    use crate::{error::ResolveError, store::MemoryBlobStore};

    #[test]
    fn partial_documents_decode() -> Result<()> {
        let config = ImageConfig::decode(br#"{"rootfs": {"type": "layers"}}"#)?;

        assert_eq!(config, ImageConfig::default());
        assert_eq!(config.os_arch(None), "/");

        Ok(())
    }

    #[test]
    fn history_decodes() -> Result<()> {
        let config = ImageConfig::decode(
            br#"{
                "os": "linux",
                "architecture": "amd64",
                "config": {"Env": ["PATH=/usr/bin"]},
                "history": [
                    {"created": "2024-01-02T03:04:05Z", "created_by": "/bin/sh -c #(nop) ADD file:abc in /"},
                    {"created_by": "/bin/sh -c #(nop) CMD [\"nginx\"]", "empty_layer": true}
                ]
            }"#,
        )?;

        assert_eq!(config.os_arch(None), "linux/amd64");
        assert_eq!(config.history.len(), 2);
        assert!(config.history[0].created.is_some());
        assert!(config.history[1].empty_layer);

        Ok(())
    }

    #[test]
    fn null_fields_decode() -> Result<()> {
        let config = ImageConfig::decode(
            br#"{"os": null, "architecture": "amd64", "created": null, "history": null}"#,
        )?;
        assert_eq!(config.os_arch(None), "/amd64");
        assert!(config.history.is_empty());

        let config = ImageConfig::decode(
            br#"{"history": [{"created": null, "created_by": null, "empty_layer": null, "comment": null}]}"#,
        )?;
        assert_eq!(config.history, vec![HistoryEntry::default()]);

        Ok(())
    }

    #[test]
    fn loose_timestamps_decode() -> Result<()> {
        let config = ImageConfig::decode(
            br#"{
                "created": "",
                "history": [
                    {"created": "1970-01-01 00:00:00 +0000 UTC", "created_by": "COPY . /app"}
                ]
            }"#,
        )?;

        assert_eq!(config.created.as_deref(), Some(""));
        assert_eq!(
            config.history[0].created.as_deref(),
            Some("1970-01-01 00:00:00 +0000 UTC")
        );
        assert_eq!(config.history[0].created_by, "COPY . /app");

        Ok(())
    }

    #[test]
    fn platform_hint_fills_gaps() {
        let config = ImageConfig {
            os: "linux".into(),
            ..Default::default()
        };
        let hint = Platform {
            os: "windows".into(),
            architecture: "arm64".into(),
            variant: None,
        };

        assert_eq!(config.os_arch(Some(&hint)), "linux/arm64");
    }

    #[test(tokio::test)]
    async fn resolves_from_blob_store() -> Result<()> {
        let content = br#"{"os": "linux", "architecture": "arm64"}"#;
        let digest = Digest::of(content);
        let paths = ContentPaths::blobs();

        let mut blobs = MemoryBlobStore::new();
        blobs.insert(paths.resolve_path("acme", &digest)?, content.to_vec());

        let ctx = RequestContext::default();

        let config = resolve_config(&ctx, &blobs, &paths, "Acme", &digest).await?;
        assert_eq!(config.map(|c| c.architecture), Some("arm64".to_string()));

        let missing = resolve_config(&ctx, &blobs, &paths, "acme", &Digest::of(b"other")).await?;
        assert_eq!(missing, None);

        Ok(())
    }

    #[test(tokio::test)]
    async fn malformed_config_is_internal() -> Result<()> {
        let digest = Digest::of(b"garbage");
        let paths = ContentPaths::blobs();

        let mut blobs = MemoryBlobStore::new();
        blobs.insert(paths.resolve_path("acme", &digest)?, b"{not json".to_vec());

        let res = resolve_config(&RequestContext::default(), &blobs, &paths, "acme", &digest).await;
        assert!(matches!(res, Err(ResolveError::Internal(_))));

        Ok(())
    }
}
