use tracing::debug;

use crate::{
    context::RequestContext,
    digest::Digest,
    error::{NotFound, ResolveResult},
    reference::{Reference, TagName},
    store::{ManifestStore, TagStore},
    types::{ManifestRow, Registry, TagRow},
};

/// Read-only manifest lookup by tag or by digest.
///
/// Each path reports its own not-found reason, a missing tag is never
/// reported as a missing manifest.
#[derive(Clone, Copy)]
pub struct ManifestLookup<'a> {
    pub ctx: &'a RequestContext,
    pub manifests: &'a dyn ManifestStore,
    pub tags: &'a dyn TagStore,
}

impl<'a> ManifestLookup<'a> {
    pub async fn by_tag(
        &self,
        registry: &Registry,
        image: &str,
        tag: &TagName,
    ) -> ResolveResult<(ManifestRow, TagRow)> {
        let row = self
            .ctx
            .guard(self.tags.get_tag_by_name(registry.id, image, tag))
            .await?
            .ok_or_else(|| NotFound::Tag {
                image: image.to_string(),
                tag: tag.to_string(),
            })?;

        // A tag whose manifest row has disappeared is reported against the manifest.
        let manifest = self
            .ctx
            .guard(self.manifests.get_manifest_by_id(registry.id, row.manifest_id))
            .await?
            .ok_or_else(|| NotFound::Manifest {
                image: image.to_string(),
                reference: tag.to_string(),
            })?;

        debug!(registry = %registry.name, image, %tag, digest = %manifest.digest, "Resolved tag");
        Ok((manifest, row))
    }

    pub async fn by_digest(
        &self,
        registry: &Registry,
        image: &str,
        digest: &Digest,
    ) -> ResolveResult<ManifestRow> {
        let manifest = self
            .ctx
            .guard(self.manifests.get_manifest_by_digest(registry.id, image, digest))
            .await?
            .ok_or_else(|| NotFound::Manifest {
                image: image.to_string(),
                reference: digest.to_string(),
            })?;

        Ok(manifest)
    }

    pub async fn by_reference(
        &self,
        registry: &Registry,
        image: &str,
        reference: &Reference,
    ) -> ResolveResult<ManifestRow> {
        match reference {
            Reference::Tag(tag) => Ok(self.by_tag(registry, image, tag).await?.0),
            Reference::Digest(digest) => self.by_digest(registry, image, digest).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use test_log::test;

    use super::*;
    use crate::{error::ResolveError, store::MemoryStore, tests};

    #[test(tokio::test)]
    async fn tag_and_digest_paths() -> Result<()> {
        let store = MemoryStore::new(tests::catalog());
        let registry = tests::docker_registry();
        let ctx = RequestContext::default();
        let lookup = ManifestLookup {
            ctx: &ctx,
            manifests: &store,
            tags: &store,
        };

        let (manifest, tag) = lookup
            .by_tag(&registry, "nginx", &TagName::new("v2")?)
            .await?;
        assert_eq!(tag.name.as_str(), "v2");
        assert_eq!(manifest.id, tag.manifest_id);

        let again = lookup.by_digest(&registry, "nginx", &manifest.digest).await?;
        assert_eq!(again, manifest);

        let by_ref = lookup
            .by_reference(&registry, "nginx", &Reference::Digest(manifest.digest.clone()))
            .await?;
        assert_eq!(by_ref, manifest);

        Ok(())
    }

    #[test(tokio::test)]
    async fn not_found_reasons() -> Result<()> {
        let store = MemoryStore::new(tests::catalog());
        let registry = tests::docker_registry();
        let ctx = RequestContext::default();
        let lookup = ManifestLookup {
            ctx: &ctx,
            manifests: &store,
            tags: &store,
        };

        let err = lookup
            .by_tag(&registry, "nginx", &TagName::new("v9")?)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(NotFound::Tag { .. })));

        let err = lookup
            .by_digest(&registry, "nginx", &Digest::of(b"nothing"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(NotFound::Manifest { .. })));

        // A manifest of another image is not visible through this one.
        let (manifest, _) = lookup
            .by_tag(&registry, "nginx", &TagName::new("v2")?)
            .await?;
        let err = lookup
            .by_digest(&registry, "redis", &manifest.digest)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound(NotFound::Manifest { .. })));

        Ok(())
    }
}
