use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, warn};

use super::{Resolver, decode};
use crate::{
    context::RequestContext,
    digest::Digest,
    error::{NotFound, ResolveResult, ValidationError},
    manifest::{ConcreteManifest, Descriptor, ManifestList, Platform, ResolvedManifest},
    metrics::Operation,
    reference::Reference,
    types::{ManifestRow, Registry},
};

/// One platform of a resolved reference.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDetail {
    pub digest: Digest,
    pub created_at: DateTime<Utc>,
    pub size: u64,
    pub os_arch: String,
    pub downloads_count: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestListResult {
    pub image_name: String,
    pub version: String,
    pub manifests: Vec<ManifestDetail>,
}

impl Resolver {
    /// Every platform manifest behind `reference`, in manifest list order.
    ///
    /// A list entry that cannot be resolved fails the whole call. Entries of an
    /// unrecognized type are skipped.
    pub async fn resolve_manifests(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        image: &str,
        reference: &Reference,
    ) -> ResolveResult<ManifestListResult> {
        let res = self.manifests_inner(ctx, registry, image, reference).await;
        self.observe(Operation::Manifests, res)
    }

    async fn manifests_inner(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        image: &str,
        reference: &Reference,
    ) -> ResolveResult<ManifestListResult> {
        let top = self
            .lookup(ctx)
            .by_reference(registry, image, reference)
            .await?;

        let manifests = match decode(&top)? {
            ResolvedManifest::Concrete(manifest) => {
                vec![self.summarize(ctx, registry, &top, &manifest, None).await?]
            }
            ResolvedManifest::List(list) => self.fan_out(ctx, registry, image, &top, &list).await?,
            ResolvedManifest::Unknown { media_type } => {
                return Err(ValidationError::UnsupportedManifest {
                    media_type: media_type.unwrap_or_else(|| top.media_type.clone()),
                }
                .into());
            }
        };

        debug!(
            registry = %registry.name,
            image,
            %reference,
            platforms = manifests.len(),
            "Resolved manifests"
        );

        Ok(ManifestListResult {
            image_name: image.to_string(),
            version: reference.to_string(),
            manifests,
        })
    }

    async fn fan_out(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        image: &str,
        top: &ManifestRow,
        list: &ManifestList,
    ) -> ResolveResult<Vec<ManifestDetail>> {
        let entries = list
            .manifests
            .iter()
            .map(|entry| self.resolve_entry(ctx, registry, image, top, entry));

        // try_join_all keeps input order and drops the remaining lookups on the first error.
        let details = try_join_all(entries).await?;

        Ok(details.into_iter().flatten().collect())
    }

    async fn resolve_entry(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        image: &str,
        top: &ManifestRow,
        entry: &Descriptor,
    ) -> ResolveResult<Option<ManifestDetail>> {
        let row = self
            .lookup(ctx)
            .by_digest(registry, image, &entry.digest)
            .await?;

        match decode(&row)? {
            ResolvedManifest::Concrete(manifest) => {
                let detail = self
                    .summarize(ctx, registry, &row, &manifest, entry.platform.as_ref())
                    .await?;
                Ok(Some(detail))
            }
            ResolvedManifest::List(_) => Err(ValidationError::NestedManifestList {
                list: top.digest.clone(),
                entry: row.digest.clone(),
            }
            .into()),
            ResolvedManifest::Unknown { .. } => {
                warn!(
                    image,
                    list = %top.digest,
                    entry = %row.digest,
                    "Skipping manifest list entry of unknown type"
                );
                Ok(None)
            }
        }
    }

    async fn summarize(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        row: &ManifestRow,
        manifest: &ConcreteManifest,
        hint: Option<&Platform>,
    ) -> ResolveResult<ManifestDetail> {
        let config = self
            .config_for(ctx, registry, &manifest.config.digest)
            .await?
            .ok_or_else(|| NotFound::ManifestConfig {
                digest: manifest.config.digest.clone(),
            })?;

        Ok(ManifestDetail {
            digest: row.digest.clone(),
            created_at: row.created_at,
            size: row.total_size,
            os_arch: config.os_arch(hint),
            downloads_count: row.download_count,
        })
    }
}
