use serde::Serialize;
use tracing::debug;

use super::{Resolver, decode};
use crate::{
    context::RequestContext,
    digest::Digest,
    error::{NotFound, ResolveResult, ValidationError},
    image_config::HistoryEntry,
    manifest::{Descriptor, ResolvedManifest},
    metrics::Operation,
    types::Registry,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Layer {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerSummary {
    pub digest: Digest,
    pub os_arch: String,
    pub layers: Vec<Layer>,
}

impl Resolver {
    /// Build history of one concrete manifest, addressed by digest.
    pub async fn resolve_layers(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        image: &str,
        digest: &str,
    ) -> ResolveResult<LayerSummary> {
        let res = self.layers_inner(ctx, registry, image, digest).await;
        self.observe(Operation::Layers, res)
    }

    async fn layers_inner(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        image: &str,
        digest: &str,
    ) -> ResolveResult<LayerSummary> {
        let digest = Digest::parse(digest)?;
        let row = self.lookup(ctx).by_digest(registry, image, &digest).await?;

        let manifest = match decode(&row)? {
            ResolvedManifest::Concrete(manifest) => manifest,
            other => {
                return Err(ValidationError::UnsupportedManifest {
                    media_type: other.media_type().to_string(),
                }
                .into());
            }
        };

        let not_found = || NotFound::ManifestConfig {
            digest: manifest.config.digest.clone(),
        };

        let config = self
            .config_for(ctx, registry, &manifest.config.digest)
            .await?
            .ok_or_else(not_found)?;

        if config.history.is_empty() {
            return Err(not_found().into());
        }

        debug!(registry = %registry.name, image, %digest, "Resolved layers");

        Ok(LayerSummary {
            os_arch: config.os_arch(None),
            layers: pair_layers(&config.history, &manifest.layers),
            digest,
        })
    }
}

/// One entry per history record. Records that produced a filesystem layer take
/// the size of the next manifest layer, in order.
fn pair_layers(history: &[HistoryEntry], layers: &[Descriptor]) -> Vec<Layer> {
    let mut sizes = layers.iter().map(|layer| layer.size);

    history
        .iter()
        .map(|entry| Layer {
            command: entry.created_by.clone(),
            size: match entry.empty_layer {
                true => None,
                false => sizes.next().flatten(),
            },
        })
        .collect()
}
