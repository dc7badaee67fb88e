//! The read operations over stored manifests, versions and files.
//!
//! A [`Resolver`] owns no mutable state. Every call takes the request context
//! and the already-resolved [`Registry`], talks to its [`Backends`] and returns
//! a projection or a [`ResolveError`](crate::error::ResolveError).

use anyhow::Context;
use tracing::warn;

use crate::{
    config::{Configuration, PaginationConfig},
    context::RequestContext,
    error::ResolveResult,
    image_config::{ImageConfig, resolve_config},
    lookup::ManifestLookup,
    manifest::{ResolvedManifest, classify},
    metrics::{Operation, Outcome, ResolverMetrics},
    paths::ContentPaths,
    pull::PullTarget,
    quarantine::QuarantinePolicy,
    store::Backends,
    types::{ManifestRow, Registry},
    urls::RegistryUrls,
};

mod detail;
mod files;
mod layers;
mod manifests;
mod versions;

pub use self::detail::{DetailResult, DockerDetail, FlatDetail, HelmDetail};
pub use self::files::{FileDetail, FileQuery};
pub use self::layers::{Layer, LayerSummary};
pub use self::manifests::{ManifestDetail, ManifestListResult};
pub use self::versions::{ArtifactVersion, VersionKind, VersionQuery};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolverSettings {
    pub pagination: PaginationConfig,
    pub quarantine: QuarantinePolicy,
}

impl From<&Configuration> for ResolverSettings {
    fn from(config: &Configuration) -> Self {
        Self {
            pagination: config.pagination.clone(),
            quarantine: config.quarantine,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Resolver {
    backends: Backends,
    blob_paths: ContentPaths,
    file_paths: ContentPaths,
    urls: RegistryUrls,
    settings: ResolverSettings,
    metrics: Option<ResolverMetrics>,
}

impl Resolver {
    pub fn new(backends: Backends, urls: RegistryUrls, settings: ResolverSettings) -> Self {
        Self {
            backends,
            blob_paths: ContentPaths::blobs(),
            file_paths: ContentPaths::files(),
            urls,
            settings,
            metrics: None,
        }
    }

    pub fn from_config(config: &Configuration, backends: Backends) -> anyhow::Result<Self> {
        let urls = RegistryUrls::parse(&config.url)?;
        Ok(Self::new(backends, urls, config.into()))
    }

    pub fn with_metrics(mut self, metrics: ResolverMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    fn lookup<'a>(&'a self, ctx: &'a RequestContext) -> ManifestLookup<'a> {
        ManifestLookup {
            ctx,
            manifests: self.backends.manifests.as_ref(),
            tags: self.backends.tags.as_ref(),
        }
    }

    fn pull_target<'a>(&'a self, registry: &'a Registry) -> PullTarget<'a> {
        PullTarget {
            urls: &self.urls,
            root: &registry.root_identifier,
            registry: &registry.name,
        }
    }

    async fn config_for(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        digest: &crate::digest::Digest,
    ) -> ResolveResult<Option<ImageConfig>> {
        resolve_config(
            ctx,
            self.backends.blobs.as_ref(),
            &self.blob_paths,
            &registry.root_identifier,
            digest,
        )
        .await
    }

    /// Count the outcome of one operation and log it if it is a failure worth logging.
    fn observe<T>(&self, operation: Operation, res: ResolveResult<T>) -> ResolveResult<T> {
        let outcome = match &res {
            Ok(_) => Outcome::Ok,
            Err(err) => {
                err.log();
                err.outcome()
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record(operation, outcome);
        }

        res
    }
}

fn decode(row: &ManifestRow) -> ResolveResult<ResolvedManifest> {
    let resolved = classify(row.payload.as_bytes())
        .with_context(|| format!("Unable to decode manifest {}", row.digest))?;

    if let ResolvedManifest::Unknown { media_type } = &resolved {
        warn!(
            image = %row.image_name,
            digest = %row.digest,
            media_type = ?media_type,
            "Unrecognized manifest"
        );
    }

    Ok(resolved)
}
