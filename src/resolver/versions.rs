use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::{Resolver, decode};
use crate::{
    context::RequestContext,
    digest::Digest,
    error::{NotFound, ResolveResult},
    manifest::ResolvedManifest,
    metrics::Operation,
    page::{Page, PageParams, PageRequest, SortParams},
    pull::{PullReference, pull_command},
    quarantine::{Quarantined, overlay},
    reference::TagName,
    store::{ListQuery, ManifestListing, TagListing},
    types::{QuarantineInfo, Registry, VersionRecord},
};

/// Listing parameters for [`Resolver::enumerate_versions`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VersionQuery {
    pub page: PageParams,
    pub sort: SortParams,
    pub search: Option<String>,
    /// List every manifest by digest instead of tags.
    pub untagged: bool,
}

/// Ecosystem specific part of a listing row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
pub enum VersionKind {
    Tagged {
        digest: Digest,
        digest_count: u64,
    },
    Untagged {
        digest: Digest,
        tags: Vec<TagName>,
    },
    Flat {
        file_count: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        artifact_type: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactVersion {
    pub name: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub downloads_count: u64,
    pub pull_command: String,
    pub is_latest_version: bool,
    pub is_quarantined: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarantine_reason: Option<String>,
    #[serde(flatten)]
    pub kind: VersionKind,
}

impl Quarantined for ArtifactVersion {
    fn version_key(&self) -> &str {
        &self.name
    }

    fn set_quarantine(&mut self, info: &QuarantineInfo) {
        self.is_quarantined = true;
        self.quarantine_reason = Some(info.reason.clone());
    }
}

impl Resolver {
    /// One page of versions of `image`, decorated with latest and quarantine state.
    pub async fn enumerate_versions(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        image: &str,
        query: &VersionQuery,
    ) -> ResolveResult<Page<ArtifactVersion>> {
        let res = self.versions_inner(ctx, registry, image, query).await;
        self.observe(Operation::Versions, res)
    }

    async fn versions_inner(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        image: &str,
        query: &VersionQuery,
    ) -> ResolveResult<Page<ArtifactVersion>> {
        let artifact = ctx
            .guard(self.backends.artifacts.get_artifact(registry.id, image))
            .await?;
        if !artifact.is_some_and(|a| a.enabled) {
            return Err(NotFound::Artifact {
                image: image.to_string(),
            }
            .into());
        }

        let request = PageRequest::new(query.page, &self.settings.pagination);
        let search = query.search.as_deref().filter(|s| !s.trim().is_empty());

        let sort = query.sort;
        let (item_count, mut items) = match (registry.package_type.is_oci(), query.untagged) {
            (true, false) => {
                self.tag_versions(ctx, registry, image, sort, search, request)
                    .await?
            }
            (true, true) => {
                self.manifest_versions(ctx, registry, image, sort, search, request)
                    .await?
            }
            (false, _) => {
                self.flat_versions(ctx, registry, image, sort, search, request)
                    .await?
            }
        };

        overlay(
            ctx,
            self.backends.quarantine.as_ref(),
            self.settings.quarantine,
            image,
            &registry.name,
            &mut items,
        )
        .await?;

        debug!(
            registry = %registry.name,
            image,
            item_count,
            page = request.page_index,
            returned = items.len(),
            "Enumerated versions"
        );

        Ok(Page::new(request, item_count, items))
    }

    async fn tag_versions(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        image: &str,
        sort: SortParams,
        search: Option<&str>,
        request: PageRequest,
    ) -> ResolveResult<(u64, Vec<ArtifactVersion>)> {
        let tags = self.backends.tags.as_ref();
        let list = ListQuery {
            sort,
            limit: request.limit(),
            offset: request.offset(),
            search: search.map(str::to_string),
        };

        let (rows, count, latest) = tokio::try_join!(
            ctx.guard(tags.list_tags(registry.id, image, &list)),
            ctx.guard(tags.count_tags(registry.id, image, search)),
            ctx.guard(tags.latest_tag_name(registry.id, image)),
        )?;

        let items = rows
            .into_iter()
            .map(|TagListing { tag, manifest }| -> ResolveResult<ArtifactVersion> {
                let digest_count = match decode(&manifest)? {
                    ResolvedManifest::List(list) => list.manifests.len() as u64,
                    ResolvedManifest::Concrete(_) | ResolvedManifest::Unknown { .. } => 1,
                };

                Ok(ArtifactVersion {
                    name: tag.name.to_string(),
                    size: manifest.total_size,
                    last_modified: tag.updated_at,
                    downloads_count: manifest.download_count,
                    pull_command: pull_command(
                        registry.package_type,
                        self.pull_target(registry),
                        image,
                        PullReference::Tag(&tag.name),
                    ),
                    is_latest_version: latest.as_ref() == Some(&tag.name),
                    is_quarantined: false,
                    quarantine_reason: None,
                    kind: VersionKind::Tagged {
                        digest: manifest.digest,
                        digest_count,
                    },
                })
            })
            .collect::<ResolveResult<Vec<_>>>()?;

        Ok((count, items))
    }

    async fn manifest_versions(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        image: &str,
        sort: SortParams,
        search: Option<&str>,
        request: PageRequest,
    ) -> ResolveResult<(u64, Vec<ArtifactVersion>)> {
        // Digest addressed, so a search can only ever match exactly.
        let search = search.map(Digest::parse).transpose()?;

        let manifests = self.backends.manifests.as_ref();
        let list = ListQuery {
            sort,
            limit: request.limit(),
            offset: request.offset(),
            search: search.clone(),
        };

        let (rows, count, latest) = tokio::try_join!(
            ctx.guard(manifests.list_manifests(registry.id, image, &list)),
            ctx.guard(manifests.count_manifests(registry.id, image, search.as_ref())),
            ctx.guard(self.backends.tags.latest_tag_name(registry.id, image)),
        )?;

        let items = rows
            .into_iter()
            .map(|ManifestListing { manifest, tags }| ArtifactVersion {
                name: manifest.digest.to_string(),
                size: manifest.total_size,
                last_modified: manifest.created_at,
                downloads_count: manifest.download_count,
                pull_command: pull_command(
                    registry.package_type,
                    self.pull_target(registry),
                    image,
                    PullReference::Digest(&manifest.digest),
                ),
                is_latest_version: latest.as_ref().is_some_and(|latest| tags.contains(latest)),
                is_quarantined: false,
                quarantine_reason: None,
                kind: VersionKind::Untagged {
                    digest: manifest.digest,
                    tags,
                },
            })
            .collect();

        Ok((count, items))
    }

    async fn flat_versions(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        image: &str,
        sort: SortParams,
        search: Option<&str>,
        request: PageRequest,
    ) -> ResolveResult<(u64, Vec<ArtifactVersion>)> {
        let versions = self.backends.versions.as_ref();
        let list = ListQuery {
            sort,
            limit: request.limit(),
            offset: request.offset(),
            search: search.map(str::to_string),
        };

        let (rows, count, latest) = tokio::try_join!(
            ctx.guard(versions.list_versions(registry.id, image, &list)),
            ctx.guard(versions.count_versions(registry.id, image, search)),
            ctx.guard(versions.latest_version(registry.id, image)),
        )?;

        let items = rows
            .into_iter()
            .map(|record| {
                let description = record.description().map(str::to_string);
                let VersionRecord {
                    version,
                    size,
                    file_count,
                    download_count,
                    artifact_type,
                    updated_at,
                    ..
                } = record;

                ArtifactVersion {
                    pull_command: pull_command(
                        registry.package_type,
                        self.pull_target(registry),
                        image,
                        PullReference::Version(&version),
                    ),
                    is_latest_version: latest.as_deref() == Some(version.as_str()),
                    name: version,
                    size,
                    last_modified: updated_at,
                    downloads_count: download_count,
                    is_quarantined: false,
                    quarantine_reason: None,
                    kind: VersionKind::Flat {
                        file_count,
                        description,
                        artifact_type,
                    },
                }
            })
            .collect();

        Ok((count, items))
    }
}
