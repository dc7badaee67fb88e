use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::{Resolver, decode};
use crate::{
    context::RequestContext,
    digest::Digest,
    error::{NotFound, ResolveResult, ValidationError},
    manifest::ResolvedManifest,
    metrics::Operation,
    pull::{PullReference, pull_command},
    quarantine::{Quarantined, overlay},
    reference::TagName,
    types::{ManifestRow, PackageType, QuarantineInfo, Registry, TagRow, VersionRecord},
    urls::registry_path,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerDetail {
    pub image_name: String,
    pub version: String,
    pub package_type: PackageType,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub registry_path: String,
    pub url: String,
    pub size: u64,
    pub downloads_count: u64,
    pub pull_command: String,
    pub is_latest_version: bool,
    pub is_quarantined: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarantine_reason: Option<String>,
}

impl Quarantined for DockerDetail {
    fn version_key(&self) -> &str {
        &self.version
    }

    fn set_quarantine(&mut self, info: &QuarantineInfo) {
        self.is_quarantined = true;
        self.quarantine_reason = Some(info.reason.clone());
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmDetail {
    pub artifact: String,
    pub version: String,
    pub package_type: PackageType,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub registry_path: String,
    pub url: String,
    pub size: u64,
    pub pull_command: String,
    pub is_latest_version: bool,
}

/// Detail of one version of a flat-versioned package.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatDetail {
    pub artifact: String,
    pub version: String,
    pub package_type: PackageType,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub size: u64,
    pub file_count: u64,
    pub downloads_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<String>,
    pub pull_command: String,
    pub is_latest_version: bool,
    pub is_quarantined: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quarantine_reason: Option<String>,
}

impl Quarantined for FlatDetail {
    fn version_key(&self) -> &str {
        &self.version
    }

    fn set_quarantine(&mut self, info: &QuarantineInfo) {
        self.is_quarantined = true;
        self.quarantine_reason = Some(info.reason.clone());
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DetailResult {
    Docker(DockerDetail),
    Helm(HelmDetail),
    Flat(FlatDetail),
}

impl Resolver {
    /// Detail record of one version of an artifact.
    ///
    /// Containers need `digest`, which must be the tag's own manifest or one of
    /// the entries of the tag's manifest list. Charts are resolved by tag alone,
    /// every other ecosystem by version name.
    pub async fn resolve_manifest_detail(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        image: &str,
        version: &str,
        digest: Option<&str>,
    ) -> ResolveResult<DetailResult> {
        let res = self.detail_inner(ctx, registry, image, version, digest).await;
        self.observe(Operation::Detail, res)
    }

    async fn detail_inner(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        image: &str,
        version: &str,
        digest: Option<&str>,
    ) -> ResolveResult<DetailResult> {
        match registry.package_type {
            PackageType::Docker => {
                let tag = TagName::new(version)?;
                let digest = digest.ok_or(ValidationError::MissingParameter("digest"))?;
                let digest = Digest::parse(digest)?;
                let detail = self.docker_detail(ctx, registry, image, &tag, &digest).await?;
                Ok(DetailResult::Docker(detail))
            }
            PackageType::Helm => {
                let tag = TagName::new(version)?;
                let detail = self.helm_detail(ctx, registry, image, &tag).await?;
                Ok(DetailResult::Helm(detail))
            }
            _ => {
                let detail = self.flat_detail(ctx, registry, image, version).await?;
                Ok(DetailResult::Flat(detail))
            }
        }
    }

    /// Tag row, its manifest and whether it is the artifact's latest tag.
    async fn tagged(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        image: &str,
        tag: &TagName,
    ) -> ResolveResult<(ManifestRow, TagRow, bool)> {
        let lookup = self.lookup(ctx);

        let ((manifest, row), latest) = tokio::try_join!(
            lookup.by_tag(registry, image, tag),
            ctx.guard(self.backends.tags.latest_tag_name(registry.id, image)),
        )?;

        Ok((manifest, row, latest.as_ref() == Some(tag)))
    }

    async fn docker_detail(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        image: &str,
        tag: &TagName,
        digest: &Digest,
    ) -> ResolveResult<DockerDetail> {
        let (top, row, is_latest) = self.tagged(ctx, registry, image, tag).await?;

        let manifest = if &top.digest == digest {
            top
        } else {
            let listed = match decode(&top)? {
                ResolvedManifest::List(list) => list.manifests.iter().any(|m| &m.digest == digest),
                ResolvedManifest::Concrete(_) | ResolvedManifest::Unknown { .. } => false,
            };

            if !listed {
                return Err(NotFound::Manifest {
                    image: image.to_string(),
                    reference: digest.to_string(),
                }
                .into());
            }

            self.lookup(ctx).by_digest(registry, image, digest).await?
        };

        let mut detail = DockerDetail {
            image_name: image.to_string(),
            version: tag.to_string(),
            package_type: registry.package_type,
            created_at: manifest.created_at,
            modified_at: row.updated_at,
            registry_path: registry_path(&registry.name, image, &manifest.digest),
            url: self.urls.tag_url(&registry.root_identifier, &registry.name, image, tag.as_str()),
            size: manifest.total_size,
            downloads_count: manifest.download_count,
            pull_command: pull_command(
                registry.package_type,
                self.pull_target(registry),
                image,
                PullReference::Digest(&manifest.digest),
            ),
            is_latest_version: is_latest,
            is_quarantined: false,
            quarantine_reason: None,
        };

        overlay(
            ctx,
            self.backends.quarantine.as_ref(),
            self.settings.quarantine,
            image,
            &registry.name,
            std::slice::from_mut(&mut detail),
        )
        .await?;

        debug!(registry = %registry.name, image, %tag, %digest, "Resolved container detail");
        Ok(detail)
    }

    async fn helm_detail(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        image: &str,
        tag: &TagName,
    ) -> ResolveResult<HelmDetail> {
        let (manifest, row, is_latest) = self.tagged(ctx, registry, image, tag).await?;

        debug!(registry = %registry.name, image, %tag, "Resolved chart detail");

        Ok(HelmDetail {
            artifact: image.to_string(),
            version: tag.to_string(),
            package_type: registry.package_type,
            created_at: manifest.created_at,
            modified_at: row.updated_at,
            registry_path: registry_path(&registry.name, image, &manifest.digest),
            url: self.urls.tag_url(&registry.root_identifier, &registry.name, image, tag.as_str()),
            size: manifest.total_size,
            pull_command: pull_command(
                registry.package_type,
                self.pull_target(registry),
                image,
                PullReference::Tag(tag),
            ),
            is_latest_version: is_latest,
        })
    }

    async fn flat_detail(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        image: &str,
        version: &str,
    ) -> ResolveResult<FlatDetail> {
        let versions = self.backends.versions.as_ref();

        let (record, latest) = tokio::try_join!(
            ctx.guard(versions.get_version(registry.id, image, version)),
            ctx.guard(versions.latest_version(registry.id, image)),
        )?;

        let record = record.ok_or_else(|| NotFound::Version {
            image: image.to_string(),
            version: version.to_string(),
        })?;

        let description = record.description().map(str::to_string);
        let VersionRecord {
            version,
            size,
            file_count,
            download_count,
            artifact_type,
            created_at,
            updated_at,
            ..
        } = record;

        let mut detail = FlatDetail {
            artifact: image.to_string(),
            pull_command: pull_command(
                registry.package_type,
                self.pull_target(registry),
                image,
                PullReference::Version(&version),
            ),
            is_latest_version: latest.as_deref() == Some(version.as_str()),
            version,
            package_type: registry.package_type,
            created_at,
            modified_at: updated_at,
            size,
            file_count,
            downloads_count: download_count,
            description,
            artifact_type,
            is_quarantined: false,
            quarantine_reason: None,
        };

        overlay(
            ctx,
            self.backends.quarantine.as_ref(),
            self.settings.quarantine,
            image,
            &registry.name,
            std::slice::from_mut(&mut detail),
        )
        .await?;

        debug!(
            registry = %registry.name,
            image,
            version = %detail.version,
            "Resolved version detail"
        );
        Ok(detail)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{Result, bail};
    use test_log::test;

    use super::*;
    use crate::{
        error::ResolveError,
        quarantine::QuarantinePolicy,
        resolver::ResolverSettings,
        tests::{
            ResolverFixture, UnavailableQuarantine, backends, docker_registry, helm_registry,
            maven_registry,
        },
    };

    fn docker(res: DetailResult) -> Result<DockerDetail> {
        match res {
            DetailResult::Docker(detail) => Ok(detail),
            other => bail!("expected a container detail, got {other:?}"),
        }
    }

    #[test(tokio::test)]
    async fn list_entry_detail() -> Result<()> {
        let fixture = ResolverFixture::new();
        let entry = fixture.manifest(2);

        let detail = docker(
            fixture
                .resolve_manifest_detail(
                    &fixture.ctx,
                    &docker_registry(),
                    "nginx",
                    "v1",
                    Some(&entry.digest.to_string()),
                )
                .await?,
        )?;

        assert_eq!(detail.version, "v1");
        assert_eq!(detail.size, 250);
        assert_eq!(
            detail.registry_path,
            format!("docker-local/nginx/{}", entry.digest)
        );
        assert_eq!(
            detail.url,
            "https://pkg.example.com/registry/acme/docker-local/nginx/v1"
        );
        assert_eq!(
            detail.pull_command,
            format!("docker pull pkg.example.com/acme/docker-local/nginx@{}", entry.digest)
        );
        assert!(!detail.is_latest_version);
        assert!(detail.is_quarantined);
        assert_eq!(detail.quarantine_reason.as_deref(), Some("CVE-2024-0001"));

        Ok(())
    }

    #[test(tokio::test)]
    async fn own_manifest_detail() -> Result<()> {
        let fixture = ResolverFixture::new();
        let manifest = fixture.manifest(4);

        let detail = docker(
            fixture
                .resolve_manifest_detail(
                    &fixture.ctx,
                    &docker_registry(),
                    "nginx",
                    "v2",
                    Some(&manifest.digest.to_string()),
                )
                .await?,
        )?;

        assert!(detail.is_latest_version);
        assert!(!detail.is_quarantined);
        assert_eq!(detail.modified_at, crate::tests::at(5));

        Ok(())
    }

    #[test(tokio::test)]
    async fn digest_must_belong_to_the_tag() {
        let fixture = ResolverFixture::new();
        let other = fixture.manifest(1);

        let err = fixture
            .resolve_manifest_detail(
                &fixture.ctx,
                &docker_registry(),
                "nginx",
                "v2",
                Some(&other.digest.to_string()),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::NotFound(NotFound::Manifest { .. })));
    }

    #[test(tokio::test)]
    async fn container_detail_needs_a_digest() {
        let fixture = ResolverFixture::new();

        let err = fixture
            .resolve_manifest_detail(&fixture.ctx, &docker_registry(), "nginx", "v1", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Validation(ValidationError::MissingParameter("digest"))
        ));

        let err = fixture
            .resolve_manifest_detail(
                &fixture.ctx,
                &docker_registry(),
                "nginx",
                "v1",
                Some("sha256:xyz"),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Validation(ValidationError::Digest(_))
        ));
    }

    #[test(tokio::test)]
    async fn chart_detail() -> Result<()> {
        let fixture = ResolverFixture::new();

        let res = fixture
            .resolve_manifest_detail(&fixture.ctx, &helm_registry(), "podinfo", "6.5.0", None)
            .await?;

        let DetailResult::Helm(detail) = res else {
            bail!("expected a chart detail");
        };

        assert_eq!(detail.artifact, "podinfo");
        assert_eq!(detail.size, 3600);
        assert!(detail.is_latest_version);
        assert_eq!(
            detail.pull_command,
            "helm pull oci://pkg.example.com/acme/helm-local/podinfo --version 6.5.0"
        );

        let res = fixture
            .resolve_manifest_detail(&fixture.ctx, &helm_registry(), "podinfo", "6.4.0", None)
            .await?;
        let DetailResult::Helm(detail) = res else {
            bail!("expected a chart detail");
        };
        assert!(!detail.is_latest_version);

        Ok(())
    }

    #[test(tokio::test)]
    async fn version_detail() -> Result<()> {
        let fixture = ResolverFixture::new();

        let res = fixture
            .resolve_manifest_detail(&fixture.ctx, &maven_registry(), "com.acme:lib", "1.0.0", None)
            .await?;
        let DetailResult::Flat(detail) = res else {
            bail!("expected a version detail");
        };

        assert_eq!(detail.package_type, PackageType::Maven);
        assert_eq!(detail.size, 1024);
        assert_eq!(detail.downloads_count, 9);
        assert_eq!(detail.description.as_deref(), Some("Acme library"));
        assert_eq!(
            detail.pull_command,
            "mvn dependency:get -Dartifact=com.acme:lib:1.0.0 \
             -DremoteRepositories=https://pkg.example.com/pkg/acme/maven-local/maven"
        );
        assert!(!detail.is_latest_version);
        assert!(detail.is_quarantined);
        assert_eq!(detail.quarantine_reason.as_deref(), Some("License violation"));

        let res = fixture
            .resolve_manifest_detail(&fixture.ctx, &maven_registry(), "com.acme:lib", "1.1.0", None)
            .await?;
        let DetailResult::Flat(detail) = res else {
            bail!("expected a version detail");
        };
        assert!(detail.is_latest_version);
        assert!(!detail.is_quarantined);
        assert_eq!(detail.artifact_type.as_deref(), Some("jar"));

        Ok(())
    }

    #[test(tokio::test)]
    async fn missing_version() {
        let fixture = ResolverFixture::new();

        let err = fixture
            .resolve_manifest_detail(&fixture.ctx, &maven_registry(), "com.acme:lib", "9.9.9", None)
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::NotFound(NotFound::Version { .. })));
        assert_eq!(err.code(), "VERSION_NOT_FOUND");
    }

    #[test(tokio::test)]
    async fn quarantine_failures_follow_policy() -> Result<()> {
        let digest = crate::tests::catalog()
            .manifests
            .into_iter()
            .find(|m| m.id == 4)
            .map(|m| m.digest.to_string());

        let mut strict = backends();
        strict.quarantine = Arc::new(UnavailableQuarantine);
        let fixture = ResolverFixture::with(strict.clone(), ResolverSettings::default());

        let err = fixture
            .resolve_manifest_detail(
                &fixture.ctx,
                &docker_registry(),
                "nginx",
                "v2",
                digest.as_deref(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Internal(_)));

        let fixture = ResolverFixture::with(
            strict,
            ResolverSettings {
                quarantine: QuarantinePolicy::Lenient,
                ..Default::default()
            },
        );

        let detail = docker(
            fixture
                .resolve_manifest_detail(
                    &fixture.ctx,
                    &docker_registry(),
                    "nginx",
                    "v2",
                    digest.as_deref(),
                )
                .await?,
        )?;
        assert!(!detail.is_quarantined);

        Ok(())
    }
}
