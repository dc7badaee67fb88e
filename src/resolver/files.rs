use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::Resolver;
use crate::{
    context::RequestContext,
    error::{NotFound, ResolveResult, ValidationError},
    metrics::Operation,
    page::{Page, PageParams, PageRequest, SortParams},
    store::ListQuery,
    types::{FileNode, Registry},
};

/// Listing parameters for [`Resolver::resolve_files`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileQuery {
    pub page: PageParams,
    pub sort: SortParams,
    pub search: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDetail {
    pub name: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub checksums: Vec<String>,
    /// Location of the content relative to the blob backend.
    pub storage_path: String,
    pub download_command: String,
}

impl Resolver {
    /// One page of the files stored for `version` of a flat-versioned package.
    pub async fn resolve_files(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        image: &str,
        version: &str,
        query: &FileQuery,
    ) -> ResolveResult<Page<FileDetail>> {
        let res = self.files_inner(ctx, registry, image, version, query).await;
        self.observe(Operation::Files, res)
    }

    async fn files_inner(
        &self,
        ctx: &RequestContext,
        registry: &Registry,
        image: &str,
        version: &str,
        query: &FileQuery,
    ) -> ResolveResult<Page<FileDetail>> {
        if registry.package_type.is_oci() {
            return Err(ValidationError::UnsupportedPackageType(registry.package_type).into());
        }

        let request = PageRequest::new(query.page, &self.settings.pagination);
        let search = query.search.as_deref().filter(|s| !s.trim().is_empty());
        let list = ListQuery {
            sort: query.sort,
            limit: request.limit(),
            offset: request.offset(),
            search: search.map(str::to_string),
        };

        let files = self.backends.files.as_ref();
        let (record, rows, item_count) = tokio::try_join!(
            ctx.guard(self.backends.versions.get_version(registry.id, image, version)),
            ctx.guard(files.list_files(registry.id, image, version, &list)),
            ctx.guard(files.count_files(registry.id, image, version, search)),
        )?;

        if record.is_none() {
            return Err(NotFound::Version {
                image: image.to_string(),
                version: version.to_string(),
            }
            .into());
        }

        let package_url = self.urls.package_url(
            &registry.root_identifier,
            &registry.name,
            registry.package_type,
        );

        let items = rows
            .into_iter()
            .map(|node| -> ResolveResult<FileDetail> {
                let storage_path = self
                    .file_paths
                    .resolve_path(&registry.root_identifier, &node.digest)?;

                let FileNode {
                    name,
                    digest,
                    size,
                    created_at,
                    ..
                } = node;

                Ok(FileDetail {
                    download_command: format!(
                        "curl --location '{package_url}/{image}/{version}/{name}' -O"
                    ),
                    checksums: vec![format!(
                        "{}: {}",
                        digest.algo.to_ascii_uppercase(),
                        digest.hash
                    )],
                    storage_path: storage_path.display().to_string(),
                    name,
                    size,
                    created_at,
                })
            })
            .collect::<ResolveResult<Vec<_>>>()?;

        debug!(
            registry = %registry.name,
            image,
            version,
            item_count,
            returned = items.len(),
            "Listed version files"
        );

        Ok(Page::new(request, item_count, items))
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use test_log::test;

    use super::*;
    use crate::{
        digest::Digest,
        error::ResolveError,
        metrics::Outcome,
        tests::{ResolverFixture, docker_registry, maven_registry},
    };

    #[test(tokio::test)]
    async fn lists_files_of_a_version() -> Result<()> {
        let fixture = ResolverFixture::new();

        let page = fixture
            .resolve_files(
                &fixture.ctx,
                &maven_registry(),
                "com.acme:lib",
                "1.0.0",
                &FileQuery {
                    sort: SortParams::new(Some("name"), Some("ASC")),
                    ..Default::default()
                },
            )
            .await?;

        assert_eq!(page.item_count, 3);
        assert_eq!(page.page_count, 1);

        let jar = &page.items[0];
        let digest = Digest::of(b"lib-1.0.0.jar");
        assert_eq!(jar.name, "lib-1.0.0.jar");
        assert_eq!(jar.size, 900);
        assert_eq!(jar.checksums, vec![format!("SHA256: {}", digest.hash)]);
        assert_eq!(
            jar.storage_path,
            format!("acme/files/sha256/{}", digest.hash)
        );
        assert_eq!(
            jar.download_command,
            "curl --location \\
             'https://pkg.example.com/pkg/acme/maven-local/maven/com.acme:lib/1.0.0/lib-1.0.0.jar' -O"
        );

        assert_eq!(fixture.metrics.count(Operation::Files, Outcome::Ok), 1);

        Ok(())
    }

    #[test(tokio::test)]
    async fn search_and_paging() -> Result<()> {
        let fixture = ResolverFixture::new();

        let page = fixture
            .resolve_files(
                &fixture.ctx,
                &maven_registry(),
                "com.acme:lib",
                "1.0.0",
                &FileQuery {
                    page: PageParams {
                        page: Some(1),
                        size: Some(1),
                    },
                    sort: SortParams::new(Some("size"), Some("DESC")),
                    search: Some("jar".into()),
                },
            )
            .await?;

        assert_eq!(page.item_count, 2);
        assert_eq!(page.page_count, 2);
        assert_eq!(page.page_index, 1);
        let names: Vec<_> = page.items.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["lib-1.0.0.jar.sha1"]);

        Ok(())
    }

    #[test(tokio::test)]
    async fn unknown_version() {
        let fixture = ResolverFixture::new();

        let err = fixture
            .resolve_files(
                &fixture.ctx,
                &maven_registry(),
                "com.acme:lib",
                "2.0.0",
                &FileQuery::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::NotFound(NotFound::Version { .. })));
        assert_eq!(fixture.metrics.count(Operation::Files, Outcome::NotFound), 1);
    }

    #[test(tokio::test)]
    async fn containers_have_no_files() {
        let fixture = ResolverFixture::new();

        let err = fixture
            .resolve_files(
                &fixture.ctx,
                &docker_registry(),
                "nginx",
                "v1",
                &FileQuery::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ResolveError::Validation(ValidationError::UnsupportedPackageType(_))
        ));
    }
}
