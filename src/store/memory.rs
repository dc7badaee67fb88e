use std::{cmp::Ordering, collections::HashMap, path::Path};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    ArtifactStore, FileStore, ListQuery, ManifestListing, ManifestStore, QuarantineStore,
    TagListing, TagStore, VersionStore,
};
use crate::{
    digest::Digest,
    page::SortField,
    reference::TagName,
    types::{
        Artifact, FileNode, ManifestRow, QuarantineInfo, QuarantineKey, Registry, TagRow,
        VersionRecord,
    },
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantineEntry {
    pub key: QuarantineKey,
    pub info: QuarantineInfo,
}

/// Serializable snapshot of registry metadata.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub registries: Vec<Registry>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub manifests: Vec<ManifestRow>,
    #[serde(default)]
    pub tags: Vec<TagRow>,
    #[serde(default)]
    pub versions: Vec<VersionRecord>,
    #[serde(default)]
    pub files: Vec<FileNode>,
    #[serde(default)]
    pub quarantine: Vec<QuarantineEntry>,
}

/// All metadata stores backed by an immutable [`Catalog`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    catalog: Catalog,
    quarantine: HashMap<QuarantineKey, QuarantineInfo>,
}

impl MemoryStore {
    pub fn new(catalog: Catalog) -> Self {
        let quarantine = catalog
            .quarantine
            .iter()
            .map(|entry| (entry.key.clone(), entry.info.clone()))
            .collect();

        Self {
            catalog,
            quarantine,
        }
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Unable to read catalog: {:?}", path))?;
        let catalog: Catalog = serde_json::from_slice(&data)
            .with_context(|| format!("Unable to parse catalog: {:?}", path))?;

        Ok(Self::new(catalog))
    }

    pub fn registry(&self, name: &str) -> Option<&Registry> {
        self.catalog.registries.iter().find(|r| r.name == name)
    }

    fn manifest(&self, registry_id: i64, id: i64) -> Option<&ManifestRow> {
        self.catalog
            .manifests
            .iter()
            .find(|m| m.registry_id == registry_id && m.id == id)
    }

    fn tags_for(&self, registry_id: i64, image: &str) -> impl Iterator<Item = &TagRow> {
        self.catalog
            .tags
            .iter()
            .filter(move |t| t.registry_id == registry_id && t.image_name == image)
    }

    fn tag_listings(&self, registry_id: i64, image: &str, search: Option<&str>) -> Vec<TagListing> {
        self.tags_for(registry_id, image)
            .filter(|t| matches_search(t.name.as_str(), search))
            .filter_map(|tag| {
                self.manifest(registry_id, tag.manifest_id)
                    .map(|manifest| TagListing {
                        tag: tag.clone(),
                        manifest: manifest.clone(),
                    })
            })
            .collect()
    }

    fn manifest_listings(
        &self,
        registry_id: i64,
        image: &str,
        search: Option<&Digest>,
    ) -> Vec<ManifestListing> {
        self.catalog
            .manifests
            .iter()
            .filter(|m| m.registry_id == registry_id && m.image_name == image)
            .filter(|m| search.is_none_or(|digest| &m.digest == digest))
            .map(|manifest| {
                let mut tags: Vec<TagName> = self
                    .tags_for(registry_id, image)
                    .filter(|t| t.manifest_id == manifest.id)
                    .map(|t| t.name.clone())
                    .collect();
                tags.sort();

                ManifestListing {
                    manifest: manifest.clone(),
                    tags,
                }
            })
            .collect()
    }

    fn versions_for(
        &self,
        registry_id: i64,
        image: &str,
        search: Option<&str>,
    ) -> Vec<VersionRecord> {
        self.catalog
            .versions
            .iter()
            .filter(|v| v.registry_id == registry_id && v.image_name == image)
            .filter(|v| matches_search(&v.version, search))
            .cloned()
            .collect()
    }

    fn files_for(
        &self,
        registry_id: i64,
        image: &str,
        version: &str,
        search: Option<&str>,
    ) -> Vec<FileNode> {
        self.catalog
            .files
            .iter()
            .filter(|f| {
                f.registry_id == registry_id && f.image_name == image && f.version == version
            })
            .filter(|f| matches_search(&f.name, search))
            .cloned()
            .collect()
    }
}

impl From<Catalog> for MemoryStore {
    fn from(catalog: Catalog) -> Self {
        Self::new(catalog)
    }
}

/// Case-insensitive substring match, the in-memory equivalent of `LIKE '%term%'`.
fn matches_search(value: &str, search: Option<&str>) -> bool {
    match search {
        Some(term) if !term.is_empty() => value
            .to_ascii_lowercase()
            .contains(&term.to_ascii_lowercase()),
        _ => true,
    }
}

fn window<T, S>(
    mut rows: Vec<T>,
    query: &ListQuery<S>,
    compare: impl Fn(&T, &T) -> Ordering,
    tiebreak: impl Fn(&T, &T) -> Ordering,
) -> Vec<T> {
    rows.sort_by(|a, b| {
        query
            .sort
            .order
            .apply(compare(a, b))
            .then_with(|| tiebreak(a, b))
    });

    rows.into_iter()
        .skip(usize::try_from(query.offset).unwrap_or(usize::MAX))
        .take(usize::try_from(query.limit).unwrap_or(usize::MAX))
        .collect()
}

#[async_trait]
impl ManifestStore for MemoryStore {
    async fn get_manifest_by_id(&self, registry_id: i64, id: i64) -> Result<Option<ManifestRow>> {
        Ok(self.manifest(registry_id, id).cloned())
    }

    async fn get_manifest_by_digest(
        &self,
        registry_id: i64,
        image: &str,
        digest: &Digest,
    ) -> Result<Option<ManifestRow>> {
        Ok(self
            .catalog
            .manifests
            .iter()
            .find(|m| m.registry_id == registry_id && m.image_name == image && &m.digest == digest)
            .cloned())
    }

    async fn list_manifests(
        &self,
        registry_id: i64,
        image: &str,
        query: &ListQuery<Digest>,
    ) -> Result<Vec<ManifestListing>> {
        let rows = self.manifest_listings(registry_id, image, query.search.as_ref());

        Ok(window(
            rows,
            query,
            |a, b| {
                let (a, b) = (&a.manifest, &b.manifest);
                match query.sort.field {
                    SortField::Name => a.digest.cmp(&b.digest),
                    SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                    SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                    SortField::Size => a.total_size.cmp(&b.total_size),
                    SortField::DownloadsCount => a.download_count.cmp(&b.download_count),
                }
            },
            |a, b| a.manifest.digest.cmp(&b.manifest.digest),
        ))
    }

    async fn count_manifests(
        &self,
        registry_id: i64,
        image: &str,
        search: Option<&Digest>,
    ) -> Result<u64> {
        Ok(self.manifest_listings(registry_id, image, search).len() as u64)
    }
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn get_tag_by_name(
        &self,
        registry_id: i64,
        image: &str,
        tag: &TagName,
    ) -> Result<Option<TagRow>> {
        Ok(self
            .tags_for(registry_id, image)
            .find(|t| &t.name == tag)
            .cloned())
    }

    async fn list_tags(
        &self,
        registry_id: i64,
        image: &str,
        query: &ListQuery,
    ) -> Result<Vec<TagListing>> {
        let rows = self.tag_listings(registry_id, image, query.search.as_deref());

        Ok(window(
            rows,
            query,
            |a, b| match query.sort.field {
                SortField::Name => a.tag.name.cmp(&b.tag.name),
                SortField::CreatedAt => a.tag.created_at.cmp(&b.tag.created_at),
                SortField::UpdatedAt => a.tag.updated_at.cmp(&b.tag.updated_at),
                SortField::Size => a.manifest.total_size.cmp(&b.manifest.total_size),
                SortField::DownloadsCount => a
                    .manifest
                    .download_count
                    .cmp(&b.manifest.download_count),
            },
            |a, b| a.tag.name.cmp(&b.tag.name),
        ))
    }

    async fn count_tags(
        &self,
        registry_id: i64,
        image: &str,
        search: Option<&str>,
    ) -> Result<u64> {
        Ok(self.tag_listings(registry_id, image, search).len() as u64)
    }

    async fn latest_tag_name(&self, registry_id: i64, image: &str) -> Result<Option<TagName>> {
        Ok(self
            .tags_for(registry_id, image)
            .max_by(|a, b| {
                a.updated_at
                    .cmp(&b.updated_at)
                    .then_with(|| a.name.cmp(&b.name))
            })
            .map(|t| t.name.clone()))
    }
}

#[async_trait]
impl VersionStore for MemoryStore {
    async fn get_version(
        &self,
        registry_id: i64,
        image: &str,
        version: &str,
    ) -> Result<Option<VersionRecord>> {
        Ok(self
            .catalog
            .versions
            .iter()
            .find(|v| {
                v.registry_id == registry_id && v.image_name == image && v.version == version
            })
            .cloned())
    }

    async fn list_versions(
        &self,
        registry_id: i64,
        image: &str,
        query: &ListQuery,
    ) -> Result<Vec<VersionRecord>> {
        let rows = self.versions_for(registry_id, image, query.search.as_deref());

        Ok(window(
            rows,
            query,
            |a, b| match query.sort.field {
                SortField::Name => a.version.cmp(&b.version),
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                SortField::Size => a.size.cmp(&b.size),
                SortField::DownloadsCount => a.download_count.cmp(&b.download_count),
            },
            |a, b| a.version.cmp(&b.version),
        ))
    }

    async fn count_versions(
        &self,
        registry_id: i64,
        image: &str,
        search: Option<&str>,
    ) -> Result<u64> {
        Ok(self.versions_for(registry_id, image, search).len() as u64)
    }

    async fn latest_version(&self, registry_id: i64, image: &str) -> Result<Option<String>> {
        Ok(self
            .versions_for(registry_id, image, None)
            .into_iter()
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.version.cmp(&b.version))
            })
            .map(|v| v.version))
    }
}

#[async_trait]
impl FileStore for MemoryStore {
    async fn list_files(
        &self,
        registry_id: i64,
        image: &str,
        version: &str,
        query: &ListQuery,
    ) -> Result<Vec<FileNode>> {
        let rows = self.files_for(registry_id, image, version, query.search.as_deref());

        // Files are never modified or downloaded as a unit, so those keys fall back.
        Ok(window(
            rows,
            query,
            |a, b| match query.sort.field {
                SortField::Name => a.name.cmp(&b.name),
                SortField::Size => a.size.cmp(&b.size),
                SortField::CreatedAt | SortField::UpdatedAt | SortField::DownloadsCount => {
                    a.created_at.cmp(&b.created_at)
                }
            },
            |a, b| a.name.cmp(&b.name),
        ))
    }

    async fn count_files(
        &self,
        registry_id: i64,
        image: &str,
        version: &str,
        search: Option<&str>,
    ) -> Result<u64> {
        Ok(self.files_for(registry_id, image, version, search).len() as u64)
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn get_artifact(&self, registry_id: i64, image: &str) -> Result<Option<Artifact>> {
        Ok(self
            .catalog
            .artifacts
            .iter()
            .find(|a| a.registry_id == registry_id && a.name == image)
            .cloned())
    }
}

#[async_trait]
impl QuarantineStore for MemoryStore {
    async fn batch_get_quarantine_info(
        &self,
        keys: &[QuarantineKey],
    ) -> Result<HashMap<QuarantineKey, QuarantineInfo>> {
        Ok(keys
            .iter()
            .filter_map(|key| {
                self.quarantine
                    .get(key)
                    .map(|info| (key.clone(), info.clone()))
            })
            .collect())
    }
}
