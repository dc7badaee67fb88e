//! Read-only views over the metadata stores and the blob backend.
//!
//! Everything here is consumed, never written, by the resolver. The traits are
//! object safe so a resolver can hold any mix of backends behind `Arc<dyn _>`.

use std::{collections::HashMap, path::Path, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;

use crate::{
    digest::Digest,
    page::SortParams,
    reference::TagName,
    types::{
        Artifact, FileNode, ManifestRow, QuarantineInfo, QuarantineKey, TagRow, VersionRecord,
    },
};

mod blobs;
mod memory;

pub use self::blobs::{FsBlobStore, MemoryBlobStore};
pub use self::memory::{Catalog, MemoryStore, QuarantineEntry};

/// Sort, window and search for a listing query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListQuery<S = String> {
    pub sort: SortParams,
    pub limit: u64,
    pub offset: u64,
    pub search: Option<S>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagListing {
    pub tag: TagRow,
    pub manifest: ManifestRow,
}

/// A manifest together with every tag currently pointing at it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestListing {
    pub manifest: ManifestRow,
    pub tags: Vec<TagName>,
}

#[async_trait]
pub trait ManifestStore: Send + Sync {
    async fn get_manifest_by_id(&self, registry_id: i64, id: i64) -> Result<Option<ManifestRow>>;

    async fn get_manifest_by_digest(
        &self,
        registry_id: i64,
        image: &str,
        digest: &Digest,
    ) -> Result<Option<ManifestRow>>;

    /// Every manifest of an image, tagged or not.
    async fn list_manifests(
        &self,
        registry_id: i64,
        image: &str,
        query: &ListQuery<Digest>,
    ) -> Result<Vec<ManifestListing>>;

    async fn count_manifests(
        &self,
        registry_id: i64,
        image: &str,
        search: Option<&Digest>,
    ) -> Result<u64>;
}

#[async_trait]
pub trait TagStore: Send + Sync {
    async fn get_tag_by_name(
        &self,
        registry_id: i64,
        image: &str,
        tag: &TagName,
    ) -> Result<Option<TagRow>>;

    async fn list_tags(
        &self,
        registry_id: i64,
        image: &str,
        query: &ListQuery,
    ) -> Result<Vec<TagListing>>;

    async fn count_tags(&self, registry_id: i64, image: &str, search: Option<&str>)
    -> Result<u64>;

    /// The most recently (re)pointed tag of an image.
    async fn latest_tag_name(&self, registry_id: i64, image: &str) -> Result<Option<TagName>>;
}

#[async_trait]
pub trait VersionStore: Send + Sync {
    async fn get_version(
        &self,
        registry_id: i64,
        image: &str,
        version: &str,
    ) -> Result<Option<VersionRecord>>;

    async fn list_versions(
        &self,
        registry_id: i64,
        image: &str,
        query: &ListQuery,
    ) -> Result<Vec<VersionRecord>>;

    async fn count_versions(
        &self,
        registry_id: i64,
        image: &str,
        search: Option<&str>,
    ) -> Result<u64>;

    async fn latest_version(&self, registry_id: i64, image: &str) -> Result<Option<String>>;
}

/// Files stored for one version of a flat-versioned package.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn list_files(
        &self,
        registry_id: i64,
        image: &str,
        version: &str,
        query: &ListQuery,
    ) -> Result<Vec<FileNode>>;

    async fn count_files(
        &self,
        registry_id: i64,
        image: &str,
        version: &str,
        search: Option<&str>,
    ) -> Result<u64>;
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn get_artifact(&self, registry_id: i64, image: &str) -> Result<Option<Artifact>>;
}

#[async_trait]
pub trait QuarantineStore: Send + Sync {
    /// One round trip for the whole page. Keys without an entry are simply absent.
    async fn batch_get_quarantine_info(
        &self,
        keys: &[QuarantineKey],
    ) -> Result<HashMap<QuarantineKey, QuarantineInfo>>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// `Ok(None)` when nothing is stored at `path`.
    async fn get_content(&self, path: &Path) -> Result<Option<Vec<u8>>>;
}

/// The set of collaborators a resolver reads from.
#[derive(Clone)]
pub struct Backends {
    pub manifests: Arc<dyn ManifestStore>,
    pub tags: Arc<dyn TagStore>,
    pub versions: Arc<dyn VersionStore>,
    pub files: Arc<dyn FileStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub quarantine: Arc<dyn QuarantineStore>,
    pub blobs: Arc<dyn BlobStore>,
}

impl Backends {
    /// Serve all metadata from one [`MemoryStore`].
    pub fn from_memory(store: Arc<MemoryStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            manifests: store.clone(),
            tags: store.clone(),
            versions: store.clone(),
            files: store.clone(),
            artifacts: store.clone(),
            quarantine: store,
            blobs,
        }
    }
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}
