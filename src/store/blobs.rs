use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::trace;

use super::BlobStore;

/// Blob content stored as plain files under a root directory.
#[derive(Clone, Debug)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get_content(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        let full = self.root.join(path);
        trace!(path = ?full, "Reading blob");

        match tokio::fs::read(&full).await {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("Unable to read blob content: {:?}", &full))
            }
        }
    }
}

/// Blob content held in memory, keyed by the resolved storage path.
#[derive(Clone, Debug, Default)]
pub struct MemoryBlobStore {
    content: HashMap<PathBuf, Vec<u8>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) {
        self.content.insert(path.into(), content.into());
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get_content(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        Ok(self.content.get(path).cloned())
    }
}
