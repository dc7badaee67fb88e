use std::path::PathBuf;

use anyhow::{Result, bail};

use crate::digest::Digest;

/// Which kind of content a digest is being located for. Config blobs and
/// flat-versioned file nodes live in separate trees.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Namespace {
    Blobs,
    Files,
}

/// Deterministic (root, digest) to storage path mapping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentPaths {
    namespace: Namespace,
}

impl ContentPaths {
    pub fn blobs() -> Self {
        Self {
            namespace: Namespace::Blobs,
        }
    }

    pub fn files() -> Self {
        Self {
            namespace: Namespace::Files,
        }
    }

    /// Storage path, relative to the blob backend, for `digest` under `root`.
    ///
    /// The root identifier is lower-cased so that `Acme` and `acme` share a tree.
    pub fn resolve_path(&self, root: &str, digest: &Digest) -> Result<PathBuf> {
        let root = root.trim();
        if root.is_empty() {
            bail!("Registry root identifier is empty");
        }
        if root
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_whitespace())
            || root == "."
            || root == ".."
        {
            bail!("Registry root identifier {root:?} is not a single path segment");
        }

        let root = PathBuf::from(root.to_ascii_lowercase());

        Ok(match self.namespace {
            Namespace::Blobs => root
                .join("docker")
                .join("blobs")
                .join(digest.to_path())
                .join("data"),
            Namespace::Files => root.join("files").join(&digest.algo).join(&digest.hash),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest() -> Digest {
        format!("sha256:{}", "ab".repeat(32)).parse().unwrap()
    }

    #[test]
    fn blob_paths() {
        let path = ContentPaths::blobs().resolve_path("Acme", &digest()).unwrap();

        assert_eq!(
            path,
            PathBuf::from(format!("acme/docker/blobs/sha256/ab/{}/data", "ab".repeat(32)))
        );
    }

    #[test]
    fn deterministic() {
        let paths = ContentPaths::blobs();

        assert_eq!(
            paths.resolve_path("acme", &digest()).unwrap(),
            paths.resolve_path("acme", &digest()).unwrap()
        );
    }

    #[test]
    fn file_nodes_use_their_own_tree() {
        let blob = ContentPaths::blobs().resolve_path("acme", &digest()).unwrap();
        let file = ContentPaths::files().resolve_path("acme", &digest()).unwrap();

        assert_ne!(blob, file);
        assert_eq!(
            file,
            PathBuf::from(format!("acme/files/sha256/{}", "ab".repeat(32)))
        );
    }

    #[test]
    fn rejects_bad_roots() {
        let paths = ContentPaths::blobs();

        assert!(paths.resolve_path("", &digest()).is_err());
        assert!(paths.resolve_path("   ", &digest()).is_err());
        assert!(paths.resolve_path("..", &digest()).is_err());
        assert!(paths.resolve_path("a/b", &digest()).is_err());
    }
}
