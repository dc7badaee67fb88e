use std::convert::TryFrom;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use data_encoding::HEXLOWER;
use ring::digest;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DigestError {
    #[error("digest is empty")]
    Empty,
    #[error("digest {0:?} is not of the form algorithm:hex")]
    Malformed(String),
    #[error("unsupported digest algorithm {0:?}")]
    UnsupportedAlgorithm(String),
    #[error("digest hash {hash:?} should be {expected} hex characters for {algo}")]
    InvalidLength {
        algo: String,
        hash: String,
        expected: usize,
    },
    #[error("digest hash {0:?} contains non-hex characters")]
    InvalidHex(String),
}

/// Content address of an immutable blob, `algorithm:hex`.
#[derive(Clone, Debug, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct Digest {
    pub algo: String,
    pub hash: String,
}

fn expected_length(algo: &str) -> Option<usize> {
    match algo {
        "sha256" => Some(64),
        "sha384" => Some(96),
        "sha512" => Some(128),
        _ => None,
    }
}

impl Digest {
    pub fn parse(raw: &str) -> Result<Digest, DigestError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DigestError::Empty);
        }

        let (algo, hash) = raw
            .split_once(':')
            .ok_or_else(|| DigestError::Malformed(raw.to_string()))?;

        if algo.is_empty() || hash.is_empty() || hash.contains(':') {
            return Err(DigestError::Malformed(raw.to_string()));
        }

        let algo = algo.to_ascii_lowercase();
        let expected =
            expected_length(&algo).ok_or_else(|| DigestError::UnsupportedAlgorithm(algo.clone()))?;

        if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DigestError::InvalidHex(hash.to_string()));
        }

        if hash.len() != expected {
            return Err(DigestError::InvalidLength {
                algo,
                hash: hash.to_string(),
                expected,
            });
        }

        Ok(Digest {
            algo,
            hash: hash.to_ascii_lowercase(),
        })
    }

    pub fn from_sha256(digest: &digest::Digest) -> Digest {
        Digest {
            algo: "sha256".to_string(),
            hash: HEXLOWER.encode(digest.as_ref()),
        }
    }

    /// Digest of `content` using sha256.
    pub fn of(content: &[u8]) -> Digest {
        Self::from_sha256(&digest::digest(&digest::SHA256, content))
    }

    pub fn to_path(&self) -> PathBuf {
        Path::new(&self.algo)
            .join(&self.hash[0..2])
            .join(&self.hash)
    }
}

impl FromStr for Digest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Digest::parse(s)
    }
}

// We implement this so that serde_json can parse a Digest from a straight string
impl TryFrom<String> for Digest {
    type Error = DigestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Digest::parse(&value)
    }
}

// We implement this so that serde_json can serialize a Digest struct into a string
impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        format!("{}", digest)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algo, self.hash)
    }
}
