use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::digest::{Digest, DigestError};

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid tag name {0:?}")]
pub struct TagError(pub String);

/// A mutable name pointing at a manifest. Never interchangeable with a [`Digest`].
#[derive(Clone, Debug, Hash, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct TagName(String);

impl TagName {
    pub fn new(name: impl Into<String>) -> Result<Self, TagError> {
        let name = name.into();
        if !TAG_PATTERN.is_match(&name) {
            return Err(TagError(name));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TagName {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TagName {
    type Error = TagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TagName> for String {
    fn from(tag: TagName) -> Self {
        tag.0
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for TagName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// How a caller addressed a manifest. The variant is decided by the caller and
/// travels with the request; it is never re-derived from the string shape.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum Reference {
    Tag(TagName),
    Digest(Digest),
}

impl Reference {
    pub fn tag(raw: &str) -> Result<Self, TagError> {
        Ok(Self::Tag(TagName::new(raw)?))
    }

    pub fn digest(raw: &str) -> Result<Self, DigestError> {
        Ok(Self::Digest(Digest::parse(raw)?))
    }

    pub fn is_tag(&self) -> bool {
        matches!(self, Self::Tag(_))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(tag) => tag.fmt(f),
            Self::Digest(digest) => digest.fmt(f),
        }
    }
}
