use anyhow::{Context, Result, bail};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use url::{Position, Url};

use crate::{digest::Digest, types::PackageType};

// Path-safe, but '/' is kept so nested image names stay readable.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Formats the human facing URLs of a registry deployment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryUrls {
    base: Url,
}

impl RegistryUrls {
    pub fn new(base: Url) -> Result<Self> {
        if base.cannot_be_a_base() || base.host_str().is_none() {
            bail!("Registry URL {base} cannot be used as a base");
        }
        Ok(Self { base })
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let base = Url::parse(raw).with_context(|| format!("Invalid registry URL {raw:?}"))?;
        Self::new(base)
    }

    fn base(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    /// The base URL without its scheme, e.g. `registry.example.com:8443`.
    pub fn host(&self) -> &str {
        self.base[Position::BeforeHost..].trim_end_matches('/')
    }

    /// `{host}/{root}/{registry}`, the prefix OCI clients pull from.
    pub fn registry_ref(&self, root: &str, registry: &str) -> String {
        format!("{}/{}/{}", self.host(), root.to_ascii_lowercase(), registry)
    }

    /// Endpoint serving a flat-versioned registry to its native client.
    pub fn package_url(&self, root: &str, registry: &str, package_type: PackageType) -> String {
        format!(
            "{}/pkg/{}/{}/{}",
            self.base(),
            root.to_ascii_lowercase(),
            registry,
            package_type.path_segment()
        )
    }

    /// UI link for one version of an artifact.
    pub fn tag_url(&self, root: &str, registry: &str, image: &str, version: &str) -> String {
        format!(
            "{}/registry/{}/{}/{}/{}",
            self.base(),
            root.to_ascii_lowercase(),
            encode(registry),
            encode(image),
            encode(version)
        )
    }
}

fn encode(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

/// Storage-facing path of a manifest, `{registry}/{image}/{digest}`.
pub fn registry_path(registry: &str, image: &str, digest: &Digest) -> String {
    format!("{registry}/{image}/{digest}")
}
