use serde::Deserialize;

use crate::digest::Digest;

pub const DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct Platform {
    #[serde(default)]
    pub architecture: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub variant: Option<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    #[serde(default)]
    pub media_type: String,
    pub digest: Digest,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub platform: Option<Platform>,
}

/// Single platform image (or chart) manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcreteManifest {
    pub media_type: String,
    pub config: Descriptor,
    pub layers: Vec<Descriptor>,
}

/// Ordered references to concrete manifests, one per platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestList {
    pub media_type: String,
    pub manifests: Vec<Descriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedManifest {
    Concrete(ConcreteManifest),
    List(ManifestList),
    Unknown { media_type: Option<String> },
}

impl ResolvedManifest {
    pub fn media_type(&self) -> &str {
        match self {
            Self::Concrete(manifest) => &manifest.media_type,
            Self::List(list) => &list.media_type,
            Self::Unknown { media_type } => media_type.as_deref().unwrap_or("unknown"),
        }
    }
}

// Every field is optional here so that the discriminators, not serde, decide the shape.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    #[serde(default)]
    media_type: Option<String>,
    #[serde(default)]
    config: Option<Descriptor>,
    #[serde(default)]
    layers: Vec<Descriptor>,
    #[serde(default)]
    manifests: Option<Vec<Descriptor>>,
}

/// Decode a stored manifest payload.
///
/// Shapes are tried in a fixed order: docker image manifest, OCI image
/// manifest, then docker list / OCI index. Anything else, schema1 included,
/// is [`ResolvedManifest::Unknown`]. Only a payload that is not JSON at all
/// (or carries malformed digests) is an error.
pub fn classify(payload: &[u8]) -> Result<ResolvedManifest, serde_json::Error> {
    let envelope: Envelope = serde_json::from_slice(payload)?;
    let media_type = envelope.media_type.as_deref();

    if let Some(config) = envelope.config.clone() {
        match media_type {
            Some(DOCKER_MANIFEST) => {
                return Ok(ResolvedManifest::Concrete(ConcreteManifest {
                    media_type: DOCKER_MANIFEST.into(),
                    config,
                    layers: envelope.layers,
                }));
            }
            Some(OCI_MANIFEST) | None => {
                return Ok(ResolvedManifest::Concrete(ConcreteManifest {
                    media_type: OCI_MANIFEST.into(),
                    config,
                    layers: envelope.layers,
                }));
            }
            _ => {}
        }
    }

    if let Some(manifests) = envelope.manifests {
        match media_type {
            Some(DOCKER_MANIFEST_LIST) => {
                return Ok(ResolvedManifest::List(ManifestList {
                    media_type: DOCKER_MANIFEST_LIST.into(),
                    manifests,
                }));
            }
            Some(OCI_INDEX) | None => {
                return Ok(ResolvedManifest::List(ManifestList {
                    media_type: OCI_INDEX.into(),
                    manifests,
                }));
            }
            _ => {}
        }
    }

    Ok(ResolvedManifest::Unknown {
        media_type: envelope.media_type,
    })
}
