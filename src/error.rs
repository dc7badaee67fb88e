use axum::{
    body::Body,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::{
    digest::{Digest, DigestError},
    metrics::Outcome,
    reference::TagError,
    types::PackageType,
};

/// Malformed caller input, or manifests this core refuses to interpret.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid digest: {0}")]
    Digest(#[from] DigestError),
    #[error(transparent)]
    Tag(#[from] TagError),
    #[error("unsupported manifest type {media_type:?}")]
    UnsupportedManifest { media_type: String },
    #[error("manifest list {list} references nested manifest list {entry}")]
    NestedManifestList { list: Digest, entry: Digest },
    #[error("package type {0} is not supported by this operation")]
    UnsupportedPackageType(PackageType),
    #[error("missing required parameter {0}")]
    MissingParameter(&'static str),
}

/// Which lookup came back empty. Kept distinct all the way to the response body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotFound {
    #[error("tag {tag} not found for {image}")]
    Tag { image: String, tag: String },
    #[error("manifest {reference} not found for {image}")]
    Manifest { image: String, reference: String },
    #[error("manifest config {digest} not found")]
    ManifestConfig { digest: Digest },
    #[error("version {version} not found for {image}")]
    Version { image: String, version: String },
    #[error("artifact {image} not found")]
    Artifact { image: String },
}

impl NotFound {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Tag { .. } => "TAG_NOT_FOUND",
            Self::Manifest { .. } => "MANIFEST_NOT_FOUND",
            Self::ManifestConfig { .. } => "MANIFEST_CONFIG_NOT_FOUND",
            Self::Version { .. } => "VERSION_NOT_FOUND",
            Self::Artifact { .. } => "NAME_UNKNOWN",
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    NotFound(#[from] NotFound),
    #[error("request was cancelled")]
    Cancelled,
    #[error("request deadline exceeded")]
    DeadlineExceeded,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ResolveResult<T> = Result<T, ResolveError>;

impl From<DigestError> for ResolveError {
    fn from(err: DigestError) -> Self {
        Self::Validation(err.into())
    }
}

impl From<TagError> for ResolveError {
    fn from(err: TagError) -> Self {
        Self::Validation(err.into())
    }
}

pub(crate) fn format_error(e: &anyhow::Error) -> String {
    let mut s = String::new();
    s.push_str(&format!("{}", e));
    for cause in e.chain().skip(1) {
        s.push_str(&format!("\nCaused by: {}", cause));
    }
    s
}

pub(crate) fn simple_oci_error(code: &str, message: &str) -> Body {
    Body::from(
        serde_json::json!({
            "errors": [{
                "code": code,
                "message": message
            }]
        })
        .to_string(),
    )
}

impl ResolveError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(err) => match err {
                ValidationError::Digest(_) => "DIGEST_INVALID",
                ValidationError::Tag(_) => "TAG_INVALID",
                ValidationError::UnsupportedManifest { .. } => "MANIFEST_UNSUPPORTED",
                ValidationError::NestedManifestList { .. } => "MANIFEST_LIST_NESTED",
                ValidationError::UnsupportedPackageType(_) => "PACKAGE_TYPE_UNSUPPORTED",
                ValidationError::MissingParameter(_) => "PARAMETER_MISSING",
            },
            Self::NotFound(err) => err.code(),
            Self::Cancelled => "CANCELLED",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            // nginx's "client closed request"
            Self::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
            Self::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            Self::Validation(_) => Outcome::Validation,
            Self::NotFound(_) => Outcome::NotFound,
            Self::Cancelled | Self::DeadlineExceeded => Outcome::Cancelled,
            Self::Internal(_) => Outcome::Internal,
        }
    }

    /// Log internal failures with their full cause chain. Expected outcomes are not logged.
    pub(crate) fn log(&self) {
        if let Self::Internal(err) = self {
            error!(
                error = %format_error(err),
                backtrace = ?err.backtrace(),
                "Resolver error"
            );
        }
    }
}

/// Internal errors have already been logged by the resolver when they are turned
/// into a response, so only the status goes out.
impl IntoResponse for ResolveError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            Self::Internal(_) => Response::builder().status(status).body(Body::empty()),
            _ => Response::builder()
                .status(status)
                .header(header::CONTENT_TYPE, "application/json")
                .body(simple_oci_error(self.code(), &self.to_string())),
        }
        .unwrap_or_else(|err| {
            let err: anyhow::Error = err.into();
            error!(
                error = %format_error(&err),
                backtrace = ?err.backtrace(),
                "Resolver error"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, Body::empty()).into_response()
        })
    }
}
