//! Unified error types for the storefront client.

use crate::api::ApiResponse;
use crate::auth::StoreError;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Errors when loading or parsing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// TransportError
// ---------------------------------------------------------------------------

/// Network-level failures raised before any HTTP status is available.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connect, timeout, DNS, or body-read failure from reqwest.
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    /// The request could not be turned into a valid outbound call.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(inner) if inner.is_timeout())
    }
}

// ---------------------------------------------------------------------------
// RefreshError
// ---------------------------------------------------------------------------

/// Why a refresh cycle failed.
///
/// Cloned into every waiter of the cycle, so variants carry rendered
/// messages rather than source errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error("no refresh credential is stored")]
    MissingRefreshToken,
    #[error("refresh credential was rejected (status {status})")]
    Rejected { status: u16, body: String },
    #[error("refresh endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("refresh call failed: {0}")]
    Transport(String),
    #[error("invalid refresh response: {0}")]
    InvalidResponse(String),
    #[error("failed to persist refreshed credentials: {0}")]
    Storage(String),
    /// The driving request was dropped before the cycle settled.
    #[error("refresh was abandoned before completion")]
    Abandoned,
}

impl RefreshError {
    /// True when the session must be torn down for this failure.
    ///
    /// Only an abandoned cycle leaves credentials in place; nobody learned
    /// anything about their validity.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Abandoned)
    }
}

// ---------------------------------------------------------------------------
// GatewayError
// ---------------------------------------------------------------------------

/// Errors surfaced by [`crate::api::Gateway::send`].
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport failure, passed through without engaging refresh logic.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A 401 that could not be recovered: the replay was rejected again, or
    /// the refresh endpoint itself rejected the caller.
    #[error("unauthorized (status {})", .0.status)]
    Unauthorized(ApiResponse),
    /// The refresh cycle this request depended on failed.
    #[error("session expired: {0}")]
    SessionExpired(RefreshError),
    /// A queued request waited longer than the configured bound for a refresh.
    #[error("timed out after {0:?} waiting for credential refresh")]
    RefreshWaitTimeout(std::time::Duration),
    #[error("credential store: {0}")]
    Store(#[from] StoreError),
}

impl GatewayError {
    /// HTTP status associated with this error, when one exists.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Unauthorized(response) => Some(response.status),
            _ => None,
        }
    }
}
