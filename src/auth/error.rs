//! Credential storage error definitions.

use thiserror::Error;

/// Errors surfaced by credential stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Invalid(String),
    /// The blocking task running a store operation panicked or was cancelled.
    #[error("credential store task failed: {0}")]
    Background(String),
}
