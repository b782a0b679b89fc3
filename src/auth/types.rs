//! Public credential model types.

use serde::{Deserialize, Serialize};

/// Storage key for the access credential unless configured otherwise.
pub const DEFAULT_ACCESS_KEY: &str = "access_token";
/// Storage key for the refresh credential unless configured otherwise.
pub const DEFAULT_REFRESH_KEY: &str = "refresh_token";

/// Access + refresh credentials issued together at login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

// Tokens stay out of debug output and therefore out of logs.
impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// Well-known storage key names for the credential pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialKeys {
    pub access: String,
    pub refresh: String,
}

impl Default for CredentialKeys {
    fn default() -> Self {
        Self {
            access: DEFAULT_ACCESS_KEY.to_string(),
            refresh: DEFAULT_REFRESH_KEY.to_string(),
        }
    }
}

/// Presence summary for stored credentials, without exposing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionHealth {
    pub has_access_token: bool,
    pub has_refresh_token: bool,
}

impl SessionHealth {
    pub fn is_logged_in(&self) -> bool {
        self.has_access_token || self.has_refresh_token
    }
}
