//! Refresh endpoint protocol: exchange a refresh credential for a new access credential.

use serde::Deserialize;
use serde_json::json;

use super::request::RequestDescriptor;
use super::transport::Transport;
use crate::error::RefreshError;

/// Default path of the token refresh endpoint.
pub const DEFAULT_REFRESH_PATH: &str = "/auth/token/refresh/";

/// Longest body excerpt kept in refresh errors.
const ERROR_BODY_LIMIT: usize = 512;

/// Credentials returned by a successful refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
    pub access: String,
    /// Present only when the server rotates refresh credentials.
    pub refresh: Option<String>,
}

impl std::fmt::Debug for RefreshedTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshedTokens")
            .field("rotated", &self.refresh.is_some())
            .finish_non_exhaustive()
    }
}

/// Refresh endpoint response shape.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    access: Option<String>,
    #[serde(default)]
    refresh: Option<String>,
}

/// Call the refresh endpoint once. Never retries.
pub(crate) async fn request_refresh(
    transport: &dyn Transport,
    refresh_path: &str,
    refresh_token: &str,
) -> Result<RefreshedTokens, RefreshError> {
    let request = RequestDescriptor::post(refresh_path)
        .with_json(&json!({ "refresh": refresh_token }))
        .map_err(|err| RefreshError::InvalidResponse(format!("encode refresh body: {err}")))?;

    let response = transport
        .dispatch(&request, None)
        .await
        .map_err(|err| RefreshError::Transport(err.to_string()))?;

    if response.is_unauthorized() {
        return Err(RefreshError::Rejected {
            status: response.status,
            body: excerpt(&response.text()),
        });
    }
    if !response.is_success() {
        return Err(RefreshError::Status {
            status: response.status,
            body: excerpt(&response.text()),
        });
    }

    let payload: RefreshResponse = response
        .json()
        .map_err(|err| RefreshError::InvalidResponse(err.to_string()))?;
    let access = payload.access.unwrap_or_default().trim().to_string();
    if access.is_empty() {
        return Err(RefreshError::InvalidResponse(
            "refresh response did not include `access`".to_string(),
        ));
    }
    let refresh = payload
        .refresh
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());
    Ok(RefreshedTokens { access, refresh })
}

/// True when `path` targets the refresh endpoint, ignoring slashes and query.
pub(crate) fn is_refresh_target(path: &str, refresh_path: &str) -> bool {
    normalize_path(path) == normalize_path(refresh_path)
}

fn normalize_path(path: &str) -> &str {
    let path = match path.find("://") {
        Some(scheme_end) => {
            let rest = &path[scheme_end + 3..];
            rest.find('/').map_or("", |slash| &rest[slash..])
        }
        None => path,
    };
    let path = path.split(|c| c == '?' || c == '#').next().unwrap_or_default();
    path.trim_matches('/')
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= ERROR_BODY_LIMIT {
        return trimmed.to_string();
    }
    let mut end = ERROR_BODY_LIMIT;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}
