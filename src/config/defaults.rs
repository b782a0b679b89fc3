//! Default configuration constants.

/// Embedded default `storefront.toml` template written by `storefront init`.
pub(super) const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("templates/storefront.toml");
/// Default remote API base URL.
pub(super) const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
/// Default timeout for one HTTP exchange, refresh calls included.
pub(super) const DEFAULT_API_TIMEOUT_SECS: u64 = 30;
/// Default bound on how long a queued request waits for a refresh.
pub(super) const DEFAULT_REFRESH_WAIT_TIMEOUT_SECS: u64 = 30;
/// Default log filter when neither `RUST_LOG` nor config sets one.
pub(super) const DEFAULT_LOG_LEVEL: &str = "warn";
