//! Build metadata surfaced by `storefront --version`.

/// Short commit hash, or `unknown` outside a git checkout.
pub const GIT_COMMIT: &str = env!("STOREFRONT_BUILD_GIT_HASH");

/// UTC build time, or `unknown` when it could not be determined.
pub const BUILD_TIMESTAMP: &str = env!("STOREFRONT_BUILD_TIMESTAMP");

/// Printed by clap after the binary name, e.g. `0.1.5 (3f2a9c1d0b7e, built 2026-10-17T09:00:00Z)`.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("STOREFRONT_BUILD_GIT_HASH"),
    ", built ",
    env!("STOREFRONT_BUILD_TIMESTAMP"),
    ")"
);
