//! CLI argument parsing via clap.

use clap::{Parser, Subcommand};

/// Authenticated client for the storefront REST API.
#[derive(Debug, Parser)]
#[command(
    name = "storefront",
    version,
    long_version = storefront_client::build_info::LONG_VERSION
)]
pub struct Args {
    /// Path to config file (default: ./storefront.toml or ~/.config/storefront/storefront.toml).
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<String>,

    /// Override API base URL.
    #[arg(long = "base-url", global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store a credential pair obtained from the sign-in endpoint.
    Login {
        /// Access credential.
        #[arg(long = "access")]
        access: String,
        /// Refresh credential. Prompted for (hidden) when omitted.
        #[arg(long = "refresh")]
        refresh: Option<String>,
    },
    /// Remove stored credentials.
    Logout,
    /// Show whether credentials are stored.
    Status,
    /// Send one authenticated request and print the response body.
    Request {
        /// HTTP method, e.g. GET or POST.
        method: String,
        /// Path relative to the configured base URL, or an absolute URL.
        path: String,
        /// JSON request body.
        #[arg(long = "data")]
        data: Option<String>,
        /// Extra header as `Name: value`. Repeatable.
        #[arg(long = "header", value_name = "NAME:VALUE")]
        headers: Vec<String>,
    },
    /// Write the default config to ~/.config/storefront/storefront.toml.
    Init,
}

/// Split a `Name: value` header argument.
pub fn parse_header_arg(raw: &str) -> Result<(String, String), String> {
    let Some((name, value)) = raw.split_once(':') else {
        return Err(format!("header `{raw}` must look like `Name: value`"));
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("header `{raw}` has an empty name"));
    }
    Ok((name.to_string(), value.trim().to_string()))
}
