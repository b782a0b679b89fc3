//! Storefront client: authenticated access to the storefront REST API.
//!
//! Every call goes through a [`Gateway`](api::Gateway) that attaches the
//! stored bearer credential, refreshes it once when the API answers 401
//! (however many requests discover the expiry at the same time), replays
//! the affected requests, and broadcasts a session-expired event when the
//! session cannot be recovered.
//!
//! # Quick start
//!
//! ```no_run
//! use storefront_client::api::{Gateway, RequestDescriptor};
//! use storefront_client::config::load_config;
//!
//! # async fn example() {
//! let config = load_config(None).unwrap();
//! let gateway = Gateway::from_config(&config).unwrap();
//! let response = gateway
//!     .send(&RequestDescriptor::get("/products/"))
//!     .await
//!     .unwrap();
//! println!("{}", response.text());
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod build_info;
pub mod config;
pub mod error;
pub mod session;
#[cfg(test)]
pub mod testsupport;
