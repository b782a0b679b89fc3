//! Credential pair persistence.
//!
//! The access and refresh credentials live as two string entries in a
//! client-side key/value store. [`FileStore`] keeps them encrypted under
//! `~/.config/storefront/credentials.json`; [`MemoryStore`] keeps them in
//! process memory.

mod credentials;
mod crypto;
mod error;
mod store;
mod types;

pub use credentials::Credentials;
pub use error::StoreError;
pub use store::{default_credentials_path, CredentialStore, FileStore, MemoryStore};
pub use types::{
    CredentialKeys, CredentialPair, SessionHealth, DEFAULT_ACCESS_KEY, DEFAULT_REFRESH_KEY,
};
