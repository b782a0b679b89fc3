//! Durable string-valued key/value storage for credentials.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::crypto::{
    decrypt_entries, encrypt_entries, looks_encrypted_store, DEFAULT_KDF_LOG_N, MAX_KDF_LOG_N,
};
use super::error::StoreError;
use crate::config::config_root_dir;

/// Client-side key/value storage holding the credential pair.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Returns `true` when an entry was removed.
    fn remove(&self, key: &str) -> Result<bool, StoreError>;
}

/// Process-local store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        // A poisoned map is still a consistent map of strings.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lock().remove(key).is_some())
    }
}

/// Legacy plaintext layout, migrated to the encrypted layout on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct PlainStoreFile {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

/// Encrypted JSON file store with an in-memory read cache.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    kdf_log_n: u8,
    cache: Mutex<Option<BTreeMap<String, String>>>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kdf_log_n: DEFAULT_KDF_LOG_N,
            cache: Mutex::new(None),
        }
    }

    /// Override the scrypt cost for newly written files, capped so the
    /// result stays readable.
    pub fn with_kdf_log_n(mut self, kdf_log_n: u8) -> Self {
        self.kdf_log_n = kdf_log_n.min(MAX_KDF_LOG_N);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> (T, bool),
    ) -> Result<T, StoreError> {
        let mut cache = self
            .cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if cache.is_none() {
            *cache = Some(load_entries(&self.path, self.kdf_log_n)?);
        }
        let Some(entries) = cache.as_mut() else {
            return Err(StoreError::Invalid("credential cache unavailable".to_string()));
        };
        let (out, dirty) = f(entries);
        if dirty {
            if let Err(err) = write_entries(&self.path, entries, self.kdf_log_n) {
                // Disk is the source of truth; reload next time.
                *cache = None;
                return Err(err);
            }
        }
        Ok(out)
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.with_entries(|entries| (entries.get(key).cloned(), false))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.with_entries(|entries| {
            let changed = entries.get(key).map(String::as_str) != Some(value);
            entries.insert(key.to_string(), value.to_string());
            ((), changed)
        })
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        self.with_entries(|entries| {
            let removed = entries.remove(key).is_some();
            (removed, removed)
        })
    }
}

/// Returns the default credential file path (`~/.config/storefront/credentials.json`).
pub fn default_credentials_path() -> Option<PathBuf> {
    config_root_dir().map(|dir| dir.join("storefront").join("credentials.json"))
}

/// Load and decode the credential file, including plaintext migration.
pub(crate) fn load_entries(
    path: &Path,
    kdf_log_n: u8,
) -> Result<BTreeMap<String, String>, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            let value: serde_json::Value = serde_json::from_str(&text).map_err(|err| {
                StoreError::Invalid(format!(
                    "failed to parse credential store `{}`: {err}",
                    path.display()
                ))
            })?;

            if looks_encrypted_store(&value) {
                let encrypted = serde_json::from_value(value).map_err(|err| {
                    StoreError::Invalid(format!(
                        "failed to parse encrypted credential store `{}`: {err}",
                        path.display()
                    ))
                })?;
                return decrypt_entries(&encrypted);
            }

            let parsed: PlainStoreFile = serde_json::from_value(value).map_err(|err| {
                StoreError::Invalid(format!(
                    "failed to parse credential store `{}`: {err}",
                    path.display()
                ))
            })?;
            if !parsed.entries.is_empty() {
                // Best-effort migration. If re-write fails, keep serving plaintext.
                if let Err(err) = write_entries(path, &parsed.entries, kdf_log_n) {
                    tracing::warn!(path = %path.display(), error = %err, "credential store migration failed");
                }
            }
            Ok(parsed.entries)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
        Err(err) => Err(StoreError::Io(err)),
    }
}

/// Encrypt and persist entries to disk with restrictive permissions.
pub(crate) fn write_entries(
    path: &Path,
    entries: &BTreeMap<String, String>,
    kdf_log_n: u8,
) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700));
        }
    }

    let encrypted = encrypt_entries(entries, kdf_log_n)?;
    let text = serde_json::to_string_pretty(&encrypted).map_err(|err| {
        StoreError::Invalid(format!("failed to serialize encrypted credential store: {err}"))
    })?;
    let mut options = std::fs::OpenOptions::new();
    options.create(true).truncate(true).write(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testsupport::TestTempDir;

    /// Cheap scrypt cost so tests stay fast.
    const TEST_KDF_LOG_N: u8 = 4;

    #[test]
    fn memory_store_round_trips_and_removes() {
        let store = MemoryStore::new();
        assert_eq!(store.get("access_token").unwrap(), None);
        store.set("access_token", "a1").unwrap();
        assert_eq!(store.get("access_token").unwrap().as_deref(), Some("a1"));
        assert!(store.remove("access_token").unwrap());
        assert!(!store.remove("access_token").unwrap());
    }

    #[test]
    fn file_store_encrypts_values_on_disk() {
        let tmp = TestTempDir::new("file-store-encrypt");
        let path = tmp.child("credentials.json");
        let store = FileStore::new(&path).with_kdf_log_n(TEST_KDF_LOG_N);
        store.set("access_token", "access-plain-text").unwrap();
        store.set("refresh_token", "refresh-plain-text").unwrap();

        let raw = std::fs::read_to_string(&path).expect("read encrypted file");
        assert!(raw.contains("\"encryption\""), "raw: {raw}");
        assert!(!raw.contains("plain-text"), "token leaked in credential file");

        // A fresh instance must read back through decryption, not the cache.
        let reopened = FileStore::new(&path);
        assert_eq!(
            reopened.get("access_token").unwrap().as_deref(),
            Some("access-plain-text")
        );
        assert_eq!(
            reopened.get("refresh_token").unwrap().as_deref(),
            Some("refresh-plain-text")
        );
    }

    #[test]
    fn file_store_remove_persists() {
        let tmp = TestTempDir::new("file-store-remove");
        let path = tmp.child("credentials.json");
        let store = FileStore::new(&path).with_kdf_log_n(TEST_KDF_LOG_N);
        store.set("access_token", "a").unwrap();
        store.set("refresh_token", "r").unwrap();
        assert!(store.remove("access_token").unwrap());

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get("access_token").unwrap(), None);
        assert_eq!(reopened.get("refresh_token").unwrap().as_deref(), Some("r"));
    }

    #[test]
    fn load_migrates_plaintext_store_to_encrypted_format() {
        let tmp = TestTempDir::new("file-store-migrate");
        let path = tmp.write_text(
            "credentials.json",
            r#"{"version":1,"entries":{"access_token":"legacy-access"}}"#,
        );

        let loaded = load_entries(&path, TEST_KDF_LOG_N).expect("load + migrate plaintext");
        assert_eq!(
            loaded.get("access_token").map(String::as_str),
            Some("legacy-access")
        );

        let migrated = std::fs::read_to_string(&path).expect("read migrated store");
        assert!(migrated.contains("\"encryption\""), "raw: {migrated}");
        assert!(!migrated.contains("legacy-access"), "plaintext token remained");
    }

    #[test]
    fn load_reports_tampered_encrypted_payload() {
        let tmp = TestTempDir::new("file-store-tamper");
        let path = tmp.child("credentials.json");
        let mut entries = BTreeMap::new();
        entries.insert("access_token".to_string(), "token-a".to_string());
        write_entries(&path, &entries, TEST_KDF_LOG_N).expect("write encrypted store");

        let mut value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read encrypted"))
                .expect("parse encrypted json");
        let ciphertext = value["entries"]["access_token"]["ciphertext"]
            .as_str()
            .expect("ciphertext")
            .to_string();
        value["entries"]["access_token"]["ciphertext"] =
            serde_json::Value::String(format!("{ciphertext}AA"));
        std::fs::write(
            &path,
            serde_json::to_string_pretty(&value).expect("serialize tampered"),
        )
        .expect("write tampered");

        let err = load_entries(&path, TEST_KDF_LOG_N).expect_err("tampered payload should fail");
        assert!(err.to_string().contains("failed to decrypt"), "got: {err}");
    }

    #[test]
    fn oversized_key_derivation_cost_is_an_error() {
        let tmp = TestTempDir::new("file-store-kdf-cost");
        let path = tmp.child("credentials.json");
        FileStore::new(&path)
            .with_kdf_log_n(TEST_KDF_LOG_N)
            .set("access_token", "token-a")
            .expect("write encrypted store");

        let mut value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read encrypted"))
                .expect("parse encrypted json");
        value["encryption"]["kdf_log_n"] = serde_json::json!(40);
        std::fs::write(&path, value.to_string()).expect("write oversized cost");

        let err = FileStore::new(&path)
            .get("access_token")
            .expect_err("oversized cost must be rejected before deriving");
        assert!(err.to_string().contains("exceeds the maximum"), "got: {err}");
    }

    #[test]
    fn load_missing_path_returns_empty_entries() {
        let tmp = TestTempDir::new("file-store-missing");
        let loaded = load_entries(&tmp.child("nope.json"), TEST_KDF_LOG_N).expect("default");
        assert!(loaded.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn written_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TestTempDir::new("file-store-perms");
        let path = tmp.child("nested/credentials.json");
        let store = FileStore::new(&path).with_kdf_log_n(TEST_KDF_LOG_N);
        store.set("access_token", "a").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }
}
