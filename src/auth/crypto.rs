//! Machine-derived encryption-at-rest for the credential file.

use aes_gcm_siv::aead::{Aead, KeyInit};
use aes_gcm_siv::{Aes256GcmSiv, Nonce};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use rand::RngCore;
use scrypt::{scrypt, Params as ScryptParams};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use super::error::StoreError;

pub(crate) const STORE_VERSION_ENCRYPTED: u32 = 3;
/// scrypt cost used for new files; the value is recorded per file.
pub(crate) const DEFAULT_KDF_LOG_N: u8 = 17;
/// Highest scrypt cost accepted from a file (2^20 rounds, 1 GiB of memory).
pub(crate) const MAX_KDF_LOG_N: u8 = 20;
const STORE_SALT_LEN: usize = 16;
const STORE_NONCE_LEN: usize = 12;
const STORE_KEY_LEN: usize = 32;
const MACHINE_KEY_CONTEXT: &str = "storefront-credentials-machine-kek-v1";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct EncryptedStoreFile {
    #[serde(default)]
    pub(crate) version: u32,
    #[serde(default)]
    pub(crate) encryption: EncryptionEnvelope,
    #[serde(default)]
    pub(crate) entries: BTreeMap<String, EncryptedEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct EncryptionEnvelope {
    #[serde(default)]
    pub(crate) salt: String,
    #[serde(default = "default_kdf_log_n")]
    pub(crate) kdf_log_n: u8,
    #[serde(default)]
    pub(crate) wrapped_dek_nonce: String,
    #[serde(default)]
    pub(crate) wrapped_dek_ciphertext: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct EncryptedEntry {
    #[serde(default)]
    pub(crate) nonce: String,
    #[serde(default)]
    pub(crate) ciphertext: String,
}

fn default_kdf_log_n() -> u8 {
    DEFAULT_KDF_LOG_N
}

pub(crate) fn looks_encrypted_store(value: &serde_json::Value) -> bool {
    value
        .get("encryption")
        .and_then(|inner| inner.as_object())
        .is_some()
}

pub(crate) fn encrypt_entries(
    entries: &BTreeMap<String, String>,
    kdf_log_n: u8,
) -> Result<EncryptedStoreFile, StoreError> {
    let mut salt = [0u8; STORE_SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let kek = derive_machine_kek(&salt, kdf_log_n)?;

    let mut dek = [0u8; STORE_KEY_LEN];
    rand::thread_rng().fill_bytes(&mut dek);
    let (wrapped_dek_nonce, wrapped_dek_ciphertext) = encrypt_blob(&kek, &dek)?;

    let mut encrypted = BTreeMap::new();
    for (key, value) in entries {
        let (nonce, ciphertext) = encrypt_blob(&dek, value.as_bytes())?;
        encrypted.insert(
            key.clone(),
            EncryptedEntry {
                nonce: B64.encode(nonce),
                ciphertext: B64.encode(ciphertext),
            },
        );
    }

    Ok(EncryptedStoreFile {
        version: STORE_VERSION_ENCRYPTED,
        encryption: EncryptionEnvelope {
            salt: B64.encode(salt),
            kdf_log_n,
            wrapped_dek_nonce: B64.encode(wrapped_dek_nonce),
            wrapped_dek_ciphertext: B64.encode(wrapped_dek_ciphertext),
        },
        entries: encrypted,
    })
}

pub(crate) fn decrypt_entries(
    file: &EncryptedStoreFile,
) -> Result<BTreeMap<String, String>, StoreError> {
    let kdf_log_n = file.encryption.kdf_log_n;
    if kdf_log_n > MAX_KDF_LOG_N {
        return Err(StoreError::Invalid(format!(
            "credential store key derivation cost {kdf_log_n} exceeds the maximum of {MAX_KDF_LOG_N}"
        )));
    }
    let salt = decode_fixed::<STORE_SALT_LEN>(&file.encryption.salt, "salt")?;
    let kek = derive_machine_kek(&salt, kdf_log_n)?;
    let wrapped_nonce = decode_fixed::<STORE_NONCE_LEN>(
        &file.encryption.wrapped_dek_nonce,
        "wrapped_dek_nonce",
    )?;
    let wrapped_dek = decode_bytes(
        &file.encryption.wrapped_dek_ciphertext,
        "wrapped_dek_ciphertext",
    )?;
    let dek_raw = decrypt_blob(&kek, &wrapped_nonce, &wrapped_dek).map_err(|_| {
        StoreError::Invalid(
            "failed to decrypt stored credentials (machine identity may have changed). Run `storefront logout` and login again."
                .to_string(),
        )
    })?;
    if dek_raw.len() != STORE_KEY_LEN {
        return Err(StoreError::Invalid(
            "invalid encrypted key material in credential store".to_string(),
        ));
    }
    let mut dek = [0u8; STORE_KEY_LEN];
    dek.copy_from_slice(&dek_raw);

    let mut entries = BTreeMap::new();
    for (key, record) in &file.entries {
        let nonce = decode_fixed::<STORE_NONCE_LEN>(&record.nonce, "nonce")?;
        let ciphertext = decode_bytes(&record.ciphertext, "ciphertext")?;
        let plain = decrypt_blob(&dek, &nonce, &ciphertext).map_err(|_| {
            StoreError::Invalid(format!(
                "failed to decrypt stored credential `{key}`. Run `storefront logout` and login again."
            ))
        })?;
        let value = String::from_utf8(plain).map_err(|_| {
            StoreError::Invalid(format!("stored credential `{key}` is not valid UTF-8"))
        })?;
        entries.insert(key.clone(), value);
    }
    Ok(entries)
}

fn derive_machine_kek(
    salt: &[u8; STORE_SALT_LEN],
    kdf_log_n: u8,
) -> Result<[u8; STORE_KEY_LEN], StoreError> {
    let mut material = machine_secret_material();
    material.extend_from_slice(salt);

    let mut hashed = Sha256::new();
    hashed.update(MACHINE_KEY_CONTEXT.as_bytes());
    hashed.update(&material);
    let seed = hashed.finalize();

    let params = ScryptParams::new(kdf_log_n, 8, 1, STORE_KEY_LEN)
        .map_err(|err| StoreError::Invalid(format!("invalid key derivation cost: {err}")))?;
    let mut key = [0u8; STORE_KEY_LEN];
    scrypt(&seed, salt, &params, &mut key)
        .map_err(|err| StoreError::Invalid(format!("failed to derive machine key: {err}")))?;
    Ok(key)
}

fn machine_secret_material() -> Vec<u8> {
    let hostname = hostname::get()
        .map(|value| value.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown-host".to_string());
    let username = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown-user".to_string());
    let home = dirs::home_dir()
        .map(|path| path.display().to_string())
        .unwrap_or_default();
    let machine_id = read_machine_id().unwrap_or_default();
    format!(
        "os={}|host={}|user={}|home={}|machine_id={}",
        std::env::consts::OS,
        hostname,
        username,
        home,
        machine_id
    )
    .into_bytes()
}

fn read_machine_id() -> Option<String> {
    for path in ["/etc/machine-id", "/var/lib/dbus/machine-id", "/etc/hostid"] {
        if let Ok(value) = std::fs::read_to_string(path) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

fn encrypt_blob(
    key: &[u8; STORE_KEY_LEN],
    plaintext: &[u8],
) -> Result<(Vec<u8>, Vec<u8>), StoreError> {
    let cipher = Aes256GcmSiv::new_from_slice(key)
        .map_err(|_| StoreError::Invalid("invalid encryption key length".to_string()))?;
    let mut nonce = [0u8; STORE_NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| StoreError::Invalid("failed to encrypt credential data".to_string()))?;
    Ok((nonce.to_vec(), ciphertext))
}

fn decrypt_blob(
    key: &[u8; STORE_KEY_LEN],
    nonce: &[u8; STORE_NONCE_LEN],
    ciphertext: &[u8],
) -> Result<Vec<u8>, StoreError> {
    let cipher = Aes256GcmSiv::new_from_slice(key)
        .map_err(|_| StoreError::Invalid("invalid encryption key length".to_string()))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| StoreError::Invalid("failed to decrypt credential data".to_string()))
}

fn decode_bytes(value: &str, field: &str) -> Result<Vec<u8>, StoreError> {
    B64.decode(value).map_err(|err| {
        StoreError::Invalid(format!(
            "failed to decode credential store field `{field}`: {err}"
        ))
    })
}

fn decode_fixed<const N: usize>(value: &str, field: &str) -> Result<[u8; N], StoreError> {
    let bytes = decode_bytes(value, field)?;
    if bytes.len() != N {
        return Err(StoreError::Invalid(format!(
            "invalid credential store field `{field}` length: expected {N}, got {}",
            bytes.len()
        )));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}
