//! Secret storage: AES-256-GCM over values, key held by the OS keychain.
//!
//! The store only ever sees base64 ciphertext. The data key lives in the
//! platform credential facility; a fixed-key cipher exists for tests and
//! headless environments without a keychain.

use crate::error::CoreError;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::RngCore;
use std::sync::Arc;
use warden_store::Store;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const KEYCHAIN_USER: &str = "secrets-key";

/// Encrypts and decrypts secret values.
pub trait SecretCipher: Send + Sync {
    /// Encrypt a plaintext into an opaque blob.
    fn encrypt(&self, plaintext: &str) -> Result<String, CoreError>;
    /// Decrypt a blob back into plaintext.
    fn decrypt(&self, blob: &str) -> Result<String, CoreError>;
}

fn seal(key: &[u8; KEY_LEN], plaintext: &str) -> Result<String, CoreError> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|err| CoreError::Secret(format!("bad key length: {err}")))?;
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|err| CoreError::Secret(format!("encryption failed: {err}")))?;
    let mut blob = nonce_bytes.to_vec();
    blob.extend(ciphertext);
    Ok(BASE64.encode(blob))
}

fn open(key: &[u8; KEY_LEN], blob: &str) -> Result<String, CoreError> {
    let raw = BASE64
        .decode(blob)
        .map_err(|err| CoreError::Secret(format!("invalid blob encoding: {err}")))?;
    if raw.len() <= NONCE_LEN {
        return Err(CoreError::Secret("blob too short".to_string()));
    }
    let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|err| CoreError::Secret(format!("bad key length: {err}")))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|err| CoreError::Secret(format!("decryption failed: {err}")))?;
    String::from_utf8(plaintext).map_err(|err| CoreError::Secret(format!("invalid utf-8: {err}")))
}

/// Cipher whose data key is stored in the OS credential facility, created
/// on first use.
pub struct KeychainCipher {
    key: [u8; KEY_LEN],
}

impl KeychainCipher {
    /// Load or create the data key under the given service name.
    pub fn load(service: &str) -> Result<Self, CoreError> {
        let entry = keyring::Entry::new(service, KEYCHAIN_USER)
            .map_err(|err| CoreError::Secret(format!("keychain unavailable: {err}")))?;
        let key = match entry.get_password() {
            Ok(encoded) => {
                let raw = BASE64
                    .decode(&encoded)
                    .map_err(|err| CoreError::Secret(format!("corrupt stored key: {err}")))?;
                raw.try_into()
                    .map_err(|_| CoreError::Secret("stored key has wrong length".to_string()))?
            }
            Err(keyring::Error::NoEntry) => {
                let mut key = [0u8; KEY_LEN];
                rand::rng().fill_bytes(&mut key);
                entry
                    .set_password(&BASE64.encode(key))
                    .map_err(|err| CoreError::Secret(format!("keychain write failed: {err}")))?;
                key
            }
            Err(err) => {
                return Err(CoreError::Secret(format!("keychain read failed: {err}")));
            }
        };
        Ok(Self { key })
    }
}

impl SecretCipher for KeychainCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, CoreError> {
        seal(&self.key, plaintext)
    }

    fn decrypt(&self, blob: &str) -> Result<String, CoreError> {
        open(&self.key, blob)
    }
}

/// Cipher with a caller-provided key. For tests and environments without a
/// usable keychain.
pub struct StaticKeyCipher {
    key: [u8; KEY_LEN],
}

impl StaticKeyCipher {
    /// Cipher over a fixed 32-byte key.
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }
}

impl SecretCipher for StaticKeyCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, CoreError> {
        seal(&self.key, plaintext)
    }

    fn decrypt(&self, blob: &str) -> Result<String, CoreError> {
        open(&self.key, blob)
    }
}

/// Secret upsert/get/delete over the store, with encryption at the edge.
#[derive(Clone)]
pub struct SecretService {
    store: Store,
    cipher: Arc<dyn SecretCipher>,
}

impl SecretService {
    /// Service over the shared store and a cipher.
    pub fn new(store: Store, cipher: Arc<dyn SecretCipher>) -> Self {
        Self { store, cipher }
    }

    /// Encrypt and upsert a secret value.
    pub fn set(&self, key_name: &str, value: &str) -> Result<(), CoreError> {
        let blob = self.cipher.encrypt(value)?;
        Ok(self.store.upsert_secret(key_name, &blob)?)
    }

    /// Decrypt and return a secret value.
    pub fn get(&self, key_name: &str) -> Result<Option<String>, CoreError> {
        match self.store.secret_blob(key_name)? {
            Some(blob) => Ok(Some(self.cipher.decrypt(&blob)?)),
            None => Ok(None),
        }
    }

    /// Delete a secret.
    pub fn delete(&self, key_name: &str) -> Result<(), CoreError> {
        Ok(self.store.delete_secret(key_name)?)
    }

    /// Whether a secret exists.
    pub fn has(&self, key_name: &str) -> Result<bool, CoreError> {
        Ok(self.store.has_secret(key_name)?)
    }

    /// Stored key names only; values never leave encrypted form here.
    pub fn list_names(&self) -> Result<Vec<String>, CoreError> {
        Ok(self.store.list_secret_names()?)
    }
}
