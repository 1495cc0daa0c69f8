// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Symmetric key management for encryption at rest.
//!
//! A single AES-256-GCM key protects every register and the biometric
//! gallery. The key lives in one file (base64 of 32 random bytes) and is
//! generated on first use.
//!
//! Encrypted blobs are `base64(nonce_12bytes || ciphertext || tag_16bytes)`.
//!
//! Resetting the key is a wipe: blobs written under the previous key can no
//! longer be decrypted and nothing is re-encrypted.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use super::{StorageError, StorageResult};

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Default key file location, relative to the working directory.
pub const DEFAULT_KEY_PATH: &str = "secret.key";

/// AES-256-GCM key used for every encrypted store.
#[derive(Clone)]
pub struct StoreKey {
    key: [u8; KEY_LEN],
}

impl Drop for StoreKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StoreKey(<redacted>)")
    }
}

impl StoreKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Parse key material from its base64 file representation.
    pub fn from_encoded(encoded: &str) -> StorageResult<Self> {
        let mut decoded = BASE64
            .decode(encoded.trim().as_bytes())
            .map_err(|e| StorageError::InvalidKey(e.to_string()))?;
        if decoded.len() != KEY_LEN {
            let len = decoded.len();
            decoded.zeroize();
            return Err(StorageError::InvalidKey(format!(
                "wrong length: {len} (expected {KEY_LEN})"
            )));
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self { key })
    }

    /// Base64 representation written to the key file.
    pub fn encode(&self) -> String {
        BASE64.encode(self.key)
    }

    /// Encrypt plaintext → base64(nonce || ciphertext || tag)
    pub fn encrypt(&self, plaintext: &[u8]) -> StorageResult<Vec<u8>> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|_| StorageError::Crypto("invalid key"))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| StorageError::Crypto("encryption failed"))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(&blob).into_bytes())
    }

    /// Decrypt base64(nonce || ciphertext || tag) → plaintext
    pub fn decrypt(&self, token: &[u8]) -> StorageResult<Vec<u8>> {
        let trimmed = token.trim_ascii();
        let data = BASE64
            .decode(trimmed)
            .map_err(|_| StorageError::Crypto("invalid base64"))?;

        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(StorageError::Crypto("ciphertext too short"));
        }

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|_| StorageError::Crypto("invalid key"))?;
        let nonce = Nonce::from_slice(&data[..NONCE_LEN]);

        cipher
            .decrypt(nonce, &data[NONCE_LEN..])
            .map_err(|_| StorageError::Crypto("decryption failed (wrong key or tampered data)"))
    }
}

/// File-backed owner of the store key.
#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PATH)
    }
}

impl KeyStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the key, generating and persisting one if the file is absent.
    pub fn load(&self) -> StorageResult<StoreKey> {
        if self.path.exists() {
            let encoded = fs::read_to_string(&self.path)?;
            return StoreKey::from_encoded(&encoded);
        }
        self.generate()
    }

    /// Delete the current key and generate a new one.
    ///
    /// Every blob encrypted with the old key becomes unreadable.
    pub fn reset(&self) -> StorageResult<StoreKey> {
        let existed = self.delete()?;
        tracing::warn!(
            path = %self.path.display(),
            existed,
            "Encryption key reset; existing encrypted stores are no longer readable"
        );
        self.generate()
    }

    /// Remove the key file. Returns whether a key existed.
    pub fn delete(&self) -> StorageResult<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn generate(&self) -> StorageResult<StoreKey> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let key = StoreKey::generate();
        write_new_file_restricted(&self.path, key.encode().as_bytes())?;
        tracing::info!(path = %self.path.display(), "Generated new encryption key");
        Ok(key)
    }
}

fn write_new_file_restricted(path: &Path, data: &[u8]) -> StorageResult<()> {
    let mut file = OpenOptions::new().create_new(true).write(true).open(path)?;
    file.write_all(data)?;
    file.flush()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
