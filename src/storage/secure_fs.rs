// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Encryption-at-rest file operations.
//!
//! Every register is kept on disk as an AES-256-GCM blob. Reads go through a
//! decrypted scratch copy; writes re-encrypt the canonical file and refresh
//! its `.enc` backup sibling.
//!
//! ## Read-Modify-Write Protocol
//!
//! 1. decrypt the canonical file into a scratch copy (verbatim copy if the
//!    file does not decrypt under the current key)
//! 2. parse and reconcile the table against its schema
//! 3. mutate in memory
//! 4. encrypt and write the canonical file (temp file + rename)
//! 5. write a fresh encrypted backup
//! 6. delete the scratch copy (guard drop, on every exit path)
//!
//! There is no locking: one process must own the data directory.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use serde::{de::DeserializeOwned, Serialize};

use super::keystore::StoreKey;
use super::table::{reconcile, Schema, Table};
use super::StoragePaths;

/// Error type for encrypted storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Store or entity not found
    #[error("Not found: {0}")]
    NotFound(String),
    /// Scratch copy could not be parsed (wrong key, truncated write, foreign file)
    #[error("Corrupt store {path}: {reason}")]
    Corrupt { path: String, reason: String },
    /// Key file content is unusable
    #[error("Invalid key material: {0}")]
    InvalidKey(String),
    /// Cipher operation failed
    #[error("Crypto error: {0}")]
    Crypto(&'static str),
    /// Storage not initialized
    #[error("Storage not initialized")]
    NotInitialized,
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// How a scratch copy was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptOutcome {
    /// The canonical file decrypted under the current key.
    Decrypted,
    /// Decryption failed; the scratch copy is the file verbatim.
    PlaintextFallback,
}

/// Decrypted working copy, removed when dropped.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
    registry: Arc<Mutex<HashSet<PathBuf>>>,
}

impl ScratchFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
        if let Ok(mut registry) = self.registry.lock() {
            registry.remove(&self.path);
        }
    }
}

/// Encrypted register storage.
#[derive(Debug, Clone)]
pub struct SecureStorage {
    paths: StoragePaths,
    key: StoreKey,
    scratch: Arc<Mutex<HashSet<PathBuf>>>,
    initialized: bool,
}

impl SecureStorage {
    /// Create a new SecureStorage instance.
    ///
    /// Does NOT create the directory structure. Call `initialize()` first.
    pub fn new(paths: StoragePaths, key: StoreKey) -> Self {
        Self {
            paths,
            key,
            scratch: Arc::new(Mutex::new(HashSet::new())),
            initialized: false,
        }
    }

    /// Get the storage paths.
    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Create the data and scratch directories. Idempotent.
    pub fn initialize(&mut self) -> StorageResult<()> {
        fs::create_dir_all(self.paths.root())?;
        fs::create_dir_all(self.paths.scratch_dir())?;
        self.initialized = true;
        Ok(())
    }

    /// Replace the key used for every subsequent read and write.
    pub fn rekey(&mut self, key: StoreKey) {
        self.key = key;
    }

    /// Write-read-delete probe of the data directory.
    pub fn health_check(&self) -> StorageResult<()> {
        self.require_initialized()?;

        let probe = self.paths.root().join(".health_check");
        let sealed = self.key.encrypt(b"health_check_data")?;
        fs::write(&probe, &sealed)?;
        let read = fs::read(&probe)?;
        fs::remove_file(&probe)?;

        if self.key.decrypt(&read)? != b"health_check_data" {
            return Err(StorageError::Corrupt {
                path: probe.display().to_string(),
                reason: "health check data mismatch".to_string(),
            });
        }
        Ok(())
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        File::open(path.as_ref()).is_ok()
    }

    // ========== Encrypted Read Path ==========

    /// Decrypt `path` into a fresh scratch file.
    ///
    /// Any decryption failure falls back to a verbatim copy so callers always
    /// receive a readable scratch file; the outcome says which happened.
    pub fn read_through_decrypt(
        &self,
        path: impl AsRef<Path>,
    ) -> StorageResult<(ScratchFile, DecryptOutcome)> {
        self.require_initialized()?;
        let path = path.as_ref();

        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let (content, outcome) = match self.key.decrypt(&raw) {
            Ok(plain) => (plain, DecryptOutcome::Decrypted),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Store did not decrypt under current key, reading verbatim"
                );
                (raw, DecryptOutcome::PlaintextFallback)
            }
        };

        let scratch = self.acquire_scratch()?;
        fs::write(scratch.path(), &content)?;
        Ok((scratch, outcome))
    }

    /// Read and deserialize an encrypted (or transitionally plaintext) JSON file.
    pub fn read_json<T: DeserializeOwned>(&self, path: impl AsRef<Path>) -> StorageResult<T> {
        let path = path.as_ref();
        let (scratch, _) = self.read_through_decrypt(path)?;
        parse_scratch(&scratch, path)
    }

    /// Read a register and reconcile it against `schema`.
    pub fn read_table(&self, path: impl AsRef<Path>, schema: &Schema) -> StorageResult<Table> {
        let table: Table = self.read_json(path)?;
        Ok(reconcile(table, schema))
    }

    // ========== Encrypted Write Path ==========

    /// Encrypt and write a JSON value, then refresh the backup.
    pub fn write_json<T: Serialize>(&self, path: impl AsRef<Path>, value: &T) -> StorageResult<()> {
        self.require_initialized()?;
        let path = path.as_ref();

        let plaintext = serde_json::to_vec_pretty(value)?;
        let sealed = self.key.encrypt(&plaintext)?;
        atomic_write(path, &sealed)?;
        self.write_backup(path, &plaintext)
    }

    /// Run one read-modify-write cycle over a register.
    ///
    /// The scratch copy lives until the canonical file and backup are
    /// written, and is removed whether or not `mutate` succeeds.
    pub fn mutate_table<T>(
        &self,
        path: impl AsRef<Path>,
        schema: &Schema,
        mutate: impl FnOnce(&mut Table) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let path = path.as_ref();
        let (scratch, _) = self.read_through_decrypt(path)?;
        let mut table = reconcile(parse_scratch(&scratch, path)?, schema);

        let out = mutate(&mut table)?;
        self.write_json(path, &table)?;

        drop(scratch);
        Ok(out)
    }

    /// Write an encrypted copy next to `path`. No-op when `path` is absent.
    pub fn ensure_backup(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        self.require_initialized()?;
        let path = path.as_ref();

        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        let plaintext = self.key.decrypt(&raw).unwrap_or(raw);
        self.write_backup(path, &plaintext)
    }

    /// Delete a store and its backup. Missing files are ignored.
    pub fn remove_store(&self, path: impl AsRef<Path>) -> StorageResult<()> {
        self.require_initialized()?;
        let path = path.as_ref();
        for target in [path.to_path_buf(), StoragePaths::backup_of(path)] {
            match fs::remove_file(&target) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    // ========== Scratch Management ==========

    /// Remove every scratch file this storage still tracks.
    ///
    /// Guards already clean up on drop; this is the process-exit pass.
    pub fn cleanup_scratch(&self) -> usize {
        let Ok(mut registry) = self.scratch.lock() else {
            return 0;
        };
        let mut removed = 0;
        for path in registry.drain() {
            if fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        removed
    }

    /// Delete scratch files older than `max_age` left by an earlier process.
    pub fn sweep_stale_scratch(&self, max_age: Duration) -> StorageResult<usize> {
        self.require_initialized()?;
        let dir = self.paths.scratch_dir();
        if !dir.exists() {
            return Ok(0);
        }

        let now = SystemTime::now();
        let mut removed = 0;
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            let age = now.duration_since(modified).unwrap_or_default();
            if age >= max_age {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }

        if removed > 0 {
            tracing::info!(removed, dir = %dir.display(), "Removed stale scratch files");
        }
        Ok(removed)
    }

    fn acquire_scratch(&self) -> StorageResult<ScratchFile> {
        fs::create_dir_all(self.paths.scratch_dir())?;
        let path = self
            .paths
            .scratch_file(&uuid::Uuid::new_v4().simple().to_string());
        if let Ok(mut registry) = self.scratch.lock() {
            registry.insert(path.clone());
        }
        Ok(ScratchFile {
            path,
            registry: Arc::clone(&self.scratch),
        })
    }

    fn write_backup(&self, path: &Path, plaintext: &[u8]) -> StorageResult<()> {
        let sealed = self.key.encrypt(plaintext)?;
        atomic_write(&StoragePaths::backup_of(path), &sealed)
    }

    fn require_initialized(&self) -> StorageResult<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(StorageError::NotInitialized)
        }
    }
}

fn parse_scratch<T: DeserializeOwned>(scratch: &ScratchFile, source: &Path) -> StorageResult<T> {
    let bytes = fs::read(scratch.path())?;
    serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupt {
        path: source.display().to_string(),
        reason: e.to_string(),
    })
}

fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);
    {
        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.flush()?;
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::table::{Column, ExtraColumns};
    use serde::Deserialize;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, SecureStorage) {
        let temp = TempDir::new().unwrap();
        let mut storage = SecureStorage::new(StoragePaths::new(temp.path()), StoreKey::generate());
        storage.initialize().unwrap();
        (temp, storage)
    }

    fn scratch_count(storage: &SecureStorage) -> usize {
        fs::read_dir(storage.paths().scratch_dir()).unwrap().count()
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Probe {
        id: i64,
        label: String,
    }

    #[test]
    fn write_json_encrypts_canonical_and_backup() {
        let (_temp, storage) = setup();
        let path = storage.paths().root().join("probe.json");
        let value = Probe {
            id: 1,
            label: "secret-label".into(),
        };

        storage.write_json(&path, &value).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("secret-label"));
        let backup = fs::read_to_string(StoragePaths::backup_of(&path)).unwrap();
        assert!(!backup.contains("secret-label"));

        let read: Probe = storage.read_json(&path).unwrap();
        assert_eq!(read, value);
    }

    #[test]
    fn read_through_decrypt_reports_outcome() {
        let (_temp, storage) = setup();
        let encrypted = storage.paths().root().join("enc.json");
        let plain = storage.paths().root().join("plain.json");
        storage.write_json(&encrypted, &json!({"a": 1})).unwrap();
        fs::write(&plain, br#"{"a": 2}"#).unwrap();

        let (scratch, outcome) = storage.read_through_decrypt(&encrypted).unwrap();
        assert_eq!(outcome, DecryptOutcome::Decrypted);
        assert!(scratch.path().exists());
        drop(scratch);

        let (scratch, outcome) = storage.read_through_decrypt(&plain).unwrap();
        assert_eq!(outcome, DecryptOutcome::PlaintextFallback);
        assert_eq!(fs::read(scratch.path()).unwrap(), br#"{"a": 2}"#);
        let scratch_path = scratch.path().to_path_buf();
        drop(scratch);
        assert!(!scratch_path.exists());
    }

    #[test]
    fn wrong_key_surfaces_as_corrupt_on_parse() {
        let (_temp, mut storage) = setup();
        let path = storage.paths().root().join("table.json");
        storage.write_json(&path, &Table::default()).unwrap();

        storage.rekey(StoreKey::generate());
        let result: StorageResult<Table> = storage.read_json(&path);
        assert!(matches!(result, Err(StorageError::Corrupt { .. })));
        assert_eq!(scratch_count(&storage), 0);
    }

    #[test]
    fn mutate_table_reconciles_and_cleans_scratch() {
        let (_temp, storage) = setup();
        let path = storage.paths().root().join("table.json");
        fs::write(&path, br#"{"columns":["id"],"rows":[[1]]}"#).unwrap();

        let schema = Schema::new(
            vec![
                Column::new("id", serde_json::Value::Null),
                Column::new("name", json!("")),
            ],
            ExtraColumns::Keep,
        );

        let len = storage
            .mutate_table(&path, &schema, |table| {
                table.push_row_with(|c| if c == "id" { json!(2) } else { json!("Bo") });
                Ok(table.rows.len())
            })
            .unwrap();
        assert_eq!(len, 2);

        let table = storage.read_table(&path, &schema).unwrap();
        assert_eq!(table.columns, vec!["id", "name"]);
        assert_eq!(table.rows[0], vec![json!(1), json!("")]);
        assert_eq!(scratch_count(&storage), 0);
        assert!(StoragePaths::backup_of(&path).exists());
    }

    #[test]
    fn failed_mutation_leaves_store_untouched() {
        let (_temp, storage) = setup();
        let path = storage.paths().root().join("table.json");
        storage.write_json(&path, &Table::default()).unwrap();
        let before = fs::read(&path).unwrap();

        let schema = Schema::new(Vec::new(), ExtraColumns::Keep);
        let result: StorageResult<()> = storage.mutate_table(&path, &schema, |_| {
            Err(StorageError::NotFound("row".into()))
        });

        assert!(result.is_err());
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(scratch_count(&storage), 0);
    }

    #[test]
    fn ensure_backup_ignores_missing_and_encrypts_plaintext() {
        let (_temp, storage) = setup();
        let missing = storage.paths().root().join("missing.json");
        storage.ensure_backup(&missing).unwrap();
        assert!(!StoragePaths::backup_of(&missing).exists());

        let plain = storage.paths().root().join("plain.json");
        fs::write(&plain, b"legacy").unwrap();
        storage.ensure_backup(&plain).unwrap();

        let backup = fs::read(StoragePaths::backup_of(&plain)).unwrap();
        assert_ne!(backup, b"legacy");
        assert_eq!(storage.key.decrypt(&backup).unwrap(), b"legacy");
    }

    #[test]
    fn missing_store_is_not_found() {
        let (_temp, storage) = setup();
        let result = storage.read_through_decrypt(storage.paths().root().join("nope.json"));
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn cleanup_scratch_removes_leaked_guards() {
        let (_temp, storage) = setup();
        let path = storage.paths().root().join("p.json");
        storage.write_json(&path, &json!([])).unwrap();

        let (scratch, _) = storage.read_through_decrypt(&path).unwrap();
        std::mem::forget(scratch);
        assert_eq!(scratch_count(&storage), 1);

        assert_eq!(storage.cleanup_scratch(), 1);
        assert_eq!(scratch_count(&storage), 0);
    }

    #[test]
    fn sweep_removes_old_scratch_files() {
        let (_temp, storage) = setup();
        fs::write(storage.paths().scratch_file("orphan"), b"x").unwrap();

        assert_eq!(storage.sweep_stale_scratch(Duration::from_secs(3600)).unwrap(), 0);
        assert_eq!(storage.sweep_stale_scratch(Duration::ZERO).unwrap(), 1);
    }

    #[test]
    fn remove_store_deletes_backup_too() {
        let (_temp, storage) = setup();
        let path = storage.paths().root().join("gone.json");
        storage.write_json(&path, &json!({})).unwrap();

        storage.remove_store(&path).unwrap();
        assert!(!path.exists());
        assert!(!StoragePaths::backup_of(&path).exists());
        storage.remove_store(&path).unwrap();
    }

    #[test]
    fn health_check_works() {
        let (_temp, storage) = setup();
        storage.health_check().expect("Health check should pass");
    }

    #[test]
    fn uninitialized_storage_returns_error() {
        let storage = SecureStorage::new(StoragePaths::new("/tmp/never-init"), StoreKey::generate());
        let result = storage.read_json::<Probe>("/tmp/any.json");
        assert!(matches!(result, Err(StorageError::NotInitialized)));
    }
}
