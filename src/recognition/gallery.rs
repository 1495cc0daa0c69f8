// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Biometric gallery: enrolled feature vectors and confusable-identity pairs.
//!
//! The gallery is persisted as one encrypted JSON document. Records for an
//! identity are only ever replaced as a set; nothing deletes a single sample.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::{SecureStorage, StorageError, StorageResult};

/// One enrolled sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiometricRecord {
    pub vector: Vec<f64>,
    pub identity_id: i64,
    pub name: String,
    /// Disambiguation tag, used to tell twins apart.
    #[serde(default)]
    pub tag: Option<String>,
}

/// Unordered pair of identities flagged as confusable. Stored low id first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[schema(value_type = Vec<i64>)]
pub struct TwinPair(pub i64, pub i64);

impl TwinPair {
    pub fn new(a: i64, b: i64) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.0 == id || self.1 == id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Gallery {
    #[serde(default)]
    pub records: Vec<BiometricRecord>,
    #[serde(default)]
    pub twin_pairs: Vec<TwinPair>,
}

impl Gallery {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Samples enrolled for one identity.
    pub fn samples_for(&self, identity_id: i64) -> usize {
        self.records
            .iter()
            .filter(|r| r.identity_id == identity_id)
            .count()
    }

    /// Remove every record of `identity_id`, then append `vectors`.
    /// Returns how many stale records were removed.
    pub fn replace_identity(
        &mut self,
        identity_id: i64,
        vectors: Vec<Vec<f64>>,
        name: &str,
        tag: Option<&str>,
    ) -> usize {
        let before = self.records.len();
        self.records.retain(|r| r.identity_id != identity_id);
        let removed = before - self.records.len();

        self.records
            .extend(vectors.into_iter().map(|vector| BiometricRecord {
                vector,
                identity_id,
                name: name.to_string(),
                tag: tag.map(str::to_string),
            }));
        removed
    }

    /// Record a twin pair. Returns `false` if already recorded.
    pub fn add_twin_pair(&mut self, a: i64, b: i64) -> bool {
        let pair = TwinPair::new(a, b);
        if self.twin_pairs.contains(&pair) {
            return false;
        }
        self.twin_pairs.push(pair);
        true
    }

    pub fn are_twins(&self, a: i64, b: i64) -> bool {
        self.twin_pairs.contains(&TwinPair::new(a, b))
    }
}

/// Repository for the encrypted gallery file.
pub struct GalleryRepository<'a> {
    storage: &'a SecureStorage,
}

impl<'a> GalleryRepository<'a> {
    pub fn new(storage: &'a SecureStorage) -> Self {
        Self { storage }
    }

    /// Load the gallery; an absent file is an empty gallery.
    pub fn load(&self) -> StorageResult<Gallery> {
        match self.storage.read_json(self.storage.paths().gallery()) {
            Ok(gallery) => Ok(gallery),
            Err(StorageError::NotFound(_)) => Ok(Gallery::default()),
            Err(e) => Err(e),
        }
    }

    pub fn save(&self, gallery: &Gallery) -> StorageResult<()> {
        self.storage
            .write_json(self.storage.paths().gallery(), gallery)?;
        tracing::debug!(
            records = gallery.len(),
            twin_pairs = gallery.twin_pairs.len(),
            "Saved biometric gallery"
        );
        Ok(())
    }

    /// Delete the gallery file and its backup.
    pub fn reset(&self) -> StorageResult<()> {
        self.storage.remove_store(self.storage.paths().gallery())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{StoragePaths, StoreKey};
    use tempfile::TempDir;

    fn setup() -> (TempDir, SecureStorage) {
        let temp = TempDir::new().unwrap();
        let mut storage = SecureStorage::new(StoragePaths::new(temp.path()), StoreKey::generate());
        storage.initialize().unwrap();
        (temp, storage)
    }

    #[test]
    fn replace_identity_drops_stale_samples() {
        let mut gallery = Gallery::default();
        gallery.replace_identity(1, vec![vec![0.0], vec![0.1]], "Ann", None);
        gallery.replace_identity(2, vec![vec![5.0]], "Bob", None);

        let removed = gallery.replace_identity(1, vec![vec![0.2]], "Ann", Some("left"));
        assert_eq!(removed, 2);
        assert_eq!(gallery.samples_for(1), 1);
        assert_eq!(gallery.samples_for(2), 1);

        let ann = gallery.records.iter().find(|r| r.identity_id == 1).unwrap();
        assert_eq!(ann.vector, vec![0.2]);
        assert_eq!(ann.tag.as_deref(), Some("left"));
    }

    #[test]
    fn twin_pairs_are_unordered() {
        let mut gallery = Gallery::default();
        assert!(gallery.add_twin_pair(9, 4));
        assert!(!gallery.add_twin_pair(4, 9));
        assert!(gallery.are_twins(4, 9));
        assert_eq!(gallery.twin_pairs, vec![TwinPair(4, 9)]);
        assert!(gallery.twin_pairs[0].contains(9));
    }

    #[test]
    fn missing_gallery_loads_empty() {
        let (_temp, storage) = setup();
        let gallery = GalleryRepository::new(&storage).load().unwrap();
        assert!(gallery.is_empty());
    }

    #[test]
    fn save_and_load_gallery() {
        let (_temp, storage) = setup();
        let repo = GalleryRepository::new(&storage);

        let mut gallery = Gallery::default();
        gallery.replace_identity(7, vec![vec![0.5, 0.25]], "Ann", None);
        gallery.add_twin_pair(7, 8);
        repo.save(&gallery).unwrap();

        let raw = std::fs::read_to_string(storage.paths().gallery()).unwrap();
        assert!(!raw.contains("Ann"));
        assert_eq!(repo.load().unwrap(), gallery);

        repo.reset().unwrap();
        assert!(repo.load().unwrap().is_empty());
    }

    #[test]
    fn legacy_gallery_without_tags_loads() {
        let (_temp, storage) = setup();
        std::fs::write(
            storage.paths().gallery(),
            br#"{"records":[{"vector":[1.0],"identity_id":3,"name":"Cy"}]}"#,
        )
        .unwrap();

        let gallery = GalleryRepository::new(&storage).load().unwrap();
        assert_eq!(gallery.records[0].tag, None);
        assert!(gallery.twin_pairs.is_empty());
    }
}
