// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! Seed repository.
//!
//! One BIP-39 mnemonic per user, stored raw under `seeds/{user_id}/`.
//! The mnemonic is read for derivation and signing only and is NEVER
//! returned via API.

use super::super::{FileStorage, StorageError, StorageResult};

/// Repository for per-user seed material.
pub struct SeedRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> SeedRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    /// Check whether a user already has a seed.
    pub fn exists(&self, user_id: &str) -> bool {
        self.storage
            .exists(self.storage.paths().seed_mnemonic(user_id))
    }

    /// Store a user's mnemonic. Fails if one already exists: a seed must
    /// never be silently replaced, since that would orphan derived wallets.
    pub fn create(&self, user_id: &str, mnemonic: &str) -> StorageResult<()> {
        if self.exists(user_id) {
            return Err(StorageError::AlreadyExists(format!("Seed for {user_id}")));
        }
        self.storage.write_raw(
            self.storage.paths().seed_mnemonic(user_id),
            mnemonic.trim().as_bytes(),
        )
    }

    /// Read a user's mnemonic.
    ///
    /// **Internal use only** - for derivation and signing.
    pub(crate) fn read_mnemonic(&self, user_id: &str) -> StorageResult<String> {
        if !self.exists(user_id) {
            return Err(StorageError::NotFound(format!("Seed for {user_id}")));
        }

        let raw = self
            .storage
            .read_raw(self.storage.paths().seed_mnemonic(user_id))?;
        String::from_utf8(raw)
            .map(|s| s.trim().to_string())
            .map_err(|_| StorageError::NotFound(format!("Seed for {user_id} is not UTF-8")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;

    const MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn test_storage() -> (FileStorage, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut storage = FileStorage::new(StoragePaths::new(dir.path()));
        storage.initialize().expect("initialize");
        (storage, dir)
    }

    #[test]
    fn create_and_read_round_trip() {
        let (storage, _dir) = test_storage();
        let repo = SeedRepository::new(&storage);

        repo.create("user-1", MNEMONIC).unwrap();
        assert!(repo.exists("user-1"));
        assert_eq!(repo.read_mnemonic("user-1").unwrap(), MNEMONIC);
    }

    #[test]
    fn create_twice_fails() {
        let (storage, _dir) = test_storage();
        let repo = SeedRepository::new(&storage);

        repo.create("user-1", MNEMONIC).unwrap();
        let result = repo.create("user-1", MNEMONIC);
        assert!(matches!(result, Err(StorageError::AlreadyExists(_))));
    }

    #[test]
    fn read_missing_seed_fails() {
        let (storage, _dir) = test_storage();
        let repo = SeedRepository::new(&storage);
        assert!(matches!(
            repo.read_mnemonic("ghost"),
            Err(StorageError::NotFound(_))
        ));
    }
}
