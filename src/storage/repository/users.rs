// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! User profile repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::super::{FileStorage, StorageError, StorageResult};

/// A user profile row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserRecord {
    /// Canonical user ID (JWT `sub` claim).
    pub user_id: String,
    /// Display name.
    pub name: Option<String>,
    /// When the profile was first seen.
    pub created_at: DateTime<Utc>,
}

/// Repository for user profiles.
pub struct UserRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> UserRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    pub fn exists(&self, user_id: &str) -> bool {
        self.storage.exists(self.storage.paths().user(user_id))
    }

    pub fn get(&self, user_id: &str) -> StorageResult<UserRecord> {
        let path = self.storage.paths().user(user_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("User {user_id}")));
        }
        self.storage.read_json(path)
    }

    /// Fetch the profile, creating it on first sight.
    pub fn ensure(&self, user_id: &str, name: Option<&str>) -> StorageResult<UserRecord> {
        if self.exists(user_id) {
            return self.get(user_id);
        }

        let record = UserRecord {
            user_id: user_id.to_string(),
            name: name.map(str::to_string),
            created_at: Utc::now(),
        };
        self.storage
            .write_json(self.storage.paths().user(user_id), &record)?;
        Ok(record)
    }

    /// Update the display name.
    pub fn set_name(&self, user_id: &str, name: Option<String>) -> StorageResult<UserRecord> {
        let mut record = self.get(user_id)?;
        record.name = name;
        self.storage
            .write_json(self.storage.paths().user(user_id), &record)?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;

    fn test_storage() -> (FileStorage, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut storage = FileStorage::new(StoragePaths::new(dir.path()));
        storage.initialize().expect("initialize");
        (storage, dir)
    }

    #[test]
    fn ensure_creates_then_returns_existing() {
        let (storage, _dir) = test_storage();
        let repo = UserRepository::new(&storage);

        let created = repo.ensure("user-1", Some("Alice")).unwrap();
        assert_eq!(created.name.as_deref(), Some("Alice"));

        // Second ensure must not overwrite the stored name
        let again = repo.ensure("user-1", Some("Mallory")).unwrap();
        assert_eq!(again.name.as_deref(), Some("Alice"));
        assert_eq!(again.created_at, created.created_at);
    }

    #[test]
    fn set_name_updates_profile() {
        let (storage, _dir) = test_storage();
        let repo = UserRepository::new(&storage);

        repo.ensure("user-1", None).unwrap();
        let updated = repo.set_name("user-1", Some("Bob".to_string())).unwrap();
        assert_eq!(updated.name.as_deref(), Some("Bob"));
    }

    #[test]
    fn get_missing_user_fails() {
        let (storage, _dir) = test_storage();
        let repo = UserRepository::new(&storage);
        assert!(matches!(
            repo.get("ghost"),
            Err(StorageError::NotFound(_))
        ));
    }
}
