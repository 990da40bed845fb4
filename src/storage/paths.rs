// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! Path layout for the data directory.

use std::path::{Path, PathBuf};

use crate::config::DEFAULT_DATA_DIR;

/// Storage path utilities rooted at the data directory.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_DIR)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all persistent data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== User Paths ==========

    /// Directory containing user profiles.
    pub fn users_dir(&self) -> PathBuf {
        self.root.join("users")
    }

    /// Path to a user profile file.
    pub fn user(&self, user_id: &str) -> PathBuf {
        self.users_dir().join(format!("{user_id}.json"))
    }

    // ========== Seed Paths ==========

    /// Directory containing per-user seed material.
    pub fn seeds_dir(&self) -> PathBuf {
        self.root.join("seeds")
    }

    /// Directory for a specific user's seed.
    pub fn seed_dir(&self, user_id: &str) -> PathBuf {
        self.seeds_dir().join(user_id)
    }

    /// Path to a user's BIP-39 mnemonic file. NEVER exposed via API.
    pub fn seed_mnemonic(&self, user_id: &str) -> PathBuf {
        self.seed_dir(user_id).join("mnemonic.txt")
    }

    // ========== Wallet Paths ==========

    /// Directory containing derived wallet records.
    pub fn wallets_dir(&self) -> PathBuf {
        self.root.join("wallets")
    }

    /// Path to a derived wallet record.
    pub fn wallet(&self, wallet_id: &str) -> PathBuf {
        self.wallets_dir().join(format!("{wallet_id}.json"))
    }

    // ========== Lightning Node Paths ==========

    /// Directory containing lightning node session mirrors.
    pub fn lightning_dir(&self) -> PathBuf {
        self.root.join("lightning")
    }

    /// Path to a lightning node record.
    pub fn lightning_node(&self, node_id: &str) -> PathBuf {
        self.lightning_dir().join(format!("{node_id}.json"))
    }

    // ========== Transaction Database ==========

    /// Path to the embedded redb transaction database.
    pub fn tx_database(&self) -> PathBuf {
        self.root.join("txdb").join("transactions.redb")
    }

    // ========== Audit Log Paths ==========

    /// Directory containing audit logs.
    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Path to a daily audit events file (JSONL format).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date).join("events.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_use_data_root() {
        let paths = StoragePaths::default();
        assert_eq!(paths.root(), Path::new("/data"));
    }

    #[test]
    fn custom_root_for_testing() {
        let paths = StoragePaths::new("/tmp/test-data");
        assert_eq!(paths.root(), Path::new("/tmp/test-data"));
        assert_eq!(
            paths.wallet("w-123"),
            PathBuf::from("/tmp/test-data/wallets/w-123.json")
        );
    }

    #[test]
    fn seed_paths_are_per_user() {
        let paths = StoragePaths::default();
        assert_eq!(
            paths.seed_mnemonic("user-1"),
            PathBuf::from("/data/seeds/user-1/mnemonic.txt")
        );
    }

    #[test]
    fn lightning_paths_are_correct() {
        let paths = StoragePaths::default();
        assert_eq!(paths.lightning_dir(), PathBuf::from("/data/lightning"));
        assert_eq!(
            paths.lightning_node("ln-1"),
            PathBuf::from("/data/lightning/ln-1.json")
        );
    }

    #[test]
    fn audit_paths_are_daily() {
        let paths = StoragePaths::default();
        assert_eq!(
            paths.audit_events_file("2026-08-07"),
            PathBuf::from("/data/audit/2026-08-07/events.jsonl")
        );
    }
}
