// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! Derived wallet repository.
//!
//! A wallet row records one derived address: `(owner, chain, address,
//! derivation index, account kind)`. Key material stays in the seed
//! repository; wallet rows are pure metadata and safe to return via API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::chains::{AccountKind, ChainKey};

use super::super::{FileStorage, StorageError, StorageResult};

/// A derived wallet row.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WalletRecord {
    /// Unique wallet identifier (UUID).
    pub wallet_id: String,
    /// User who owns this wallet.
    pub owner_user_id: String,
    /// Chain the wallet lives on.
    pub chain: ChainKey,
    /// Encoded address in the chain's native format.
    pub address: String,
    /// Address index within the account.
    pub derivation_index: u32,
    /// Derivation path used.
    pub derivation_path: String,
    /// EOA or ERC-4337 smart account.
    pub account_kind: AccountKind,
    /// Optional human-readable label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// When the wallet was derived.
    pub created_at: DateTime<Utc>,
}

/// Response returned to API clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    pub wallet_id: String,
    pub chain: ChainKey,
    pub address: String,
    pub derivation_index: u32,
    pub account_kind: AccountKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<WalletRecord> for WalletResponse {
    fn from(record: WalletRecord) -> Self {
        Self {
            wallet_id: record.wallet_id,
            chain: record.chain,
            address: record.address,
            derivation_index: record.derivation_index,
            account_kind: record.account_kind,
            label: record.label,
            created_at: record.created_at,
        }
    }
}

impl super::super::OwnedResource for WalletRecord {
    fn owner_user_id(&self) -> &str {
        &self.owner_user_id
    }
}

/// Repository for derived wallet rows.
pub struct WalletRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> WalletRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    pub fn exists(&self, wallet_id: &str) -> bool {
        self.storage.exists(self.storage.paths().wallet(wallet_id))
    }

    pub fn get(&self, wallet_id: &str) -> StorageResult<WalletRecord> {
        let path = self.storage.paths().wallet(wallet_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Wallet {wallet_id}")));
        }
        self.storage.read_json(path)
    }

    pub fn create(&self, record: &WalletRecord) -> StorageResult<()> {
        if self.exists(&record.wallet_id) {
            return Err(StorageError::AlreadyExists(format!(
                "Wallet {}",
                record.wallet_id
            )));
        }
        self.storage
            .write_json(self.storage.paths().wallet(&record.wallet_id), record)
    }

    pub fn update(&self, record: &WalletRecord) -> StorageResult<()> {
        if !self.exists(&record.wallet_id) {
            return Err(StorageError::NotFound(format!(
                "Wallet {}",
                record.wallet_id
            )));
        }
        self.storage
            .write_json(self.storage.paths().wallet(&record.wallet_id), record)
    }

    /// List all wallets owned by a user.
    pub fn list_by_owner(&self, owner_user_id: &str) -> StorageResult<Vec<WalletRecord>> {
        let ids = self
            .storage
            .list_records(self.storage.paths().wallets_dir())?;

        let mut wallets = Vec::new();
        for id in &ids {
            if let Ok(record) = self.get(id) {
                if record.owner_user_id == owner_user_id {
                    wallets.push(record);
                }
            }
        }
        wallets.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(wallets)
    }

    /// Find the wallet record holding an address, across all users.
    ///
    /// Used to decide whether a session participant is locally custodied.
    pub fn find_by_address(&self, address: &str) -> StorageResult<Option<WalletRecord>> {
        let ids = self
            .storage
            .list_records(self.storage.paths().wallets_dir())?;

        for id in &ids {
            if let Ok(record) = self.get(id) {
                if record.address.eq_ignore_ascii_case(address) {
                    return Ok(Some(record));
                }
            }
        }
        Ok(None)
    }

    /// Find a user's wallet on a chain at a derivation index, if derived.
    pub fn find_by_chain_index(
        &self,
        owner_user_id: &str,
        chain: ChainKey,
        derivation_index: u32,
        account_kind: AccountKind,
    ) -> StorageResult<Option<WalletRecord>> {
        Ok(self.list_by_owner(owner_user_id)?.into_iter().find(|w| {
            w.chain == chain
                && w.derivation_index == derivation_index
                && w.account_kind == account_kind
        }))
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

    fn test_record(wallet_id: &str, owner: &str, chain: ChainKey) -> WalletRecord {
        WalletRecord {
            wallet_id: wallet_id.to_string(),
            owner_user_id: owner.to_string(),
            chain,
            address: format!("0xaddr-{wallet_id}"),
            derivation_index: 0,
            derivation_path: "m/44'/60'/0'/0/0".to_string(),
            account_kind: AccountKind::Eoa,
            label: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn create_and_get_round_trip() {
        let (storage, _dir) = test_storage();
        let repo = WalletRepository::new(&storage);

        let record = test_record("w1", "user-1", ChainKey::Ethereum);
        repo.create(&record).unwrap();

        let loaded = repo.get("w1").unwrap();
        assert_eq!(loaded.address, record.address);
        assert_eq!(loaded.chain, ChainKey::Ethereum);
    }

    #[test]
    fn create_duplicate_fails() {
        let (storage, _dir) = test_storage();
        let repo = WalletRepository::new(&storage);

        let record = test_record("w1", "user-1", ChainKey::Ethereum);
        repo.create(&record).unwrap();
        assert!(matches!(
            repo.create(&record),
            Err(StorageError::AlreadyExists(_))
        ));
    }

    #[test]
    fn list_by_owner_filters() {
        let (storage, _dir) = test_storage();
        let repo = WalletRepository::new(&storage);

        repo.create(&test_record("w1", "user-1", ChainKey::Ethereum))
            .unwrap();
        repo.create(&test_record("w2", "user-1", ChainKey::Solana))
            .unwrap();
        repo.create(&test_record("w3", "user-2", ChainKey::Ethereum))
            .unwrap();

        assert_eq!(repo.list_by_owner("user-1").unwrap().len(), 2);
        assert_eq!(repo.list_by_owner("user-2").unwrap().len(), 1);
        assert!(repo.list_by_owner("user-3").unwrap().is_empty());
    }

    #[test]
    fn find_by_chain_index_distinguishes_account_kind() {
        let (storage, _dir) = test_storage();
        let repo = WalletRepository::new(&storage);

        let eoa = test_record("w1", "user-1", ChainKey::Ethereum);
        repo.create(&eoa).unwrap();

        let found = repo
            .find_by_chain_index("user-1", ChainKey::Ethereum, 0, AccountKind::Eoa)
            .unwrap();
        assert!(found.is_some());

        let smart = repo
            .find_by_chain_index("user-1", ChainKey::Ethereum, 0, AccountKind::Erc4337)
            .unwrap();
        assert!(smart.is_none());
    }

    #[test]
    fn find_by_address_ignores_case() {
        let (storage, _dir) = test_storage();
        let repo = WalletRepository::new(&storage);

        let mut record = test_record("w1", "user-1", ChainKey::Ethereum);
        record.address = "0xAbCd000000000000000000000000000000000001".to_string();
        repo.create(&record).unwrap();

        let found = repo
            .find_by_address("0xabcd000000000000000000000000000000000001")
            .unwrap()
            .unwrap();
        assert_eq!(found.owner_user_id, "user-1");
        assert!(repo.find_by_address("0xffff").unwrap().is_none());
    }

    #[test]
    fn wallet_response_drops_owner() {
        let record = test_record("w1", "user-1", ChainKey::Ethereum);
        let response: WalletResponse = record.clone().into();
        assert_eq!(response.wallet_id, record.wallet_id);
        assert_eq!(response.address, record.address);
        // owner_user_id intentionally absent from WalletResponse
    }
}
