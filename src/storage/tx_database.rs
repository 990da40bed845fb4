// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! Embedded transaction history database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `transactions`: tx_hash → serialized StoredTransaction
//! - `address_tx_index`: composite key (address|!timestamp|tx_hash) → direction
//! - `address_wallet_map`: on-chain address → wallet_id
//! - `indexer_state`: key → value (checkpoint state)

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Primary table: tx_hash → serialized StoredTransaction (JSON bytes).
const TRANSACTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("transactions");

/// Index: composite key → direction ("sent"|"received").
/// Key format: `address|!timestamp_be|tx_hash` for descending-time range scans.
const ADDRESS_TX_INDEX: TableDefinition<&[u8], &str> = TableDefinition::new("address_tx_index");

/// Map: lowercase on-chain address → wallet_id.
const ADDRESS_WALLET_MAP: TableDefinition<&str, &str> = TableDefinition::new("address_wallet_map");

/// Indexer state: key → value bytes (e.g., "last_block_sepolia" → u64 big-endian).
const INDEXER_STATE: TableDefinition<&str, &[u8]> = TableDefinition::new("indexer_state");

#[derive(Debug, thiserror::Error)]
pub enum TxDbError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type TxDbResult<T> = Result<T, TxDbError>;

/// On-chain transaction status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

/// A recorded on-chain transaction, mirrored from sends and the indexer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StoredTransaction {
    /// Transaction hash.
    pub tx_hash: String,
    /// Chain key (e.g. "ethereum", "sepolia").
    pub chain: String,
    /// Sender address.
    pub from_address: String,
    /// Recipient address.
    pub to_address: String,
    /// Amount in human-readable units.
    pub amount: String,
    /// Asset symbol, or ERC-20 contract address for unknown tokens.
    pub asset: String,
    /// Current status.
    pub status: TxStatus,
    /// Block number once confirmed.
    pub block_number: Option<u64>,
    /// When the transaction was first recorded.
    pub created_at: DateTime<Utc>,
}

/// A transaction paired with its direction relative to a queried address.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DirectedTransaction {
    #[serde(flatten)]
    pub tx: StoredTransaction,
    /// "sent" or "received".
    pub direction: String,
}

/// Build a composite key for the address_tx_index table.
///
/// Format: `lowercase_address | inverted_timestamp_be_bytes | tx_hash`
///
/// The inverted timestamp ensures newest-first ordering when scanning forward.
fn make_index_key(address: &str, timestamp: i64, tx_hash: &str) -> Vec<u8> {
    let addr = address.to_lowercase();
    let mut key = Vec::with_capacity(addr.len() + 1 + 8 + 1 + tx_hash.len());
    key.extend_from_slice(addr.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&(!timestamp as u64).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(tx_hash.as_bytes());
    key
}

/// Build a prefix key for range scanning all transactions of an address.
fn make_prefix(address: &str) -> Vec<u8> {
    let addr = address.to_lowercase();
    let mut prefix = Vec::with_capacity(addr.len() + 1);
    prefix.extend_from_slice(addr.as_bytes());
    prefix.push(b'|');
    prefix
}

/// Build the upper bound for a range scan.
fn make_prefix_end(address: &str) -> Vec<u8> {
    let mut end = make_prefix(address);
    end.extend_from_slice(&[0xFF; 20]);
    end
}

/// Embedded ACID transaction database.
pub struct TxDatabase {
    db: Database,
}

impl TxDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> TxDbResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(TRANSACTIONS)?;
            let _ = write_txn.open_table(ADDRESS_TX_INDEX)?;
            let _ = write_txn.open_table(ADDRESS_WALLET_MAP)?;
            let _ = write_txn.open_table(INDEXER_STATE)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Insert or update a transaction and its index entries.
    ///
    /// `directions` is a list of `(address, direction)` pairs, e.g.:
    /// `[("0xabc...", "sent"), ("0xdef...", "received")]`
    pub fn upsert_transaction(
        &self,
        tx: &StoredTransaction,
        directions: &[(String, &str)],
    ) -> TxDbResult<()> {
        let json = serde_json::to_vec(tx)?;
        let timestamp = tx.created_at.timestamp();

        let write_txn = self.db.begin_write()?;
        {
            let mut transactions = write_txn.open_table(TRANSACTIONS)?;
            transactions.insert(tx.tx_hash.as_str(), json.as_slice())?;

            let mut index = write_txn.open_table(ADDRESS_TX_INDEX)?;
            for (address, direction) in directions {
                let key = make_index_key(address, timestamp, &tx.tx_hash);
                index.insert(key.as_slice(), *direction)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up a transaction by hash.
    pub fn get_transaction(&self, tx_hash: &str) -> TxDbResult<Option<StoredTransaction>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TRANSACTIONS)?;
        match table.get(tx_hash)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Update the status (and block number) of a recorded transaction.
    pub fn update_status(
        &self,
        tx_hash: &str,
        status: TxStatus,
        block_number: Option<u64>,
    ) -> TxDbResult<()> {
        let mut tx = self
            .get_transaction(tx_hash)?
            .ok_or_else(|| TxDbError::NotFound(format!("transaction {tx_hash}")))?;
        tx.status = status;
        if block_number.is_some() {
            tx.block_number = block_number;
        }

        let json = serde_json::to_vec(&tx)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut transactions = write_txn.open_table(TRANSACTIONS)?;
            transactions.insert(tx_hash, json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// List transactions touching an address, newest first.
    pub fn list_for_address(
        &self,
        address: &str,
        limit: usize,
    ) -> TxDbResult<Vec<DirectedTransaction>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(ADDRESS_TX_INDEX)?;
        let transactions = read_txn.open_table(TRANSACTIONS)?;

        let lower = make_prefix(address);
        let upper = make_prefix_end(address);

        let mut results = Vec::new();
        for entry in index.range(lower.as_slice()..upper.as_slice())? {
            if results.len() >= limit {
                break;
            }
            let (key_guard, dir_guard) = entry?;
            let key = key_guard.value();

            // tx_hash is everything after the second separator
            let hash_offset = make_prefix(address).len() + 8 + 1;
            if key.len() <= hash_offset {
                continue;
            }
            let tx_hash = match std::str::from_utf8(&key[hash_offset..]) {
                Ok(h) => h,
                Err(_) => continue,
            };

            if let Some(tx_guard) = transactions.get(tx_hash)? {
                results.push(DirectedTransaction {
                    tx: serde_json::from_slice(tx_guard.value())?,
                    direction: dir_guard.value().to_string(),
                });
            }
        }
        Ok(results)
    }

    /// Register an on-chain address as belonging to a wallet.
    pub fn register_address(&self, address: &str, wallet_id: &str) -> TxDbResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut map = write_txn.open_table(ADDRESS_WALLET_MAP)?;
            map.insert(address.to_lowercase().as_str(), wallet_id)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up the wallet owning an address, if registered.
    pub fn wallet_for_address(&self, address: &str) -> TxDbResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let map = read_txn.open_table(ADDRESS_WALLET_MAP)?;
        Ok(map
            .get(address.to_lowercase().as_str())?
            .map(|guard| guard.value().to_string()))
    }

    /// List all registered addresses.
    pub fn registered_addresses(&self) -> TxDbResult<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let map = read_txn.open_table(ADDRESS_WALLET_MAP)?;
        let mut addresses = Vec::new();
        for entry in map.iter()? {
            let (key, _) = entry?;
            addresses.push(key.value().to_string());
        }
        Ok(addresses)
    }

    /// Persist an indexer checkpoint (last processed block).
    pub fn set_checkpoint(&self, key: &str, block: u64) -> TxDbResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut state = write_txn.open_table(INDEXER_STATE)?;
            state.insert(key, block.to_be_bytes().as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Read an indexer checkpoint.
    pub fn get_checkpoint(&self, key: &str) -> TxDbResult<Option<u64>> {
        let read_txn = self.db.begin_read()?;
        let state = read_txn.open_table(INDEXER_STATE)?;
        match state.get(key)? {
            Some(guard) => {
                let bytes: [u8; 8] = guard
                    .value()
                    .try_into()
                    .map_err(|_| TxDbError::NotFound(format!("malformed checkpoint {key}")))?;
                Ok(Some(u64::from_be_bytes(bytes)))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (TxDatabase, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = TxDatabase::open(&dir.path().join("tx.redb")).expect("open db");
        (db, dir)
    }

    fn test_tx(hash: &str, seconds_ago: i64) -> StoredTransaction {
        StoredTransaction {
            tx_hash: hash.to_string(),
            chain: "sepolia".to_string(),
            from_address: "0xAAAA000000000000000000000000000000000001".to_string(),
            to_address: "0xBBBB000000000000000000000000000000000002".to_string(),
            amount: "1.5".to_string(),
            asset: "ETH".to_string(),
            status: TxStatus::Pending,
            block_number: None,
            created_at: Utc::now() - chrono::Duration::seconds(seconds_ago),
        }
    }

    #[test]
    fn upsert_and_get_round_trip() {
        let (db, _dir) = test_db();
        let tx = test_tx("0xhash1", 0);

        db.upsert_transaction(&tx, &[(tx.from_address.clone(), "sent")])
            .unwrap();

        let loaded = db.get_transaction("0xhash1").unwrap().unwrap();
        assert_eq!(loaded.tx_hash, "0xhash1");
        assert_eq!(loaded.status, TxStatus::Pending);
    }

    #[test]
    fn list_for_address_is_newest_first() {
        let (db, _dir) = test_db();
        let older = test_tx("0xolder", 300);
        let newer = test_tx("0xnewer", 10);

        db.upsert_transaction(&older, &[(older.from_address.clone(), "sent")])
            .unwrap();
        db.upsert_transaction(&newer, &[(newer.from_address.clone(), "sent")])
            .unwrap();

        let listed = db
            .list_for_address(&older.from_address, 10)
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].tx.tx_hash, "0xnewer");
        assert_eq!(listed[1].tx.tx_hash, "0xolder");
        assert_eq!(listed[0].direction, "sent");
    }

    #[test]
    fn list_for_address_respects_limit_and_case() {
        let (db, _dir) = test_db();
        for i in 0..5 {
            let tx = test_tx(&format!("0xhash{i}"), i * 10);
            db.upsert_transaction(&tx, &[(tx.from_address.clone(), "sent")])
                .unwrap();
        }

        // Query with different casing than stored
        let listed = db
            .list_for_address("0xaaaa000000000000000000000000000000000001", 3)
            .unwrap();
        assert_eq!(listed.len(), 3);
    }

    #[test]
    fn update_status_sets_block_number() {
        let (db, _dir) = test_db();
        let tx = test_tx("0xpending", 0);
        db.upsert_transaction(&tx, &[]).unwrap();

        db.update_status("0xpending", TxStatus::Confirmed, Some(123456))
            .unwrap();

        let loaded = db.get_transaction("0xpending").unwrap().unwrap();
        assert_eq!(loaded.status, TxStatus::Confirmed);
        assert_eq!(loaded.block_number, Some(123456));
    }

    #[test]
    fn update_status_on_unknown_hash_fails() {
        let (db, _dir) = test_db();
        let result = db.update_status("0xmissing", TxStatus::Failed, None);
        assert!(matches!(result, Err(TxDbError::NotFound(_))));
    }

    #[test]
    fn address_registration_round_trip() {
        let (db, _dir) = test_db();
        db.register_address("0xAbC1230000000000000000000000000000000000", "wallet-1")
            .unwrap();

        let wallet = db
            .wallet_for_address("0xabc1230000000000000000000000000000000000")
            .unwrap();
        assert_eq!(wallet.as_deref(), Some("wallet-1"));

        let addresses = db.registered_addresses().unwrap();
        assert_eq!(addresses.len(), 1);
    }

    #[test]
    fn checkpoints_round_trip() {
        let (db, _dir) = test_db();
        assert_eq!(db.get_checkpoint("last_block_sepolia").unwrap(), None);

        db.set_checkpoint("last_block_sepolia", 7_654_321).unwrap();
        assert_eq!(
            db.get_checkpoint("last_block_sepolia").unwrap(),
            Some(7_654_321)
        );
    }
}
