// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! # Storage Module
//!
//! Persistent state lives in two places:
//!
//! - JSON-file repositories under `DATA_DIR` for users, seeds, derived
//!   wallets and lightning node mirrors;
//! - an embedded redb database for on-chain transaction history and
//!   indexer checkpoints.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/
//!   users/{user_id}.json
//!   seeds/{user_id}/mnemonic.txt   # NEVER exposed via API
//!   wallets/{wallet_id}.json
//!   lightning/{node_id}.json
//!   txdb/transactions.redb
//!   audit/{date}/events.jsonl      # Daily audit logs
//! ```

pub mod audit;
pub mod fs;
pub mod ownership;
pub mod paths;
pub mod repository;
pub mod tx_database;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use fs::{FileStorage, StorageError, StorageResult};
pub use ownership::{OwnedResource, OwnershipEnforcer};
pub use paths::StoragePaths;
pub use repository::{
    LightningNodeRecord, LightningNodeRepository, SeedRepository, UserRecord, UserRepository,
    WalletRecord, WalletRepository, WalletResponse,
};
pub use tx_database::{DirectedTransaction, StoredTransaction, TxDatabase, TxDbError, TxStatus};
