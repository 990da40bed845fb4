// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! # Transfer Indexer
//!
//! Background task that indexes ERC-20 `Transfer` events touching registered
//! wallet addresses into the embedded redb transaction database. Cross-chain
//! history beyond the followed chain comes from the Zerion client.
//!
//! ## Checkpointing
//!
//! The last processed block is persisted in redb (`indexer_state` table).
//! On restart, indexing resumes from the checkpoint instead of rescanning.

pub mod zerion;

pub use zerion::{ZerionClient, ZerionError};

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, FixedBytes, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::Filter;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::chains::{format_units, tokens_for_chain, ChainConfig};
use crate::storage::{StoredTransaction, TxDatabase, TxDbError, TxStatus};

/// keccak256("Transfer(address,address,uint256)")
const TRANSFER_TOPIC: FixedBytes<32> = FixedBytes::new([
    0xdd, 0xf2, 0x52, 0xad, 0x1b, 0xe2, 0xc8, 0x9b, 0x69, 0xc2, 0xb0, 0x68, 0xfc, 0x37, 0x8d, 0xaa,
    0x95, 0x2b, 0xa7, 0xf1, 0x63, 0xc4, 0xa1, 0x16, 0x28, 0xf5, 0x5a, 0x4d, 0xf5, 0x23, 0xb3, 0xef,
]);

/// Default block chunk size per `eth_getLogs` query.
const DEFAULT_CHUNK_SIZE: u64 = 2000;

/// Default poll interval when caught up to chain head.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How far back to look when starting fresh (no checkpoint).
const INITIAL_LOOKBACK_BLOCKS: u64 = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error(transparent)]
    Db(#[from] TxDbError),
}

/// ERC-20 transfer indexer that runs as a background tokio task.
pub struct EventIndexer {
    db: Arc<TxDatabase>,
    chain: &'static ChainConfig,
    poll_interval: Duration,
    chunk_size: u64,
}

impl EventIndexer {
    /// Create an indexer following one chain's known token contracts.
    pub fn new(db: Arc<TxDatabase>, chain: &'static ChainConfig) -> Self {
        Self {
            db,
            chain,
            poll_interval: DEFAULT_POLL_INTERVAL,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    fn checkpoint_key(&self) -> String {
        format!("last_block_{}", self.chain.key)
    }

    fn token_contracts(&self) -> Vec<Address> {
        tokens_for_chain(self.chain.key)
            .iter()
            .filter_map(|t| t.address.parse().ok())
            .collect()
    }

    /// Run the indexer loop until the cancellation token is triggered.
    ///
    /// This should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(indexer.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(chain = %self.chain.key, "Transfer indexer starting");

        let url = match self.chain.resolved_rpc_url().parse() {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(chain = %self.chain.key, error = %e, "Indexer has no valid RPC URL");
                return;
            }
        };
        let provider = ProviderBuilder::new().connect_http(url);

        loop {
            if shutdown.is_cancelled() {
                tracing::info!("Transfer indexer shutting down");
                return;
            }

            if let Err(e) = self.index_step(&provider).await {
                tracing::warn!(error = %e, "Indexer step failed, will retry");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {},
                _ = shutdown.cancelled() => {
                    tracing::info!("Transfer indexer shutting down");
                    return;
                }
            }
        }
    }

    /// Execute one indexing step: fetch logs from checkpoint to head.
    async fn index_step<P: Provider + Clone>(&self, provider: &P) -> Result<(), IndexerError> {
        let key = self.checkpoint_key();
        let checkpoint = self.db.get_checkpoint(&key)?;

        let head = provider
            .get_block_number()
            .await
            .map_err(|e| IndexerError::Rpc(e.to_string()))?;

        let start = match checkpoint {
            None => head.saturating_sub(INITIAL_LOOKBACK_BLOCKS),
            Some(last) => last + 1,
        };
        if start > head {
            return Ok(());
        }

        let contracts = self.token_contracts();
        if contracts.is_empty() {
            self.db.set_checkpoint(&key, head)?;
            return Ok(());
        }

        let mut from = start;
        while from <= head {
            let to = (from + self.chunk_size - 1).min(head);

            let indexed = self.fetch_and_store_logs(provider, &contracts, from, to).await?;
            if indexed > 0 {
                tracing::debug!(
                    from_block = from,
                    to_block = to,
                    events = indexed,
                    "Indexed ERC-20 transfer events"
                );
            }

            self.db.set_checkpoint(&key, to)?;
            from = to + 1;
        }
        Ok(())
    }

    /// Fetch logs for a block range and store transfers touching registered
    /// wallet addresses.
    async fn fetch_and_store_logs<P: Provider + Clone>(
        &self,
        provider: &P,
        contracts: &[Address],
        from_block: u64,
        to_block: u64,
    ) -> Result<usize, IndexerError> {
        let filter = Filter::new()
            .address(contracts.to_vec())
            .event_signature(TRANSFER_TOPIC)
            .from_block(from_block)
            .to_block(to_block);

        let logs = provider
            .get_logs(&filter)
            .await
            .map_err(|e| IndexerError::Rpc(e.to_string()))?;

        let mut count = 0;
        for log in &logs {
            // Transfer event: topics [event_sig, from, to], data = value
            if log.topics().len() < 3 {
                continue;
            }

            let from_addr = format!("0x{}", alloy::hex::encode(&log.topics()[1][12..]));
            let to_addr = format!("0x{}", alloy::hex::encode(&log.topics()[2][12..]));

            let value = if log.data().data.len() >= 32 {
                U256::from_be_slice(&log.data().data[..32])
            } else {
                U256::ZERO
            };

            let Some(tx_hash) = log.transaction_hash.map(|h| format!("{h:#x}")) else {
                continue;
            };

            let from_wallet = self.db.wallet_for_address(&from_addr)?;
            let to_wallet = self.db.wallet_for_address(&to_addr)?;
            if from_wallet.is_none() && to_wallet.is_none() {
                continue;
            }

            // Skip transfers already recorded (e.g. our own sends)
            if self.db.get_transaction(&tx_hash)?.is_some() {
                continue;
            }

            let contract = format!("{:?}", log.address()).to_lowercase();
            let (symbol, decimals) = self.identify_token(&contract);

            let mut directions: Vec<(String, &str)> = Vec::new();
            if from_wallet.is_some() {
                directions.push((from_addr.clone(), "sent"));
            }
            if to_wallet.is_some() {
                directions.push((to_addr.clone(), "received"));
            }

            let tx = StoredTransaction {
                tx_hash,
                chain: self.chain.key.to_string(),
                from_address: from_addr,
                to_address: to_addr,
                amount: format_units(value, decimals),
                asset: symbol,
                status: TxStatus::Confirmed,
                block_number: log.block_number,
                created_at: Utc::now(),
            };
            self.db.upsert_transaction(&tx, &directions)?;
            count += 1;
        }
        Ok(count)
    }

    /// Resolve symbol and decimals for a watched contract.
    fn identify_token(&self, contract: &str) -> (String, u8) {
        for token in tokens_for_chain(self.chain.key) {
            if token.address.eq_ignore_ascii_case(contract) {
                return (token.symbol.to_string(), token.decimals);
            }
        }
        (contract.to_string(), 18)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::{chain_config, ChainKey};

    #[test]
    fn transfer_topic_matches_event_signature() {
        let computed = alloy::primitives::keccak256(b"Transfer(address,address,uint256)");
        assert_eq!(computed, TRANSFER_TOPIC);
    }

    #[test]
    fn checkpoint_key_is_per_chain() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(TxDatabase::open(&dir.path().join("tx.redb")).unwrap());

        let eth = EventIndexer::new(db.clone(), chain_config(ChainKey::Ethereum));
        let base = EventIndexer::new(db, chain_config(ChainKey::Base));
        assert_eq!(eth.checkpoint_key(), "last_block_ethereum");
        assert_eq!(base.checkpoint_key(), "last_block_base");
    }

    #[test]
    fn known_token_contracts_parse() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(TxDatabase::open(&dir.path().join("tx.redb")).unwrap());

        let eth = EventIndexer::new(db, chain_config(ChainKey::Ethereum));
        let contracts = eth.token_contracts();
        assert!(!contracts.is_empty());

        let (symbol, decimals) =
            eth.identify_token("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
        assert_eq!(symbol, "USDC");
        assert_eq!(decimals, 6);

        let (unknown, fallback) = eth.identify_token("0xdeadbeef");
        assert_eq!(unknown, "0xdeadbeef");
        assert_eq!(fallback, 18);
    }
}
