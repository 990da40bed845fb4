// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

use std::sync::Arc;

use crate::config::AppConfig;
use crate::indexer::ZerionClient;
use crate::lightning::LightningNodeService;
use crate::storage::{FileStorage, TxDatabase};

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    storage: FileStorage,
    /// Embedded transaction database. Absent when opening it failed at boot;
    /// send/history endpoints degrade gracefully.
    pub tx_db: Option<Arc<TxDatabase>>,
    /// Lightning node orchestration service.
    pub lightning: Arc<LightningNodeService>,
    /// Zerion indexer client, when configured.
    pub zerion: Option<Arc<ZerionClient>>,
}

impl AppState {
    pub fn new(
        config: Arc<AppConfig>,
        storage: FileStorage,
        tx_db: Option<Arc<TxDatabase>>,
        zerion: Option<Arc<ZerionClient>>,
    ) -> Self {
        let lightning = Arc::new(LightningNodeService::new(storage.clone(), config.clone()));
        Self {
            config,
            storage,
            tx_db,
            lightning,
            zerion,
        }
    }

    /// The file storage layer.
    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::storage::StoragePaths;

    /// Fully-initialized state over a temp directory, for handler tests.
    pub fn test_state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut storage = FileStorage::new(StoragePaths::new(dir.path()));
        storage.initialize().expect("initialize");

        let tx_db = TxDatabase::open(&storage.paths().tx_database())
            .map(Arc::new)
            .ok();

        let config = Arc::new(AppConfig {
            data_dir: dir.path().display().to_string(),
            jwt_secret: None,
            jwt_issuer: None,
            clearnode_url: "https://clearnet-sandbox.yellow.com/rpc".to_string(),
            zerion_api_key: None,
            erc4337_factory: "0x9406Cc6185a346906296840746125a0E44976454".to_string(),
            indexer_enabled: false,
            indexer_chain: "sepolia".to_string(),
        });

        (AppState::new(config, storage, tx_db, None), dir)
    }
}
