// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

use std::{env, net::SocketAddr, str::FromStr, sync::Arc};

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use beacon_wallet_server::{
    api::router,
    chains::{chain_config, ChainKey},
    config::AppConfig,
    indexer::{EventIndexer, ZerionClient},
    state::AppState,
    storage::{FileStorage, StoragePaths, TxDatabase},
};

#[tokio::main]
async fn main() {
    init_tracing();

    let config = Arc::new(AppConfig::from_env());

    // Initialize file storage (panics at boot if the data dir is unusable)
    let mut storage = FileStorage::new(StoragePaths::new(&config.data_dir));
    storage
        .initialize()
        .expect("Failed to initialize data directory");

    // Open the embedded transaction database; degrade without it
    let tx_db = match TxDatabase::open(&storage.paths().tx_database()) {
        Ok(db) => Some(Arc::new(db)),
        Err(e) => {
            tracing::error!(error = %e, "Transaction database unavailable, history disabled");
            None
        }
    };

    // Zerion indexer client, when configured
    let zerion = config
        .zerion_api_key
        .as_deref()
        .and_then(|key| match ZerionClient::new(key) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!(error = %e, "Zerion client unavailable");
                None
            }
        });

    let shutdown = CancellationToken::new();

    // Background transfer indexer
    if config.indexer_enabled {
        match (tx_db.clone(), ChainKey::from_str(&config.indexer_chain)) {
            (Some(db), Ok(chain)) => {
                let indexer = EventIndexer::new(db, chain_config(chain));
                tokio::spawn(indexer.run(shutdown.clone()));
            }
            (None, _) => {
                tracing::warn!("Indexer enabled but transaction database is unavailable");
            }
            (_, Err(e)) => {
                tracing::warn!(chain = %config.indexer_chain, error = %e, "Indexer chain not recognized");
            }
        }
    }

    let state = AppState::new(config, storage, tx_db, zerion);
    let app = router(state);

    // Parse bind address
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .expect("Failed to parse bind address");

    tracing::info!(%addr, "Beacon Wallet server listening (docs at /docs)");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .expect("HTTP server failed");
}

/// Install the tracing subscriber: `pretty` for terminals, `json` when
/// `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    if env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Resolve on ctrl-c, cancelling background tasks first.
async fn shutdown_signal(shutdown: CancellationToken) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
