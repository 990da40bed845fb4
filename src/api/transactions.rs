// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! Transaction endpoints: EVM sends, history, and status.

use alloy::network::EthereumWallet;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    audit_log,
    auth::Auth,
    chains::{
        chain_config, evm_signer, parse_units, AccountKind, ChainKey, EvmClient, GasEstimate,
        TxSender,
    },
    error::ApiError,
    indexer::zerion::IndexedTransaction,
    state::AppState,
    storage::{
        AuditEventType, DirectedTransaction, SeedRepository, StoredTransaction, TxStatus,
        WalletRepository,
    },
};

/// Request to send a transaction from an EVM wallet.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SendTransactionRequest {
    /// Recipient address (0x + 40 hex chars).
    pub to: String,
    /// Amount in human-readable format (e.g. "1.5").
    pub amount: String,
    /// "native" or an ERC-20 contract address.
    #[serde(default = "default_native")]
    pub token: String,
    /// Optional gas limit override.
    #[serde(default)]
    pub gas_limit: Option<u64>,
}

fn default_native() -> String {
    "native".to_string()
}

/// Transaction send response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SendTransactionResponse {
    /// Transaction hash.
    pub tx_hash: String,
    /// Current status.
    pub status: String,
    /// Block explorer URL.
    pub explorer_url: String,
}

/// Query parameters for transaction list.
#[derive(Debug, Deserialize, IntoParams)]
pub struct TransactionListQuery {
    /// Maximum number of results (default: 50).
    pub limit: Option<usize>,
}

/// Transaction list response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionListResponse {
    /// Locally recorded transactions (sends + indexed transfers).
    pub transactions: Vec<DirectedTransaction>,
    /// Indexer-side history, when the indexer is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexed: Option<Vec<IndexedTransactionView>>,
}

/// One indexer-side transaction.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct IndexedTransactionView {
    pub hash: String,
    pub chain: String,
    pub operation_type: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mined_at: Option<String>,
}

impl From<IndexedTransaction> for IndexedTransactionView {
    fn from(tx: IndexedTransaction) -> Self {
        Self {
            hash: tx.hash,
            chain: tx.chain,
            operation_type: tx.operation_type,
            status: tx.status,
            mined_at: tx.mined_at,
        }
    }
}

/// Query parameters for transaction status.
#[derive(Debug, Deserialize, IntoParams)]
pub struct TransactionStatusQuery {
    /// Chain to query (default "ethereum").
    pub chain: Option<String>,
}

/// Transaction status response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionStatusResponse {
    pub tx_hash: String,
    /// "pending", "confirmed", or "failed".
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
}

/// Estimate gas for a send without broadcasting it.
#[utoipa::path(
    post,
    path = "/v1/wallet/{wallet_id}/estimate",
    tag = "Transactions",
    security(("bearer_auth" = [])),
    params(("wallet_id" = String, Path, description = "Wallet ID")),
    request_body = SendTransactionRequest,
    responses(
        (status = 200, description = "Gas estimate", body = GasEstimate),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not your wallet"),
        (status = 404, description = "Wallet not found"),
        (status = 502, description = "Chain RPC unavailable")
    )
)]
pub async fn estimate_gas(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
    Json(request): Json<SendTransactionRequest>,
) -> Result<Json<GasEstimate>, ApiError> {
    let storage = state.storage();
    let wallets = WalletRepository::new(storage);

    let wallet = wallets
        .get(&wallet_id)
        .map_err(|_| ApiError::not_found(format!("Wallet {wallet_id} not found")))?;
    if wallet.owner_user_id != user.user_id {
        return Err(ApiError::forbidden("You don't have permission to use this wallet"));
    }

    let config = chain_config(wallet.chain);
    if !config.is_evm() {
        return Err(ApiError::bad_request(
            "Gas estimation is supported on EVM chains only",
        ));
    }

    let seeds = SeedRepository::new(storage);
    let mnemonic = seeds
        .read_mnemonic(&user.user_id)
        .map_err(|e| ApiError::internal(format!("Failed to load seed: {e}")))?;
    let signer = evm_signer(&mnemonic, wallet.derivation_index)
        .map_err(|e| ApiError::internal(format!("Derivation failed: {e}")))?;
    let sender = TxSender::new(config, EthereumWallet::from(signer))
        .map_err(|e| ApiError::internal(format!("RPC client failed: {e}")))?;

    let estimate = if request.token == "native" {
        let amount = parse_units(&request.amount, config.decimals)
            .map_err(|e| ApiError::bad_request(format!("Invalid amount: {e}")))?;
        sender
            .estimate_native_transfer(&wallet.address, &request.to, amount)
            .await
    } else {
        let client = EvmClient::new(config)
            .map_err(|e| ApiError::internal(format!("RPC client failed: {e}")))?;
        let token_info = client
            .get_token_balance(&wallet.address, &request.token)
            .await
            .map_err(|e| ApiError::bad_gateway(format!("Token lookup failed: {e}")))?;
        let amount = parse_units(&request.amount, token_info.decimals)
            .map_err(|e| ApiError::bad_request(format!("Invalid amount: {e}")))?;
        sender
            .estimate_token_transfer(&wallet.address, &request.to, &request.token, amount)
            .await
    }
    .map_err(|e| ApiError::bad_gateway(format!("Estimation failed: {e}")))?;

    Ok(Json(estimate))
}

/// Send native or ERC-20 funds from an EVM wallet.
#[utoipa::path(
    post,
    path = "/v1/wallet/{wallet_id}/send",
    tag = "Transactions",
    security(("bearer_auth" = [])),
    params(("wallet_id" = String, Path, description = "Wallet ID")),
    request_body = SendTransactionRequest,
    responses(
        (status = 200, description = "Transaction submitted", body = SendTransactionResponse),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not your wallet"),
        (status = 404, description = "Wallet not found"),
        (status = 502, description = "Chain RPC unavailable")
    )
)]
pub async fn send_transaction(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
    Json(request): Json<SendTransactionRequest>,
) -> Result<Json<SendTransactionResponse>, ApiError> {
    let storage = state.storage();
    let wallets = WalletRepository::new(storage);

    let wallet = wallets
        .get(&wallet_id)
        .map_err(|_| ApiError::not_found(format!("Wallet {wallet_id} not found")))?;
    if wallet.owner_user_id != user.user_id {
        return Err(ApiError::forbidden("You don't have permission to use this wallet"));
    }

    let config = chain_config(wallet.chain);
    if !config.is_evm() {
        return Err(ApiError::bad_request(format!(
            "Sending is supported on EVM chains only; {} is not one",
            config.name
        )));
    }
    if wallet.account_kind != AccountKind::Eoa {
        return Err(ApiError::bad_request(
            "Smart-account sends go through the bundler, not this endpoint",
        ));
    }

    let seeds = SeedRepository::new(storage);
    let mnemonic = seeds
        .read_mnemonic(&user.user_id)
        .map_err(|e| ApiError::internal(format!("Failed to load seed: {e}")))?;
    let signer = evm_signer(&mnemonic, wallet.derivation_index)
        .map_err(|e| ApiError::internal(format!("Derivation failed: {e}")))?;

    let sender = TxSender::new(config, EthereumWallet::from(signer))
        .map_err(|e| ApiError::internal(format!("RPC client failed: {e}")))?;

    let (result, asset) = if request.token == "native" {
        let amount = parse_units(&request.amount, config.decimals)
            .map_err(|e| ApiError::bad_request(format!("Invalid amount: {e}")))?;
        let result = sender
            .send_native(&request.to, amount, request.gas_limit)
            .await
            .map_err(|e| ApiError::bad_gateway(format!("Send failed: {e}")))?;
        (result, config.symbol.to_string())
    } else {
        // Resolve token decimals on-chain before scaling the amount
        let client = EvmClient::new(config)
            .map_err(|e| ApiError::internal(format!("RPC client failed: {e}")))?;
        let token_info = client
            .get_token_balance(&wallet.address, &request.token)
            .await
            .map_err(|e| ApiError::bad_gateway(format!("Token lookup failed: {e}")))?;

        let amount = parse_units(&request.amount, token_info.decimals)
            .map_err(|e| ApiError::bad_request(format!("Invalid amount: {e}")))?;
        let result = sender
            .send_token(&request.to, &request.token, amount, request.gas_limit)
            .await
            .map_err(|e| ApiError::bad_gateway(format!("Send failed: {e}")))?;
        (result, token_info.symbol)
    };

    // Record the send locally; the indexer fills in confirmations later
    if let Some(tx_db) = &state.tx_db {
        let record = StoredTransaction {
            tx_hash: result.tx_hash.clone(),
            chain: wallet.chain.to_string(),
            from_address: wallet.address.clone(),
            to_address: request.to.clone(),
            amount: request.amount.clone(),
            asset,
            status: TxStatus::Pending,
            block_number: None,
            created_at: Utc::now(),
        };
        let mut directions = vec![(wallet.address.clone(), "sent")];
        if let Ok(Some(_)) = tx_db.wallet_for_address(&request.to) {
            directions.push((request.to.clone(), "received"));
        }
        if let Err(e) = tx_db.upsert_transaction(&record, &directions) {
            tracing::warn!(error = %e, tx_hash = %result.tx_hash, "Failed to record transaction");
        }
    }

    audit_log!(
        storage,
        AuditEventType::TransactionSubmitted,
        &user,
        "transaction",
        &result.tx_hash
    );

    Ok(Json(SendTransactionResponse {
        tx_hash: result.tx_hash,
        status: "pending".to_string(),
        explorer_url: result.explorer_url,
    }))
}

/// List transactions touching a wallet, newest first.
#[utoipa::path(
    get,
    path = "/v1/wallet/{wallet_id}/transactions",
    tag = "Transactions",
    security(("bearer_auth" = [])),
    params(
        ("wallet_id" = String, Path, description = "Wallet ID"),
        TransactionListQuery
    ),
    responses(
        (status = 200, description = "Transaction history", body = TransactionListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not your wallet"),
        (status = 404, description = "Wallet not found")
    )
)]
pub async fn list_transactions(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
    Query(query): Query<TransactionListQuery>,
) -> Result<Json<TransactionListResponse>, ApiError> {
    let repo = WalletRepository::new(state.storage());
    let wallet = repo
        .get(&wallet_id)
        .map_err(|_| ApiError::not_found(format!("Wallet {wallet_id} not found")))?;
    if wallet.owner_user_id != user.user_id {
        return Err(ApiError::forbidden("You don't have permission to access this wallet"));
    }

    let limit = query.limit.unwrap_or(50);
    let transactions = match &state.tx_db {
        Some(tx_db) => tx_db
            .list_for_address(&wallet.address, limit)
            .map_err(|e| ApiError::internal(format!("Failed to read history: {e}")))?,
        None => Vec::new(),
    };

    let indexed = match &state.zerion {
        Some(zerion) => match zerion.list_transactions(&wallet.address, limit).await {
            Ok(list) => Some(list.into_iter().map(Into::into).collect()),
            Err(e) => {
                tracing::warn!(error = %e, "Indexer history lookup failed");
                None
            }
        },
        None => None,
    };

    Ok(Json(TransactionListResponse {
        transactions,
        indexed,
    }))
}

/// Get the status of a transaction by hash.
#[utoipa::path(
    get,
    path = "/v1/transactions/{tx_hash}/status",
    tag = "Transactions",
    security(("bearer_auth" = [])),
    params(
        ("tx_hash" = String, Path, description = "Transaction hash"),
        TransactionStatusQuery
    ),
    responses(
        (status = 200, description = "Transaction status", body = TransactionStatusResponse),
        (status = 400, description = "Unsupported chain"),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "Chain RPC unavailable")
    )
)]
pub async fn transaction_status(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Path(tx_hash): Path<String>,
    Query(query): Query<TransactionStatusQuery>,
) -> Result<Json<TransactionStatusResponse>, ApiError> {
    let chain_key: ChainKey = query
        .chain
        .as_deref()
        .unwrap_or("ethereum")
        .parse()
        .map_err(|_| ApiError::bad_request("Unsupported chain"))?;
    let config = chain_config(chain_key);
    if !config.is_evm() {
        return Err(ApiError::bad_request(
            "Status lookup is supported on EVM chains only",
        ));
    }

    let client = EvmClient::new(config)
        .map_err(|e| ApiError::internal(format!("RPC client failed: {e}")))?;
    let receipt = client
        .get_transaction_status(&tx_hash)
        .await
        .map_err(|e| ApiError::bad_gateway(format!("Status lookup failed: {e}")))?;

    let response = match receipt {
        Some(receipt) => {
            let status = if receipt.success {
                TxStatus::Confirmed
            } else {
                TxStatus::Failed
            };
            // Best-effort local status update
            if let Some(tx_db) = &state.tx_db {
                let _ = tx_db.update_status(&tx_hash, status, Some(receipt.block_number));
            }
            TransactionStatusResponse {
                tx_hash,
                status: if receipt.success { "confirmed" } else { "failed" }.to_string(),
                block_number: Some(receipt.block_number),
                gas_used: Some(receipt.gas_used),
            }
        }
        None => TransactionStatusResponse {
            tx_hash,
            status: "pending".to_string(),
            block_number: None,
            gas_used: None,
        },
    };
    Ok(Json(response))
}
