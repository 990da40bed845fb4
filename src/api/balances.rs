// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! Balance and portfolio endpoints.
//!
//! EVM balances come straight from chain RPC; everything else reads through
//! the Zerion indexer.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    auth::Auth,
    chains::{chain_config, EvmClient, WalletBalances},
    error::ApiError,
    indexer::zerion::Position,
    state::AppState,
    storage::WalletRepository,
};

/// Cross-chain portfolio response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PortfolioResponse {
    /// Wallet address the portfolio was queried for.
    pub address: String,
    /// Total USD value across chains.
    pub total_value_usd: f64,
    /// USD value per chain key.
    pub by_chain: std::collections::HashMap<String, f64>,
    /// Individual fungible positions.
    pub positions: Vec<PositionView>,
}

/// One position in the portfolio response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PositionView {
    pub symbol: String,
    pub name: String,
    pub chain: String,
    pub quantity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_usd: Option<f64>,
}

impl From<Position> for PositionView {
    fn from(p: Position) -> Self {
        Self {
            symbol: p.symbol,
            name: p.name,
            chain: p.chain,
            quantity: p.quantity,
            value_usd: p.value_usd,
        }
    }
}

/// Get balances for a wallet.
///
/// EVM wallets are read from chain RPC (native + known tokens); non-EVM
/// wallets are read from the Zerion indexer.
#[utoipa::path(
    get,
    path = "/v1/wallet/{wallet_id}/balance",
    tag = "Balances",
    security(("bearer_auth" = [])),
    params(("wallet_id" = String, Path, description = "Wallet ID")),
    responses(
        (status = 200, description = "Wallet balances", body = WalletBalances),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not your wallet"),
        (status = 404, description = "Wallet not found"),
        (status = 502, description = "Chain RPC or indexer unavailable")
    )
)]
pub async fn get_balance(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
) -> Result<Json<WalletBalances>, ApiError> {
    let repo = WalletRepository::new(state.storage());
    let wallet = repo
        .get(&wallet_id)
        .map_err(|_| ApiError::not_found(format!("Wallet {wallet_id} not found")))?;
    if wallet.owner_user_id != user.user_id {
        return Err(ApiError::forbidden("You don't have permission to access this wallet"));
    }

    let config = chain_config(wallet.chain);
    if config.is_evm() {
        let client = EvmClient::new(config)
            .map_err(|e| ApiError::internal(format!("RPC client failed: {e}")))?;
        let balances = client
            .get_wallet_balances(&wallet.address)
            .await
            .map_err(|e| ApiError::bad_gateway(format!("Balance lookup failed: {e}")))?;
        return Ok(Json(balances));
    }

    // Non-EVM chains read through the indexer
    let Some(zerion) = &state.zerion else {
        return Err(ApiError::bad_gateway(
            "Indexer not configured; non-EVM balances unavailable",
        ));
    };

    let positions = zerion
        .list_positions(&wallet.address)
        .await
        .map_err(|e| ApiError::bad_gateway(format!("Indexer lookup failed: {e}")))?;

    let chain_key = wallet.chain.to_string();
    let token_balances = positions
        .into_iter()
        .filter(|p| p.chain == chain_key)
        .map(|p| crate::chains::TokenBalance {
            symbol: p.symbol,
            name: p.name,
            balance_raw: String::new(),
            balance_formatted: p.quantity,
            decimals: config.decimals,
            contract_address: None,
        })
        .collect::<Vec<_>>();

    let native_balance = token_balances
        .iter()
        .find(|b| b.symbol == config.symbol)
        .cloned()
        .unwrap_or(crate::chains::TokenBalance {
            symbol: config.symbol.to_string(),
            name: config.name.to_string(),
            balance_raw: "0".to_string(),
            balance_formatted: "0".to_string(),
            decimals: config.decimals,
            contract_address: None,
        });

    Ok(Json(WalletBalances {
        address: wallet.address,
        chain: chain_key,
        chain_id: 0,
        native_balance,
        token_balances,
    }))
}

/// Get the cross-chain portfolio for a wallet's address.
#[utoipa::path(
    get,
    path = "/v1/wallet/{wallet_id}/portfolio",
    tag = "Balances",
    security(("bearer_auth" = [])),
    params(("wallet_id" = String, Path, description = "Wallet ID")),
    responses(
        (status = 200, description = "Portfolio", body = PortfolioResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not your wallet"),
        (status = 404, description = "Wallet not found"),
        (status = 502, description = "Indexer unavailable")
    )
)]
pub async fn get_portfolio(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
) -> Result<Json<PortfolioResponse>, ApiError> {
    let repo = WalletRepository::new(state.storage());
    let wallet = repo
        .get(&wallet_id)
        .map_err(|_| ApiError::not_found(format!("Wallet {wallet_id} not found")))?;
    if wallet.owner_user_id != user.user_id {
        return Err(ApiError::forbidden("You don't have permission to access this wallet"));
    }

    let Some(zerion) = &state.zerion else {
        return Err(ApiError::bad_gateway("Indexer not configured"));
    };

    let portfolio = zerion
        .get_portfolio(&wallet.address)
        .await
        .map_err(|e| ApiError::bad_gateway(format!("Portfolio lookup failed: {e}")))?;
    let positions = zerion
        .list_positions(&wallet.address)
        .await
        .map_err(|e| ApiError::bad_gateway(format!("Positions lookup failed: {e}")))?;

    Ok(Json(PortfolioResponse {
        address: wallet.address,
        total_value_usd: portfolio.total_value_usd,
        by_chain: portfolio.by_chain,
        positions: positions.into_iter().map(Into::into).collect(),
    }))
}
