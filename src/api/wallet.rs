// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! Wallet management endpoints.
//!
//! A user has one BIP-39 seed; every wallet row is an address derived from
//! it. Setup derives the index-0 address on every registry chain; further
//! addresses (and ERC-4337 smart accounts) come from `/wallet/derive`.
//! Mnemonics and private keys are never returned.

use alloy::signers::Signer;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    audit_log,
    auth::Auth,
    chains::{
        self, chain_config, derive::derivation_path, evm_signer, AccountKind, ChainKey, Curve,
        EvmClient, WALLET_CONFIGS,
    },
    error::ApiError,
    state::AppState,
    storage::{
        AuditEventType, SeedRepository, StorageError, WalletRecord, WalletRepository,
        WalletResponse,
    },
};

/// Request to set up a user's wallet seed.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateWalletSetupRequest {
    /// Import an existing BIP-39 mnemonic; a fresh one is generated when
    /// absent. Never echoed back.
    #[serde(default)]
    pub mnemonic: Option<String>,
}

/// Response after wallet setup.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WalletSetupResponse {
    /// Wallets derived at index 0, one per chain.
    pub wallets: Vec<WalletResponse>,
    /// Message indicating success.
    pub message: String,
}

/// Response containing a list of wallets.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WalletListResponse {
    /// Wallets owned by the user.
    pub wallets: Vec<WalletResponse>,
    /// Total count of wallets.
    pub total: usize,
}

/// Public chain registry row.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChainInfo {
    pub chain: ChainKey,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub curve: Curve,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evm_chain_id: Option<u64>,
    pub supports_erc4337: bool,
}

/// Request to derive an additional wallet.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DeriveWalletRequest {
    /// Chain key (e.g. "ethereum", "solana").
    pub chain: String,
    /// Address index (default 0).
    #[serde(default)]
    pub index: u32,
    /// Account kind (default "eoa"). "erc4337" resolves the counterfactual
    /// smart-account address through the configured factory.
    #[serde(default)]
    pub account_kind: Option<AccountKind>,
}

/// Request to relabel a wallet.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateWalletRequest {
    /// New label; null clears it.
    pub label: Option<String>,
}

/// Request to sign a message or typed data with an EVM wallet.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SignRequest {
    /// Wallet to sign with. Must be an EVM EOA.
    pub wallet_id: String,
    /// "personal_sign" or "eth_signTypedData_v4".
    pub method: String,
    /// UTF-8 message for personal_sign.
    #[serde(default)]
    pub message: Option<String>,
    /// EIP-712 payload for eth_signTypedData_v4.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub typed_data: Option<serde_json::Value>,
}

/// Signature response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SignResponse {
    /// 65-byte signature, 0x-prefixed hex.
    pub signature: String,
    /// Address that produced the signature.
    pub address: String,
}

/// Set up the authenticated user's wallet seed.
///
/// Generates (or imports) a BIP-39 mnemonic, stores it, and derives the
/// index-0 address on every supported chain.
#[utoipa::path(
    post,
    path = "/v1/wallet",
    tag = "Wallet",
    security(("bearer_auth" = [])),
    request_body = CreateWalletSetupRequest,
    responses(
        (status = 201, description = "Seed created and wallets derived", body = WalletSetupResponse),
        (status = 400, description = "Invalid mnemonic"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Seed already exists")
    )
)]
pub async fn create_wallet_setup(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateWalletSetupRequest>,
) -> Result<(StatusCode, Json<WalletSetupResponse>), ApiError> {
    let storage = state.storage();
    let seeds = SeedRepository::new(storage);

    let mnemonic = match request.mnemonic {
        Some(phrase) => {
            chains::parse_mnemonic(&phrase)
                .map_err(|e| ApiError::bad_request(format!("Invalid mnemonic: {e}")))?;
            phrase
        }
        None => chains::generate_mnemonic()
            .map_err(|e| ApiError::internal(format!("Mnemonic generation failed: {e}")))?,
    };

    match seeds.create(&user.user_id, &mnemonic) {
        Ok(()) => {}
        Err(StorageError::AlreadyExists(_)) => {
            return Err(ApiError::conflict("A wallet seed already exists for this user"));
        }
        Err(e) => return Err(ApiError::internal(format!("Failed to store seed: {e}"))),
    }

    let wallets = WalletRepository::new(storage);
    let mut derived = Vec::new();
    for config in WALLET_CONFIGS {
        let wallet = chains::derive_wallet(&mnemonic, config, 0)
            .map_err(|e| ApiError::internal(format!("Derivation failed: {e}")))?;

        let record = WalletRecord {
            wallet_id: uuid::Uuid::new_v4().to_string(),
            owner_user_id: user.user_id.clone(),
            chain: config.key,
            address: wallet.address.clone(),
            derivation_index: 0,
            derivation_path: wallet.derivation_path.clone(),
            account_kind: AccountKind::Eoa,
            label: None,
            created_at: Utc::now(),
        };
        wallets
            .create(&record)
            .map_err(|e| ApiError::internal(format!("Failed to store wallet: {e}")))?;

        // Register EVM addresses so the transfer indexer attributes events
        if config.is_evm() {
            if let Some(tx_db) = &state.tx_db {
                if let Err(e) = tx_db.register_address(&record.address, &record.wallet_id) {
                    tracing::warn!(error = %e, wallet_id = %record.wallet_id, "Failed to register wallet address");
                }
            }
        }
        derived.push(WalletResponse::from(record));
    }

    audit_log!(
        storage,
        AuditEventType::SeedCreated,
        &user,
        "seed",
        &user.user_id
    );

    Ok((
        StatusCode::CREATED,
        Json(WalletSetupResponse {
            wallets: derived,
            message: "Wallet seed created".to_string(),
        }),
    ))
}

/// List all wallets owned by the authenticated user.
#[utoipa::path(
    get,
    path = "/v1/wallet",
    tag = "Wallet",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "List of wallets", body = WalletListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_wallets(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<WalletListResponse>, ApiError> {
    let repo = WalletRepository::new(state.storage());
    let wallets = repo
        .list_by_owner(&user.user_id)
        .map_err(|e| ApiError::internal(format!("Failed to list wallets: {e}")))?;

    let wallet_responses: Vec<WalletResponse> = wallets.into_iter().map(Into::into).collect();
    let total = wallet_responses.len();
    Ok(Json(WalletListResponse {
        wallets: wallet_responses,
        total,
    }))
}

/// List supported chains.
#[utoipa::path(
    get,
    path = "/v1/wallet/chains",
    tag = "Wallet",
    responses(
        (status = 200, description = "Supported chains", body = [ChainInfo])
    )
)]
pub async fn list_chains() -> Json<Vec<ChainInfo>> {
    let chains = WALLET_CONFIGS
        .iter()
        .map(|c| ChainInfo {
            chain: c.key,
            name: c.name.to_string(),
            symbol: c.symbol.to_string(),
            decimals: c.decimals,
            curve: c.curve,
            evm_chain_id: c.evm_chain_id,
            supports_erc4337: c.supports_erc4337,
        })
        .collect();
    Json(chains)
}

/// Derive an additional wallet for the authenticated user.
///
/// Idempotent: re-deriving an existing (chain, index, kind) returns the
/// stored row.
#[utoipa::path(
    post,
    path = "/v1/wallet/derive",
    tag = "Wallet",
    security(("bearer_auth" = [])),
    request_body = DeriveWalletRequest,
    responses(
        (status = 200, description = "Derived wallet", body = WalletResponse),
        (status = 400, description = "Unsupported chain or account kind"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "No seed for user")
    )
)]
pub async fn derive_wallet_endpoint(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<DeriveWalletRequest>,
) -> Result<Json<WalletResponse>, ApiError> {
    let storage = state.storage();
    let chain_key: ChainKey = request
        .chain
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Unsupported chain: {}", request.chain)))?;
    let config = chain_config(chain_key);
    let account_kind = request.account_kind.unwrap_or(AccountKind::Eoa);

    if account_kind == AccountKind::Erc4337 && !config.supports_erc4337 {
        return Err(ApiError::bad_request(format!(
            "{} does not support ERC-4337 accounts",
            config.name
        )));
    }

    let wallets = WalletRepository::new(storage);
    if let Ok(Some(existing)) =
        wallets.find_by_chain_index(&user.user_id, chain_key, request.index, account_kind)
    {
        return Ok(Json(existing.into()));
    }

    let seeds = SeedRepository::new(storage);
    let mnemonic = seeds
        .read_mnemonic(&user.user_id)
        .map_err(|_| ApiError::not_found("No wallet seed for this user; create one first"))?;

    let (address, path) = match account_kind {
        AccountKind::Eoa => {
            let derived = chains::derive_wallet(&mnemonic, config, request.index)
                .map_err(|e| ApiError::internal(format!("Derivation failed: {e}")))?;
            (derived.address, derived.derivation_path)
        }
        AccountKind::Erc4337 => {
            // The smart account is owned by the EOA at the same index; its
            // address comes from the factory's CREATE2 computation.
            let owner = evm_signer(&mnemonic, request.index)
                .map_err(|e| ApiError::internal(format!("Derivation failed: {e}")))?;
            let client = EvmClient::new(config)
                .map_err(|e| ApiError::internal(format!("RPC client failed: {e}")))?;
            let address = client
                .counterfactual_account(
                    &state.config.erc4337_factory,
                    &owner.address().to_checksum(None),
                    request.index as u64,
                )
                .await
                .map_err(|e| {
                    ApiError::bad_gateway(format!("Smart account resolution failed: {e}"))
                })?;
            (address, derivation_path(config, request.index))
        }
    };

    let record = WalletRecord {
        wallet_id: uuid::Uuid::new_v4().to_string(),
        owner_user_id: user.user_id.clone(),
        chain: chain_key,
        address,
        derivation_index: request.index,
        derivation_path: path,
        account_kind,
        label: None,
        created_at: Utc::now(),
    };
    wallets
        .create(&record)
        .map_err(|e| ApiError::internal(format!("Failed to store wallet: {e}")))?;

    if config.is_evm() {
        if let Some(tx_db) = &state.tx_db {
            let _ = tx_db.register_address(&record.address, &record.wallet_id);
        }
    }

    audit_log!(
        storage,
        AuditEventType::WalletDerived,
        &user,
        "wallet",
        &record.wallet_id
    );

    Ok(Json(record.into()))
}

/// Update a wallet's label.
#[utoipa::path(
    put,
    path = "/v1/wallet/{wallet_id}",
    tag = "Wallet",
    security(("bearer_auth" = [])),
    params(("wallet_id" = String, Path, description = "Wallet ID")),
    request_body = UpdateWalletRequest,
    responses(
        (status = 200, description = "Updated wallet", body = WalletResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not your wallet"),
        (status = 404, description = "Wallet not found")
    )
)]
pub async fn update_wallet(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(wallet_id): Path<String>,
    Json(request): Json<UpdateWalletRequest>,
) -> Result<Json<WalletResponse>, ApiError> {
    let repo = WalletRepository::new(state.storage());
    let mut wallet = repo
        .get(&wallet_id)
        .map_err(|_| ApiError::not_found(format!("Wallet {wallet_id} not found")))?;
    if wallet.owner_user_id != user.user_id {
        return Err(ApiError::forbidden("You don't have permission to modify this wallet"));
    }

    wallet.label = request.label;
    repo.update(&wallet)
        .map_err(|e| ApiError::internal(format!("Failed to update wallet: {e}")))?;
    Ok(Json(wallet.into()))
}

/// Sign a message or EIP-712 typed data with an EVM wallet.
///
/// This is the signing surface behind external dApp connections.
#[utoipa::path(
    post,
    path = "/v1/wallet/sign",
    tag = "Wallet",
    security(("bearer_auth" = [])),
    request_body = SignRequest,
    responses(
        (status = 200, description = "Signature", body = SignResponse),
        (status = 400, description = "Unsupported method or wallet"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not your wallet"),
        (status = 404, description = "Wallet not found")
    )
)]
pub async fn sign_message(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<SignRequest>,
) -> Result<Json<SignResponse>, ApiError> {
    let storage = state.storage();
    let wallets = WalletRepository::new(storage);

    let wallet = wallets
        .get(&request.wallet_id)
        .map_err(|_| ApiError::not_found(format!("Wallet {} not found", request.wallet_id)))?;
    if wallet.owner_user_id != user.user_id {
        return Err(ApiError::forbidden("You don't have permission to use this wallet"));
    }
    let config = chain_config(wallet.chain);
    if !config.is_evm() || wallet.account_kind != AccountKind::Eoa {
        return Err(ApiError::bad_request(
            "Signing is supported for EVM EOA wallets only",
        ));
    }

    let seeds = SeedRepository::new(storage);
    let mnemonic = seeds
        .read_mnemonic(&user.user_id)
        .map_err(|e| ApiError::internal(format!("Failed to load seed: {e}")))?;
    let signer = evm_signer(&mnemonic, wallet.derivation_index)
        .map_err(|e| ApiError::internal(format!("Derivation failed: {e}")))?;

    let signature = match request.method.as_str() {
        "personal_sign" => {
            let message = request
                .message
                .ok_or_else(|| ApiError::bad_request("personal_sign requires `message`"))?;
            signer
                .sign_message(message.as_bytes())
                .await
                .map_err(|e| ApiError::internal(format!("Signing failed: {e}")))?
        }
        "eth_signTypedData_v4" => {
            let payload = request
                .typed_data
                .ok_or_else(|| ApiError::bad_request("eth_signTypedData_v4 requires `typed_data`"))?;
            let typed: alloy::dyn_abi::TypedData = serde_json::from_value(payload)
                .map_err(|e| ApiError::bad_request(format!("Invalid typed data: {e}")))?;
            signer
                .sign_dynamic_typed_data(&typed)
                .await
                .map_err(|e| ApiError::internal(format!("Signing failed: {e}")))?
        }
        other => {
            return Err(ApiError::bad_request(format!(
                "Unsupported signing method: {other}"
            )))
        }
    };

    audit_log!(
        storage,
        AuditEventType::MessageSigned,
        &user,
        "wallet",
        &request.wallet_id
    );

    Ok(Json(SignResponse {
        signature: format!("0x{}", alloy::hex::encode(signature.as_bytes())),
        address: wallet.address,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_chains_covers_registry() {
        let Json(chains) = list_chains().await;
        assert_eq!(chains.len(), WALLET_CONFIGS.len());
        assert!(chains.iter().any(|c| c.chain == ChainKey::Ethereum));
        assert!(chains
            .iter()
            .filter(|c| c.supports_erc4337)
            .all(|c| c.evm_chain_id.is_some()));
    }
}
