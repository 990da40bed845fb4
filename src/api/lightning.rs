// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! Lightning node endpoints.
//!
//! These wrap [`LightningNodeService`]; handlers validate/authorize, the
//! service talks to the clearnode and the mirror store.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    audit_log,
    auth::Auth,
    chains::ChainKey,
    error::ApiError,
    lightning::{
        CreateNodeParams, LightningError, LightningNodeService, Participant, ParticipantSpec,
        SessionStatus, SessionTransaction,
    },
    state::AppState,
    storage::{AuditEventType, LightningNodeRecord, StorageError},
};

/// One requested participant.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ParticipantRequest {
    /// On-chain address.
    pub address: String,
    /// Signing weight toward the quorum (default 0).
    #[serde(default)]
    pub weight: u32,
}

/// Request to create a lightning node.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateLightningNodeRequest {
    /// Chain the session settles against (default "sepolia").
    #[serde(default)]
    pub chain: Option<String>,
    /// Asset symbol the session is denominated in (e.g. "usdc").
    pub token: String,
    /// Session participants. At least 2 unique addresses, including the
    /// creator's wallet.
    pub participants: Vec<ParticipantRequest>,
    /// Combined weight required for updates (default 100).
    #[serde(default)]
    pub quorum: Option<u32>,
    /// Challenge period in seconds (default 86400).
    #[serde(default)]
    pub challenge: Option<u64>,
    /// Opaque application state blob.
    #[serde(default)]
    pub session_data: Option<String>,
    /// Creator's initial allocation, human units.
    #[serde(default)]
    pub initial_deposit: Option<String>,
}

/// Lightning node response (owner field omitted).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LightningNodeResponse {
    pub id: String,
    pub app_session_id: String,
    pub uri: String,
    pub chain: ChainKey,
    pub token: String,
    pub status: SessionStatus,
    pub quorum: u32,
    pub protocol: String,
    pub challenge: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_data: Option<String>,
    pub participants: Vec<Participant>,
    pub transactions: Vec<SessionTransaction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LightningNodeRecord> for LightningNodeResponse {
    fn from(record: LightningNodeRecord) -> Self {
        Self {
            id: record.id,
            app_session_id: record.app_session_id,
            uri: record.uri,
            chain: record.chain,
            token: record.token,
            status: record.status,
            quorum: record.quorum,
            protocol: record.protocol,
            challenge: record.challenge,
            session_data: record.session_data,
            participants: record.participants,
            transactions: record.transactions,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Node list response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LightningNodeListResponse {
    pub nodes: Vec<LightningNodeResponse>,
    pub total: usize,
}

/// Deposit request.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DepositRequest {
    /// Amount in human units.
    pub amount: String,
}

/// Transfer request.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TransferRequest {
    /// Recipient participant address.
    pub to: String,
    /// Amount in human units.
    pub amount: String,
}

/// Withdraw request.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct WithdrawRequest {
    /// Amount in human units.
    pub amount: String,
}

/// One clearnode ledger balance.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LedgerBalanceView {
    pub asset: String,
    pub amount: String,
}

/// Map service errors onto HTTP responses.
fn map_error(err: LightningError) -> ApiError {
    match err {
        LightningError::Validation(msg) => ApiError::bad_request(msg),
        LightningError::NotFound(id) => {
            ApiError::not_found(format!("Lightning node {id} not found"))
        }
        LightningError::Forbidden => {
            ApiError::forbidden("You don't have access to this lightning node")
        }
        LightningError::InsufficientQuorum { have, need } => ApiError::bad_request(format!(
            "insufficient signing weight: have {have}, quorum requires {need}"
        )),
        LightningError::Storage(StorageError::NotFound(what)) => ApiError::not_found(what),
        LightningError::Storage(StorageError::PermissionDenied { .. }) => {
            ApiError::forbidden("You don't have access to this lightning node")
        }
        LightningError::Storage(e) => ApiError::internal(format!("Storage failure: {e}")),
        LightningError::Clearnode(e) => ApiError::bad_gateway(format!("Clearnode error: {e}")),
        LightningError::Chain(e) => ApiError::internal(format!("Key derivation failed: {e}")),
    }
}

fn service(state: &AppState) -> &LightningNodeService {
    &state.lightning
}

/// Create a lightning node (Yellow Network app session).
#[utoipa::path(
    post,
    path = "/v1/lightning-node",
    tag = "Lightning",
    security(("bearer_auth" = [])),
    request_body = CreateLightningNodeRequest,
    responses(
        (status = 201, description = "Node created", body = LightningNodeResponse),
        (status = 400, description = "Fewer than 2 unique participants, or invalid request"),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "Clearnode unavailable")
    )
)]
pub async fn create_node(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<CreateLightningNodeRequest>,
) -> Result<(StatusCode, Json<LightningNodeResponse>), ApiError> {
    let chain: ChainKey = request
        .chain
        .as_deref()
        .unwrap_or("sepolia")
        .parse()
        .map_err(|_| ApiError::bad_request("Unsupported chain"))?;

    let params = CreateNodeParams {
        chain,
        token: request.token,
        participants: request
            .participants
            .into_iter()
            .map(|p| ParticipantSpec {
                address: p.address,
                weight: p.weight,
            })
            .collect(),
        quorum: request.quorum,
        challenge: request.challenge,
        session_data: request.session_data,
        initial_deposit: request.initial_deposit,
    };

    let record = service(&state)
        .create_node(&user.user_id, params)
        .await
        .map_err(map_error)?;

    audit_log!(
        state.storage(),
        AuditEventType::LightningNodeCreated,
        &user,
        "lightning_node",
        &record.id
    );

    Ok((StatusCode::CREATED, Json(record.into())))
}

/// List the caller's lightning nodes, discovering remote sessions.
#[utoipa::path(
    get,
    path = "/v1/lightning-node",
    tag = "Lightning",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Nodes", body = LightningNodeListResponse),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn list_nodes(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<LightningNodeListResponse>, ApiError> {
    let nodes = service(&state)
        .list_nodes(&user.user_id)
        .await
        .map_err(map_error)?;

    let nodes: Vec<LightningNodeResponse> = nodes.into_iter().map(Into::into).collect();
    let total = nodes.len();
    Ok(Json(LightningNodeListResponse { nodes, total }))
}

/// Get the caller's unified clearnode ledger balances.
#[utoipa::path(
    get,
    path = "/v1/lightning-node/balances",
    tag = "Lightning",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Ledger balances", body = [LedgerBalanceView]),
        (status = 401, description = "Unauthorized"),
        (status = 502, description = "Clearnode unavailable")
    )
)]
pub async fn ledger_balances(
    Auth(user): Auth,
    State(state): State<AppState>,
) -> Result<Json<Vec<LedgerBalanceView>>, ApiError> {
    let balances = service(&state)
        .ledger_balances(&user.user_id)
        .await
        .map_err(map_error)?;

    Ok(Json(
        balances
            .into_iter()
            .map(|b| LedgerBalanceView {
                asset: b.asset,
                amount: b.amount,
            })
            .collect(),
    ))
}

/// Get one lightning node, refreshed from the clearnode best-effort.
#[utoipa::path(
    get,
    path = "/v1/lightning-node/{node_id}",
    tag = "Lightning",
    security(("bearer_auth" = [])),
    params(("node_id" = String, Path, description = "Node ID")),
    responses(
        (status = 200, description = "Node", body = LightningNodeResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not a participant"),
        (status = 404, description = "Node not found")
    )
)]
pub async fn get_node(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> Result<Json<LightningNodeResponse>, ApiError> {
    let record = service(&state)
        .get_node(&user.user_id, &node_id)
        .await
        .map_err(map_error)?;
    Ok(Json(record.into()))
}

/// Join a session. Idempotent for already-joined participants.
#[utoipa::path(
    post,
    path = "/v1/lightning-node/{node_id}/join",
    tag = "Lightning",
    security(("bearer_auth" = [])),
    params(("node_id" = String, Path, description = "Node ID")),
    responses(
        (status = 200, description = "Joined", body = LightningNodeResponse),
        (status = 400, description = "Not a participant, or session not open"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Node not found")
    )
)]
pub async fn join_node(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> Result<Json<LightningNodeResponse>, ApiError> {
    let record = service(&state)
        .join_node(&user.user_id, &node_id)
        .await
        .map_err(map_error)?;

    audit_log!(
        state.storage(),
        AuditEventType::LightningNodeJoined,
        &user,
        "lightning_node",
        &node_id
    );
    Ok(Json(record.into()))
}

/// Leave a session.
#[utoipa::path(
    post,
    path = "/v1/lightning-node/{node_id}/leave",
    tag = "Lightning",
    security(("bearer_auth" = [])),
    params(("node_id" = String, Path, description = "Node ID")),
    responses(
        (status = 200, description = "Left", body = LightningNodeResponse),
        (status = 400, description = "Not joined"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Node not found")
    )
)]
pub async fn leave_node(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> Result<Json<LightningNodeResponse>, ApiError> {
    let record = service(&state)
        .leave_node(&user.user_id, &node_id)
        .await
        .map_err(map_error)?;

    audit_log!(
        state.storage(),
        AuditEventType::LightningNodeLeft,
        &user,
        "lightning_node",
        &node_id
    );
    Ok(Json(record.into()))
}

/// Deposit into the caller's session allocation.
#[utoipa::path(
    post,
    path = "/v1/lightning-node/{node_id}/deposit",
    tag = "Lightning",
    security(("bearer_auth" = [])),
    params(("node_id" = String, Path, description = "Node ID")),
    request_body = DepositRequest,
    responses(
        (status = 200, description = "Deposited", body = LightningNodeResponse),
        (status = 400, description = "Invalid amount or session state"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Node not found"),
        (status = 502, description = "Clearnode unavailable")
    )
)]
pub async fn deposit(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(node_id): Path<String>,
    Json(request): Json<DepositRequest>,
) -> Result<Json<LightningNodeResponse>, ApiError> {
    let record = service(&state)
        .deposit(&user.user_id, &node_id, &request.amount)
        .await
        .map_err(map_error)?;

    audit_log!(
        state.storage(),
        AuditEventType::LightningDeposit,
        &user,
        "lightning_node",
        &node_id
    );
    Ok(Json(record.into()))
}

/// Transfer between participants inside the session.
#[utoipa::path(
    post,
    path = "/v1/lightning-node/{node_id}/transfer",
    tag = "Lightning",
    security(("bearer_auth" = [])),
    params(("node_id" = String, Path, description = "Node ID")),
    request_body = TransferRequest,
    responses(
        (status = 200, description = "Transferred", body = LightningNodeResponse),
        (status = 400, description = "Invalid transfer or insufficient signing weight"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Node not found"),
        (status = 502, description = "Clearnode unavailable")
    )
)]
pub async fn transfer(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(node_id): Path<String>,
    Json(request): Json<TransferRequest>,
) -> Result<Json<LightningNodeResponse>, ApiError> {
    let record = service(&state)
        .transfer(&user.user_id, &node_id, &request.to, &request.amount)
        .await
        .map_err(map_error)?;

    audit_log!(
        state.storage(),
        AuditEventType::LightningTransfer,
        &user,
        "lightning_node",
        &node_id
    );
    Ok(Json(record.into()))
}

/// Withdraw from the caller's session allocation.
#[utoipa::path(
    post,
    path = "/v1/lightning-node/{node_id}/withdraw",
    tag = "Lightning",
    security(("bearer_auth" = [])),
    params(("node_id" = String, Path, description = "Node ID")),
    request_body = WithdrawRequest,
    responses(
        (status = 200, description = "Withdrawn", body = LightningNodeResponse),
        (status = 400, description = "Invalid amount or session state"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Node not found"),
        (status = 502, description = "Clearnode unavailable")
    )
)]
pub async fn withdraw(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(node_id): Path<String>,
    Json(request): Json<WithdrawRequest>,
) -> Result<Json<LightningNodeResponse>, ApiError> {
    let record = service(&state)
        .withdraw(&user.user_id, &node_id, &request.amount)
        .await
        .map_err(map_error)?;

    audit_log!(
        state.storage(),
        AuditEventType::LightningWithdraw,
        &user,
        "lightning_node",
        &node_id
    );
    Ok(Json(record.into()))
}

/// Close the session: open → pending_close → closed.
#[utoipa::path(
    post,
    path = "/v1/lightning-node/{node_id}/close",
    tag = "Lightning",
    security(("bearer_auth" = [])),
    params(("node_id" = String, Path, description = "Node ID")),
    responses(
        (status = 200, description = "Closed", body = LightningNodeResponse),
        (status = 400, description = "Already closed"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Node not found"),
        (status = 502, description = "Clearnode unavailable; node left pending_close")
    )
)]
pub async fn close_node(
    Auth(user): Auth,
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> Result<Json<LightningNodeResponse>, ApiError> {
    let record = service(&state)
        .close_node(&user.user_id, &node_id)
        .await
        .map_err(map_error)?;

    audit_log!(
        state.storage(),
        AuditEventType::LightningNodeClosed,
        &user,
        "lightning_node",
        &node_id
    );
    Ok(Json(record.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_map_to_400() {
        let err = map_error(LightningError::Validation("bad".to_string()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn quorum_errors_map_to_400_with_detail() {
        let err = map_error(LightningError::InsufficientQuorum { have: 40, need: 100 });
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("40"));
        assert!(err.message.contains("100"));
    }

    #[test]
    fn not_found_and_forbidden_map_correctly() {
        let err = map_error(LightningError::NotFound("ln-1".to_string()));
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = map_error(LightningError::Forbidden);
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn clearnode_errors_map_to_502() {
        let err = map_error(LightningError::Clearnode(
            crate::lightning::NitroliteError::Transport("down".to_string()),
        ));
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }
}
