// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::state::AppState;

pub mod balances;
pub mod health;
pub mod lightning;
pub mod transactions;
pub mod users;
pub mod wallet;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/users/me", get(users::get_me).put(users::update_me))
        .route(
            "/wallet",
            get(wallet::list_wallets).post(wallet::create_wallet_setup),
        )
        .route("/wallet/chains", get(wallet::list_chains))
        .route("/wallet/{wallet_id}", put(wallet::update_wallet))
        .route("/wallet/derive", post(wallet::derive_wallet_endpoint))
        .route("/wallet/sign", post(wallet::sign_message))
        .route("/wallet/{wallet_id}/balance", get(balances::get_balance))
        .route("/wallet/{wallet_id}/portfolio", get(balances::get_portfolio))
        .route(
            "/wallet/{wallet_id}/estimate",
            post(transactions::estimate_gas),
        )
        .route(
            "/wallet/{wallet_id}/send",
            post(transactions::send_transaction),
        )
        .route(
            "/wallet/{wallet_id}/transactions",
            get(transactions::list_transactions),
        )
        .route(
            "/transactions/{tx_hash}/status",
            get(transactions::transaction_status),
        )
        .route(
            "/lightning-node",
            get(lightning::list_nodes).post(lightning::create_node),
        )
        .route("/lightning-node/balances", get(lightning::ledger_balances))
        .route("/lightning-node/{node_id}", get(lightning::get_node))
        .route("/lightning-node/{node_id}/join", post(lightning::join_node))
        .route("/lightning-node/{node_id}/leave", post(lightning::leave_node))
        .route("/lightning-node/{node_id}/deposit", post(lightning::deposit))
        .route("/lightning-node/{node_id}/transfer", post(lightning::transfer))
        .route("/lightning-node/{node_id}/withdraw", post(lightning::withdraw))
        .route("/lightning-node/{node_id}/close", post(lightning::close_node))
        .with_state(state.clone());

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .nest("/v1", v1_routes)
        .merge(health_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        users::get_me,
        users::update_me,
        wallet::create_wallet_setup,
        wallet::list_wallets,
        wallet::list_chains,
        wallet::update_wallet,
        wallet::derive_wallet_endpoint,
        wallet::sign_message,
        balances::get_balance,
        balances::get_portfolio,
        transactions::estimate_gas,
        transactions::send_transaction,
        transactions::list_transactions,
        transactions::transaction_status,
        lightning::create_node,
        lightning::list_nodes,
        lightning::ledger_balances,
        lightning::get_node,
        lightning::join_node,
        lightning::leave_node,
        lightning::deposit,
        lightning::transfer,
        lightning::withdraw,
        lightning::close_node,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(schemas(
        users::UpdateUserRequest,
        wallet::CreateWalletSetupRequest,
        wallet::WalletSetupResponse,
        wallet::WalletListResponse,
        wallet::ChainInfo,
        wallet::DeriveWalletRequest,
        wallet::UpdateWalletRequest,
        wallet::SignRequest,
        wallet::SignResponse,
        balances::PortfolioResponse,
        balances::PositionView,
        transactions::SendTransactionRequest,
        transactions::SendTransactionResponse,
        transactions::TransactionListResponse,
        transactions::IndexedTransactionView,
        transactions::TransactionStatusResponse,
        lightning::CreateLightningNodeRequest,
        lightning::ParticipantRequest,
        lightning::LightningNodeResponse,
        lightning::LightningNodeListResponse,
        lightning::LedgerBalanceView,
        lightning::DepositRequest,
        lightning::TransferRequest,
        lightning::WithdrawRequest,
        health::HealthResponse,
        health::ReadyResponse,
        crate::storage::UserRecord,
        crate::storage::WalletResponse,
        crate::storage::DirectedTransaction,
        crate::storage::StoredTransaction,
        crate::chains::TokenBalance,
        crate::chains::WalletBalances,
        crate::chains::GasEstimate,
        crate::lightning::Participant,
        crate::lightning::SessionTransaction
    )),
    tags(
        (name = "Users", description = "User profiles"),
        (name = "Wallet", description = "Deterministic multi-chain wallets"),
        (name = "Balances", description = "Balances and portfolio"),
        (name = "Transactions", description = "On-chain sends and history"),
        (name = "Lightning", description = "Yellow Network state-channel sessions"),
        (name = "Health", description = "Service health")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let (state, _dir) = test_state();
        let app = router(state);
        // Ensure the router can be converted into a service without panicking.
        let _ = app.into_make_service();
    }
}
