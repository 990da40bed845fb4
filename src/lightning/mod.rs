// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! # Lightning Node Module
//!
//! Orchestration of Yellow Network Nitrolite app sessions ("Lightning
//! Nodes"): session creation with participant pre-authorization, join/leave,
//! off-chain deposits/transfers/withdrawals, close, and reconciliation of
//! the local mirror with clearnode state.

pub mod cache;
pub mod rpc;
pub mod service;
pub mod types;

pub use cache::{client_key, ClientCache};
pub use rpc::{NitroliteClient, NitroliteError};
pub use service::{CreateNodeParams, LightningError, LightningNodeService, ParticipantSpec};
pub use types::{
    AppAllocation, AppDefinition, AppSessionInfo, LedgerBalance, Participant, ParticipantStatus,
    SessionStatus, SessionTransaction, SessionTxStatus, SessionTxType,
};
