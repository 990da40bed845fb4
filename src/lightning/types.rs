// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! Lightning node session types.
//!
//! A "Lightning Node" is an off-chain multi-party payment session on the
//! Yellow Network Nitrolite protocol. The clearnode owns the session; rows
//! here are a best-effort local mirror for the UI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Session lifecycle: open → pending_close → closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Open,
    PendingClose,
    Closed,
}

/// Participant lifecycle: invited → joined → left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantStatus {
    Invited,
    Joined,
    Left,
}

/// Kind of off-chain movement recorded against a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionTxType {
    Deposit,
    Transfer,
    Withdraw,
    Close,
}

/// Status of a recorded session transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionTxStatus {
    Pending,
    Confirmed,
    Failed,
}

/// A participant in a lightning node session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Participant {
    /// On-chain address of the participant.
    pub address: String,
    /// Signing weight toward the session quorum.
    pub weight: u32,
    /// Mirrored off-chain balance, human units.
    pub balance: String,
    /// Asset symbol the balance is denominated in.
    pub asset: String,
    /// Current participant status.
    pub status: ParticipantStatus,
    /// When the participant joined, if they have.
    pub joined_at: Option<DateTime<Utc>>,
    /// Last time the participant interacted with the session.
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl Participant {
    /// A freshly invited participant with a zero balance.
    pub fn invited(address: impl Into<String>, weight: u32, asset: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            weight,
            balance: "0".to_string(),
            asset: asset.into(),
            status: ParticipantStatus::Invited,
            joined_at: None,
            last_seen_at: None,
        }
    }
}

/// An off-chain movement recorded against a session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionTransaction {
    /// Unique transaction ID.
    pub id: String,
    /// Sender address ("" for deposits from the ledger).
    pub from_address: String,
    /// Recipient address.
    pub to_address: String,
    /// Amount in human units.
    pub amount: String,
    /// Asset symbol.
    pub asset: String,
    /// Kind of movement.
    pub tx_type: SessionTxType,
    /// Outcome of the movement.
    pub status: SessionTxStatus,
    /// On-chain hash when the movement settled on chain (deposits/withdrawals).
    pub tx_hash: Option<String>,
    /// When the movement was recorded.
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Clearnode protocol surface
// =============================================================================

/// Application definition submitted when creating a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppDefinition {
    /// Protocol identifier, e.g. "NitroRPC/0.2".
    pub protocol: String,
    /// Participant addresses. Order is significant: weights are positional.
    pub participants: Vec<String>,
    /// Signing weight per participant, positionally matched.
    pub weights: Vec<u32>,
    /// Combined weight required to update the session.
    pub quorum: u32,
    /// Challenge period in seconds.
    pub challenge: u64,
    /// Uniqueness nonce.
    pub nonce: u64,
}

/// A single asset allocation within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppAllocation {
    /// Participant address the allocation belongs to.
    pub participant: String,
    /// Asset symbol (clearnode ledger asset, e.g. "usdc").
    pub asset: String,
    /// Amount in human units.
    pub amount: String,
}

/// Remote session state as reported by the clearnode.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSessionInfo {
    /// Clearnode-assigned session ID.
    pub app_session_id: String,
    /// Remote status string ("open" | "closed").
    pub status: String,
    /// Participant addresses.
    #[serde(default)]
    pub participants: Vec<String>,
    /// Protocol identifier.
    #[serde(default)]
    pub protocol: String,
    /// Combined weight required for updates.
    #[serde(default)]
    pub quorum: u32,
    /// Challenge period in seconds.
    #[serde(default)]
    pub challenge: u64,
    /// Opaque application state blob.
    #[serde(default)]
    pub session_data: Option<String>,
}

impl AppSessionInfo {
    /// Map the remote status string onto the local enum.
    pub fn local_status(&self) -> SessionStatus {
        if self.status.eq_ignore_ascii_case("closed") {
            SessionStatus::Closed
        } else {
            SessionStatus::Open
        }
    }
}

/// A ledger balance entry for a participant.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerBalance {
    pub asset: String,
    pub amount: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::PendingClose).unwrap(),
            r#""pending_close""#
        );
        assert_eq!(
            serde_json::to_string(&SessionStatus::Open).unwrap(),
            r#""open""#
        );
    }

    #[test]
    fn participant_status_round_trips() {
        for status in [
            ParticipantStatus::Invited,
            ParticipantStatus::Joined,
            ParticipantStatus::Left,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            let back: ParticipantStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn invited_participant_starts_at_zero() {
        let p = Participant::invited("0xabc", 50, "usdc");
        assert_eq!(p.status, ParticipantStatus::Invited);
        assert_eq!(p.balance, "0");
        assert!(p.joined_at.is_none());
    }

    #[test]
    fn remote_status_maps_to_local() {
        let mut info = AppSessionInfo {
            app_session_id: "0xsession".to_string(),
            status: "open".to_string(),
            participants: vec![],
            protocol: String::new(),
            quorum: 100,
            challenge: 0,
            session_data: None,
        };
        assert_eq!(info.local_status(), SessionStatus::Open);

        info.status = "CLOSED".to_string();
        assert_eq!(info.local_status(), SessionStatus::Closed);
    }
}
