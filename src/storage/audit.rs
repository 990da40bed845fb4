// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! Audit logging for security-sensitive operations.
//!
//! Wallet, transaction, lightning-node and authentication events are
//! appended to daily JSONL files under `audit/`.

use std::fs::OpenOptions;
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{FileStorage, StorageResult};

/// Types of auditable events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Wallet events
    SeedCreated,
    WalletDerived,
    WalletAccessed,
    MessageSigned,

    // Transaction events
    TransactionSubmitted,

    // Lightning node events
    LightningNodeCreated,
    LightningNodeJoined,
    LightningNodeLeft,
    LightningDeposit,
    LightningTransfer,
    LightningWithdraw,
    LightningNodeClosed,

    // Auth events
    AuthSuccess,
    AuthFailure,
    PermissionDenied,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// User who triggered the event (if known).
    pub user_id: Option<String>,
    /// Resource affected (wallet_id, node_id, tx_hash, ...).
    pub resource_id: Option<String>,
    /// Resource type (wallet, lightning_node, transaction, ...).
    pub resource_type: Option<String>,
    /// Additional details as JSON.
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error message if operation failed.
    pub error: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            user_id: None,
            resource_id: None,
            resource_type: None,
            details: None,
            success: true,
            error: None,
        }
    }

    /// Set the user ID.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the resource.
    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Add details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Repository for audit events.
pub struct AuditRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> AuditRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    /// Append an event to today's audit file.
    pub fn log(&self, event: &AuditEvent) -> StorageResult<()> {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let path = self.storage.paths().audit_events_file(&date);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(&line)?;
        Ok(())
    }

    /// Read all events logged on a given date (`YYYY-MM-DD`).
    pub fn events_for_date(&self, date: &str) -> StorageResult<Vec<AuditEvent>> {
        let path = self.storage.paths().audit_events_file(date);
        if !self.storage.exists(&path) {
            return Ok(Vec::new());
        }

        let raw = self.storage.read_raw(&path)?;
        let mut events = Vec::new();
        for line in raw.split(|b| *b == b'\n') {
            if line.is_empty() {
                continue;
            }
            events.push(serde_json::from_slice(line)?);
        }
        Ok(events)
    }
}

/// Log an audit event, warning (not failing) when the write itself fails.
#[macro_export]
macro_rules! audit_log {
    ($storage:expr, $event_type:expr, $user:expr, $resource_type:expr, $resource_id:expr) => {{
        let repo = $crate::storage::AuditRepository::new($storage);
        let event = $crate::storage::AuditEvent::new($event_type)
            .with_user(&$user.user_id)
            .with_resource($resource_type, $resource_id);
        if let Err(e) = repo.log(&event) {
            tracing::warn!(error = %e, "Failed to write audit event");
        }
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;

    fn test_storage() -> (FileStorage, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut storage = FileStorage::new(StoragePaths::new(dir.path()));
        storage.initialize().expect("initialize");
        (storage, dir)
    }

    #[test]
    fn log_appends_jsonl_events() {
        let (storage, _dir) = test_storage();
        let repo = AuditRepository::new(&storage);

        let first = AuditEvent::new(AuditEventType::SeedCreated).with_user("user-1");
        let second = AuditEvent::new(AuditEventType::LightningNodeCreated)
            .with_user("user-1")
            .with_resource("lightning_node", "ln-1");

        repo.log(&first).unwrap();
        repo.log(&second).unwrap();

        let date = first.timestamp.format("%Y-%m-%d").to_string();
        let events = repo.events_for_date(&date).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::SeedCreated);
        assert_eq!(events[1].resource_id.as_deref(), Some("ln-1"));
    }

    #[test]
    fn events_for_missing_date_is_empty() {
        let (storage, _dir) = test_storage();
        let repo = AuditRepository::new(&storage);
        assert!(repo.events_for_date("1999-01-01").unwrap().is_empty());
    }

    #[test]
    fn failed_marks_event() {
        let event = AuditEvent::new(AuditEventType::AuthFailure).failed("bad token");
        assert!(!event.success);
        assert_eq!(event.error.as_deref(), Some("bad token"));
    }
}
