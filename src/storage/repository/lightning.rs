// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! Lightning node repository.
//!
//! Each record mirrors one Yellow Network app session together with its
//! participants and off-chain transaction log. The clearnode owns the
//! session; these rows are a best-effort cache of remote truth. Rows are
//! created on create/discovery-sync, mutated on deposit/transfer/withdraw/
//! close, never hard-deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::chains::ChainKey;
use crate::lightning::types::{Participant, SessionStatus, SessionTransaction};

use super::super::{FileStorage, StorageError, StorageResult};

/// A mirrored lightning node session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LightningNodeRecord {
    /// Local node ID (UUID).
    pub id: String,
    /// User who created (or discovered) the session locally.
    pub owner_user_id: String,
    /// Clearnode-assigned app session ID. Unique across records.
    pub app_session_id: String,
    /// Clearnode endpoint the session lives on.
    pub uri: String,
    /// Chain the session settles against.
    pub chain: ChainKey,
    /// Asset symbol the session is denominated in.
    pub token: String,
    /// Mirrored session status.
    pub status: SessionStatus,
    /// Combined signing weight required for updates.
    pub quorum: u32,
    /// Protocol identifier, e.g. "NitroRPC/0.2".
    pub protocol: String,
    /// Challenge period in seconds.
    pub challenge: u64,
    /// Opaque application state blob.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_data: Option<String>,
    /// Session participants.
    pub participants: Vec<Participant>,
    /// Off-chain transaction log.
    pub transactions: Vec<SessionTransaction>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LightningNodeRecord {
    /// Find a participant by address (case-insensitive for hex addresses).
    pub fn participant(&self, address: &str) -> Option<&Participant> {
        self.participants
            .iter()
            .find(|p| p.address.eq_ignore_ascii_case(address))
    }

    /// Mutable participant lookup.
    pub fn participant_mut(&mut self, address: &str) -> Option<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|p| p.address.eq_ignore_ascii_case(address))
    }
}

impl super::super::OwnedResource for LightningNodeRecord {
    fn owner_user_id(&self) -> &str {
        &self.owner_user_id
    }
}

/// Repository for lightning node mirrors.
pub struct LightningNodeRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> LightningNodeRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    pub fn exists(&self, node_id: &str) -> bool {
        self.storage
            .exists(self.storage.paths().lightning_node(node_id))
    }

    pub fn get(&self, node_id: &str) -> StorageResult<LightningNodeRecord> {
        let path = self.storage.paths().lightning_node(node_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Lightning node {node_id}")));
        }
        self.storage.read_json(path)
    }

    pub fn create(&self, record: &LightningNodeRecord) -> StorageResult<()> {
        if self.exists(&record.id) {
            return Err(StorageError::AlreadyExists(format!(
                "Lightning node {}",
                record.id
            )));
        }
        if self.find_by_app_session(&record.app_session_id)?.is_some() {
            return Err(StorageError::AlreadyExists(format!(
                "Session {}",
                record.app_session_id
            )));
        }
        self.storage
            .write_json(self.storage.paths().lightning_node(&record.id), record)
    }

    /// Persist a mutated record, bumping `updated_at`.
    pub fn update(&self, record: &mut LightningNodeRecord) -> StorageResult<()> {
        if !self.exists(&record.id) {
            return Err(StorageError::NotFound(format!(
                "Lightning node {}",
                record.id
            )));
        }
        record.updated_at = Utc::now();
        self.storage
            .write_json(self.storage.paths().lightning_node(&record.id), record)
    }

    /// List all nodes owned by a user, newest first.
    pub fn list_by_owner(&self, owner_user_id: &str) -> StorageResult<Vec<LightningNodeRecord>> {
        let mut nodes: Vec<LightningNodeRecord> = self
            .list_all()?
            .into_iter()
            .filter(|n| n.owner_user_id == owner_user_id)
            .collect();
        nodes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(nodes)
    }

    /// List every mirrored node.
    pub fn list_all(&self) -> StorageResult<Vec<LightningNodeRecord>> {
        let ids = self
            .storage
            .list_records(self.storage.paths().lightning_dir())?;

        let mut nodes = Vec::new();
        for id in &ids {
            if let Ok(record) = self.get(id) {
                nodes.push(record);
            }
        }
        Ok(nodes)
    }

    /// Find the node mirroring a given app session, if any.
    pub fn find_by_app_session(
        &self,
        app_session_id: &str,
    ) -> StorageResult<Option<LightningNodeRecord>> {
        Ok(self
            .list_all()?
            .into_iter()
            .find(|n| n.app_session_id == app_session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lightning::types::ParticipantStatus;
    use crate::storage::StoragePaths;

    fn test_storage() -> (FileStorage, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut storage = FileStorage::new(StoragePaths::new(dir.path()));
        storage.initialize().expect("initialize");
        (storage, dir)
    }

    fn test_node(id: &str, session: &str) -> LightningNodeRecord {
        LightningNodeRecord {
            id: id.to_string(),
            owner_user_id: "user-1".to_string(),
            app_session_id: session.to_string(),
            uri: "https://clearnet-sandbox.yellow.com/rpc".to_string(),
            chain: ChainKey::Sepolia,
            token: "usdc".to_string(),
            status: SessionStatus::Open,
            quorum: 100,
            protocol: "NitroRPC/0.2".to_string(),
            challenge: 86400,
            session_data: None,
            participants: vec![
                {
                    let mut p = Participant::invited("0xAAA0000000000000000000000000000000000001", 100, "usdc");
                    p.status = ParticipantStatus::Joined;
                    p.joined_at = Some(Utc::now());
                    p
                },
                Participant::invited("0xBBB0000000000000000000000000000000000002", 0, "usdc"),
            ],
            transactions: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn create_and_get_round_trip() {
        let (storage, _dir) = test_storage();
        let repo = LightningNodeRepository::new(&storage);

        let node = test_node("ln-1", "0xsession1");
        repo.create(&node).unwrap();

        let loaded = repo.get("ln-1").unwrap();
        assert_eq!(loaded.app_session_id, "0xsession1");
        assert_eq!(loaded.participants.len(), 2);
        assert_eq!(loaded.status, SessionStatus::Open);
    }

    #[test]
    fn app_session_id_is_unique() {
        let (storage, _dir) = test_storage();
        let repo = LightningNodeRepository::new(&storage);

        repo.create(&test_node("ln-1", "0xsession1")).unwrap();
        let duplicate = test_node("ln-2", "0xsession1");
        assert!(matches!(
            repo.create(&duplicate),
            Err(StorageError::AlreadyExists(_))
        ));
    }

    #[test]
    fn find_by_app_session_locates_record() {
        let (storage, _dir) = test_storage();
        let repo = LightningNodeRepository::new(&storage);

        repo.create(&test_node("ln-1", "0xsession1")).unwrap();
        repo.create(&test_node("ln-2", "0xsession2")).unwrap();

        let found = repo.find_by_app_session("0xsession2").unwrap().unwrap();
        assert_eq!(found.id, "ln-2");
        assert!(repo.find_by_app_session("0xmissing").unwrap().is_none());
    }

    #[test]
    fn update_bumps_updated_at() {
        let (storage, _dir) = test_storage();
        let repo = LightningNodeRepository::new(&storage);

        let mut node = test_node("ln-1", "0xsession1");
        repo.create(&node).unwrap();
        let before = node.updated_at;

        std::thread::sleep(std::time::Duration::from_millis(5));
        node.status = SessionStatus::PendingClose;
        repo.update(&mut node).unwrap();

        let loaded = repo.get("ln-1").unwrap();
        assert_eq!(loaded.status, SessionStatus::PendingClose);
        assert!(loaded.updated_at > before);
    }

    #[test]
    fn participant_lookup_is_case_insensitive() {
        let node = test_node("ln-1", "0xsession1");
        assert!(node
            .participant("0xaaa0000000000000000000000000000000000001")
            .is_some());
        assert!(node.participant("0xdead").is_none());
    }
}
