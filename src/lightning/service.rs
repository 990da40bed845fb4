// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! Lightning node orchestration.
//!
//! This service fronts the clearnode: it pre-authorizes participants, keeps
//! per-user authenticated clients cached, retries exactly once when the
//! clearnode reports an expired session, and mirrors remote session state
//! into the local store. The clearnode owns the session; local rows are a
//! cache of remote truth, never authoritative.

use std::sync::Arc;

use alloy::signers::local::PrivateKeySigner;
use chrono::Utc;

use crate::chains::{evm_signer, format_units, parse_units, ChainError, ChainKey};
use crate::config::AppConfig;
use crate::storage::{
    FileStorage, LightningNodeRecord, LightningNodeRepository, SeedRepository, StorageError,
    WalletRepository,
};

use super::cache::{client_key, ClientCache};
use super::rpc::{NitroliteClient, NitroliteError};
use super::types::{
    AppAllocation, AppDefinition, AppSessionInfo, Participant, ParticipantStatus, SessionStatus,
    SessionTransaction, SessionTxStatus, SessionTxType,
};

/// Internal fixed-point scale for mirrored balances.
const BALANCE_SCALE: u8 = 18;

/// Default challenge period (one day).
const DEFAULT_CHALLENGE_SECS: u64 = 86_400;

/// Default quorum when the request leaves it unset: the creator's weight.
const DEFAULT_QUORUM: u32 = 100;

const PROTOCOL: &str = "NitroRPC/0.2";

#[derive(Debug, thiserror::Error)]
pub enum LightningError {
    #[error("{0}")]
    Validation(String),

    #[error("lightning node not found: {0}")]
    NotFound(String),

    #[error("access denied")]
    Forbidden,

    #[error("insufficient signing weight: have {have}, quorum requires {need}")]
    InsufficientQuorum { have: u32, need: u32 },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Clearnode(#[from] NitroliteError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// One requested participant.
#[derive(Debug, Clone)]
pub struct ParticipantSpec {
    pub address: String,
    pub weight: u32,
}

/// Parameters for creating a lightning node.
#[derive(Debug, Clone)]
pub struct CreateNodeParams {
    pub chain: ChainKey,
    pub token: String,
    pub participants: Vec<ParticipantSpec>,
    pub quorum: Option<u32>,
    pub challenge: Option<u64>,
    pub session_data: Option<String>,
    /// Creator's initial allocation, human units.
    pub initial_deposit: Option<String>,
}

/// Orchestrates Yellow Network app sessions and their local mirrors.
pub struct LightningNodeService {
    storage: FileStorage,
    config: Arc<AppConfig>,
    cache: ClientCache,
}

impl LightningNodeService {
    pub fn new(storage: FileStorage, config: Arc<AppConfig>) -> Self {
        Self {
            storage,
            config,
            cache: ClientCache::default(),
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Create a new app session and mirror it locally.
    pub async fn create_node(
        &self,
        user_id: &str,
        params: CreateNodeParams,
    ) -> Result<LightningNodeRecord, LightningError> {
        let specs = validate_participants(&params.participants)?;

        let signer = self.user_signer(user_id)?;
        let creator_address = signer.address().to_checksum(None);

        if !specs
            .iter()
            .any(|s| s.address.eq_ignore_ascii_case(&creator_address))
        {
            return Err(LightningError::Validation(format!(
                "creator wallet {creator_address} must be listed among the participants"
            )));
        }

        let quorum = params.quorum.unwrap_or(DEFAULT_QUORUM);
        let challenge = params.challenge.unwrap_or(DEFAULT_CHALLENGE_SECS);
        let definition = AppDefinition {
            protocol: PROTOCOL.to_string(),
            participants: specs.iter().map(|s| s.address.clone()).collect(),
            weights: specs.iter().map(|s| s.weight).collect(),
            quorum,
            challenge,
            nonce: Utc::now().timestamp_millis() as u64,
        };

        let deposit = match params.initial_deposit.as_deref() {
            Some(raw) => Some(normalize_amount(raw)?),
            None => None,
        };
        let mut allocations = Vec::new();
        if let Some(amount) = &deposit {
            allocations.push(AppAllocation {
                participant: creator_address.clone(),
                asset: params.token.clone(),
                amount: amount.clone(),
            });
        }

        // Pre-authorize every locally-custodied participant so their session
        // keys are known to the clearnode before the session references them.
        let co_signers = self
            .preauthorize_participants(params.chain, &specs, &creator_address)
            .await?;

        let key = client_key(user_id, &params.chain.to_string(), &creator_address);
        let client = self.client_for(&key, &signer).await?;

        let info = match client
            .create_app_session(&definition, &allocations, params.session_data.as_deref(), &co_signers)
            .await
        {
            Err(e) if e.is_session_expired() => {
                self.cache.evict(&key);
                let client = self.client_for(&key, &signer).await?;
                client
                    .create_app_session(
                        &definition,
                        &allocations,
                        params.session_data.as_deref(),
                        &co_signers,
                    )
                    .await?
            }
            other => other?,
        };

        let now = Utc::now();
        let mut participants: Vec<Participant> = specs
            .iter()
            .map(|s| Participant::invited(&s.address, s.weight, &params.token))
            .collect();
        for p in &mut participants {
            if p.address.eq_ignore_ascii_case(&creator_address) {
                p.status = ParticipantStatus::Joined;
                p.joined_at = Some(now);
                p.last_seen_at = Some(now);
                if let Some(amount) = &deposit {
                    p.balance = amount.clone();
                }
            }
        }

        let mut transactions = Vec::new();
        if let Some(amount) = &deposit {
            transactions.push(session_tx(
                SessionTxType::Deposit,
                "",
                &creator_address,
                amount,
                &params.token,
            ));
        }

        let record = LightningNodeRecord {
            id: uuid::Uuid::new_v4().to_string(),
            owner_user_id: user_id.to_string(),
            app_session_id: info.app_session_id.clone(),
            uri: self.config.clearnode_url.clone(),
            chain: params.chain,
            token: params.token,
            status: SessionStatus::Open,
            quorum,
            protocol: definition.protocol.clone(),
            challenge,
            session_data: params.session_data,
            participants,
            transactions,
            created_at: now,
            updated_at: now,
        };

        let repo = LightningNodeRepository::new(&self.storage);
        repo.create(&record)?;

        tracing::info!(
            node_id = %record.id,
            app_session_id = %record.app_session_id,
            participants = record.participants.len(),
            "Created lightning node"
        );
        Ok(record)
    }

    /// Get a node, refreshing its mirror from the clearnode best-effort.
    pub async fn get_node(
        &self,
        user_id: &str,
        node_id: &str,
    ) -> Result<LightningNodeRecord, LightningError> {
        let repo = LightningNodeRepository::new(&self.storage);
        let mut record = repo
            .get(node_id)
            .map_err(|_| LightningError::NotFound(node_id.to_string()))?;

        // Owners and session participants may view a node; others may not.
        if record.owner_user_id != user_id {
            let address = self.user_address(user_id);
            let is_member = address
                .as_deref()
                .is_some_and(|addr| record.participant(addr).is_some());
            if !is_member {
                return Err(LightningError::Forbidden);
            }
        }

        // Local state is a best-effort cache; refresh from remote when reachable.
        if let Err(e) = self.refresh_from_remote(user_id, &mut record).await {
            tracing::warn!(node_id, error = %e, "Could not refresh node from clearnode");
        }
        Ok(record)
    }

    /// List the sessions a user owns or participates in, discovering remote
    /// sessions missing locally.
    pub async fn list_nodes(
        &self,
        user_id: &str,
    ) -> Result<Vec<LightningNodeRecord>, LightningError> {
        if let Err(e) = self.discover_remote_sessions(user_id).await {
            tracing::warn!(user_id, error = %e, "Discovery sync with clearnode failed");
        }

        let address = self.user_address(user_id);
        let repo = LightningNodeRepository::new(&self.storage);
        let mut nodes: Vec<LightningNodeRecord> = repo
            .list_all()?
            .into_iter()
            .filter(|n| {
                n.owner_user_id == user_id
                    || address
                        .as_deref()
                        .is_some_and(|addr| n.participant(addr).is_some())
            })
            .collect();
        nodes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(nodes)
    }

    /// Join a session. Idempotent for already-joined participants.
    pub async fn join_node(
        &self,
        user_id: &str,
        node_id: &str,
    ) -> Result<LightningNodeRecord, LightningError> {
        let signer = self.user_signer(user_id)?;
        let address = signer.address().to_checksum(None);

        let repo = LightningNodeRepository::new(&self.storage);
        let mut record = repo
            .get(node_id)
            .map_err(|_| LightningError::NotFound(node_id.to_string()))?;

        apply_join(&mut record, &address)?;
        repo.update(&mut record)?;
        Ok(record)
    }

    /// Leave a session.
    pub async fn leave_node(
        &self,
        user_id: &str,
        node_id: &str,
    ) -> Result<LightningNodeRecord, LightningError> {
        let signer = self.user_signer(user_id)?;
        let address = signer.address().to_checksum(None);

        let repo = LightningNodeRepository::new(&self.storage);
        let mut record = repo
            .get(node_id)
            .map_err(|_| LightningError::NotFound(node_id.to_string()))?;

        apply_leave(&mut record, &address)?;
        repo.update(&mut record)?;
        Ok(record)
    }

    /// Move funds from the caller's ledger into their session allocation.
    pub async fn deposit(
        &self,
        user_id: &str,
        node_id: &str,
        amount: &str,
    ) -> Result<LightningNodeRecord, LightningError> {
        let amount = normalize_amount(amount)?;
        let signer = self.user_signer(user_id)?;
        let address = signer.address().to_checksum(None);

        let repo = LightningNodeRepository::new(&self.storage);
        let mut record = repo
            .get(node_id)
            .map_err(|_| LightningError::NotFound(node_id.to_string()))?;

        ensure_open(&record)?;
        ensure_joined(&record, &address)?;

        let mut next = record.clone();
        let participant = next
            .participant_mut(&address)
            .expect("ensure_joined verified membership");
        participant.balance = add_amounts(&participant.balance, &amount)?;
        participant.last_seen_at = Some(Utc::now());

        self.submit_state(user_id, &signer, &next, &[]).await?;

        next.transactions.push(session_tx(
            SessionTxType::Deposit,
            "",
            &address,
            &amount,
            &next.token,
        ));
        repo.update(&mut next)?;
        record = next;
        Ok(record)
    }

    /// Transfer within the session between participants.
    pub async fn transfer(
        &self,
        user_id: &str,
        node_id: &str,
        to_address: &str,
        amount: &str,
    ) -> Result<LightningNodeRecord, LightningError> {
        let amount = normalize_amount(amount)?;
        let signer = self.user_signer(user_id)?;
        let from_address = signer.address().to_checksum(None);

        let repo = LightningNodeRepository::new(&self.storage);
        let mut record = repo
            .get(node_id)
            .map_err(|_| LightningError::NotFound(node_id.to_string()))?;

        ensure_open(&record)?;
        ensure_joined(&record, &from_address)?;

        let mut next = record.clone();
        apply_transfer(&mut next, &from_address, to_address, &amount)?;

        // A state update needs signatures whose combined weight meets the
        // quorum. We can only sign for participants this service custodies.
        let co_signers = self.co_signers_for(&next, &from_address)?;
        let have = signing_weight(&next, &from_address, &co_signers);
        if have < next.quorum {
            return Err(LightningError::InsufficientQuorum {
                have,
                need: next.quorum,
            });
        }

        self.submit_state(user_id, &signer, &next, &co_signers).await?;

        next.transactions.push(session_tx(
            SessionTxType::Transfer,
            &from_address,
            to_address,
            &amount,
            &next.token,
        ));
        repo.update(&mut next)?;
        record = next;
        Ok(record)
    }

    /// Move funds from the caller's session allocation back to their ledger.
    pub async fn withdraw(
        &self,
        user_id: &str,
        node_id: &str,
        amount: &str,
    ) -> Result<LightningNodeRecord, LightningError> {
        let amount = normalize_amount(amount)?;
        let signer = self.user_signer(user_id)?;
        let address = signer.address().to_checksum(None);

        let repo = LightningNodeRepository::new(&self.storage);
        let mut record = repo
            .get(node_id)
            .map_err(|_| LightningError::NotFound(node_id.to_string()))?;

        ensure_open(&record)?;
        ensure_joined(&record, &address)?;

        let mut next = record.clone();
        {
            let participant = next
                .participant_mut(&address)
                .expect("ensure_joined verified membership");
            participant.balance = sub_amounts(&participant.balance, &amount)?;
            participant.last_seen_at = Some(Utc::now());
        }

        self.submit_state(user_id, &signer, &next, &[]).await?;

        next.transactions.push(session_tx(
            SessionTxType::Withdraw,
            &address,
            "",
            &amount,
            &next.token,
        ));
        repo.update(&mut next)?;
        record = next;
        Ok(record)
    }

    /// Close the session: open → pending_close → closed.
    ///
    /// `pending_close` is persisted before the clearnode call so a crash or
    /// remote failure leaves the node in a state the next close can resume.
    pub async fn close_node(
        &self,
        user_id: &str,
        node_id: &str,
    ) -> Result<LightningNodeRecord, LightningError> {
        let signer = self.user_signer(user_id)?;
        let address = signer.address().to_checksum(None);

        let repo = LightningNodeRepository::new(&self.storage);
        let mut record = repo
            .get(node_id)
            .map_err(|_| LightningError::NotFound(node_id.to_string()))?;

        if record.status == SessionStatus::Closed {
            return Err(LightningError::Validation(
                "lightning node is already closed".to_string(),
            ));
        }
        ensure_joined(&record, &address)?;

        record.status = SessionStatus::PendingClose;
        repo.update(&mut record)?;

        let allocations = final_allocations(&record);
        let co_signers = self.co_signers_for(&record, &address)?;

        let key = client_key(user_id, &record.chain.to_string(), &address);
        let client = self.client_for(&key, &signer).await?;
        let result = match client
            .close_app_session(&record.app_session_id, &allocations, &co_signers)
            .await
        {
            Err(e) if e.is_session_expired() => {
                self.cache.evict(&key);
                let client = self.client_for(&key, &signer).await?;
                client
                    .close_app_session(&record.app_session_id, &allocations, &co_signers)
                    .await
            }
            other => other,
        };

        match result {
            Ok(()) => {
                record.status = SessionStatus::Closed;
                let total = final_total(&record);
                record.transactions.push(session_tx(
                    SessionTxType::Close,
                    &address,
                    "",
                    &total,
                    &record.token.clone(),
                ));
                repo.update(&mut record)?;
                tracing::info!(node_id, app_session_id = %record.app_session_id, "Closed lightning node");
                Ok(record)
            }
            Err(e) => {
                // Stay pending_close; a later close call retries from here.
                tracing::warn!(node_id, error = %e, "Close failed, node left pending_close");
                Err(e.into())
            }
        }
    }

    /// The caller's unified clearnode ledger balances.
    pub async fn ledger_balances(
        &self,
        user_id: &str,
    ) -> Result<Vec<super::types::LedgerBalance>, LightningError> {
        let signer = self.user_signer(user_id)?;
        let address = signer.address().to_checksum(None);
        let key = client_key(user_id, "ledger", &address);

        let client = self.client_for(&key, &signer).await?;
        match client.get_ledger_balances(&address).await {
            Err(e) if e.is_session_expired() => {
                self.cache.evict(&key);
                let client = self.client_for(&key, &signer).await?;
                Ok(client.get_ledger_balances(&address).await?)
            }
            other => Ok(other?),
        }
    }

    // =========================================================================
    // Clearnode plumbing
    // =========================================================================

    /// The caller's derived session address, when they have a seed.
    fn user_address(&self, user_id: &str) -> Option<String> {
        self.user_signer(user_id)
            .ok()
            .map(|s| s.address().to_checksum(None))
    }

    /// Derive the caller's session signer from their stored seed.
    fn user_signer(&self, user_id: &str) -> Result<PrivateKeySigner, LightningError> {
        let seeds = SeedRepository::new(&self.storage);
        let mnemonic = seeds.read_mnemonic(user_id).map_err(|_| {
            LightningError::Validation(format!("user {user_id} has no wallet seed"))
        })?;
        Ok(evm_signer(&mnemonic, 0)?)
    }

    /// Get (or create and authenticate) the cached client for a key.
    async fn client_for(
        &self,
        key: &str,
        signer: &PrivateKeySigner,
    ) -> Result<Arc<NitroliteClient>, LightningError> {
        if let Some(client) = self.cache.get(key) {
            return Ok(client);
        }

        let client = Arc::new(
            NitroliteClient::connect(self.config.clearnode_url.clone(), signer.clone()).await?,
        );
        self.cache.insert(key.to_string(), client.clone());
        Ok(client)
    }

    /// Authenticate every locally-custodied participant other than the
    /// creator, returning their signers for co-signing.
    async fn preauthorize_participants(
        &self,
        chain: ChainKey,
        specs: &[ParticipantSpec],
        creator_address: &str,
    ) -> Result<Vec<PrivateKeySigner>, LightningError> {
        let wallets = WalletRepository::new(&self.storage);
        let seeds = SeedRepository::new(&self.storage);

        let mut signers = Vec::new();
        for spec in specs {
            if spec.address.eq_ignore_ascii_case(creator_address) {
                continue;
            }
            let Some(wallet) = wallets.find_by_address(&spec.address)? else {
                continue; // remote participant, authorizes itself
            };
            let Ok(mnemonic) = seeds.read_mnemonic(&wallet.owner_user_id) else {
                continue;
            };
            let signer = evm_signer(&mnemonic, wallet.derivation_index)?;
            let key = client_key(&wallet.owner_user_id, &chain.to_string(), &spec.address);
            if let Err(e) = self.client_for(&key, &signer).await {
                tracing::warn!(address = %spec.address, error = %e, "Participant pre-authorization failed");
                continue;
            }
            signers.push(signer);
        }
        Ok(signers)
    }

    /// Signers for joined participants custodied by this service, excluding
    /// the caller.
    fn co_signers_for(
        &self,
        record: &LightningNodeRecord,
        caller_address: &str,
    ) -> Result<Vec<PrivateKeySigner>, LightningError> {
        let wallets = WalletRepository::new(&self.storage);
        let seeds = SeedRepository::new(&self.storage);

        let mut signers = Vec::new();
        for participant in &record.participants {
            if participant.status != ParticipantStatus::Joined
                || participant.address.eq_ignore_ascii_case(caller_address)
            {
                continue;
            }
            let Some(wallet) = wallets.find_by_address(&participant.address)? else {
                continue;
            };
            let Ok(mnemonic) = seeds.read_mnemonic(&wallet.owner_user_id) else {
                continue;
            };
            signers.push(evm_signer(&mnemonic, wallet.derivation_index)?);
        }
        Ok(signers)
    }

    /// Submit the record's allocations as the new app state, with the
    /// single session-expiry retry.
    async fn submit_state(
        &self,
        user_id: &str,
        signer: &PrivateKeySigner,
        record: &LightningNodeRecord,
        co_signers: &[PrivateKeySigner],
    ) -> Result<(), LightningError> {
        let address = signer.address().to_checksum(None);
        let allocations = final_allocations(record);
        let key = client_key(user_id, &record.chain.to_string(), &address);

        let client = self.client_for(&key, signer).await?;
        match client
            .submit_app_state(
                &record.app_session_id,
                &allocations,
                record.session_data.as_deref(),
                co_signers,
            )
            .await
        {
            Err(e) if e.is_session_expired() => {
                self.cache.evict(&key);
                let client = self.client_for(&key, signer).await?;
                client
                    .submit_app_state(
                        &record.app_session_id,
                        &allocations,
                        record.session_data.as_deref(),
                        co_signers,
                    )
                    .await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
            Ok(()) => Ok(()),
        }
    }

    /// Refresh one mirror from remote session state.
    async fn refresh_from_remote(
        &self,
        user_id: &str,
        record: &mut LightningNodeRecord,
    ) -> Result<(), LightningError> {
        let signer = self.user_signer(user_id)?;
        let address = signer.address().to_checksum(None);
        let key = client_key(user_id, &record.chain.to_string(), &address);
        let client = self.client_for(&key, &signer).await?;

        let sessions = match client.get_app_sessions(&address, None).await {
            Err(e) if e.is_session_expired() => {
                self.cache.evict(&key);
                let client = self.client_for(&key, &signer).await?;
                client.get_app_sessions(&address, None).await?
            }
            other => other?,
        };

        if let Some(info) = sessions
            .iter()
            .find(|s| s.app_session_id == record.app_session_id)
        {
            if sync_remote(record, info) {
                let repo = LightningNodeRepository::new(&self.storage);
                repo.update(record)?;
            }
        }
        Ok(())
    }

    /// Insert mirrors for remote sessions this store has never seen.
    async fn discover_remote_sessions(&self, user_id: &str) -> Result<(), LightningError> {
        let signer = self.user_signer(user_id)?;
        let address = signer.address().to_checksum(None);
        let key = client_key(user_id, "discovery", &address);
        let client = self.client_for(&key, &signer).await?;

        let sessions = client.get_app_sessions(&address, None).await?;
        let repo = LightningNodeRepository::new(&self.storage);

        for info in sessions {
            if repo.find_by_app_session(&info.app_session_id)?.is_some() {
                continue;
            }
            let record = mirror_from_remote(user_id, &self.config.clearnode_url, &address, &info);
            repo.create(&record)?;
            tracing::info!(
                app_session_id = %record.app_session_id,
                "Discovered remote session, mirrored locally"
            );
        }
        Ok(())
    }
}

// =============================================================================
// Pure state-transition helpers
// =============================================================================

/// Validate the participant list: at least two unique addresses.
fn validate_participants(
    specs: &[ParticipantSpec],
) -> Result<Vec<ParticipantSpec>, LightningError> {
    let mut seen = std::collections::HashSet::new();
    for spec in specs {
        if spec.address.trim().is_empty() {
            return Err(LightningError::Validation(
                "participant address must not be empty".to_string(),
            ));
        }
        if !seen.insert(spec.address.to_lowercase()) {
            return Err(LightningError::Validation(format!(
                "duplicate participant address {}",
                spec.address
            )));
        }
    }
    if seen.len() < 2 {
        return Err(LightningError::Validation(
            "a lightning node requires at least 2 unique participants".to_string(),
        ));
    }
    Ok(specs.to_vec())
}

/// invited → joined; joined → touch last_seen_at; left → error.
fn apply_join(record: &mut LightningNodeRecord, address: &str) -> Result<(), LightningError> {
    ensure_open(record)?;
    let now = Utc::now();
    let participant = record.participant_mut(address).ok_or_else(|| {
        LightningError::Validation(format!("{address} is not a participant of this session"))
    })?;

    match participant.status {
        ParticipantStatus::Invited => {
            participant.status = ParticipantStatus::Joined;
            participant.joined_at = Some(now);
            participant.last_seen_at = Some(now);
        }
        ParticipantStatus::Joined => {
            // Idempotent: only refresh the last-seen marker.
            participant.last_seen_at = Some(now);
        }
        ParticipantStatus::Left => {
            return Err(LightningError::Validation(format!(
                "{address} has left this session"
            )));
        }
    }
    Ok(())
}

/// joined → left.
fn apply_leave(record: &mut LightningNodeRecord, address: &str) -> Result<(), LightningError> {
    let now = Utc::now();
    let participant = record.participant_mut(address).ok_or_else(|| {
        LightningError::Validation(format!("{address} is not a participant of this session"))
    })?;

    if participant.status != ParticipantStatus::Joined {
        return Err(LightningError::Validation(format!(
            "{address} has not joined this session"
        )));
    }
    participant.status = ParticipantStatus::Left;
    participant.last_seen_at = Some(now);
    Ok(())
}

/// Move `amount` between two participants' mirrored balances.
fn apply_transfer(
    record: &mut LightningNodeRecord,
    from: &str,
    to: &str,
    amount: &str,
) -> Result<(), LightningError> {
    if from.eq_ignore_ascii_case(to) {
        return Err(LightningError::Validation(
            "cannot transfer to yourself".to_string(),
        ));
    }
    if record.participant(to).is_none() {
        return Err(LightningError::Validation(format!(
            "{to} is not a participant of this session"
        )));
    }
    if record
        .participant(to)
        .is_some_and(|p| p.status == ParticipantStatus::Left)
    {
        return Err(LightningError::Validation(format!(
            "{to} has left this session"
        )));
    }

    let now = Utc::now();
    {
        let sender = record
            .participant_mut(from)
            .ok_or_else(|| LightningError::Validation(format!("{from} is not a participant")))?;
        sender.balance = sub_amounts(&sender.balance, amount)?;
        sender.last_seen_at = Some(now);
    }
    {
        let recipient = record
            .participant_mut(to)
            .expect("recipient checked above");
        recipient.balance = add_amounts(&recipient.balance, amount)?;
    }
    Ok(())
}

fn ensure_open(record: &LightningNodeRecord) -> Result<(), LightningError> {
    if record.status != SessionStatus::Open {
        return Err(LightningError::Validation(format!(
            "lightning node is not open (status: {:?})",
            record.status
        )));
    }
    Ok(())
}

fn ensure_joined(record: &LightningNodeRecord, address: &str) -> Result<(), LightningError> {
    match record.participant(address) {
        Some(p) if p.status == ParticipantStatus::Joined => Ok(()),
        Some(_) => Err(LightningError::Validation(format!(
            "{address} has not joined this session"
        ))),
        None => Err(LightningError::Validation(format!(
            "{address} is not a participant of this session"
        ))),
    }
}

/// Combined signing weight available: caller plus custodied co-signers.
fn signing_weight(
    record: &LightningNodeRecord,
    caller_address: &str,
    co_signers: &[PrivateKeySigner],
) -> u32 {
    let co_addresses: Vec<String> = co_signers
        .iter()
        .map(|s| s.address().to_checksum(None).to_lowercase())
        .collect();

    record
        .participants
        .iter()
        .filter(|p| {
            p.address.eq_ignore_ascii_case(caller_address)
                || co_addresses.contains(&p.address.to_lowercase())
        })
        .map(|p| p.weight)
        .sum()
}

/// The record's current allocations, one per participant.
fn final_allocations(record: &LightningNodeRecord) -> Vec<AppAllocation> {
    record
        .participants
        .iter()
        .map(|p| AppAllocation {
            participant: p.address.clone(),
            asset: p.asset.clone(),
            amount: p.balance.clone(),
        })
        .collect()
}

/// Sum of all mirrored balances, for the close transaction row.
fn final_total(record: &LightningNodeRecord) -> String {
    let mut total = "0".to_string();
    for p in &record.participants {
        if let Ok(sum) = add_amounts(&total, &p.balance) {
            total = sum;
        }
    }
    total
}

/// Fold remote session state into the mirror. Returns true when changed.
fn sync_remote(record: &mut LightningNodeRecord, info: &AppSessionInfo) -> bool {
    let mut changed = false;

    // Remote truth wins for terminal states; a local pending_close sticks
    // until the clearnode confirms the close.
    if info.local_status() == SessionStatus::Closed && record.status != SessionStatus::Closed {
        record.status = SessionStatus::Closed;
        changed = true;
    }

    if info.session_data.is_some() && info.session_data != record.session_data {
        record.session_data = info.session_data.clone();
        changed = true;
    }
    if info.quorum != 0 && info.quorum != record.quorum {
        record.quorum = info.quorum;
        changed = true;
    }
    changed
}

/// Build a local mirror for a session discovered on the clearnode.
fn mirror_from_remote(
    user_id: &str,
    clearnode_url: &str,
    user_address: &str,
    info: &AppSessionInfo,
) -> LightningNodeRecord {
    let now = Utc::now();
    let participants = info
        .participants
        .iter()
        .map(|address| {
            let mut p = Participant::invited(address, 0, "");
            if address.eq_ignore_ascii_case(user_address) {
                p.status = ParticipantStatus::Joined;
                p.joined_at = Some(now);
            }
            p
        })
        .collect();

    LightningNodeRecord {
        id: uuid::Uuid::new_v4().to_string(),
        owner_user_id: user_id.to_string(),
        app_session_id: info.app_session_id.clone(),
        uri: clearnode_url.to_string(),
        chain: ChainKey::Sepolia,
        token: String::new(),
        status: info.local_status(),
        quorum: info.quorum,
        protocol: if info.protocol.is_empty() {
            PROTOCOL.to_string()
        } else {
            info.protocol.clone()
        },
        challenge: info.challenge,
        session_data: info.session_data.clone(),
        participants,
        transactions: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

fn session_tx(
    tx_type: SessionTxType,
    from: &str,
    to: &str,
    amount: &str,
    asset: &str,
) -> SessionTransaction {
    SessionTransaction {
        id: uuid::Uuid::new_v4().to_string(),
        from_address: from.to_string(),
        to_address: to.to_string(),
        amount: amount.to_string(),
        asset: asset.to_string(),
        tx_type,
        status: SessionTxStatus::Confirmed,
        tx_hash: None,
        created_at: Utc::now(),
    }
}

// =============================================================================
// Balance arithmetic (fixed-point over decimal strings)
// =============================================================================

/// Validate and canonicalize a positive decimal amount.
fn normalize_amount(raw: &str) -> Result<String, LightningError> {
    let value = parse_units(raw.trim(), BALANCE_SCALE)
        .map_err(|_| LightningError::Validation(format!("invalid amount: {raw}")))?;
    if value.is_zero() {
        return Err(LightningError::Validation(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(format_units(value, BALANCE_SCALE))
}

fn add_amounts(a: &str, b: &str) -> Result<String, LightningError> {
    let a = parse_units(a, BALANCE_SCALE)
        .map_err(|_| LightningError::Validation(format!("invalid balance: {a}")))?;
    let b = parse_units(b, BALANCE_SCALE)
        .map_err(|_| LightningError::Validation(format!("invalid amount: {b}")))?;
    Ok(format_units(a + b, BALANCE_SCALE))
}

fn sub_amounts(a: &str, b: &str) -> Result<String, LightningError> {
    let a_units = parse_units(a, BALANCE_SCALE)
        .map_err(|_| LightningError::Validation(format!("invalid balance: {a}")))?;
    let b_units = parse_units(b, BALANCE_SCALE)
        .map_err(|_| LightningError::Validation(format!("invalid amount: {b}")))?;
    if b_units > a_units {
        return Err(LightningError::Validation(format!(
            "insufficient balance: have {a}, need {b}"
        )));
    }
    Ok(format_units(a_units - b_units, BALANCE_SCALE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(address: &str, weight: u32) -> ParticipantSpec {
        ParticipantSpec {
            address: address.to_string(),
            weight,
        }
    }

    fn test_record() -> LightningNodeRecord {
        let now = Utc::now();
        let mut creator = Participant::invited("0xAAA0000000000000000000000000000000000001", 100, "usdc");
        creator.status = ParticipantStatus::Joined;
        creator.joined_at = Some(now);
        creator.balance = "10".to_string();

        LightningNodeRecord {
            id: "ln-1".to_string(),
            owner_user_id: "user-1".to_string(),
            app_session_id: "0xsession1".to_string(),
            uri: "https://clearnet-sandbox.yellow.com/rpc".to_string(),
            chain: ChainKey::Sepolia,
            token: "usdc".to_string(),
            status: SessionStatus::Open,
            quorum: 100,
            protocol: PROTOCOL.to_string(),
            challenge: DEFAULT_CHALLENGE_SECS,
            session_data: None,
            participants: vec![
                creator,
                Participant::invited("0xBBB0000000000000000000000000000000000002", 0, "usdc"),
            ],
            transactions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    const CREATOR: &str = "0xAAA0000000000000000000000000000000000001";
    const INVITEE: &str = "0xBBB0000000000000000000000000000000000002";

    #[test]
    fn create_requires_two_unique_participants() {
        let err = validate_participants(&[spec("0xaaa", 100)]).unwrap_err();
        assert!(matches!(err, LightningError::Validation(_)));

        // Same address twice, different case, is still one participant
        let err =
            validate_participants(&[spec("0xAAA", 100), spec("0xaaa", 0)]).unwrap_err();
        assert!(matches!(err, LightningError::Validation(_)));

        assert!(validate_participants(&[spec("0xaaa", 100), spec("0xbbb", 0)]).is_ok());
    }

    #[test]
    fn join_moves_invited_to_joined() {
        let mut record = test_record();
        apply_join(&mut record, INVITEE).unwrap();

        let p = record.participant(INVITEE).unwrap();
        assert_eq!(p.status, ParticipantStatus::Joined);
        assert!(p.joined_at.is_some());
        assert!(p.last_seen_at.is_some());
    }

    #[test]
    fn join_is_idempotent_and_touches_last_seen() {
        let mut record = test_record();
        apply_join(&mut record, INVITEE).unwrap();
        let first_joined_at = record.participant(INVITEE).unwrap().joined_at;
        let first_seen = record.participant(INVITEE).unwrap().last_seen_at;

        std::thread::sleep(std::time::Duration::from_millis(5));
        apply_join(&mut record, INVITEE).unwrap();

        let p = record.participant(INVITEE).unwrap();
        assert_eq!(p.joined_at, first_joined_at, "joined_at must not move");
        assert!(p.last_seen_at > first_seen, "last_seen_at must advance");
    }

    #[test]
    fn join_rejects_left_participants_and_strangers() {
        let mut record = test_record();
        apply_join(&mut record, INVITEE).unwrap();
        apply_leave(&mut record, INVITEE).unwrap();

        assert!(matches!(
            apply_join(&mut record, INVITEE),
            Err(LightningError::Validation(_))
        ));
        assert!(matches!(
            apply_join(&mut record, "0xDEAD000000000000000000000000000000000000"),
            Err(LightningError::Validation(_))
        ));
    }

    #[test]
    fn leave_requires_joined() {
        let mut record = test_record();
        assert!(matches!(
            apply_leave(&mut record, INVITEE),
            Err(LightningError::Validation(_))
        ));

        apply_join(&mut record, INVITEE).unwrap();
        apply_leave(&mut record, INVITEE).unwrap();
        assert_eq!(
            record.participant(INVITEE).unwrap().status,
            ParticipantStatus::Left
        );
    }

    #[test]
    fn transfer_moves_balances() {
        let mut record = test_record();
        apply_join(&mut record, INVITEE).unwrap();

        apply_transfer(&mut record, CREATOR, INVITEE, "2.5").unwrap();
        assert_eq!(record.participant(CREATOR).unwrap().balance, "7.5");
        assert_eq!(record.participant(INVITEE).unwrap().balance, "2.5");
    }

    #[test]
    fn transfer_rejects_overdraft_self_and_strangers() {
        let mut record = test_record();
        apply_join(&mut record, INVITEE).unwrap();

        assert!(matches!(
            apply_transfer(&mut record, CREATOR, INVITEE, "1000"),
            Err(LightningError::Validation(_))
        ));
        assert!(matches!(
            apply_transfer(&mut record, CREATOR, CREATOR, "1"),
            Err(LightningError::Validation(_))
        ));
        assert!(matches!(
            apply_transfer(&mut record, CREATOR, "0xDEAD000000000000000000000000000000000000", "1"),
            Err(LightningError::Validation(_))
        ));
        // Failed transfers must not mutate balances
        assert_eq!(record.participant(CREATOR).unwrap().balance, "10");
    }

    #[test]
    fn operations_require_open_session() {
        let mut record = test_record();
        record.status = SessionStatus::PendingClose;
        assert!(matches!(
            apply_join(&mut record, INVITEE),
            Err(LightningError::Validation(_))
        ));
        assert!(ensure_open(&record).is_err());

        record.status = SessionStatus::Open;
        assert!(ensure_open(&record).is_ok());
    }

    #[test]
    fn signing_weight_counts_caller_only_without_cosigners() {
        let record = test_record();
        assert_eq!(signing_weight(&record, CREATOR, &[]), 100);
        assert_eq!(signing_weight(&record, INVITEE, &[]), 0);
    }

    #[test]
    fn final_allocations_mirror_balances() {
        let record = test_record();
        let allocations = final_allocations(&record);
        assert_eq!(allocations.len(), 2);
        assert_eq!(allocations[0].participant, CREATOR);
        assert_eq!(allocations[0].amount, "10");
        assert_eq!(final_total(&record), "10");
    }

    #[test]
    fn sync_remote_applies_terminal_status() {
        let mut record = test_record();
        let info = AppSessionInfo {
            app_session_id: record.app_session_id.clone(),
            status: "closed".to_string(),
            participants: vec![],
            protocol: String::new(),
            quorum: 0,
            challenge: 0,
            session_data: Some("{\"round\":3}".to_string()),
        };

        assert!(sync_remote(&mut record, &info));
        assert_eq!(record.status, SessionStatus::Closed);
        assert_eq!(record.session_data.as_deref(), Some("{\"round\":3}"));

        // Unchanged input reports no change
        assert!(!sync_remote(&mut record, &info));
    }

    #[test]
    fn sync_remote_keeps_pending_close_while_remote_open() {
        let mut record = test_record();
        record.status = SessionStatus::PendingClose;
        let info = AppSessionInfo {
            app_session_id: record.app_session_id.clone(),
            status: "open".to_string(),
            participants: vec![],
            protocol: String::new(),
            quorum: 0,
            challenge: 0,
            session_data: None,
        };

        assert!(!sync_remote(&mut record, &info));
        assert_eq!(record.status, SessionStatus::PendingClose);
    }

    #[test]
    fn mirror_from_remote_marks_user_joined() {
        let info = AppSessionInfo {
            app_session_id: "0xremote".to_string(),
            status: "open".to_string(),
            participants: vec![CREATOR.to_string(), INVITEE.to_string()],
            protocol: "NitroRPC/0.2".to_string(),
            quorum: 100,
            challenge: 3600,
            session_data: None,
        };

        let record = mirror_from_remote("user-1", "https://clearnode", CREATOR, &info);
        assert_eq!(record.app_session_id, "0xremote");
        assert_eq!(record.status, SessionStatus::Open);
        assert_eq!(
            record.participant(CREATOR).unwrap().status,
            ParticipantStatus::Joined
        );
        assert_eq!(
            record.participant(INVITEE).unwrap().status,
            ParticipantStatus::Invited
        );
    }

    #[test]
    fn amount_arithmetic_round_trips() {
        assert_eq!(add_amounts("1.5", "2.25").unwrap(), "3.75");
        assert_eq!(sub_amounts("3.75", "2.25").unwrap(), "1.5");
        assert_eq!(add_amounts("0", "0.000001").unwrap(), "0.000001");
        assert!(sub_amounts("1", "2").is_err());
    }

    #[test]
    fn normalize_amount_rejects_zero_and_garbage() {
        assert_eq!(normalize_amount("1.50").unwrap(), "1.5");
        assert!(normalize_amount("0").is_err());
        assert!(normalize_amount("-1").is_err());
        assert!(normalize_amount("abc").is_err());
    }
}
