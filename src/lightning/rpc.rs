// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! Thin typed client for the Yellow Network clearnode RPC.
//!
//! Requests follow the NitroRPC envelope: a `req` tuple of
//! `[request_id, method, params, timestamp_ms]` plus a `sig` array carrying
//! one EIP-191 signature per authorizing participant. Session creation and
//! updates are signed by the session key; authentication exchanges a signed
//! challenge for a bearer token.
//!
//! Protocol internals beyond this surface are the clearnode's concern.

use std::sync::atomic::{AtomicU64, Ordering};

use alloy::signers::{local::PrivateKeySigner, Signer};
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use super::types::{AppAllocation, AppDefinition, AppSessionInfo, LedgerBalance};

/// Error message fragments that indicate the clearnode session/auth expired.
const SESSION_EXPIRED_MARKERS: &[&str] = &[
    "session expired",
    "token expired",
    "unauthorized",
    "authentication required",
];

#[derive(Debug, thiserror::Error)]
pub enum NitroliteError {
    #[error("clearnode transport error: {0}")]
    Transport(String),

    #[error("clearnode rejected request: {message}")]
    Rpc { code: i64, message: String },

    #[error("clearnode auth failed: {0}")]
    Auth(String),

    #[error("clearnode response was invalid: {0}")]
    InvalidResponse(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

impl NitroliteError {
    /// Whether the error indicates an expired clearnode session.
    ///
    /// The clearnode reports expiry only through its error message, so this
    /// is substring matching by necessity. Callers evict their cached client
    /// and retry once when this returns true.
    pub fn is_session_expired(&self) -> bool {
        let message = match self {
            NitroliteError::Rpc { message, .. } => message,
            NitroliteError::Auth(message) => message,
            _ => return false,
        };
        let lowered = message.to_lowercase();
        SESSION_EXPIRED_MARKERS.iter().any(|m| lowered.contains(m))
    }
}

/// Authenticated clearnode client bound to one signer.
pub struct NitroliteClient {
    url: String,
    http: Client,
    signer: PrivateKeySigner,
    request_id: AtomicU64,
    jwt: RwLock<Option<String>>,
}

impl NitroliteClient {
    /// Create a client and run the auth handshake.
    pub async fn connect(url: impl Into<String>, signer: PrivateKeySigner) -> Result<Self, NitroliteError> {
        let client = Self {
            url: url.into(),
            http: Client::new(),
            signer,
            request_id: AtomicU64::new(1),
            jwt: RwLock::new(None),
        };
        client.authenticate().await?;
        Ok(client)
    }

    /// The signer's address.
    pub fn address(&self) -> String {
        self.signer.address().to_checksum(None)
    }

    /// Run the challenge/verify auth handshake and store the bearer token.
    pub async fn authenticate(&self) -> Result<(), NitroliteError> {
        let challenge = self
            .request(
                "auth_request",
                json!({ "address": self.address() }),
                &[],
            )
            .await?;

        let challenge_token = challenge
            .get("challenge_message")
            .and_then(Value::as_str)
            .ok_or_else(|| NitroliteError::Auth("missing challenge_message".to_string()))?
            .to_string();

        let signature = self.sign_payload(challenge_token.as_bytes()).await?;
        let verified = self
            .request(
                "auth_verify",
                json!({
                    "address": self.address(),
                    "challenge": challenge_token,
                    "signature": signature,
                }),
                &[],
            )
            .await?;

        let token = verified
            .get("jwt_token")
            .and_then(Value::as_str)
            .ok_or_else(|| NitroliteError::Auth("missing jwt_token".to_string()))?
            .to_string();

        *self.jwt.write().await = Some(token);
        Ok(())
    }

    /// Create an app session. Returns the remote session state.
    pub async fn create_app_session(
        &self,
        definition: &AppDefinition,
        allocations: &[AppAllocation],
        session_data: Option<&str>,
        co_signers: &[PrivateKeySigner],
    ) -> Result<AppSessionInfo, NitroliteError> {
        let params = json!({
            "definition": definition,
            "allocations": allocations,
            "session_data": session_data,
        });
        let result = self.request("create_app_session", params, co_signers).await?;
        parse_result(result)
    }

    /// Submit a new app state (deposit/transfer/withdraw reallocation).
    pub async fn submit_app_state(
        &self,
        app_session_id: &str,
        allocations: &[AppAllocation],
        session_data: Option<&str>,
        co_signers: &[PrivateKeySigner],
    ) -> Result<(), NitroliteError> {
        let params = json!({
            "app_session_id": app_session_id,
            "allocations": allocations,
            "session_data": session_data,
        });
        self.request("submit_app_state", params, co_signers).await?;
        Ok(())
    }

    /// Close an app session with final allocations.
    pub async fn close_app_session(
        &self,
        app_session_id: &str,
        allocations: &[AppAllocation],
        co_signers: &[PrivateKeySigner],
    ) -> Result<(), NitroliteError> {
        let params = json!({
            "app_session_id": app_session_id,
            "allocations": allocations,
        });
        self.request("close_app_session", params, co_signers).await?;
        Ok(())
    }

    /// List the signer's app sessions.
    pub async fn get_app_sessions(
        &self,
        participant: &str,
        status: Option<&str>,
    ) -> Result<Vec<AppSessionInfo>, NitroliteError> {
        let result = self
            .request(
                "get_app_sessions",
                json!({ "participant": participant, "status": status }),
                &[],
            )
            .await?;

        let sessions = result
            .get("app_sessions")
            .cloned()
            .unwrap_or_else(|| json!([]));
        serde_json::from_value(sessions)
            .map_err(|e| NitroliteError::InvalidResponse(e.to_string()))
    }

    /// Read the signer's unified ledger balances.
    pub async fn get_ledger_balances(
        &self,
        participant: &str,
    ) -> Result<Vec<LedgerBalance>, NitroliteError> {
        let result = self
            .request(
                "get_ledger_balances",
                json!({ "participant": participant }),
                &[],
            )
            .await?;

        let balances = result
            .get("ledger_balances")
            .cloned()
            .unwrap_or_else(|| json!([]));
        serde_json::from_value(balances)
            .map_err(|e| NitroliteError::InvalidResponse(e.to_string()))
    }

    /// Issue one NitroRPC request, signing the `req` tuple with the session
    /// key plus any co-signers.
    async fn request(
        &self,
        method: &str,
        params: Value,
        co_signers: &[PrivateKeySigner],
    ) -> Result<Value, NitroliteError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let req = json!([id, method, params, Utc::now().timestamp_millis()]);

        let payload =
            serde_json::to_vec(&req).map_err(|e| NitroliteError::InvalidResponse(e.to_string()))?;

        let mut signatures = vec![self.sign_payload(&payload).await?];
        for signer in co_signers {
            let sig = signer
                .sign_message(&payload)
                .await
                .map_err(|e| NitroliteError::Signing(e.to_string()))?;
            signatures.push(format!("0x{}", alloy::hex::encode(sig.as_bytes())));
        }

        let envelope = json!({ "req": req, "sig": signatures });

        let mut request = self.http.post(&self.url).json(&envelope);
        if let Some(token) = self.jwt.read().await.as_deref() {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| NitroliteError::Transport(e.to_string()))?;
        let body: Value = response
            .json()
            .await
            .map_err(|e| NitroliteError::Transport(e.to_string()))?;

        parse_envelope(&body)
    }

    /// EIP-191 signature over a payload, hex encoded.
    async fn sign_payload(&self, payload: &[u8]) -> Result<String, NitroliteError> {
        let sig = self
            .signer
            .sign_message(payload)
            .await
            .map_err(|e| NitroliteError::Signing(e.to_string()))?;
        Ok(format!("0x{}", alloy::hex::encode(sig.as_bytes())))
    }
}

/// Unpack a NitroRPC response envelope into its result payload.
///
/// Success: `{"res": [id, method, result, ts], "sig": [...]}`.
/// Failure: `{"err": [id, code, message, ts]}`.
fn parse_envelope(body: &Value) -> Result<Value, NitroliteError> {
    if let Some(err) = body.get("err").and_then(Value::as_array) {
        let code = err.get(1).and_then(Value::as_i64).unwrap_or(-1);
        let message = err
            .get(2)
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(NitroliteError::Rpc { code, message });
    }

    let res = body
        .get("res")
        .and_then(Value::as_array)
        .ok_or_else(|| NitroliteError::InvalidResponse("missing res tuple".to_string()))?;
    res.get(2)
        .cloned()
        .ok_or_else(|| NitroliteError::InvalidResponse("res tuple too short".to_string()))
}

fn parse_result(result: Value) -> Result<AppSessionInfo, NitroliteError> {
    // Some clearnode builds nest the session under "app_session"
    let value = result.get("app_session").cloned().unwrap_or(result);
    serde_json::from_value(value).map_err(|e| NitroliteError::InvalidResponse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_session_is_detected_from_message() {
        let expired = NitroliteError::Rpc {
            code: 401,
            message: "app session expired, re-authenticate".to_string(),
        };
        assert!(expired.is_session_expired());

        let auth = NitroliteError::Auth("JWT token expired".to_string());
        assert!(auth.is_session_expired());

        let unrelated = NitroliteError::Rpc {
            code: 400,
            message: "insufficient funds".to_string(),
        };
        assert!(!unrelated.is_session_expired());

        let transport = NitroliteError::Transport("connection refused".to_string());
        assert!(!transport.is_session_expired());
    }

    #[test]
    fn envelope_parsing_extracts_result() {
        let body = json!({
            "res": [7, "get_app_sessions", {"app_sessions": []}, 1700000000000i64],
            "sig": ["0xabc"]
        });
        let result = parse_envelope(&body).unwrap();
        assert!(result.get("app_sessions").is_some());
    }

    #[test]
    fn envelope_parsing_surfaces_errors() {
        let body = json!({ "err": [7, 4001, "session expired", 1700000000000i64] });
        let err = parse_envelope(&body).unwrap_err();
        match &err {
            NitroliteError::Rpc { code, message } => {
                assert_eq!(*code, 4001);
                assert_eq!(message, "session expired");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_session_expired());
    }

    #[test]
    fn envelope_parsing_rejects_malformed_bodies() {
        let body = json!({ "neither": true });
        assert!(matches!(
            parse_envelope(&body),
            Err(NitroliteError::InvalidResponse(_))
        ));
    }

    #[test]
    fn session_info_parses_nested_and_flat() {
        let flat = json!({
            "app_session_id": "0xs1",
            "status": "open",
        });
        let info = parse_result(flat).unwrap();
        assert_eq!(info.app_session_id, "0xs1");

        let nested = json!({
            "app_session": { "app_session_id": "0xs2", "status": "closed" }
        });
        let info = parse_result(nested).unwrap();
        assert_eq!(info.app_session_id, "0xs2");
        assert_eq!(info.status, "closed");
    }
}
