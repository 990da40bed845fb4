// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! Zerion indexer integration for cross-chain portfolio and history reads.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::config::env_or_default;

const DEFAULT_API_BASE_URL: &str = "https://api.zerion.io";
const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum ZerionError {
    #[error("Zerion configuration missing: {0}")]
    MissingConfig(String),

    #[error("Zerion request failed: {0}")]
    Request(String),

    #[error("Zerion response was invalid: {0}")]
    InvalidResponse(String),
}

/// Zerion REST client.
#[derive(Debug, Clone)]
pub struct ZerionClient {
    base_url: String,
    api_key: String,
    http: Client,
}

/// Aggregated portfolio value for a wallet.
#[derive(Debug, Clone, Deserialize)]
pub struct Portfolio {
    #[serde(default)]
    pub total_value_usd: f64,
    /// USD value per chain key.
    #[serde(default)]
    pub by_chain: std::collections::HashMap<String, f64>,
}

/// One fungible position held by a wallet.
#[derive(Debug, Clone)]
pub struct Position {
    pub symbol: String,
    pub name: String,
    pub chain: String,
    pub quantity: String,
    pub value_usd: Option<f64>,
}

/// One indexed transaction.
#[derive(Debug, Clone)]
pub struct IndexedTransaction {
    pub hash: String,
    pub chain: String,
    pub operation_type: String,
    pub status: String,
    pub mined_at: Option<String>,
}

impl ZerionClient {
    /// Build a client from an API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ZerionError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ZerionError::MissingConfig("ZERION_API_KEY".to_string()));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ZerionError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: env_or_default("ZERION_API_URL", DEFAULT_API_BASE_URL),
            api_key,
            http,
        })
    }

    /// Aggregated portfolio value for an address, all chains.
    pub async fn get_portfolio(&self, address: &str) -> Result<Portfolio, ZerionError> {
        let url = format!("{}/v1/wallets/{}/portfolio", self.base_url, address);
        let body: PortfolioEnvelope = self.get_json(&url, &[("currency", "usd")]).await?;

        Ok(Portfolio {
            total_value_usd: body.data.attributes.total.positions,
            by_chain: body.data.attributes.positions_distribution_by_chain,
        })
    }

    /// Fungible positions held by an address.
    pub async fn list_positions(&self, address: &str) -> Result<Vec<Position>, ZerionError> {
        let url = format!("{}/v1/wallets/{}/positions/", self.base_url, address);
        let page_size = DEFAULT_PAGE_SIZE.to_string();
        let body: ListEnvelope<PositionData> = self
            .get_json(&url, &[("currency", "usd"), ("page[size]", &page_size)])
            .await?;

        Ok(body
            .data
            .into_iter()
            .map(|item| Position {
                symbol: item.attributes.fungible_info.symbol,
                name: item.attributes.fungible_info.name,
                chain: item
                    .relationships
                    .chain
                    .map(|c| c.data.id)
                    .unwrap_or_default(),
                quantity: item.attributes.quantity.numeric,
                value_usd: item.attributes.value,
            })
            .collect())
    }

    /// Recent transactions for an address, newest first.
    pub async fn list_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<IndexedTransaction>, ZerionError> {
        let url = format!("{}/v1/wallets/{}/transactions/", self.base_url, address);
        let page_size = limit.min(100).to_string();
        let body: ListEnvelope<TransactionData> = self
            .get_json(&url, &[("currency", "usd"), ("page[size]", &page_size)])
            .await?;

        Ok(body
            .data
            .into_iter()
            .map(|item| IndexedTransaction {
                hash: item.attributes.hash,
                chain: item
                    .relationships
                    .chain
                    .map(|c| c.data.id)
                    .unwrap_or_default(),
                operation_type: item.attributes.operation_type,
                status: item.attributes.status,
                mined_at: item.attributes.mined_at,
            })
            .collect())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ZerionError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .basic_auth(&self.api_key, Some(""))
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| ZerionError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ZerionError::Request(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ZerionError::InvalidResponse(e.to_string()))
    }
}

// =============================================================================
// Wire types (JSON:API envelopes, trimmed to what the service reads)
// =============================================================================

#[derive(Debug, Deserialize)]
struct PortfolioEnvelope {
    data: PortfolioData,
}

#[derive(Debug, Deserialize)]
struct PortfolioData {
    attributes: PortfolioAttributes,
}

#[derive(Debug, Deserialize)]
struct PortfolioAttributes {
    #[serde(default)]
    total: PortfolioTotal,
    #[serde(default)]
    positions_distribution_by_chain: std::collections::HashMap<String, f64>,
}

#[derive(Debug, Default, Deserialize)]
struct PortfolioTotal {
    #[serde(default)]
    positions: f64,
}

#[derive(Debug, Deserialize)]
struct ListEnvelope<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct PositionData {
    attributes: PositionAttributes,
    #[serde(default)]
    relationships: Relationships,
}

#[derive(Debug, Deserialize)]
struct PositionAttributes {
    fungible_info: FungibleInfo,
    quantity: Quantity,
    #[serde(default)]
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct FungibleInfo {
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Quantity {
    #[serde(default)]
    numeric: String,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    attributes: TransactionAttributes,
    #[serde(default)]
    relationships: Relationships,
}

#[derive(Debug, Deserialize)]
struct TransactionAttributes {
    #[serde(default)]
    hash: String,
    #[serde(default)]
    operation_type: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    mined_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Relationships {
    #[serde(default)]
    chain: Option<ChainRelationship>,
}

#[derive(Debug, Deserialize)]
struct ChainRelationship {
    data: ChainRef,
}

#[derive(Debug, Deserialize)]
struct ChainRef {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_requires_api_key() {
        assert!(matches!(
            ZerionClient::new(""),
            Err(ZerionError::MissingConfig(_))
        ));
        assert!(ZerionClient::new("zk_dev_123").is_ok());
    }

    #[test]
    fn portfolio_envelope_parses() {
        let raw = serde_json::json!({
            "data": {
                "type": "portfolio",
                "id": "0xabc",
                "attributes": {
                    "total": { "positions": 1234.56 },
                    "positions_distribution_by_chain": {
                        "ethereum": 1000.0,
                        "base": 234.56
                    }
                }
            }
        });
        let envelope: PortfolioEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.data.attributes.total.positions, 1234.56);
        assert_eq!(
            envelope.data.attributes.positions_distribution_by_chain["base"],
            234.56
        );
    }

    #[test]
    fn position_envelope_parses() {
        let raw = serde_json::json!({
            "data": [{
                "type": "positions",
                "id": "p1",
                "attributes": {
                    "fungible_info": { "symbol": "USDC", "name": "USD Coin" },
                    "quantity": { "numeric": "42.5" },
                    "value": 42.5
                },
                "relationships": {
                    "chain": { "data": { "type": "chains", "id": "ethereum" } }
                }
            }]
        });
        let envelope: ListEnvelope<PositionData> = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.data.len(), 1);
        assert_eq!(envelope.data[0].attributes.fungible_info.symbol, "USDC");
    }

    #[test]
    fn transaction_envelope_tolerates_missing_fields() {
        let raw = serde_json::json!({
            "data": [{
                "type": "transactions",
                "id": "t1",
                "attributes": { "hash": "0xdead", "operation_type": "send", "status": "confirmed" }
            }]
        });
        let envelope: ListEnvelope<TransactionData> = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.data[0].attributes.hash, "0xdead");
        assert!(envelope.data[0].attributes.mined_at.is_none());
    }
}
