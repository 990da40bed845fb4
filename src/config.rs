// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for wallet/session storage | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `AUTH_JWT_SECRET` | HS256 secret for bearer-token verification | Dev mode when unset |
//! | `AUTH_ISSUER` | Expected JWT issuer claim | Optional |
//! | `CLEARNODE_URL` | Yellow Network clearnode RPC endpoint | `https://clearnet-sandbox.yellow.com/rpc` |
//! | `ZERION_API_KEY` | Zerion indexer API key | Indexer routes 503 when unset |
//! | `ZERION_API_URL` | Zerion API base URL | `https://api.zerion.io` |
//! | `<CHAIN>_RPC_URL` | Per-chain RPC override (e.g. `ETHEREUM_RPC_URL`) | Registry default |
//! | `ERC4337_FACTORY` | Smart-account factory address for counterfactual lookup | v0.6 SimpleAccount factory |
//! | `INDEXER_ENABLED` | Run the background transfer indexer (`true`/`false`) | `false` |
//! | `INDEXER_CHAIN` | Chain key the indexer follows | `sepolia` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;

/// Environment variable name for the data directory path.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Default data directory when `DATA_DIR` is unset.
pub const DEFAULT_DATA_DIR: &str = "/data";

const DEFAULT_CLEARNODE_URL: &str = "https://clearnet-sandbox.yellow.com/rpc";

/// v0.6 SimpleAccount factory, deployed at the same address on all
/// major EVM chains via deterministic deployment.
const DEFAULT_ERC4337_FACTORY: &str = "0x9406Cc6185a346906296840746125a0E44976454";

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Root directory for file storage.
    pub data_dir: String,
    /// HS256 secret for JWT verification. `None` enables dev mode
    /// (structure-only token validation).
    pub jwt_secret: Option<String>,
    /// Expected `iss` claim, when set.
    pub jwt_issuer: Option<String>,
    /// Yellow Network clearnode endpoint.
    pub clearnode_url: String,
    /// Zerion API key, when configured.
    pub zerion_api_key: Option<String>,
    /// ERC-4337 account factory address.
    pub erc4337_factory: String,
    /// Whether the background transfer indexer runs.
    pub indexer_enabled: bool,
    /// Chain key the indexer follows.
    pub indexer_chain: String,
}

impl AppConfig {
    /// Load configuration from the environment.
    pub fn from_env() -> Self {
        Self {
            data_dir: env_or_default(DATA_DIR_ENV, DEFAULT_DATA_DIR),
            jwt_secret: env::var("AUTH_JWT_SECRET").ok().filter(|s| !s.is_empty()),
            jwt_issuer: env::var("AUTH_ISSUER").ok().filter(|s| !s.is_empty()),
            clearnode_url: env_or_default("CLEARNODE_URL", DEFAULT_CLEARNODE_URL),
            zerion_api_key: env::var("ZERION_API_KEY").ok().filter(|s| !s.is_empty()),
            erc4337_factory: env_or_default("ERC4337_FACTORY", DEFAULT_ERC4337_FACTORY),
            indexer_enabled: env::var("INDEXER_ENABLED")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
            indexer_chain: env_or_default("INDEXER_CHAIN", "sepolia"),
        }
    }
}

/// Read an environment variable, falling back to a default.
pub fn env_or_default(name: &str, default: &str) -> String {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_default_falls_back_on_missing_or_blank() {
        assert_eq!(env_or_default("BEACON_TEST_UNSET_VAR", "fallback"), "fallback");

        std::env::set_var("BEACON_TEST_BLANK_VAR", "   ");
        assert_eq!(env_or_default("BEACON_TEST_BLANK_VAR", "fallback"), "fallback");
        std::env::remove_var("BEACON_TEST_BLANK_VAR");
    }

    #[test]
    fn env_or_default_returns_set_value() {
        std::env::set_var("BEACON_TEST_SET_VAR", "value");
        assert_eq!(env_or_default("BEACON_TEST_SET_VAR", "fallback"), "value");
        std::env::remove_var("BEACON_TEST_SET_VAR");
    }
}
