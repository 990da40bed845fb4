// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! Static chain registry.
//!
//! Every supported chain is a row in [`WALLET_CONFIGS`]. RPC URLs can be
//! overridden per chain via `<KEY>_RPC_URL` environment variables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ChainError;

/// Supported chain identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChainKey {
    Ethereum,
    Sepolia,
    Polygon,
    Base,
    Bitcoin,
    Solana,
    Tron,
    Aptos,
    Polkadot,
}

impl fmt::Display for ChainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChainKey::Ethereum => "ethereum",
            ChainKey::Sepolia => "sepolia",
            ChainKey::Polygon => "polygon",
            ChainKey::Base => "base",
            ChainKey::Bitcoin => "bitcoin",
            ChainKey::Solana => "solana",
            ChainKey::Tron => "tron",
            ChainKey::Aptos => "aptos",
            ChainKey::Polkadot => "polkadot",
        };
        f.write_str(s)
    }
}

impl FromStr for ChainKey {
    type Err = ChainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ethereum" => Ok(ChainKey::Ethereum),
            "sepolia" => Ok(ChainKey::Sepolia),
            "polygon" => Ok(ChainKey::Polygon),
            "base" => Ok(ChainKey::Base),
            "bitcoin" => Ok(ChainKey::Bitcoin),
            "solana" => Ok(ChainKey::Solana),
            "tron" => Ok(ChainKey::Tron),
            "aptos" => Ok(ChainKey::Aptos),
            "polkadot" => Ok(ChainKey::Polkadot),
            other => Err(ChainError::UnsupportedChain(other.to_string())),
        }
    }
}

/// Signature curve used by a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Curve {
    Secp256k1,
    Ed25519,
}

/// Address encoding scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressScheme {
    /// EIP-55 checksummed hex.
    EvmChecksum,
    /// Native segwit P2WPKH bech32.
    BitcoinP2wpkh,
    /// Base58 of the ed25519 public key.
    SolanaBase58,
    /// Base58check of 0x41-prefixed keccak address bytes.
    TronBase58Check,
    /// SHA3-256 authentication key, hex.
    AptosAuthKey,
    /// SS58 with the generic substrate prefix.
    Ss58,
}

/// Account kind for a derived wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// Externally-owned account (private-key wallet).
    Eoa,
    /// ERC-4337 smart account (contract wallet behind a factory).
    Erc4337,
}

/// Static configuration for one chain.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub key: ChainKey,
    /// Display name.
    pub name: &'static str,
    /// Native asset symbol.
    pub symbol: &'static str,
    /// Native asset decimals.
    pub decimals: u8,
    /// BIP-44 coin type (SLIP-0044).
    pub coin_type: u32,
    pub curve: Curve,
    pub scheme: AddressScheme,
    /// EVM chain id, for EVM chains only.
    pub evm_chain_id: Option<u64>,
    /// Default RPC endpoint.
    pub rpc_url: &'static str,
    /// Environment variable that overrides the RPC endpoint.
    pub rpc_env: &'static str,
    /// Block explorer base URL.
    pub explorer_url: &'static str,
    /// Whether ERC-4337 smart accounts are supported on this chain.
    pub supports_erc4337: bool,
}

impl ChainConfig {
    /// Whether this is an EVM chain.
    pub fn is_evm(&self) -> bool {
        self.evm_chain_id.is_some()
    }

    /// Resolve the RPC URL, honoring the env override.
    pub fn resolved_rpc_url(&self) -> String {
        crate::config::env_or_default(self.rpc_env, self.rpc_url)
    }

    /// Explorer URL for a transaction hash.
    pub fn explorer_tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url, tx_hash)
    }
}

/// The chain registry. One row per supported chain.
pub const WALLET_CONFIGS: &[ChainConfig] = &[
    ChainConfig {
        key: ChainKey::Ethereum,
        name: "Ethereum",
        symbol: "ETH",
        decimals: 18,
        coin_type: 60,
        curve: Curve::Secp256k1,
        scheme: AddressScheme::EvmChecksum,
        evm_chain_id: Some(1),
        rpc_url: "https://eth.llamarpc.com",
        rpc_env: "ETHEREUM_RPC_URL",
        explorer_url: "https://etherscan.io",
        supports_erc4337: true,
    },
    ChainConfig {
        key: ChainKey::Sepolia,
        name: "Sepolia Testnet",
        symbol: "ETH",
        decimals: 18,
        coin_type: 60,
        curve: Curve::Secp256k1,
        scheme: AddressScheme::EvmChecksum,
        evm_chain_id: Some(11155111),
        rpc_url: "https://rpc.sepolia.org",
        rpc_env: "SEPOLIA_RPC_URL",
        explorer_url: "https://sepolia.etherscan.io",
        supports_erc4337: true,
    },
    ChainConfig {
        key: ChainKey::Polygon,
        name: "Polygon",
        symbol: "POL",
        decimals: 18,
        coin_type: 60,
        curve: Curve::Secp256k1,
        scheme: AddressScheme::EvmChecksum,
        evm_chain_id: Some(137),
        rpc_url: "https://polygon-rpc.com",
        rpc_env: "POLYGON_RPC_URL",
        explorer_url: "https://polygonscan.com",
        supports_erc4337: true,
    },
    ChainConfig {
        key: ChainKey::Base,
        name: "Base",
        symbol: "ETH",
        decimals: 18,
        coin_type: 60,
        curve: Curve::Secp256k1,
        scheme: AddressScheme::EvmChecksum,
        evm_chain_id: Some(8453),
        rpc_url: "https://mainnet.base.org",
        rpc_env: "BASE_RPC_URL",
        explorer_url: "https://basescan.org",
        supports_erc4337: true,
    },
    ChainConfig {
        key: ChainKey::Bitcoin,
        name: "Bitcoin",
        symbol: "BTC",
        decimals: 8,
        coin_type: 0,
        curve: Curve::Secp256k1,
        scheme: AddressScheme::BitcoinP2wpkh,
        evm_chain_id: None,
        rpc_url: "https://blockstream.info/api",
        rpc_env: "BITCOIN_RPC_URL",
        explorer_url: "https://blockstream.info",
        supports_erc4337: false,
    },
    ChainConfig {
        key: ChainKey::Solana,
        name: "Solana",
        symbol: "SOL",
        decimals: 9,
        coin_type: 501,
        curve: Curve::Ed25519,
        scheme: AddressScheme::SolanaBase58,
        evm_chain_id: None,
        rpc_url: "https://api.mainnet-beta.solana.com",
        rpc_env: "SOLANA_RPC_URL",
        explorer_url: "https://solscan.io",
        supports_erc4337: false,
    },
    ChainConfig {
        key: ChainKey::Tron,
        name: "Tron",
        symbol: "TRX",
        decimals: 6,
        coin_type: 195,
        curve: Curve::Secp256k1,
        scheme: AddressScheme::TronBase58Check,
        evm_chain_id: None,
        rpc_url: "https://api.trongrid.io",
        rpc_env: "TRON_RPC_URL",
        explorer_url: "https://tronscan.org",
        supports_erc4337: false,
    },
    ChainConfig {
        key: ChainKey::Aptos,
        name: "Aptos",
        symbol: "APT",
        decimals: 8,
        coin_type: 637,
        curve: Curve::Ed25519,
        scheme: AddressScheme::AptosAuthKey,
        evm_chain_id: None,
        rpc_url: "https://fullnode.mainnet.aptoslabs.com/v1",
        rpc_env: "APTOS_RPC_URL",
        explorer_url: "https://explorer.aptoslabs.com",
        supports_erc4337: false,
    },
    ChainConfig {
        key: ChainKey::Polkadot,
        name: "Polkadot",
        symbol: "DOT",
        decimals: 10,
        coin_type: 354,
        curve: Curve::Ed25519,
        scheme: AddressScheme::Ss58,
        evm_chain_id: None,
        rpc_url: "https://rpc.polkadot.io",
        rpc_env: "POLKADOT_RPC_URL",
        explorer_url: "https://polkadot.subscan.io",
        supports_erc4337: false,
    },
];

/// Look up a chain by key.
pub fn chain_config(key: ChainKey) -> &'static ChainConfig {
    WALLET_CONFIGS
        .iter()
        .find(|c| c.key == key)
        .expect("every ChainKey has a registry row")
}

/// A known ERC-20 token.
#[derive(Debug, Clone)]
pub struct Erc20Token {
    pub chain: ChainKey,
    pub symbol: &'static str,
    pub name: &'static str,
    pub decimals: u8,
    pub address: &'static str,
}

/// ERC-20 tokens surfaced in balance responses by default.
pub const KNOWN_TOKENS: &[Erc20Token] = &[
    Erc20Token {
        chain: ChainKey::Ethereum,
        symbol: "USDC",
        name: "USD Coin",
        decimals: 6,
        address: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
    },
    Erc20Token {
        chain: ChainKey::Base,
        symbol: "USDC",
        name: "USD Coin",
        decimals: 6,
        address: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
    },
    Erc20Token {
        chain: ChainKey::Polygon,
        symbol: "USDC",
        name: "USD Coin",
        decimals: 6,
        address: "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359",
    },
];

/// Known tokens for one chain.
pub fn tokens_for_chain(key: ChainKey) -> Vec<&'static Erc20Token> {
    KNOWN_TOKENS.iter().filter(|t| t.chain == key).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_chain_key_has_exactly_one_row() {
        let keys: HashSet<ChainKey> = WALLET_CONFIGS.iter().map(|c| c.key).collect();
        assert_eq!(keys.len(), WALLET_CONFIGS.len(), "duplicate registry rows");

        for key in [
            ChainKey::Ethereum,
            ChainKey::Sepolia,
            ChainKey::Polygon,
            ChainKey::Base,
            ChainKey::Bitcoin,
            ChainKey::Solana,
            ChainKey::Tron,
            ChainKey::Aptos,
            ChainKey::Polkadot,
        ] {
            let _ = chain_config(key);
        }
    }

    #[test]
    fn chain_key_round_trips_through_strings() {
        for config in WALLET_CONFIGS {
            let parsed: ChainKey = config.key.to_string().parse().unwrap();
            assert_eq!(parsed, config.key);
        }
        assert!("dogecoin".parse::<ChainKey>().is_err());
    }

    #[test]
    fn evm_chains_have_chain_ids() {
        for config in WALLET_CONFIGS {
            match config.scheme {
                AddressScheme::EvmChecksum => {
                    assert!(config.is_evm(), "{} must carry a chain id", config.name)
                }
                _ => assert!(!config.is_evm(), "{} must not carry a chain id", config.name),
            }
        }
    }

    #[test]
    fn erc4337_only_on_evm_chains() {
        for config in WALLET_CONFIGS {
            if config.supports_erc4337 {
                assert!(config.is_evm());
            }
        }
    }

    #[test]
    fn ed25519_chains_use_hardened_only_schemes() {
        for config in WALLET_CONFIGS {
            if config.curve == Curve::Ed25519 {
                assert!(matches!(
                    config.scheme,
                    AddressScheme::SolanaBase58 | AddressScheme::AptosAuthKey | AddressScheme::Ss58
                ));
            }
        }
    }

    #[test]
    fn explorer_tx_url_joins_hash() {
        let eth = chain_config(ChainKey::Ethereum);
        assert_eq!(
            eth.explorer_tx_url("0xabc"),
            "https://etherscan.io/tx/0xabc"
        );
    }

    #[test]
    fn known_tokens_reference_evm_chains() {
        for token in KNOWN_TOKENS {
            assert!(chain_config(token.chain).is_evm());
            assert!(token.address.starts_with("0x"));
        }
        assert!(!tokens_for_chain(ChainKey::Ethereum).is_empty());
        assert!(tokens_for_chain(ChainKey::Bitcoin).is_empty());
    }
}
