// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! Deterministic key derivation from a user's BIP-39 mnemonic.
//!
//! secp256k1 chains (EVM, Bitcoin, Tron) derive through BIP-32 at the
//! registry's BIP-44 path. ed25519 chains (Solana, Aptos, Substrate) derive
//! through SLIP-0010, which only supports hardened steps.
//!
//! Derivation is pure: same mnemonic + chain + index always yields the same
//! address.

use std::str::FromStr;

use alloy::primitives::{keccak256, Address};
use alloy::signers::local::PrivateKeySigner;
use bip32::{DerivationPath, XPrv};
use bip39::{Language, Mnemonic};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha512;
use utoipa::ToSchema;

use super::registry::{AddressScheme, ChainConfig, ChainKey, Curve};
use super::ChainError;

/// SLIP-0010 master key derivation domain for ed25519.
const ED25519_SEED_KEY: &[u8] = b"ed25519 seed";

/// Generic substrate SS58 address prefix.
const SS58_SUBSTRATE_PREFIX: u8 = 42;

/// A wallet derived for one chain at one index.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DerivedWallet {
    /// Chain the wallet belongs to.
    pub chain: ChainKey,
    /// Encoded address in the chain's native format.
    pub address: String,
    /// Hex-encoded public key.
    pub public_key: String,
    /// Derivation path used.
    pub derivation_path: String,
    /// Address index within the account.
    pub index: u32,
}

/// Parse and validate a BIP-39 mnemonic.
pub fn parse_mnemonic(phrase: &str) -> Result<Mnemonic, ChainError> {
    Mnemonic::parse_in(Language::English, phrase)
        .map_err(|e| ChainError::InvalidMnemonic(e.to_string()))
}

/// Generate a fresh 12-word mnemonic.
pub fn generate_mnemonic() -> Result<String, ChainError> {
    use rand::RngCore;

    let mut entropy = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut entropy);
    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
        .map_err(|e| ChainError::InvalidMnemonic(e.to_string()))?;
    Ok(mnemonic.to_string())
}

/// The derivation path for a chain at an address index.
pub fn derivation_path(config: &ChainConfig, index: u32) -> String {
    match config.scheme {
        // BIP-84 native segwit
        AddressScheme::BitcoinP2wpkh => format!("m/84'/{}'/0'/0/{}", config.coin_type, index),
        // Phantom-style Solana path
        AddressScheme::SolanaBase58 => format!("m/44'/{}'/{}'/0'", config.coin_type, index),
        // Fully-hardened ed25519 paths
        AddressScheme::AptosAuthKey | AddressScheme::Ss58 => {
            format!("m/44'/{}'/{}'/0'/0'", config.coin_type, index)
        }
        _ => format!("m/44'/{}'/0'/0/{}", config.coin_type, index),
    }
}

/// Derive the wallet for a chain at an address index.
pub fn derive_wallet(
    phrase: &str,
    config: &ChainConfig,
    index: u32,
) -> Result<DerivedWallet, ChainError> {
    let mnemonic = parse_mnemonic(phrase)?;
    let seed = mnemonic.to_seed("");
    let path = derivation_path(config, index);

    let (public_key, address) = match config.curve {
        Curve::Secp256k1 => {
            let xprv = derive_secp256k1(&seed, &path)?;
            let verifying_key = xprv.public_key();
            let compressed = verifying_key.public_key().to_encoded_point(true);
            let uncompressed = verifying_key.public_key().to_encoded_point(false);

            let address = match config.scheme {
                AddressScheme::EvmChecksum => evm_address(uncompressed.as_bytes()),
                AddressScheme::BitcoinP2wpkh => bitcoin_p2wpkh_address(compressed.as_bytes())?,
                AddressScheme::TronBase58Check => tron_address(uncompressed.as_bytes()),
                _ => {
                    return Err(ChainError::Derivation(format!(
                        "secp256k1 chain {} has a non-secp address scheme",
                        config.name
                    )))
                }
            };
            (alloy::hex::encode(compressed.as_bytes()), address)
        }
        Curve::Ed25519 => {
            let secret = slip10_ed25519(&seed, &path)?;
            let signing_key = ed25519_dalek::SigningKey::from_bytes(&secret);
            let public = signing_key.verifying_key().to_bytes();

            let address = match config.scheme {
                AddressScheme::SolanaBase58 => bs58::encode(public).into_string(),
                AddressScheme::AptosAuthKey => aptos_address(&public),
                AddressScheme::Ss58 => ss58_address(&public),
                _ => {
                    return Err(ChainError::Derivation(format!(
                        "ed25519 chain {} has a non-ed25519 address scheme",
                        config.name
                    )))
                }
            };
            (alloy::hex::encode(public), address)
        }
    };

    Ok(DerivedWallet {
        chain: config.key,
        address,
        public_key,
        derivation_path: path,
        index,
    })
}

/// Derive the EVM signing key for a user at an address index.
///
/// Used for sends, message signing, and clearnode session authentication.
pub fn evm_signer(phrase: &str, index: u32) -> Result<PrivateKeySigner, ChainError> {
    let mnemonic = parse_mnemonic(phrase)?;
    let seed = mnemonic.to_seed("");
    let path = format!("m/44'/60'/0'/0/{index}");
    let xprv = derive_secp256k1(&seed, &path)?;
    PrivateKeySigner::from_slice(xprv.private_key().to_bytes().as_slice())
        .map_err(|e| ChainError::Derivation(e.to_string()))
}

/// Walk a BIP-32 path over the seed.
fn derive_secp256k1(seed: &[u8], path: &str) -> Result<XPrv, ChainError> {
    let derivation_path = DerivationPath::from_str(path)
        .map_err(|e| ChainError::Derivation(format!("invalid path {path}: {e}")))?;

    let mut xprv = XPrv::new(seed).map_err(|e| ChainError::Derivation(e.to_string()))?;
    for child_number in derivation_path.into_iter() {
        xprv = xprv
            .derive_child(child_number)
            .map_err(|e| ChainError::Derivation(e.to_string()))?;
    }
    Ok(xprv)
}

/// SLIP-0010 ed25519 derivation. Every step must be hardened.
fn slip10_ed25519(seed: &[u8], path: &str) -> Result<[u8; 32], ChainError> {
    let indices = parse_hardened_path(path)?;

    let mut mac = Hmac::<Sha512>::new_from_slice(ED25519_SEED_KEY)
        .map_err(|e| ChainError::Derivation(e.to_string()))?;
    mac.update(seed);
    let digest = mac.finalize().into_bytes();

    let mut key = [0u8; 32];
    let mut chain_code = [0u8; 32];
    key.copy_from_slice(&digest[..32]);
    chain_code.copy_from_slice(&digest[32..]);

    for index in indices {
        let hardened = index | 0x8000_0000;
        let mut mac = Hmac::<Sha512>::new_from_slice(&chain_code)
            .map_err(|e| ChainError::Derivation(e.to_string()))?;
        mac.update(&[0u8]);
        mac.update(&key);
        mac.update(&hardened.to_be_bytes());
        let digest = mac.finalize().into_bytes();
        key.copy_from_slice(&digest[..32]);
        chain_code.copy_from_slice(&digest[32..]);
    }

    Ok(key)
}

/// Parse a fully-hardened path like `m/44'/501'/0'/0'` into raw indices.
fn parse_hardened_path(path: &str) -> Result<Vec<u32>, ChainError> {
    let mut indices = Vec::new();
    for (i, segment) in path.split('/').enumerate() {
        if i == 0 {
            if segment != "m" {
                return Err(ChainError::Derivation(format!("path must start with m: {path}")));
            }
            continue;
        }
        let raw = segment.strip_suffix('\'').ok_or_else(|| {
            ChainError::Derivation(format!("ed25519 derivation requires hardened steps: {path}"))
        })?;
        let index: u32 = raw
            .parse()
            .map_err(|_| ChainError::Derivation(format!("bad path segment {segment}")))?;
        indices.push(index);
    }
    Ok(indices)
}

/// keccak256 of the uncompressed public key (sans 0x04 prefix), last 20 bytes,
/// EIP-55 checksummed.
fn evm_address(uncompressed: &[u8]) -> String {
    let hash = keccak256(&uncompressed[1..]);
    Address::from_slice(&hash[12..]).to_checksum(None)
}

/// Native segwit P2WPKH address on mainnet.
fn bitcoin_p2wpkh_address(compressed: &[u8]) -> Result<String, ChainError> {
    let public_key = bitcoin::secp256k1::PublicKey::from_slice(compressed)
        .map_err(|e| ChainError::Derivation(e.to_string()))?;
    let compressed_public_key = bitcoin::key::CompressedPublicKey(public_key);
    Ok(bitcoin::Address::p2wpkh(&compressed_public_key, bitcoin::Network::Bitcoin).to_string())
}

/// Tron address: 0x41-prefixed keccak address bytes, base58check encoded.
fn tron_address(uncompressed: &[u8]) -> String {
    let hash = keccak256(&uncompressed[1..]);
    let mut payload = Vec::with_capacity(21);
    payload.push(0x41);
    payload.extend_from_slice(&hash[12..]);
    bs58::encode(payload).with_check().into_string()
}

/// Aptos single-key account address: sha3-256(pubkey || 0x00).
fn aptos_address(public: &[u8; 32]) -> String {
    use sha3::{Digest, Sha3_256};

    let mut hasher = Sha3_256::new();
    hasher.update(public);
    hasher.update([0u8]); // ed25519 scheme identifier
    format!("0x{}", alloy::hex::encode(hasher.finalize()))
}

/// SS58 address with the generic substrate prefix.
fn ss58_address(public: &[u8; 32]) -> String {
    use blake2::{Blake2b512, Digest};

    let mut data = Vec::with_capacity(1 + 32 + 2);
    data.push(SS58_SUBSTRATE_PREFIX);
    data.extend_from_slice(public);

    let mut hasher = Blake2b512::new();
    hasher.update(b"SS58PRE");
    hasher.update(&data);
    let checksum = hasher.finalize();

    data.extend_from_slice(&checksum[..2]);
    bs58::encode(data).into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::registry::{chain_config, WALLET_CONFIGS};

    /// Standard BIP-39 test mnemonic.
    const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn evm_derivation_matches_known_vector() {
        let config = chain_config(ChainKey::Ethereum);
        let wallet = derive_wallet(TEST_MNEMONIC, config, 0).unwrap();
        assert_eq!(
            wallet.address,
            "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
        );
        assert_eq!(wallet.derivation_path, "m/44'/60'/0'/0/0");
    }

    #[test]
    fn bitcoin_derivation_matches_bip84_vector() {
        let config = chain_config(ChainKey::Bitcoin);
        let wallet = derive_wallet(TEST_MNEMONIC, config, 0).unwrap();
        assert_eq!(
            wallet.address,
            "bc1qcr8te4kr609gcawutmrza0j4xv80jy8z306fyu"
        );
        assert_eq!(wallet.derivation_path, "m/84'/0'/0'/0/0");
    }

    #[test]
    fn evm_signer_address_matches_derived_wallet() {
        let config = chain_config(ChainKey::Ethereum);
        let wallet = derive_wallet(TEST_MNEMONIC, config, 0).unwrap();
        let signer = evm_signer(TEST_MNEMONIC, 0).unwrap();
        assert_eq!(signer.address().to_checksum(None), wallet.address);
    }

    #[test]
    fn derivation_is_deterministic_across_all_chains() {
        for config in WALLET_CONFIGS {
            let first = derive_wallet(TEST_MNEMONIC, config, 0).unwrap();
            let second = derive_wallet(TEST_MNEMONIC, config, 0).unwrap();
            assert_eq!(first.address, second.address, "chain {}", config.name);
            assert_eq!(first.public_key, second.public_key);
        }
    }

    #[test]
    fn addresses_differ_across_chains_and_indices() {
        let mut addresses = std::collections::HashSet::new();
        for config in WALLET_CONFIGS {
            for index in 0..2 {
                let wallet = derive_wallet(TEST_MNEMONIC, config, index).unwrap();
                assert!(
                    addresses.insert(wallet.address.clone()),
                    "duplicate address for {} index {index}",
                    config.name
                );
            }
        }
    }

    #[test]
    fn solana_address_is_32_byte_base58() {
        let config = chain_config(ChainKey::Solana);
        let wallet = derive_wallet(TEST_MNEMONIC, config, 0).unwrap();
        let decoded = bs58::decode(&wallet.address).into_vec().unwrap();
        assert_eq!(decoded.len(), 32);
    }

    #[test]
    fn tron_address_is_base58check_with_prefix() {
        let config = chain_config(ChainKey::Tron);
        let wallet = derive_wallet(TEST_MNEMONIC, config, 0).unwrap();
        assert!(wallet.address.starts_with('T'));

        let decoded = bs58::decode(&wallet.address)
            .with_check(None)
            .into_vec()
            .unwrap();
        assert_eq!(decoded.len(), 21);
        assert_eq!(decoded[0], 0x41);
    }

    #[test]
    fn aptos_address_is_hex_auth_key() {
        let config = chain_config(ChainKey::Aptos);
        let wallet = derive_wallet(TEST_MNEMONIC, config, 0).unwrap();
        assert!(wallet.address.starts_with("0x"));
        assert_eq!(wallet.address.len(), 66);
    }

    #[test]
    fn polkadot_address_is_valid_ss58() {
        let config = chain_config(ChainKey::Polkadot);
        let wallet = derive_wallet(TEST_MNEMONIC, config, 0).unwrap();
        let decoded = bs58::decode(&wallet.address).into_vec().unwrap();
        // prefix + 32-byte key + 2-byte checksum
        assert_eq!(decoded.len(), 35);
        assert_eq!(decoded[0], SS58_SUBSTRATE_PREFIX);
    }

    #[test]
    fn invalid_mnemonic_is_rejected() {
        let config = chain_config(ChainKey::Ethereum);
        let result = derive_wallet("not a mnemonic at all", config, 0);
        assert!(matches!(result, Err(ChainError::InvalidMnemonic(_))));
    }

    #[test]
    fn generated_mnemonics_are_valid_and_unique() {
        let first = generate_mnemonic().unwrap();
        let second = generate_mnemonic().unwrap();
        assert_eq!(first.split_whitespace().count(), 12);
        assert_ne!(first, second);
        parse_mnemonic(&first).unwrap();
    }

    #[test]
    fn hardened_path_parser_rejects_soft_steps() {
        assert!(parse_hardened_path("m/44'/501'/0'/0'").is_ok());
        assert!(parse_hardened_path("m/44'/501'/0'/0").is_err());
        assert!(parse_hardened_path("x/44'").is_err());
    }
}
