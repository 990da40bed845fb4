// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! Chain registry, deterministic key derivation, and EVM client.

pub mod derive;
pub mod evm;
pub mod registry;

pub use derive::{derive_wallet, evm_signer, generate_mnemonic, parse_mnemonic, DerivedWallet};
pub use evm::{format_units, parse_units, EvmClient, GasEstimate, SendResult, TokenBalance, TxSender, WalletBalances};
pub use registry::{
    chain_config, tokens_for_chain, AccountKind, ChainConfig, ChainKey, Curve, Erc20Token,
    WALLET_CONFIGS,
};

/// Errors from chain derivation and RPC operations.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("unsupported chain: {0}")]
    UnsupportedChain(String),

    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("derivation failed: {0}")]
    Derivation(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("contract error: {0}")]
    Contract(String),

    #[error("transaction failed: {0}")]
    TransactionFailed(String),
}
