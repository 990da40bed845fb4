// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Beacon Labs

//! EVM chain client: balances, ERC-20 reads, EIP-1559 sends, and ERC-4337
//! counterfactual account resolution.

use std::str::FromStr;

use alloy::{
    network::{Ethereum, EthereumWallet},
    primitives::{Address, U256},
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    rpc::types::TransactionRequest,
    sol,
    sol_types::SolCall,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::registry::{tokens_for_chain, ChainConfig};
use super::ChainError;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function name() external view returns (string);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

sol! {
    #[sol(rpc)]
    interface IAccountFactory {
        function getAddress(address owner, uint256 salt) external view returns (address);
    }
}

/// HTTP provider type (with all fillers).
type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// Signing HTTP provider type (fillers + wallet).
type SigningProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider<Ethereum>,
>;

/// Token balance information.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenBalance {
    /// Token symbol (e.g. "ETH", "USDC").
    pub symbol: String,
    /// Token name.
    pub name: String,
    /// Balance in smallest unit.
    pub balance_raw: String,
    /// Balance formatted with decimals.
    pub balance_formatted: String,
    /// Number of decimals.
    pub decimals: u8,
    /// Contract address (None for the native asset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
}

/// Balances for one wallet on one chain.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WalletBalances {
    /// Wallet address.
    pub address: String,
    /// Chain key.
    pub chain: String,
    /// EVM chain ID.
    pub chain_id: u64,
    /// Native asset balance.
    pub native_balance: TokenBalance,
    /// ERC-20 balances for known tokens.
    pub token_balances: Vec<TokenBalance>,
}

/// Read-only EVM chain client.
pub struct EvmClient {
    config: &'static ChainConfig,
    provider: HttpProvider,
}

impl EvmClient {
    /// Create a client for the given registry chain.
    pub fn new(config: &'static ChainConfig) -> Result<Self, ChainError> {
        if !config.is_evm() {
            return Err(ChainError::UnsupportedChain(format!(
                "{} is not an EVM chain",
                config.name
            )));
        }

        let url: url::Url = config
            .resolved_rpc_url()
            .parse()
            .map_err(|e: url::ParseError| ChainError::InvalidRpcUrl(e.to_string()))?;
        let provider = ProviderBuilder::new().connect_http(url);

        Ok(Self { config, provider })
    }

    /// Get the native balance for an address.
    pub async fn get_native_balance(&self, address: &str) -> Result<TokenBalance, ChainError> {
        let addr = parse_address(address)?;
        let balance = self
            .provider
            .get_balance(addr)
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))?;

        Ok(TokenBalance {
            symbol: self.config.symbol.to_string(),
            name: self.config.name.to_string(),
            balance_raw: balance.to_string(),
            balance_formatted: format_units(balance, self.config.decimals),
            decimals: self.config.decimals,
            contract_address: None,
        })
    }

    /// Get an ERC-20 balance for an address.
    pub async fn get_token_balance(
        &self,
        wallet_address: &str,
        token_address: &str,
    ) -> Result<TokenBalance, ChainError> {
        let wallet = parse_address(wallet_address)?;
        let token = parse_address(token_address)?;
        let contract = IERC20::new(token, self.provider.clone());

        let name: String = contract
            .name()
            .call()
            .await
            .unwrap_or_else(|_| "Unknown".to_string());
        let symbol: String = contract
            .symbol()
            .call()
            .await
            .unwrap_or_else(|_| "???".to_string());
        let decimals: u8 = contract.decimals().call().await.unwrap_or(18);

        let balance: U256 = contract
            .balanceOf(wallet)
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))?;

        Ok(TokenBalance {
            symbol,
            name,
            balance_raw: balance.to_string(),
            balance_formatted: format_units(balance, decimals),
            decimals,
            contract_address: Some(format!("{token:?}")),
        })
    }

    /// Get native + known-token balances for a wallet.
    pub async fn get_wallet_balances(
        &self,
        wallet_address: &str,
    ) -> Result<WalletBalances, ChainError> {
        let native_balance = self.get_native_balance(wallet_address).await?;

        let mut token_balances = Vec::new();
        for token in tokens_for_chain(self.config.key) {
            match self.get_token_balance(wallet_address, token.address).await {
                Ok(balance) => token_balances.push(balance),
                Err(e) => {
                    tracing::warn!(token = token.symbol, error = %e, "Failed to read token balance");
                }
            }
        }

        Ok(WalletBalances {
            address: wallet_address.to_string(),
            chain: self.config.key.to_string(),
            chain_id: self.config.evm_chain_id.unwrap_or_default(),
            native_balance,
            token_balances,
        })
    }

    /// Get the current block number.
    pub async fn get_block_number(&self) -> Result<u64, ChainError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| ChainError::Rpc(e.to_string()))
    }

    /// Resolve the counterfactual ERC-4337 account address for an owner.
    ///
    /// Calls `getAddress(owner, salt)` on the account factory; the factory
    /// computes the CREATE2 address whether or not the account is deployed.
    pub async fn counterfactual_account(
        &self,
        factory_address: &str,
        owner: &str,
        salt: u64,
    ) -> Result<String, ChainError> {
        let factory = parse_address(factory_address)?;
        let owner = parse_address(owner)?;
        let contract = IAccountFactory::new(factory, self.provider.clone());

        let account: Address = contract
            .getAddress(owner, U256::from(salt))
            .call()
            .await
            .map_err(|e| ChainError::Contract(e.to_string()))?;

        Ok(account.to_checksum(None))
    }

    /// Get the transaction status by checking for a receipt.
    pub async fn get_transaction_status(
        &self,
        tx_hash: &str,
    ) -> Result<Option<TxReceipt>, ChainError> {
        let hash = tx_hash
            .parse()
            .map_err(|e| ChainError::InvalidAddress(format!("invalid tx hash: {e}")))?;

        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(|e| ChainError::Rpc(format!("failed to get receipt: {e}")))?;

        Ok(receipt.map(|r| TxReceipt {
            block_number: r.block_number.unwrap_or(0),
            gas_used: r.gas_used as u64,
            success: r.status(),
        }))
    }

    /// Get the chain configuration.
    pub fn config(&self) -> &'static ChainConfig {
        self.config
    }
}

/// Gas estimation result.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GasEstimate {
    /// Estimated gas limit.
    pub gas_limit: u64,
    /// Current max fee per gas (base fee + priority fee).
    pub max_fee_per_gas: u128,
    /// Max priority fee per gas (tip).
    pub max_priority_fee_per_gas: u128,
    /// Total estimated cost in wei.
    pub estimated_cost_wei: String,
}

/// Transaction send result.
#[derive(Debug, Clone)]
pub struct SendResult {
    /// Transaction hash.
    pub tx_hash: String,
    /// Explorer URL for the transaction.
    pub explorer_url: String,
}

/// Transaction receipt after confirmation.
#[derive(Debug, Clone)]
pub struct TxReceipt {
    pub block_number: u64,
    pub gas_used: u64,
    pub success: bool,
}

/// Sending EVM client, bound to a signer.
pub struct TxSender {
    config: &'static ChainConfig,
    provider: SigningProvider,
}

impl TxSender {
    /// Create a sender for the given chain and wallet.
    pub fn new(config: &'static ChainConfig, wallet: EthereumWallet) -> Result<Self, ChainError> {
        if !config.is_evm() {
            return Err(ChainError::UnsupportedChain(format!(
                "{} is not an EVM chain",
                config.name
            )));
        }

        let url: url::Url = config
            .resolved_rpc_url()
            .parse()
            .map_err(|e: url::ParseError| ChainError::InvalidRpcUrl(e.to_string()))?;
        let provider = ProviderBuilder::new().wallet(wallet).connect_http(url);

        Ok(Self { config, provider })
    }

    /// Estimate gas for a native transfer.
    pub async fn estimate_native_transfer(
        &self,
        from: &str,
        to: &str,
        amount_wei: U256,
    ) -> Result<GasEstimate, ChainError> {
        let tx = TransactionRequest::default()
            .from(parse_address(from)?)
            .to(parse_address(to)?)
            .value(amount_wei);
        self.estimate_gas_for_tx(tx).await
    }

    /// Estimate gas for an ERC-20 transfer.
    pub async fn estimate_token_transfer(
        &self,
        from: &str,
        to: &str,
        token_address: &str,
        amount: U256,
    ) -> Result<GasEstimate, ChainError> {
        let call = IERC20::transferCall {
            to: parse_address(to)?,
            amount,
        };
        let tx = TransactionRequest::default()
            .from(parse_address(from)?)
            .to(parse_address(token_address)?)
            .input(call.abi_encode().into());
        self.estimate_gas_for_tx(tx).await
    }

    async fn estimate_gas_for_tx(&self, tx: TransactionRequest) -> Result<GasEstimate, ChainError> {
        let gas_limit = self
            .provider
            .estimate_gas(tx)
            .await
            .map_err(|e| ChainError::Rpc(format!("gas estimation failed: {e}")))?;

        let (max_fee_per_gas, max_priority_fee_per_gas) = self.get_gas_prices().await?;
        let estimated_cost_wei = U256::from(gas_limit) * U256::from(max_fee_per_gas);

        Ok(GasEstimate {
            gas_limit,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            estimated_cost_wei: estimated_cost_wei.to_string(),
        })
    }

    /// Get current gas prices from the network.
    async fn get_gas_prices(&self) -> Result<(u128, u128), ChainError> {
        let block = self
            .provider
            .get_block_by_number(alloy::eips::BlockNumberOrTag::Latest)
            .await
            .map_err(|e| ChainError::Rpc(format!("failed to get block: {e}")))?
            .ok_or_else(|| ChainError::Rpc("no latest block".to_string()))?;

        let base_fee: u128 = block
            .header
            .base_fee_per_gas
            .map(|f| f as u128)
            .unwrap_or(25_000_000_000u128);

        let priority_fee: u128 = 1_500_000_000; // 1.5 gwei

        // Max fee = 2 * base_fee + priority_fee (allows for base fee increase)
        let max_fee = base_fee.saturating_mul(2).saturating_add(priority_fee);
        Ok((max_fee, priority_fee))
    }

    /// Send a native transfer.
    pub async fn send_native(
        &self,
        to: &str,
        amount_wei: U256,
        gas_limit: Option<u64>,
    ) -> Result<SendResult, ChainError> {
        let (max_fee_per_gas, priority_fee) = self.get_gas_prices().await?;

        let mut tx = TransactionRequest::default()
            .to(parse_address(to)?)
            .value(amount_wei)
            .max_fee_per_gas(max_fee_per_gas)
            .max_priority_fee_per_gas(priority_fee);
        if let Some(limit) = gas_limit {
            tx = tx.gas_limit(limit);
        }

        self.send_transaction(tx).await
    }

    /// Send an ERC-20 transfer.
    pub async fn send_token(
        &self,
        to: &str,
        token_address: &str,
        amount: U256,
        gas_limit: Option<u64>,
    ) -> Result<SendResult, ChainError> {
        let call = IERC20::transferCall {
            to: parse_address(to)?,
            amount,
        };
        let (max_fee_per_gas, priority_fee) = self.get_gas_prices().await?;

        let mut tx = TransactionRequest::default()
            .to(parse_address(token_address)?)
            .input(call.abi_encode().into())
            .max_fee_per_gas(max_fee_per_gas)
            .max_priority_fee_per_gas(priority_fee);
        if let Some(limit) = gas_limit {
            tx = tx.gas_limit(limit);
        }

        self.send_transaction(tx).await
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<SendResult, ChainError> {
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| ChainError::TransactionFailed(format!("failed to send: {e}")))?;

        let tx_hash = format!("{:?}", pending.tx_hash());
        Ok(SendResult {
            explorer_url: self.config.explorer_tx_url(&tx_hash),
            tx_hash,
        })
    }

}

fn parse_address(address: &str) -> Result<Address, ChainError> {
    Address::from_str(address).map_err(|e| ChainError::InvalidAddress(e.to_string()))
}

/// Parse a human-readable amount to smallest units.
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256, ChainError> {
    let parts: Vec<&str> = amount.split('.').collect();
    if parts.len() > 2 || parts[0].is_empty() {
        return Err(ChainError::InvalidAmount(amount.to_string()));
    }

    let whole = parts[0]
        .parse::<u128>()
        .map_err(|_| ChainError::InvalidAmount(amount.to_string()))?;

    let decimal_part = if parts.len() == 2 {
        let dec_str = parts[1];
        if dec_str.len() > decimals as usize {
            return Err(ChainError::InvalidAmount(format!(
                "too many decimal places (max {decimals})"
            )));
        }
        let padded = format!("{dec_str:0<width$}", width = decimals as usize);
        padded
            .parse::<u128>()
            .map_err(|_| ChainError::InvalidAmount(amount.to_string()))?
    } else {
        0u128
    };

    let multiplier = 10u128.pow(decimals as u32);
    let total = whole
        .checked_mul(multiplier)
        .and_then(|w| w.checked_add(decimal_part))
        .ok_or_else(|| ChainError::InvalidAmount("amount overflow".to_string()))?;

    Ok(U256::from(total))
}

/// Format smallest units to a human-readable amount.
pub fn format_units(amount: U256, decimals: u8) -> String {
    if amount.is_zero() {
        return "0".to_string();
    }

    let divisor = U256::from(10u64).pow(U256::from(decimals));
    let whole = amount / divisor;
    let remainder = amount % divisor;

    if remainder.is_zero() {
        whole.to_string()
    } else {
        let decimal_str = format!("{remainder:0>width$}", width = decimals as usize);
        let trimmed = decimal_str.trim_end_matches('0');
        if trimmed.is_empty() {
            whole.to_string()
        } else {
            format!("{whole}.{trimmed}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::registry::{chain_config, ChainKey};

    #[test]
    fn parse_units_whole_and_decimal() {
        assert_eq!(
            parse_units("1", 18).unwrap(),
            U256::from(1_000_000_000_000_000_000u64)
        );
        assert_eq!(
            parse_units("1.5", 18).unwrap(),
            U256::from(1_500_000_000_000_000_000u64)
        );
        assert_eq!(parse_units("1.5", 6).unwrap(), U256::from(1_500_000u64));
        assert_eq!(
            parse_units("0.001", 18).unwrap(),
            U256::from(1_000_000_000_000_000u64)
        );
    }

    #[test]
    fn parse_units_rejects_garbage() {
        assert!(parse_units("1.2.3", 18).is_err());
        assert!(parse_units("abc", 18).is_err());
        assert!(parse_units(".5", 18).is_err());
        // more fractional digits than the asset carries
        assert!(parse_units("1.1234567", 6).is_err());
    }

    #[test]
    fn format_units_round_trips() {
        assert_eq!(
            format_units(U256::from(1_000_000_000_000_000_000u64), 18),
            "1"
        );
        assert_eq!(
            format_units(U256::from(1_500_000_000_000_000_000u64), 18),
            "1.5"
        );
        assert_eq!(format_units(U256::from(1_500_000u64), 6), "1.5");
        assert_eq!(format_units(U256::ZERO, 18), "0");
    }

    #[test]
    fn client_rejects_non_evm_chains() {
        let btc = chain_config(ChainKey::Bitcoin);
        assert!(matches!(
            EvmClient::new(btc),
            Err(ChainError::UnsupportedChain(_))
        ));
    }

    #[test]
    fn client_builds_for_evm_chains() {
        let eth = chain_config(ChainKey::Ethereum);
        let client = EvmClient::new(eth).unwrap();
        assert_eq!(client.config().evm_chain_id, Some(1));
    }
}
