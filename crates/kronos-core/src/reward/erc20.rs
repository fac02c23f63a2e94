//! ============================================================================
//! ERC-20 Transfer - Treasury-signed token transfer via alloy
//! ============================================================================
//! Signs locally with the treasury key (never leaves the process), submits a
//! single `transfer(to, amount)` call and waits for one confirmation.
//! Before signing, the RPC endpoint must report the configured chain id and
//! the token must report the configured decimals.
//! ============================================================================

use alloy::network::{EthereumWallet, ReceiptResponse};
use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::{debug, info};

use super::TokenTransfer;
use crate::session::validate_address;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function transfer(address to, uint256 amount) external returns (bool);
        function decimals() external view returns (uint8);
    }
}

/// Treasury account sending one ERC-20 token
pub struct Erc20Transfer {
    signer: PrivateKeySigner,
    rpc_url: reqwest::Url,
    token: Address,
    chain_id: u64,
    decimals: u8,
}

impl Erc20Transfer {
    /// Parse the treasury key, RPC URL and token address up front
    pub fn new(
        treasury_private_key: &str,
        rpc_url: &str,
        token: &str,
        chain_id: u64,
        decimals: u8,
    ) -> Result<Self> {
        let signer: PrivateKeySigner = treasury_private_key
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid treasury private key: {}", e))?;
        let rpc_url = rpc_url
            .parse()
            .map_err(|e| anyhow!("Invalid RPC URL {}: {}", rpc_url, e))?;
        let token = validate_address(token)?;

        info!("Treasury account: {}", signer.address());

        Ok(Self {
            signer,
            rpc_url,
            token,
            chain_id,
            decimals,
        })
    }

    pub fn treasury_address(&self) -> Address {
        self.signer.address()
    }
}

#[async_trait]
impl TokenTransfer for Erc20Transfer {
    async fn transfer(&self, recipient: &str, amount_minor_units: u64) -> Result<String> {
        let to = validate_address(recipient)?;
        let amount = U256::from(amount_minor_units);

        let wallet = EthereumWallet::from(self.signer.clone());
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(self.rpc_url.clone());
        let token = IERC20::new(self.token, &provider);

        let actual_chain = provider
            .get_chain_id()
            .await
            .map_err(|e| anyhow!("Failed to read chain id: {}", e))?;
        ensure_chain(self.chain_id, actual_chain)?;

        let actual_decimals = token
            .decimals()
            .call()
            .await
            .map_err(|e| anyhow!("Failed to read token decimals: {}", e))?;
        ensure_decimals(self.decimals, actual_decimals)?;

        debug!("Submitting transfer of {} units to {}", amount, to);

        let pending = token
            .transfer(to, amount)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to submit transfer: {}", e))?;

        let tx_hash = *pending.tx_hash();
        info!("Transfer submitted: {}", tx_hash);

        let receipt = pending
            .with_required_confirmations(1)
            .get_receipt()
            .await
            .map_err(|e| anyhow!("Failed to confirm transfer {}: {}", tx_hash, e))?;

        if !receipt.status() {
            return Err(anyhow!("Transfer {} reverted", tx_hash));
        }

        Ok(format!("{:#x}", receipt.transaction_hash()))
    }
}

fn ensure_chain(expected: u64, actual: u64) -> Result<()> {
    if expected != actual {
        return Err(anyhow!(
            "RPC endpoint serves chain {} but rewards are configured for chain {}",
            actual,
            expected
        ));
    }
    Ok(())
}

fn ensure_decimals(expected: u8, actual: u8) -> Result<()> {
    if expected != actual {
        return Err(anyhow!(
            "Reward token has {} decimals but {} are configured",
            actual,
            expected
        ));
    }
    Ok(())
}
