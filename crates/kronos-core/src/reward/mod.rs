//! ============================================================================
//! Reward Module - Stablecoin reward disbursement
//! ============================================================================
//! The disburser converts a dollar amount to token minor units and hands it to
//! a `TokenTransfer` backend:
//! - `Erc20Transfer`: treasury-signed ERC-20 transfer over JSON-RPC (alloy)
//!
//! Without a treasury credential there is no backend at all, so a missing key
//! can never reach the network. At most one transfer is attempted per call.
//! ============================================================================

mod erc20;

pub use erc20::Erc20Transfer;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::KronosConfig;
use crate::types::{KronosError, RewardTransfer};

/// Irreversible token transfer from the treasury
#[async_trait]
pub trait TokenTransfer: Send + Sync {
    /// Submit and wait for one confirmation; returns the transaction hash
    async fn transfer(&self, recipient: &str, amount_minor_units: u64) -> Result<String>;
}

/// Tagged result of a disbursement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum DisburseOutcome {
    Sent(RewardTransfer),
    NotConfigured,
    Failed(String),
}

impl DisburseOutcome {
    pub fn transaction_hash(&self) -> Option<&str> {
        match self {
            DisburseOutcome::Sent(transfer) => transfer.transaction_hash.as_deref(),
            _ => None,
        }
    }
}

/// Convert a dollar amount to integer minor units (`0.75` at 6 decimals -> `750_000`)
pub fn to_minor_units(amount: f64, decimals: u8) -> Result<u64, KronosError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(KronosError::InvalidAmount(amount.to_string()));
    }

    let scaled = (amount * 10f64.powi(i32::from(decimals))).round();
    if scaled < 1.0 || scaled > u64::MAX as f64 {
        return Err(KronosError::InvalidAmount(amount.to_string()));
    }

    Ok(scaled as u64)
}

pub struct RewardDisburser {
    backend: Option<Arc<dyn TokenTransfer>>,
    decimals: u8,
}

impl RewardDisburser {
    pub fn new(backend: Option<Arc<dyn TokenTransfer>>, decimals: u8) -> Self {
        Self { backend, decimals }
    }

    /// Build from config. No treasury key means a disburser that never sends;
    /// an unparsable key is a configuration error.
    pub fn from_config(config: &KronosConfig) -> Result<Self> {
        let decimals = config.reward_token_decimals()?;
        let backend = match &config.treasury_private_key {
            Some(key) => {
                let transfer = Erc20Transfer::new(
                    key,
                    &config.rpc_url,
                    &config.reward_token,
                    config.chain_id,
                    decimals,
                )
                .map_err(|e| KronosError::InvalidConfig(e.to_string()))?;
                Some(Arc::new(transfer) as Arc<dyn TokenTransfer>)
            }
            None => {
                warn!("Treasury private key not configured - rewards disabled");
                None
            }
        };

        Ok(Self::new(backend, decimals))
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Boolean-style contract: the transaction hash, or None if not sent
    pub async fn disburse(&self, recipient: &str, amount_in_dollars: f64) -> Option<String> {
        self.send(recipient, amount_in_dollars)
            .await
            .transaction_hash()
            .map(str::to_string)
    }

    pub async fn send(&self, recipient: &str, amount_in_dollars: f64) -> DisburseOutcome {
        let Some(backend) = &self.backend else {
            error!("Treasury key is missing - reward not sent");
            return DisburseOutcome::NotConfigured;
        };

        let amount_minor_units = match to_minor_units(amount_in_dollars, self.decimals) {
            Ok(units) => units,
            Err(e) => return DisburseOutcome::Failed(e.to_string()),
        };

        info!(
            "Sending reward of {} ({} units) to {}",
            amount_in_dollars, amount_minor_units, recipient
        );

        match backend.transfer(recipient, amount_minor_units).await {
            Ok(hash) => {
                info!("Reward sent: {}", hash);
                DisburseOutcome::Sent(RewardTransfer {
                    recipient_address: recipient.to_string(),
                    amount_minor_units,
                    transaction_hash: Some(hash),
                })
            }
            Err(e) => {
                error!("Failed to send reward to {}: {}", recipient, e);
                DisburseOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTransfer, ALICE, FAKE_TX_HASH};

    #[test]
    fn test_to_minor_units() {
        assert_eq!(to_minor_units(0.75, 6).unwrap(), 750_000);
        assert_eq!(to_minor_units(1.0, 6).unwrap(), 1_000_000);
        assert_eq!(to_minor_units(0.1 + 0.2, 6).unwrap(), 300_000);
        assert_eq!(to_minor_units(0.000001, 6).unwrap(), 1);
    }

    #[test]
    fn test_to_minor_units_rejects_bad_amounts() {
        for amount in [0.0, -1.0, f64::NAN, f64::INFINITY, 0.0000001] {
            assert!(to_minor_units(amount, 6).is_err(), "{}", amount);
        }
    }

    #[tokio::test]
    async fn test_disburse_converts_dollars() {
        let backend = Arc::new(FakeTransfer::ok());
        let disburser = RewardDisburser::new(Some(backend.clone()), 6);

        let hash = disburser.disburse(ALICE, 0.75).await;
        assert_eq!(hash.as_deref(), Some(FAKE_TX_HASH));
        assert_eq!(*backend.last_amount.lock().unwrap(), Some(750_000));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_missing_credential_never_sends() {
        let config = KronosConfig {
            treasury_private_key: None,
            reward_token: crate::config::PYUSD_SEPOLIA.to_string(),
            ..KronosConfig::default()
        };
        let disburser = RewardDisburser::from_config(&config).unwrap();

        assert!(!disburser.is_configured());
        assert_eq!(disburser.disburse(ALICE, 0.75).await, None);
        assert_eq!(disburser.send(ALICE, 0.75).await, DisburseOutcome::NotConfigured);
    }

    #[tokio::test]
    async fn test_failed_transfer_is_not_sent() {
        let backend = Arc::new(FakeTransfer::failing());
        let disburser = RewardDisburser::new(Some(backend.clone()), 6);

        assert_eq!(disburser.disburse(ALICE, 0.75).await, None);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalid_amount_does_not_reach_backend() {
        let backend = Arc::new(FakeTransfer::ok());
        let disburser = RewardDisburser::new(Some(backend.clone()), 6);

        assert!(matches!(
            disburser.send(ALICE, -0.5).await,
            DisburseOutcome::Failed(_)
        ));
        assert_eq!(backend.calls(), 0);
    }

    #[test]
    fn test_bad_treasury_key_is_config_error() {
        let config = KronosConfig {
            treasury_private_key: Some("not-a-key".to_string()),
            reward_token: crate::config::PYUSD_SEPOLIA.to_string(),
            ..KronosConfig::default()
        };
        let err = RewardDisburser::from_config(&config).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<KronosError>(),
            Some(KronosError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_custom_token_without_decimals_is_rejected() {
        let config = KronosConfig {
            treasury_private_key: None,
            reward_token: "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238".to_string(),
            reward_token_decimals: None,
            ..KronosConfig::default()
        };
        let err = RewardDisburser::from_config(&config).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<KronosError>(),
            Some(KronosError::ConfigMissing(_))
        ));
    }

    #[test]
    fn test_custom_token_uses_its_decimals() {
        let config = KronosConfig {
            treasury_private_key: None,
            reward_token: "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238".to_string(),
            reward_token_decimals: Some(18),
            ..KronosConfig::default()
        };
        let disburser = RewardDisburser::from_config(&config).unwrap();
        assert_eq!(disburser.decimals(), 18);
        assert_eq!(to_minor_units(0.75, disburser.decimals()).unwrap(), 750_000_000_000_000_000);
    }
}
