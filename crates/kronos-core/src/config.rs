//! ============================================================================
//! Configuration - Environment-driven settings
//! ============================================================================
//! Network constants for Sepolia plus the two secrets KRONOS needs:
//! - Treasury private key (Reward Disburser)
//! - Groq API key (AI Advisor)
//! Both are optional at load time; the component that needs one degrades
//! deterministically when it is missing.
//! ============================================================================

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::KronosError;

/// Sepolia chain id
pub const SEPOLIA_CHAIN_ID: u64 = 11_155_111;

/// Blockscout REST v2 for Sepolia
pub const DEFAULT_BLOCKSCOUT_API_URL: &str = "https://eth-sepolia.blockscout.com/api/v2";

/// Public Sepolia JSON-RPC endpoint
pub const DEFAULT_RPC_URL: &str = "https://rpc.sepolia.org";

/// PYUSD on Sepolia
pub const PYUSD_SEPOLIA: &str = "0xCaC524BcA292aaade2DF8A05cC58F0a65B1B3bB9";

/// PYUSD uses 6 decimals
pub const PYUSD_DECIMALS: u8 = 6;

/// Uniswap V3 SwapRouter on Sepolia
pub const UNISWAP_ROUTER_SEPOLIA: &str = "0x3fC91A3afd70395Cd496C647d5a6CC9D4B2b7FAD";

/// Groq OpenAI-compatible chat completions
pub const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

/// Default completion model
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.1-8b-instant";

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Application configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct KronosConfig {
    pub blockscout_api_url: String,
    pub blockscout_api_key: Option<String>,
    pub rpc_url: String,
    /// Chain the RPC endpoint must serve before a transfer is signed
    pub chain_id: u64,
    pub wallet_rpc_url: Option<String>,
    pub reward_token: String,
    /// Required when `reward_token` is not PYUSD
    pub reward_token_decimals: Option<u8>,
    pub treasury_private_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub groq_api_url: String,
    pub groq_model: String,
    pub db_path: Option<String>,
    pub http_timeout_secs: u64,
}

impl Default for KronosConfig {
    fn default() -> Self {
        Self {
            blockscout_api_url: env_or("BLOCKSCOUT_API_URL", DEFAULT_BLOCKSCOUT_API_URL),
            blockscout_api_key: env_opt("BLOCKSCOUT_API_KEY"),
            rpc_url: env_or("KRONOS_RPC_URL", DEFAULT_RPC_URL),
            chain_id: env_opt("KRONOS_CHAIN_ID")
                .and_then(|v| v.parse().ok())
                .unwrap_or(SEPOLIA_CHAIN_ID),
            wallet_rpc_url: env_opt("KRONOS_WALLET_RPC_URL"),
            reward_token: env_or("KRONOS_REWARD_TOKEN", PYUSD_SEPOLIA),
            reward_token_decimals: env_opt("KRONOS_REWARD_TOKEN_DECIMALS")
                .and_then(|v| v.parse().ok()),
            treasury_private_key: env_opt("KRONOS_TREASURY_PRIVATE_KEY")
                .or_else(|| env_opt("TREASURY_PRIVATE_KEY")),
            groq_api_key: env_opt("GROQ_API_KEY"),
            groq_api_url: env_or("GROQ_API_URL", GROQ_API_URL),
            groq_model: env_or("GROQ_MODEL", DEFAULT_GROQ_MODEL),
            db_path: env_opt("KRONOS_DB_PATH"),
            http_timeout_secs: env_opt("KRONOS_HTTP_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }
}

impl KronosConfig {
    /// Load from the process environment
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Shared HTTP client with the configured request timeout
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.http_timeout())
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))
    }

    /// Decimals of the reward token. PYUSD is known; any other token must
    /// state its decimals, since a wrong guess mis-scales every transfer.
    pub fn reward_token_decimals(&self) -> Result<u8, KronosError> {
        match self.reward_token_decimals {
            Some(decimals) => Ok(decimals),
            None if self.reward_token.trim().eq_ignore_ascii_case(PYUSD_SEPOLIA) => {
                Ok(PYUSD_DECIMALS)
            }
            None => Err(KronosError::ConfigMissing(
                "KRONOS_REWARD_TOKEN_DECIMALS (required with a custom KRONOS_REWARD_TOKEN)"
                    .to_string(),
            )),
        }
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for KronosConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KronosConfig")
            .field("blockscout_api_url", &self.blockscout_api_url)
            .field("blockscout_api_key", &self.blockscout_api_key.as_ref().map(|_| "<set>"))
            .field("rpc_url", &self.rpc_url)
            .field("chain_id", &self.chain_id)
            .field("wallet_rpc_url", &self.wallet_rpc_url)
            .field("reward_token", &self.reward_token)
            .field("reward_token_decimals", &self.reward_token_decimals)
            .field("treasury_private_key", &self.treasury_private_key.as_ref().map(|_| "<set>"))
            .field("groq_api_key", &self.groq_api_key.as_ref().map(|_| "<set>"))
            .field("groq_api_url", &self.groq_api_url)
            .field("groq_model", &self.groq_model)
            .field("db_path", &self.db_path)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let config = KronosConfig {
            treasury_private_key: Some("0xdeadbeef".to_string()),
            groq_api_key: Some("gsk_secret".to_string()),
            ..KronosConfig::default()
        };
        let printed = format!("{:?}", config);
        assert!(!printed.contains("deadbeef"));
        assert!(!printed.contains("gsk_secret"));
        assert!(printed.contains("<set>"));
    }

    #[test]
    fn test_pyusd_decimals_are_implied() {
        let config = KronosConfig {
            reward_token: PYUSD_SEPOLIA.to_lowercase(),
            reward_token_decimals: None,
            ..KronosConfig::default()
        };
        assert_eq!(config.reward_token_decimals().unwrap(), PYUSD_DECIMALS);
    }

    #[test]
    fn test_custom_token_requires_decimals() {
        let config = KronosConfig {
            reward_token: "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238".to_string(),
            reward_token_decimals: None,
            ..KronosConfig::default()
        };
        assert!(matches!(
            config.reward_token_decimals(),
            Err(KronosError::ConfigMissing(_))
        ));

        let config = KronosConfig {
            reward_token_decimals: Some(18),
            ..config
        };
        assert_eq!(config.reward_token_decimals().unwrap(), 18);
    }

    #[test]
    fn test_http_client_builds_with_timeout() {
        let config = KronosConfig {
            http_timeout_secs: 5,
            ..KronosConfig::default()
        };
        assert_eq!(config.http_timeout(), Duration::from_secs(5));
        assert!(config.http_client().is_ok());
    }

    #[test]
    fn test_constants_are_well_formed_addresses() {
        for addr in [PYUSD_SEPOLIA, UNISWAP_ROUTER_SEPOLIA] {
            assert!(addr.parse::<alloy::primitives::Address>().is_ok(), "{}", addr);
        }
    }
}
