//! ============================================================================
//! Wallet Session - Connection to an EIP-1193 style wallet
//! ============================================================================
//! The session is an explicit object passed to every operation that needs an
//! address. Connecting asks the wallet provider for accounts and keeps the
//! first one; multi-account selection is not supported.
//! ============================================================================

use alloy::primitives::Address;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::types::KronosError;

/// Active wallet for the current process
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletSession {
    address: Option<String>,
}

impl WalletSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session for an explicitly supplied address (no provider involved)
    pub fn with_address(address: &str) -> Result<Self, KronosError> {
        let mut session = Self::new();
        session.set_address(address)?;
        Ok(session)
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// The address, or `WalletNotConnected`
    pub fn require_address(&self) -> Result<&str, KronosError> {
        self.address().ok_or(KronosError::WalletNotConnected)
    }

    pub fn is_connected(&self) -> bool {
        self.address.is_some()
    }

    pub fn disconnect(&mut self) {
        if let Some(addr) = self.address.take() {
            info!("Wallet disconnected: {}", addr);
        }
    }

    fn set_address(&mut self, address: &str) -> Result<(), KronosError> {
        validate_address(address)?;
        self.address = Some(address.trim().to_string());
        Ok(())
    }
}

/// Check that `address` is a 20-byte hex account identifier
pub fn validate_address(address: &str) -> Result<Address, KronosError> {
    address
        .trim()
        .parse::<Address>()
        .map_err(|_| KronosError::InvalidAddress(address.to_string()))
}

// ============================================================================
// Provider Capability
// ============================================================================

/// Injected wallet capability: request access, or read already-granted accounts
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// `eth_requestAccounts` - may prompt the user
    async fn request_accounts(&self) -> Result<Vec<String>>;

    /// `eth_accounts` - accounts already authorized, never prompts
    async fn accounts(&self) -> Result<Vec<String>>;
}

/// Wallet provider reached over JSON-RPC on HTTP (e.g. Frame on 127.0.0.1:1248)
pub struct RpcWalletProvider {
    client: reqwest::Client,
    url: String,
}

impl RpcWalletProvider {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    async fn call(&self, method: &str) -> Result<Vec<String>> {
        debug!("Wallet RPC {} -> {}", method, self.url);

        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": [],
        });

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to reach wallet provider: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Wallet provider error {}: {}", status, body));
        }

        let rpc: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse wallet response: {}", e))?;

        if let Some(err) = rpc.error {
            return Err(anyhow!("Wallet rejected {} ({}): {}", method, err.code, err.message));
        }

        Ok(rpc.result.unwrap_or_default())
    }
}

#[async_trait]
impl WalletProvider for RpcWalletProvider {
    async fn request_accounts(&self) -> Result<Vec<String>> {
        self.call("eth_requestAccounts").await
    }

    async fn accounts(&self) -> Result<Vec<String>> {
        self.call("eth_accounts").await
    }
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Vec<String>>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

// ============================================================================
// Connector
// ============================================================================

/// Connects a `WalletSession` through an optional provider
pub struct WalletConnector {
    provider: Option<Box<dyn WalletProvider>>,
}

impl WalletConnector {
    pub fn new(provider: Option<Box<dyn WalletProvider>>) -> Self {
        Self { provider }
    }

    /// Build from config: a provider only exists when an endpoint is set
    pub fn from_config(config: &crate::config::KronosConfig) -> Result<Self> {
        let provider = match &config.wallet_rpc_url {
            Some(url) => Some(Box::new(RpcWalletProvider::new(config.http_client()?, url.clone()))
                as Box<dyn WalletProvider>),
            None => None,
        };
        Ok(Self::new(provider))
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    /// Eager check for an already-authorized account.
    /// Returns a connected session if one exists, an empty one otherwise.
    pub async fn init(&self) -> WalletSession {
        let Some(provider) = &self.provider else {
            return WalletSession::new();
        };

        match provider.accounts().await {
            Ok(accounts) => session_from_accounts(&accounts).unwrap_or_default(),
            Err(e) => {
                warn!("Could not read existing wallet accounts: {}", e);
                WalletSession::new()
            }
        }
    }

    /// Request account access and store the first returned account in `session`
    pub async fn connect(&self, session: &mut WalletSession) -> Result<String> {
        let provider = self
            .provider
            .as_ref()
            .ok_or(KronosError::ProviderUnavailable)?;

        let accounts = provider.request_accounts().await?;
        let connected = session_from_accounts(&accounts)?;
        let address = connected.require_address()?.to_string();

        *session = connected;
        info!("Wallet connected: {}", address);
        Ok(address)
    }
}

fn session_from_accounts(accounts: &[String]) -> Result<WalletSession, KronosError> {
    let first = accounts.first().ok_or(KronosError::NoAccounts)?;
    WalletSession::with_address(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: &str = "0x1111111111111111111111111111111111111111";
    const BOB: &str = "0x2222222222222222222222222222222222222222";

    struct FakeProvider {
        authorized: Vec<String>,
        requested: Vec<String>,
    }

    #[async_trait]
    impl WalletProvider for FakeProvider {
        async fn request_accounts(&self) -> Result<Vec<String>> {
            Ok(self.requested.clone())
        }

        async fn accounts(&self) -> Result<Vec<String>> {
            Ok(self.authorized.clone())
        }
    }

    fn connector(authorized: &[&str], requested: &[&str]) -> WalletConnector {
        WalletConnector::new(Some(Box::new(FakeProvider {
            authorized: authorized.iter().map(|s| s.to_string()).collect(),
            requested: requested.iter().map(|s| s.to_string()).collect(),
        })))
    }

    #[tokio::test]
    async fn test_connect_takes_first_account() {
        let connector = connector(&[], &[ALICE, BOB]);
        let mut session = WalletSession::new();

        let address = connector.connect(&mut session).await.unwrap();
        assert_eq!(address, ALICE);
        assert_eq!(session.address(), Some(ALICE));
    }

    #[tokio::test]
    async fn test_connect_without_provider() {
        let connector = WalletConnector::new(None);
        let mut session = WalletSession::new();

        let err = connector.connect(&mut session).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<KronosError>(),
            Some(&KronosError::ProviderUnavailable)
        );
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_connect_with_no_accounts() {
        let connector = connector(&[], &[]);
        let mut session = WalletSession::new();

        let err = connector.connect(&mut session).await.unwrap_err();
        assert_eq!(err.downcast_ref::<KronosError>(), Some(&KronosError::NoAccounts));
    }

    #[tokio::test]
    async fn test_init_restores_authorized_account() {
        let session = connector(&[BOB], &[]).init().await;
        assert_eq!(session.address(), Some(BOB));

        let empty = connector(&[], &[ALICE]).init().await;
        assert!(!empty.is_connected());
    }

    #[test]
    fn test_disconnect_clears_address() {
        let mut session = WalletSession::with_address(ALICE).unwrap();
        session.disconnect();
        assert_eq!(session.require_address(), Err(KronosError::WalletNotConnected));
    }

    #[test]
    fn test_provider_only_with_endpoint() {
        let config = crate::config::KronosConfig {
            wallet_rpc_url: None,
            ..Default::default()
        };
        assert!(!WalletConnector::from_config(&config).unwrap().has_provider());

        let config = crate::config::KronosConfig {
            wallet_rpc_url: Some("http://127.0.0.1:1248".to_string()),
            ..config
        };
        assert!(WalletConnector::from_config(&config).unwrap().has_provider());
    }

    #[test]
    fn test_rejects_malformed_address() {
        assert!(matches!(
            WalletSession::with_address("0x1234"),
            Err(KronosError::InvalidAddress(_))
        ));
        assert!(WalletSession::with_address("not an address").is_err());
    }
}
