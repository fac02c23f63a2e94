//! In-memory fakes for the chain, completion and transfer seams (tests only)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::advisor::CompletionClient;
use crate::chain_data::ChainData;
use crate::db::RewardDb;
use crate::reward::TokenTransfer;
use crate::types::{
    AddressInfo, ChatMessage, ExplorerNft, ExplorerTokenTransfer, ExplorerTransaction,
};

pub const ALICE: &str = "0x1111111111111111111111111111111111111111";
pub const BOB: &str = "0x2222222222222222222222222222222222222222";

pub fn tx(hash: &str, from: &str, to: Option<&str>) -> ExplorerTransaction {
    ExplorerTransaction {
        hash: hash.to_string(),
        from: Some(from.to_string()),
        to: to.map(str::to_string),
        value: "1000000000000000".to_string(),
        block_number: Some(6_000_000),
    }
}

pub fn token_transfer(from: &str, to: &str) -> ExplorerTokenTransfer {
    ExplorerTokenTransfer {
        transaction_hash: "0xfeed".to_string(),
        from: Some(from.to_string()),
        to: Some(to.to_string()),
        token_symbol: Some("PYUSD".to_string()),
    }
}

/// Fresh ledger in a unique temp file
pub fn temp_db() -> RewardDb {
    let path = std::env::temp_dir().join(format!("kronos-test-{}.redb", uuid::Uuid::new_v4()));
    RewardDb::open(path.to_str()).unwrap()
}

/// Chain data served from memory; `fail` makes every read error
#[derive(Default)]
pub struct FakeChain {
    pub transactions: Vec<ExplorerTransaction>,
    pub token_transfers: Vec<ExplorerTokenTransfer>,
    pub nfts: Vec<ExplorerNft>,
    pub address_info: Option<AddressInfo>,
    pub fail: bool,
    /// Delay before answering, to hold a quest in flight
    pub delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeChain {
    pub fn with_transactions(transactions: Vec<ExplorerTransaction>) -> Self {
        Self {
            transactions,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(anyhow!("Blockscout error 503 Service Unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ChainData for FakeChain {
    async fn transactions(&self, _address: &str) -> Result<Vec<ExplorerTransaction>> {
        self.enter().await?;
        Ok(self.transactions.clone())
    }

    async fn token_transfers(&self, _address: &str) -> Result<Vec<ExplorerTokenTransfer>> {
        self.enter().await?;
        Ok(self.token_transfers.clone())
    }

    async fn nfts(&self, _address: &str) -> Result<Vec<ExplorerNft>> {
        self.enter().await?;
        Ok(self.nfts.clone())
    }

    async fn address_info(&self, address: &str) -> Result<AddressInfo> {
        self.enter().await?;
        self.address_info
            .clone()
            .ok_or_else(|| anyhow!("no address info for {}", address))
    }
}

/// Completion client that records the prompt it was given
pub struct FakeCompletion {
    pub reply: Result<String, String>,
    pub seen_system: Mutex<Option<String>>,
    pub seen_history: Mutex<Vec<ChatMessage>>,
}

impl FakeCompletion {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            seen_system: Mutex::new(None),
            seen_history: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: Err("Groq API error 500".to_string()),
            seen_system: Mutex::new(None),
            seen_history: Mutex::new(Vec::new()),
        }
    }

    pub fn system_prompt(&self) -> String {
        self.seen_system.lock().unwrap().clone().unwrap_or_default()
    }
}

#[async_trait]
impl CompletionClient for FakeCompletion {
    async fn complete(&self, system: &str, history: &[ChatMessage]) -> Result<String> {
        *self.seen_system.lock().unwrap() = Some(system.to_string());
        *self.seen_history.lock().unwrap() = history.to_vec();
        self.reply.clone().map_err(|e| anyhow!(e))
    }
}

/// Token transfer that counts calls and returns a fixed hash
pub struct FakeTransfer {
    pub fail: bool,
    pub calls: AtomicUsize,
    pub last_amount: Mutex<Option<u64>>,
}

impl FakeTransfer {
    pub fn ok() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
            last_amount: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::ok()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub const FAKE_TX_HASH: &str =
    "0x9f2c000000000000000000000000000000000000000000000000000000000001";

#[async_trait]
impl TokenTransfer for FakeTransfer {
    async fn transfer(&self, _recipient: &str, amount_minor_units: u64) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_amount.lock().unwrap() = Some(amount_minor_units);
        if self.fail {
            return Err(anyhow!("execution reverted"));
        }
        Ok(FAKE_TX_HASH.to_string())
    }
}
