//! ============================================================================
//! Chain Data Client - Blockscout REST v2 reads
//! ============================================================================
//! One parameterized client for every explorer read KRONOS does:
//! - Transactions by address (quest verification, advisor context)
//! - Token transfers and NFTs (token/NFT quests)
//! - Address overview (advisor context)
//! Results are never cached; every call goes to the explorer.
//! ============================================================================

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::KronosConfig;
use crate::types::{
    AddressInfo, ExplorerNft, ExplorerTokenTransfer, ExplorerTransaction, HoldingCount,
};

/// Pages followed when counting holdings (Blockscout pages hold 50 items)
const MAX_COUNT_PAGES: usize = 5;

/// Read-only view of indexed chain data for one address
#[async_trait]
pub trait ChainData: Send + Sync {
    async fn transactions(&self, address: &str) -> Result<Vec<ExplorerTransaction>>;

    async fn token_transfers(&self, address: &str) -> Result<Vec<ExplorerTokenTransfer>>;

    async fn nfts(&self, address: &str) -> Result<Vec<ExplorerNft>>;

    async fn address_info(&self, address: &str) -> Result<AddressInfo>;
}

/// Blockscout explorer client
pub struct BlockscoutClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl BlockscoutClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            api_key,
        }
    }

    pub fn from_config(config: &KronosConfig) -> Result<Self> {
        Ok(Self::new(
            config.http_client()?,
            config.blockscout_api_url.clone(),
            config.blockscout_api_key.clone(),
        ))
    }

    fn address_url(&self, address: &str, suffix: &str) -> String {
        format!("{}/addresses/{}{}", self.base_url, address.trim(), suffix)
    }

    async fn get_text(&self, url: &str, query: &[(String, String)]) -> Result<String> {
        debug!("Blockscout GET {} {:?}", url, query);

        let mut request = self.client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| anyhow!("Failed to call Blockscout: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Blockscout error {}: {}", status, body));
        }

        response
            .text()
            .await
            .map_err(|e| anyhow!("Failed to read Blockscout response: {}", e))
    }

    async fn get_items<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>> {
        let body = self.get_text(url, &[]).await?;
        parse_items(&body)
    }

    /// Count items by following `next_page_params`, up to `MAX_COUNT_PAGES`
    async fn count_items(&self, url: &str) -> Result<HoldingCount> {
        let mut count = 0;
        let mut query = Vec::new();

        for _ in 0..MAX_COUNT_PAGES {
            let body = self.get_text(url, &query).await?;
            let page: Page<serde_json::Value> = parse_page(&body)?;
            count += page.items.len();
            match page.next_page {
                Some(next) => query = next,
                None => return Ok(HoldingCount::exact(count)),
            }
        }

        debug!("Stopped counting {} after {} pages", url, MAX_COUNT_PAGES);
        Ok(HoldingCount {
            count,
            capped: true,
        })
    }
}

#[async_trait]
impl ChainData for BlockscoutClient {
    async fn transactions(&self, address: &str) -> Result<Vec<ExplorerTransaction>> {
        let url = self.address_url(address, "/transactions");
        let items: Vec<ApiTransaction> = self.get_items(&url).await?;
        info!("Fetched {} transactions for {}", items.len(), address);
        Ok(items.into_iter().map(ApiTransaction::flatten).collect())
    }

    async fn token_transfers(&self, address: &str) -> Result<Vec<ExplorerTokenTransfer>> {
        let url = self.address_url(address, "/token-transfers");
        let items: Vec<ApiTokenTransfer> = self.get_items(&url).await?;
        info!("Fetched {} token transfers for {}", items.len(), address);
        Ok(items.into_iter().map(ApiTokenTransfer::flatten).collect())
    }

    async fn nfts(&self, address: &str) -> Result<Vec<ExplorerNft>> {
        let url = self.address_url(address, "/nft");
        let items: Vec<ApiNft> = self.get_items(&url).await?;
        info!("Fetched {} NFTs for {}", items.len(), address);
        Ok(items.into_iter().map(ApiNft::flatten).collect())
    }

    async fn address_info(&self, address: &str) -> Result<AddressInfo> {
        let body = self.get_text(&self.address_url(address, ""), &[]).await?;
        let mut info = parse_address_info(&body)?;

        // Counts come from separate listings; a failure just leaves them unknown.
        let tokens_url = self.address_url(address, "/tokens?type=ERC-20");
        info.token_count = self.count_items(&tokens_url).await.ok();
        info.nft_count = self.count_items(&self.address_url(address, "/nft")).await.ok();

        Ok(info)
    }
}

// ============================================================================
// Response Parsing
// ============================================================================

/// One page of a listing plus the query for the next page, if any
struct Page<T> {
    items: Vec<T>,
    next_page: Option<Vec<(String, String)>>,
}

fn parse_page<T: DeserializeOwned>(body: &str) -> Result<Page<T>> {
    let page: ApiPage<T> = serde_json::from_str(body)
        .map_err(|e| anyhow!("Failed to parse Blockscout response: {}", e))?;

    let next_page = page.next_page_params.map(|params| {
        params
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect()
    });

    Ok(Page {
        items: page.items.unwrap_or_default(),
        next_page,
    })
}

/// Parse a paged `{ "items": [...] }` body. A missing `items` is an empty list.
pub fn parse_items<T: DeserializeOwned>(body: &str) -> Result<Vec<T>> {
    Ok(parse_page(body)?.items)
}

pub fn parse_transactions(body: &str) -> Result<Vec<ExplorerTransaction>> {
    let items: Vec<ApiTransaction> = parse_items(body)?;
    Ok(items.into_iter().map(ApiTransaction::flatten).collect())
}

pub fn parse_address_info(body: &str) -> Result<AddressInfo> {
    let raw: ApiAddress = serde_json::from_str(body)
        .map_err(|e| anyhow!("Failed to parse address info: {}", e))?;

    Ok(AddressInfo {
        address: raw.hash,
        balance: raw.coin_balance,
        is_contract: raw.is_contract.unwrap_or(false),
        ens_name: raw.ens_domain_name,
        token_count: None,
        nft_count: None,
    })
}

#[derive(Debug, Deserialize)]
struct ApiPage<T> {
    items: Option<Vec<T>>,
    #[serde(default)]
    next_page_params: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ApiAddressRef {
    hash: String,
}

#[derive(Debug, Deserialize)]
struct ApiTransaction {
    hash: String,
    from: Option<ApiAddressRef>,
    to: Option<ApiAddressRef>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default, alias = "block")]
    block_number: Option<u64>,
}

impl ApiTransaction {
    fn flatten(self) -> ExplorerTransaction {
        ExplorerTransaction {
            hash: self.hash,
            from: self.from.map(|a| a.hash),
            to: self.to.map(|a| a.hash),
            value: self.value.unwrap_or_else(|| "0".to_string()),
            block_number: self.block_number,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiTokenTransfer {
    #[serde(alias = "tx_hash")]
    transaction_hash: String,
    from: Option<ApiAddressRef>,
    to: Option<ApiAddressRef>,
    token: Option<ApiToken>,
}

#[derive(Debug, Deserialize)]
struct ApiToken {
    symbol: Option<String>,
}

impl ApiTokenTransfer {
    fn flatten(self) -> ExplorerTokenTransfer {
        ExplorerTokenTransfer {
            transaction_hash: self.transaction_hash,
            from: self.from.map(|a| a.hash),
            to: self.to.map(|a| a.hash),
            token_symbol: self.token.and_then(|t| t.symbol),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiNft {
    id: Option<String>,
    token: Option<ApiNftCollection>,
}

#[derive(Debug, Deserialize)]
struct ApiNftCollection {
    name: Option<String>,
}

impl ApiNft {
    fn flatten(self) -> ExplorerNft {
        ExplorerNft {
            token_id: self.id,
            collection: self.token.and_then(|t| t.name),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiAddress {
    hash: String,
    coin_balance: Option<String>,
    is_contract: Option<bool>,
    ens_domain_name: Option<String>,
}
