//! ============================================================================
//! AI Advisor - KRONOS chat grounded in the user's on-chain activity
//! ============================================================================
//! Each call is independent:
//! 1. Fetch recent transactions and the address overview (best-effort)
//! 2. Summarize incoming/outgoing activity as plain text
//! 3. Build the system prompt around that summary
//! 4. Forward prompt + full history to the completion endpoint
//!
//! Nothing escapes this boundary: read failures become placeholder text and a
//! completion failure becomes a fixed fallback reply.
//! ============================================================================

mod groq;

pub use groq::GroqClient;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::chain_data::ChainData;
use crate::config::KronosConfig;
use crate::types::{addresses_match, AddressInfo, ChatMessage, Direction, TransactionSummary};

/// Reply when the completion endpoint fails or returns nothing
pub const FALLBACK_REPLY: &str =
    "I'm having a little trouble thinking right now. Please try again in a moment.";

/// Reply when no model API key is configured
pub const NOT_CONFIGURED_REPLY: &str =
    "The KRONOS assistant is not configured yet (missing GROQ_API_KEY). Please try again later.";

pub const NO_TRANSACTIONS: &str = "No recent transactions were found for this address.";

pub const ACTIVITY_UNAVAILABLE: &str =
    "I was unable to fetch recent transactions for this address from Blockscout.";

pub const ADDRESS_INFO_UNAVAILABLE: &str =
    "I was unable to fetch the balance and holdings for this address from Blockscout.";

/// Most recent transactions included in the prompt
const MAX_CONTEXT_TRANSACTIONS: usize = 10;

/// Hosted text-completion capability
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, history: &[ChatMessage]) -> Result<String>;
}

pub struct AiAdvisor {
    chain: Arc<dyn ChainData>,
    completion: Option<Arc<dyn CompletionClient>>,
}

impl AiAdvisor {
    pub fn new(chain: Arc<dyn ChainData>, completion: Option<Arc<dyn CompletionClient>>) -> Self {
        Self { chain, completion }
    }

    pub fn from_config(chain: Arc<dyn ChainData>, config: &KronosConfig) -> Result<Self> {
        let completion = match &config.groq_api_key {
            Some(key) => Some(Arc::new(
                GroqClient::new(config.http_client()?, key.clone(), config.groq_model.clone())
                    .with_api_url(config.groq_api_url.clone()),
            ) as Arc<dyn CompletionClient>),
            None => {
                warn!("GROQ_API_KEY not configured - advisor will reply with a notice");
                None
            }
        };
        Ok(Self::new(chain, completion))
    }

    pub fn is_configured(&self) -> bool {
        self.completion.is_some()
    }

    /// Answer the last message of `history` for `wallet`. Never fails.
    pub async fn respond(&self, history: &[ChatMessage], wallet: &str) -> String {
        let Some(completion) = &self.completion else {
            return NOT_CONFIGURED_REPLY.to_string();
        };

        let context = self.gather_context(wallet).await;
        let system = build_system_prompt(wallet, &context);

        match completion.complete(&system, history).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!("Empty completion from model");
                FALLBACK_REPLY.to_string()
            }
            Err(e) => {
                warn!("Error generating advisor response: {}", e);
                FALLBACK_REPLY.to_string()
            }
        }
    }

    /// Fetch both context sections; each degrades to a placeholder on failure
    pub async fn gather_context(&self, wallet: &str) -> AdvisorContext {
        let (txs, info) = tokio::join!(
            self.chain.transactions(wallet),
            self.chain.address_info(wallet)
        );

        let activity = match txs {
            Ok(txs) => {
                let summaries: Vec<TransactionSummary> = txs
                    .iter()
                    .take(MAX_CONTEXT_TRANSACTIONS)
                    .map(|tx| TransactionSummary::classify(tx, wallet))
                    .collect();
                info!("Advisor context: {} transactions for {}", summaries.len(), wallet);
                summarize_activity(&summaries, wallet)
            }
            Err(e) => {
                warn!("Failed to fetch transactions from Blockscout: {}", e);
                ACTIVITY_UNAVAILABLE.to_string()
            }
        };

        let holdings = match info {
            Ok(info) => describe_address(&info),
            Err(e) => {
                warn!("Failed to fetch address info from Blockscout: {}", e);
                ADDRESS_INFO_UNAVAILABLE.to_string()
            }
        };

        AdvisorContext { holdings, activity }
    }
}

/// Text blocks embedded in the system prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisorContext {
    pub holdings: String,
    pub activity: String,
}

// ============================================================================
// Prompt Assembly
// ============================================================================

pub fn build_system_prompt(wallet: &str, context: &AdvisorContext) -> String {
    format!(
        "You are KRONOS, a friendly and helpful AI guide for the Web3 world.\n\
        Your goal is to help users understand their on-chain activity based on the data provided.\n\
        The user's wallet address is {wallet}.\n\n\
        ADDRESS OVERVIEW:\n{holdings}\n\n\
        RECENT ACTIVITY:\n{activity}\n\n\
        Based on the context above and the conversation history, give a helpful and concise \
        answer to the user's last message.\n\
        - Keep your answers short and easy to understand for a beginner.\n\
        - Describe incoming and outgoing transactions separately.\n\
        - Only mention transactions listed above. Never invent hashes, amounts or addresses.\n\
        - If there are no recent transactions, say so plainly.\n\
        - If the context says data was unavailable, tell the user politely.",
        wallet = wallet,
        holdings = context.holdings,
        activity = context.activity,
    )
}

/// Plain-text summary of transactions classified for `wallet`
pub fn summarize_activity(summaries: &[TransactionSummary], wallet: &str) -> String {
    if summaries.is_empty() {
        return NO_TRANSACTIONS.to_string();
    }

    let incoming: Vec<_> = summaries
        .iter()
        .filter(|s| s.direction == Direction::Incoming)
        .collect();
    let outgoing: Vec<_> = summaries
        .iter()
        .filter(|s| s.direction == Direction::Outgoing)
        .collect();

    let mut out = format!(
        "{} recent transactions: {} incoming, {} outgoing.\n",
        summaries.len(),
        incoming.len(),
        outgoing.len()
    );

    for (label, group, preposition) in [
        ("Incoming", &incoming, "from"),
        ("Outgoing", &outgoing, "to"),
    ] {
        if group.is_empty() {
            continue;
        }
        out.push_str(&format!("{}:\n", label));
        for s in group.iter() {
            let party = s
                .counterparty_address
                .as_deref()
                .map(shorten)
                .unwrap_or_else(|| "contract creation".to_string());
            let block = s
                .block_number
                .map(|b| format!(", block {}", b))
                .unwrap_or_default();
            out.push_str(&format!(
                "- {} {} {} ({} ETH{})\n",
                shorten(&s.hash),
                preposition,
                party,
                wei_to_eth(&s.value),
                block
            ));
        }
    }

    let mut counterparties: Vec<&str> = Vec::new();
    for s in summaries {
        if let Some(addr) = s.counterparty_address.as_deref() {
            // Self-transfers name the wallet itself
            if addresses_match(addr, wallet) {
                continue;
            }
            if !counterparties.iter().any(|c| addresses_match(c, addr)) {
                counterparties.push(addr);
            }
        }
    }
    if !counterparties.is_empty() {
        out.push_str(&format!("Distinct counterparties: {}", counterparties.join(", ")));
    }

    out.trim_end().to_string()
}

fn describe_address(info: &AddressInfo) -> String {
    let mut parts = vec![format!(
        "Balance: {} ETH",
        info.balance.as_deref().map(wei_to_eth).unwrap_or_else(|| "unknown".to_string())
    )];
    if let Some(ens) = &info.ens_name {
        parts.push(format!("ENS name: {}", ens));
    }
    if info.is_contract {
        parts.push("This address is a contract".to_string());
    }
    if let Some(count) = info.token_count {
        parts.push(format!("ERC-20 tokens held: {}", count));
    }
    if let Some(count) = info.nft_count {
        parts.push(format!("NFTs held: {}", count));
    }
    parts.join("\n")
}

/// `0x1234567890…` -> `0x1234…7890`
pub fn shorten(value: &str) -> String {
    if value.len() <= 12 || !value.is_ascii() {
        return value.to_string();
    }
    format!("{}…{}", &value[..6], &value[value.len() - 4..])
}

/// Decimal wei string to an ETH string, without float rounding
fn wei_to_eth(wei: &str) -> String {
    let digits = wei.trim();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return wei.to_string();
    }

    let padded = format!("{:0>19}", digits);
    let (whole, frac) = padded.split_at(padded.len() - 18);
    let whole = whole.trim_start_matches('0');
    let frac = frac.trim_end_matches('0');

    match (whole.is_empty(), frac.is_empty()) {
        (true, true) => "0".to_string(),
        (true, false) => format!("0.{}", frac),
        (false, true) => whole.to_string(),
        (false, false) => format!("{}.{}", whole, frac),
    }
}
