//! ============================================================================
//! Core Types for KRONOS
//! ============================================================================
//! Defines the data structures shared by the verifier, disburser, advisor and
//! quest runner. Serializable so the shell can print them as JSON.
//! ============================================================================

use serde::{Deserialize, Serialize};

// ============================================================================
// Chat Types
// ============================================================================

/// Speaker of a chat turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of a conversation with the advisor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Append-only chat history for the current session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// ============================================================================
// Chain Data Types
// ============================================================================

/// Direction of a transaction relative to the wallet being inspected
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// Raw transaction as returned by the explorer, flattened
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExplorerTransaction {
    pub hash: String,
    pub from: Option<String>,
    /// None for contract creations
    pub to: Option<String>,
    /// Value in wei, decimal string
    pub value: String,
    pub block_number: Option<u64>,
}

/// Token transfer touching an address
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExplorerTokenTransfer {
    pub transaction_hash: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub token_symbol: Option<String>,
}

/// NFT instance held by an address
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExplorerNft {
    pub token_id: Option<String>,
    pub collection: Option<String>,
}

/// Address overview used as advisor context
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressInfo {
    pub address: String,
    /// Native balance in wei, decimal string
    pub balance: Option<String>,
    pub is_contract: bool,
    pub ens_name: Option<String>,
    pub token_count: Option<HoldingCount>,
    pub nft_count: Option<HoldingCount>,
}

/// Items counted across a paged listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HoldingCount {
    pub count: usize,
    /// More pages existed than were read, so `count` is a lower bound
    pub capped: bool,
}

impl HoldingCount {
    pub fn exact(count: usize) -> Self {
        Self { count, capped: false }
    }
}

impl std::fmt::Display for HoldingCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.capped {
            write!(f, "{}+", self.count)
        } else {
            write!(f, "{}", self.count)
        }
    }
}

/// Read-only projection of an explorer transaction relative to one wallet.
/// Recomputed on every fetch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionSummary {
    pub hash: String,
    pub counterparty_address: Option<String>,
    pub value: String,
    pub block_number: Option<u64>,
    pub direction: Direction,
}

impl TransactionSummary {
    /// Classify a transaction for `wallet`.
    ///
    /// A transaction whose destination is the wallet is incoming, which also
    /// covers self-transfers; anything else is outgoing.
    pub fn classify(tx: &ExplorerTransaction, wallet: &str) -> Self {
        let incoming = tx
            .to
            .as_deref()
            .map(|to| addresses_match(to, wallet))
            .unwrap_or(false);

        let (direction, counterparty) = if incoming {
            (Direction::Incoming, tx.from.clone())
        } else {
            (Direction::Outgoing, tx.to.clone())
        };

        Self {
            hash: tx.hash.clone(),
            counterparty_address: counterparty,
            value: tx.value.clone(),
            block_number: tx.block_number,
            direction,
        }
    }
}

/// Exact, ASCII case-insensitive comparison of two hex account identifiers
pub fn addresses_match(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

// ============================================================================
// Quest Types
// ============================================================================

/// Lifecycle of one quest within the current session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuestStatus {
    Active,
    Verifying,
    Sending,
    Complete,
    Error,
}

impl QuestStatus {
    /// Allowed forward edges. `Error -> Verifying` is an explicit new attempt.
    pub fn can_transition_to(self, next: QuestStatus) -> bool {
        use QuestStatus::*;
        matches!(
            (self, next),
            (Active, Verifying)
                | (Verifying, Sending)
                | (Verifying, Error)
                | (Sending, Complete)
                | (Sending, Error)
                | (Error, Verifying)
        )
    }
}

/// Transient per-session quest state, held by the shell
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestRecord {
    pub quest_id: String,
    pub status: QuestStatus,
    /// Reward in dollars
    pub reward_amount: f64,
    /// Human-readable status line for the shell
    pub message: String,
    pub transaction_hash: Option<String>,
}

impl QuestRecord {
    pub fn new(quest_id: impl Into<String>, reward_amount: f64) -> Self {
        Self {
            quest_id: quest_id.into(),
            status: QuestStatus::Active,
            reward_amount,
            message: "Ready to verify".to_string(),
            transaction_hash: None,
        }
    }

    pub fn transition(
        &mut self,
        next: QuestStatus,
        message: impl Into<String>,
    ) -> Result<(), KronosError> {
        if !self.status.can_transition_to(next) {
            return Err(KronosError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.message = message.into();
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.status == QuestStatus::Complete
    }
}

// ============================================================================
// Reward Types
// ============================================================================

/// A reward transfer the treasury submitted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewardTransfer {
    pub recipient_address: String,
    /// Token amount in minor units (6 decimals for PYUSD)
    pub amount_minor_units: u64,
    pub transaction_hash: Option<String>,
}

// ============================================================================
// Errors
// ============================================================================

/// Error types for KRONOS operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KronosError {
    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("No wallet provider available. Please install or start a Web3 wallet")]
    ProviderUnavailable,

    #[error("Wallet provider returned no accounts")]
    NoAccounts,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Unknown quest: {0}")]
    UnknownQuest(String),

    #[error("Quest {quest_id} is already being processed for {wallet}")]
    QuestInFlight { wallet: String, quest_id: String },

    #[error("Invalid quest transition: {from:?} -> {to:?}")]
    InvalidTransition { from: QuestStatus, to: QuestStatus },

    #[error("Invalid reward amount: {0}")]
    InvalidAmount(String),

    #[error("Configuration missing: {0}")]
    ConfigMissing(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALLET: &str = "0x1111111111111111111111111111111111111111";
    const OTHER: &str = "0x2222222222222222222222222222222222222222";

    fn tx(from: &str, to: Option<&str>) -> ExplorerTransaction {
        ExplorerTransaction {
            hash: "0xabc".to_string(),
            from: Some(from.to_string()),
            to: to.map(str::to_string),
            value: "0".to_string(),
            block_number: Some(1),
        }
    }

    #[test]
    fn test_classify_incoming_and_outgoing() {
        let incoming = TransactionSummary::classify(&tx(OTHER, Some(WALLET)), WALLET);
        assert_eq!(incoming.direction, Direction::Incoming);
        assert_eq!(incoming.counterparty_address.as_deref(), Some(OTHER));

        let outgoing = TransactionSummary::classify(&tx(WALLET, Some(OTHER)), WALLET);
        assert_eq!(outgoing.direction, Direction::Outgoing);
        assert_eq!(outgoing.counterparty_address.as_deref(), Some(OTHER));
    }

    #[test]
    fn test_self_transfer_is_incoming_once() {
        let summary = TransactionSummary::classify(&tx(WALLET, Some(WALLET)), WALLET);
        assert_eq!(summary.direction, Direction::Incoming);
    }

    #[test]
    fn test_classify_ignores_case() {
        let upper = WALLET.to_uppercase().replacen("0X", "0x", 1);
        let summary = TransactionSummary::classify(&tx(OTHER, Some(&upper)), WALLET);
        assert_eq!(summary.direction, Direction::Incoming);
    }

    #[test]
    fn test_contract_creation_is_outgoing() {
        let summary = TransactionSummary::classify(&tx(WALLET, None), WALLET);
        assert_eq!(summary.direction, Direction::Outgoing);
        assert!(summary.counterparty_address.is_none());
    }

    #[test]
    fn test_addresses_match_is_exact() {
        assert!(addresses_match(WALLET, &WALLET.to_uppercase()));
        assert!(!addresses_match(WALLET, &WALLET[..20]));
        assert!(!addresses_match(&WALLET[..20], WALLET));
    }

    #[test]
    fn test_quest_record_forward_transitions() {
        let mut record = QuestRecord::new("first-swap", 0.75);
        record.transition(QuestStatus::Verifying, "Verifying on-chain...").unwrap();
        record.transition(QuestStatus::Sending, "Sending reward...").unwrap();
        record.transition(QuestStatus::Complete, "Complete!").unwrap();
        assert!(record.is_complete());
    }

    #[test]
    fn test_quest_record_rejects_regression() {
        let mut record = QuestRecord::new("first-swap", 0.75);
        record.transition(QuestStatus::Verifying, "").unwrap();
        record.transition(QuestStatus::Sending, "").unwrap();
        record.transition(QuestStatus::Complete, "").unwrap();

        let err = record.transition(QuestStatus::Verifying, "again").unwrap_err();
        assert_eq!(
            err,
            KronosError::InvalidTransition {
                from: QuestStatus::Complete,
                to: QuestStatus::Verifying
            }
        );
        assert!(record.is_complete());
    }

    #[test]
    fn test_quest_record_retry_after_error() {
        let mut record = QuestRecord::new("first-nft", 0.5);
        record.transition(QuestStatus::Verifying, "").unwrap();
        record.transition(QuestStatus::Error, "not found").unwrap();
        assert!(record.transition(QuestStatus::Verifying, "retry").is_ok());
        assert!(record.transition(QuestStatus::Active, "").is_err());
    }

    #[test]
    fn test_chat_message_roles_serialize_lowercase() {
        let json = serde_json::to_string(&ChatMessage::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }
}
