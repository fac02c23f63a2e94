//! ============================================================================
//! Database Types - Serializable records for redb storage
//! ============================================================================

use serde::{Deserialize, Serialize};

/// One reward claim for a (quest, wallet) pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RewardRecord {
    pub quest_id: String,
    /// Recipient, lowercased
    pub wallet: String,
    pub amount_minor_units: u64,
    pub status: RewardStatus,
    /// Set once the transfer confirmed
    pub transaction_hash: Option<String>,
    pub created_at: i64,
    pub sent_at: Option<i64>,
}

/// Claim state. A `Pending` row that outlives its process means a transfer
/// may or may not have landed and needs a manual check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum RewardStatus {
    Pending,
    Sent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total_rewards: usize,
    pub pending: usize,
    pub sent: usize,
    /// Sum of sent rewards in minor units
    pub sent_minor_units: u64,
}
