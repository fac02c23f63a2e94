//! Quest catalog - the quests KRONOS knows how to verify and reward

use serde::Serialize;

use crate::config::UNISWAP_ROUTER_SEPOLIA;
use crate::types::KronosError;

/// What has to be observed on-chain for a quest to count as done
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestCriterion {
    /// Any transaction sent to this contract address
    CalledContract { contract: String },
    /// At least one token transfer whose recipient is the wallet
    ReceivedTokenTransfer,
    /// At least one NFT held by the wallet
    HoldsNft,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestDefinition {
    pub id: String,
    pub title: String,
    pub description: String,
    pub tier: u8,
    /// Reward in dollars of the reward token
    pub reward_amount: f64,
    pub criterion: QuestCriterion,
}

/// Ordered set of quests
#[derive(Debug, Clone)]
pub struct QuestCatalog {
    quests: Vec<QuestDefinition>,
}

impl QuestCatalog {
    pub fn new(quests: Vec<QuestDefinition>) -> Self {
        Self { quests }
    }

    /// The Sepolia learning path
    pub fn sepolia() -> Self {
        Self::new(vec![
            QuestDefinition {
                id: "first-token".to_string(),
                title: "Receive Your First Token".to_string(),
                description: "Receive any ERC-20 token transfer on the Sepolia testnet".to_string(),
                tier: 1,
                reward_amount: 0.25,
                criterion: QuestCriterion::ReceivedTokenTransfer,
            },
            QuestDefinition {
                id: "first-nft".to_string(),
                title: "Collect Your First NFT".to_string(),
                description: "Mint or receive an NFT on the Sepolia testnet".to_string(),
                tier: 1,
                reward_amount: 0.50,
                criterion: QuestCriterion::HoldsNft,
            },
            QuestDefinition {
                id: "first-swap".to_string(),
                title: "Make Your First Swap".to_string(),
                description: "Use Uniswap to swap tokens on the Sepolia testnet".to_string(),
                tier: 2,
                reward_amount: 0.75,
                criterion: QuestCriterion::CalledContract {
                    contract: UNISWAP_ROUTER_SEPOLIA.to_string(),
                },
            },
        ])
    }

    pub fn get(&self, quest_id: &str) -> Option<&QuestDefinition> {
        self.quests.iter().find(|q| q.id == quest_id)
    }

    pub fn require(&self, quest_id: &str) -> Result<&QuestDefinition, KronosError> {
        self.get(quest_id)
            .ok_or_else(|| KronosError::UnknownQuest(quest_id.to_string()))
    }

    pub fn all(&self) -> &[QuestDefinition] {
        &self.quests
    }
}

impl Default for QuestCatalog {
    fn default() -> Self {
        Self::sepolia()
    }
}
