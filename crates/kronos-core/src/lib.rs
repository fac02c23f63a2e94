//! ============================================================================
//! KRONOS-CORE: Quest, Reward and Advisor Engine
//! ============================================================================
//! This crate handles all backend logic for KRONOS:
//! - Wallet sessions and EIP-1193 style account requests
//! - Blockscout chain data for quest verification and chat context
//! - PYUSD reward transfers via alloy, recorded in a redb ledger
//! - The AI advisor chat via Groq
//! ============================================================================

pub mod advisor;
pub mod chain_data;
pub mod config;
pub mod db;
pub mod quest;
pub mod reward;
pub mod session;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use types::*;
pub use advisor::AiAdvisor;
pub use chain_data::{BlockscoutClient, ChainData};
pub use config::KronosConfig;
pub use db::RewardDb;
pub use quest::{QuestCatalog, QuestRunner, QuestVerifier, VerifyOutcome};
pub use reward::{DisburseOutcome, RewardDisburser};
pub use session::{WalletConnector, WalletSession};
