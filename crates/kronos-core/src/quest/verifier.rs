//! ============================================================================
//! Quest Verifier - Pass/fail for one quest from explorer data
//! ============================================================================
//! Verification is best-effort: an explorer failure reads as "not verified"
//! to callers of `verify`, but `check` keeps the cause so the shell can tell
//! "not done yet" apart from "could not check". A false positive is never
//! acceptable, so address matching is exact (case-insensitive only).
//! ============================================================================

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::catalog::{QuestCatalog, QuestCriterion, QuestDefinition};
use crate::chain_data::ChainData;
use crate::types::{addresses_match, KronosError};

/// Tagged result of a verification attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum VerifyOutcome {
    Verified,
    NotFound,
    UpstreamUnavailable(String),
}

impl VerifyOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerifyOutcome::Verified)
    }

    fn from_found(found: bool) -> Self {
        if found {
            VerifyOutcome::Verified
        } else {
            VerifyOutcome::NotFound
        }
    }
}

pub struct QuestVerifier {
    chain: Arc<dyn ChainData>,
    catalog: QuestCatalog,
}

impl QuestVerifier {
    pub fn new(chain: Arc<dyn ChainData>, catalog: QuestCatalog) -> Self {
        Self { chain, catalog }
    }

    pub fn catalog(&self) -> &QuestCatalog {
        &self.catalog
    }

    /// Boolean contract: true only when the quest is positively observed
    pub async fn verify(&self, quest_id: &str, wallet: &str) -> bool {
        match self.check_by_id(quest_id, wallet).await {
            Ok(outcome) => outcome.is_verified(),
            Err(e) => {
                warn!("Verification skipped: {}", e);
                false
            }
        }
    }

    /// Look up `quest_id` and check it. Unknown ids fail without any fetch.
    pub async fn check_by_id(
        &self,
        quest_id: &str,
        wallet: &str,
    ) -> Result<VerifyOutcome, KronosError> {
        let quest = self.catalog.require(quest_id)?;
        Ok(self.check(quest, wallet).await)
    }

    pub async fn check(&self, quest: &QuestDefinition, wallet: &str) -> VerifyOutcome {
        info!("Verifying quest {} for {}", quest.id, wallet);

        let outcome = match &quest.criterion {
            QuestCriterion::CalledContract { contract } => {
                match self.chain.transactions(wallet).await {
                    Ok(txs) => VerifyOutcome::from_found(txs.iter().any(|tx| {
                        tx.to
                            .as_deref()
                            .map(|to| addresses_match(to, contract))
                            .unwrap_or(false)
                    })),
                    Err(e) => VerifyOutcome::UpstreamUnavailable(e.to_string()),
                }
            }
            QuestCriterion::ReceivedTokenTransfer => {
                match self.chain.token_transfers(wallet).await {
                    Ok(transfers) => VerifyOutcome::from_found(transfers.iter().any(|t| {
                        t.to
                            .as_deref()
                            .map(|to| addresses_match(to, wallet))
                            .unwrap_or(false)
                    })),
                    Err(e) => VerifyOutcome::UpstreamUnavailable(e.to_string()),
                }
            }
            QuestCriterion::HoldsNft => match self.chain.nfts(wallet).await {
                Ok(nfts) => VerifyOutcome::from_found(!nfts.is_empty()),
                Err(e) => VerifyOutcome::UpstreamUnavailable(e.to_string()),
            },
        };

        match &outcome {
            VerifyOutcome::UpstreamUnavailable(reason) => {
                warn!("Quest {} could not be checked: {}", quest.id, reason)
            }
            other => info!("Quest {} for {}: {:?}", quest.id, wallet, other),
        }

        outcome
    }
}
