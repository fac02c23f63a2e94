//! ============================================================================
//! Quest Runner - Verify -> reward control flow for one quest attempt
//! ============================================================================
//! Drives a `QuestRecord` through Verifying -> Sending -> Complete/Error:
//! 1. Preconditions: connected wallet, known quest, no attempt in flight
//! 2. Verify against explorer data
//! 3. Consult the reward ledger so a (quest, wallet) pair is paid once
//! 4. Record a pending claim, disburse, settle the claim
//!
//! Only precondition failures are returned as errors. Everything after that
//! lands in the record's status and message for the shell to render.
//! ============================================================================

use std::sync::Arc;

use tracing::{error, info, warn};

use super::catalog::QuestDefinition;
use super::guard::InFlightRegistry;
use super::verifier::{QuestVerifier, VerifyOutcome};
use crate::db::{RewardDb, RewardStatus};
use crate::reward::{to_minor_units, DisburseOutcome, RewardDisburser};
use crate::session::WalletSession;
use crate::types::{KronosError, QuestRecord, QuestStatus};

pub struct QuestRunner {
    verifier: QuestVerifier,
    disburser: RewardDisburser,
    ledger: Arc<RewardDb>,
    registry: InFlightRegistry,
}

impl QuestRunner {
    pub fn new(verifier: QuestVerifier, disburser: RewardDisburser, ledger: Arc<RewardDb>) -> Self {
        Self {
            verifier,
            disburser,
            ledger,
            registry: InFlightRegistry::new(),
        }
    }

    pub fn verifier(&self) -> &QuestVerifier {
        &self.verifier
    }

    pub fn ledger(&self) -> &RewardDb {
        &self.ledger
    }

    /// One full attempt at `quest_id` for the session's wallet
    pub async fn run(
        &self,
        session: &WalletSession,
        quest_id: &str,
    ) -> Result<QuestRecord, KronosError> {
        let wallet = session.require_address()?;
        let quest = self.verifier.catalog().require(quest_id)?;

        let _ticket = self
            .registry
            .try_acquire(wallet, &quest.id)
            .ok_or_else(|| KronosError::QuestInFlight {
                wallet: wallet.to_string(),
                quest_id: quest.id.clone(),
            })?;

        let mut record = QuestRecord::new(&quest.id, quest.reward_amount);
        record.transition(QuestStatus::Verifying, "Verifying your on-chain activity...")?;

        match self.verifier.check(quest, wallet).await {
            VerifyOutcome::Verified => {}
            VerifyOutcome::NotFound => {
                record.transition(
                    QuestStatus::Error,
                    "We couldn't find this activity on-chain yet. Complete the task and try again.",
                )?;
                return Ok(record);
            }
            VerifyOutcome::UpstreamUnavailable(reason) => {
                warn!("Explorer unavailable for quest {}: {}", quest.id, reason);
                record.transition(
                    QuestStatus::Error,
                    "The block explorer is unavailable right now. Please try again in a moment.",
                )?;
                return Ok(record);
            }
        }

        self.settle_reward(quest, wallet, record).await
    }

    async fn settle_reward(
        &self,
        quest: &QuestDefinition,
        wallet: &str,
        mut record: QuestRecord,
    ) -> Result<QuestRecord, KronosError> {
        match self.ledger.get_reward(&quest.id, wallet) {
            Ok(Some(existing)) if existing.status == RewardStatus::Sent => {
                info!("Quest {} already rewarded for {}", quest.id, wallet);
                record.transition(QuestStatus::Sending, "Verified! Checking your reward...")?;
                record.transaction_hash = existing.transaction_hash;
                record.transition(
                    QuestStatus::Complete,
                    "Quest complete! Your reward was already sent.",
                )?;
                return Ok(record);
            }
            Ok(Some(_)) => {
                warn!("Pending reward claim blocks {} for {}", quest.id, wallet);
                record.transition(
                    QuestStatus::Error,
                    "A reward for this quest is still pending. Please contact support before retrying.",
                )?;
                return Ok(record);
            }
            Ok(None) => {}
            Err(e) => {
                error!("Failed to read reward ledger: {}", e);
                record.transition(
                    QuestStatus::Error,
                    "Verified, but the reward ledger is unavailable. Please try again later.",
                )?;
                return Ok(record);
            }
        }

        let amount_minor_units =
            match to_minor_units(quest.reward_amount, self.disburser.decimals()) {
                Ok(units) => units,
                Err(e) => {
                    error!("Quest {} has an invalid reward: {}", quest.id, e);
                    record.transition(QuestStatus::Error, e.to_string())?;
                    return Ok(record);
                }
            };

        record.transition(QuestStatus::Sending, "Verified! Sending your reward...")?;

        if let Err(e) = self
            .ledger
            .begin_claim(&quest.id, wallet, amount_minor_units)
        {
            error!("Failed to record reward claim: {}", e);
            record.transition(
                QuestStatus::Error,
                "Verified, but the reward could not be recorded. Please try again.",
            )?;
            return Ok(record);
        }

        match self.disburser.send(wallet, quest.reward_amount).await {
            DisburseOutcome::Sent(transfer) => {
                let hash = transfer.transaction_hash.clone().unwrap_or_default();
                if let Err(e) = self.ledger.mark_sent(&quest.id, wallet, &hash) {
                    error!(
                        "Reward {} sent for {} / {} but ledger update failed: {}",
                        hash, quest.id, wallet, e
                    );
                }
                record.transaction_hash = transfer.transaction_hash;
                record.transition(
                    QuestStatus::Complete,
                    format!("Quest complete! ${:.2} reward sent.", quest.reward_amount),
                )?;
            }
            DisburseOutcome::NotConfigured => {
                self.release_claim(&quest.id, wallet);
                record.transition(
                    QuestStatus::Error,
                    "Verified, but rewards are not configured on this server.",
                )?;
            }
            DisburseOutcome::Failed(reason) => {
                warn!("Reward transfer failed for {}: {}", quest.id, reason);
                self.release_claim(&quest.id, wallet);
                record.transition(
                    QuestStatus::Error,
                    "Verified, but sending the reward failed. Please try again.",
                )?;
            }
        }

        Ok(record)
    }

    fn release_claim(&self, quest_id: &str, wallet: &str) {
        if let Err(e) = self.ledger.abandon_claim(quest_id, wallet) {
            error!("Failed to release pending claim {} / {}: {}", quest_id, wallet, e);
        }
    }
}
