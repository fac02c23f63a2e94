//! ============================================================================
//! Quest Module - Catalog, verification and the reward flow
//! ============================================================================
//! - QuestCatalog: the quests KRONOS knows, with rewards and criteria
//! - QuestVerifier: pass/fail from block-explorer data
//! - InFlightRegistry: one attempt per (wallet, quest) at a time
//! - QuestRunner: Verifying -> Sending -> Complete/Error for one attempt
//! ============================================================================

mod catalog;
mod guard;
mod runner;
mod verifier;

pub use catalog::{QuestCatalog, QuestCriterion, QuestDefinition};
pub use guard::{InFlightRegistry, InFlightTicket};
pub use runner::QuestRunner;
pub use verifier::{QuestVerifier, VerifyOutcome};
