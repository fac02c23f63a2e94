//! ============================================================================
//! In-Flight Guard - One verification/reward attempt per (wallet, quest)
//! ============================================================================
//! A ticket is held for the whole verify -> send sequence and released on
//! drop, including on early return or cancellation of the owning future.
//! ============================================================================

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

type Key = (String, String);

/// Shared set of (wallet, quest) pairs currently being processed
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    active: Arc<Mutex<HashSet<Key>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the pair, or None if an attempt is already running
    pub fn try_acquire(&self, wallet: &str, quest_id: &str) -> Option<InFlightTicket> {
        let key = (wallet.trim().to_lowercase(), quest_id.to_string());
        let mut active = match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("In-flight registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };

        if !active.insert(key.clone()) {
            debug!("Quest {} already in flight for {}", key.1, key.0);
            return None;
        }

        Some(InFlightTicket {
            active: Arc::clone(&self.active),
            key,
        })
    }

    pub fn is_in_flight(&self, wallet: &str, quest_id: &str) -> bool {
        let key = (wallet.trim().to_lowercase(), quest_id.to_string());
        self.active
            .lock()
            .map(|active| active.contains(&key))
            .unwrap_or_else(|poisoned| poisoned.into_inner().contains(&key))
    }
}

/// Releases its pair when dropped
#[derive(Debug)]
pub struct InFlightTicket {
    active: Arc<Mutex<HashSet<Key>>>,
    key: Key,
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        let mut active = match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        active.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ALICE, BOB};

    #[test]
    fn test_second_acquire_blocked_until_drop() {
        let registry = InFlightRegistry::new();

        let ticket = registry.try_acquire(ALICE, "first-swap");
        assert!(ticket.is_some());
        assert!(registry.try_acquire(ALICE, "first-swap").is_none());
        assert!(registry.is_in_flight(ALICE, "first-swap"));

        drop(ticket);
        assert!(!registry.is_in_flight(ALICE, "first-swap"));
        assert!(registry.try_acquire(ALICE, "first-swap").is_some());
    }

    #[test]
    fn test_pairs_are_independent() {
        let registry = InFlightRegistry::new();
        let _swap = registry.try_acquire(ALICE, "first-swap").unwrap();

        assert!(registry.try_acquire(ALICE, "first-nft").is_some());
        assert!(registry.try_acquire(BOB, "first-swap").is_some());
    }

    #[test]
    fn test_wallet_case_is_ignored() {
        let registry = InFlightRegistry::new();
        let _t = registry
            .try_acquire("0xabcdefabcdefabcdefabcdefabcdefabcdefabcd", "first-swap")
            .unwrap();
        assert!(registry
            .try_acquire("0xABCDEFabcdefABCDEFabcdefABCDEFabcdefABCD", "first-swap")
            .is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let registry = InFlightRegistry::new();
        let other = registry.clone();
        let _t = registry.try_acquire(ALICE, "first-swap").unwrap();
        assert!(other.try_acquire(ALICE, "first-swap").is_none());
    }
}
