// ============================================================================
// RewardDb — Embedded Reward Ledger (redb)
// ============================================================================
// Persistent record of which (quest, wallet) pairs were paid, so a quest is
// rewarded at most once. Default path: ~/.kronos/rewards.redb (override via
// KRONOS_DB_PATH env var)
// ============================================================================

pub mod types;

pub use types::{LedgerStats, RewardRecord, RewardStatus};

use anyhow::{anyhow, Result};
use redb::{Database, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const REWARDS: TableDefinition<&str, &[u8]> = TableDefinition::new("rewards");

/// Embedded reward ledger
pub struct RewardDb {
    db: Database,
    path: PathBuf,
}

fn reward_key(quest_id: &str, wallet: &str) -> String {
    format!("rewards:{}:{}", quest_id, wallet.trim().to_lowercase())
}

impl RewardDb {
    /// Open (or create) the ledger at the given path.
    /// If `path` is None, uses KRONOS_DB_PATH env var or ~/.kronos/rewards.redb
    pub fn open(path: Option<&str>) -> Result<Self> {
        let db_path = if let Some(p) = path {
            PathBuf::from(p)
        } else if let Ok(env_path) = std::env::var("KRONOS_DB_PATH") {
            PathBuf::from(env_path)
        } else {
            let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
            let kronos_dir = home.join(".kronos");
            std::fs::create_dir_all(&kronos_dir)
                .map_err(|e| anyhow!("Failed to create .kronos directory: {}", e))?;
            kronos_dir.join("rewards.redb")
        };

        info!("Opening reward ledger at: {}", db_path.display());

        let db = Database::create(&db_path)
            .map_err(|e| anyhow!("Failed to open database: {}", e))?;

        // Ensure the table exists
        let write_txn = db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let _ = write_txn
                .open_table(REWARDS)
                .map_err(|e| anyhow!("Failed to create rewards table: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit init: {}", e))?;

        Ok(Self { db, path: db_path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn put(&self, record: &RewardRecord) -> Result<()> {
        let key = reward_key(&record.quest_id, &record.wallet);
        let value = bincode::serialize(record)
            .map_err(|e| anyhow!("Failed to serialize reward: {}", e))?;

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn.open_table(REWARDS)
                .map_err(|e| anyhow!("Failed to open rewards table: {}", e))?;
            table.insert(key.as_str(), value.as_slice())
                .map_err(|e| anyhow!("Failed to insert reward: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;
        Ok(())
    }

    pub fn get_reward(&self, quest_id: &str, wallet: &str) -> Result<Option<RewardRecord>> {
        let key = reward_key(quest_id, wallet);

        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(REWARDS)
            .map_err(|e| anyhow!("Failed to open rewards table: {}", e))?;

        match table.get(key.as_str()).map_err(|e| anyhow!("Failed to get reward: {}", e))? {
            Some(value) => {
                let record: RewardRecord = bincode::deserialize(value.value())
                    .map_err(|e| anyhow!("Failed to deserialize reward: {}", e))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Record a pending claim. Fails if any row already exists for the pair;
    /// the check and the insert share one write transaction.
    pub fn begin_claim(&self, quest_id: &str, wallet: &str, amount_minor_units: u64) -> Result<RewardRecord> {
        let key = reward_key(quest_id, wallet);
        let record = RewardRecord {
            quest_id: quest_id.to_string(),
            wallet: wallet.trim().to_lowercase(),
            amount_minor_units,
            status: RewardStatus::Pending,
            transaction_hash: None,
            created_at: chrono::Utc::now().timestamp(),
            sent_at: None,
        };
        let value = bincode::serialize(&record)
            .map_err(|e| anyhow!("Failed to serialize reward: {}", e))?;

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn.open_table(REWARDS)
                .map_err(|e| anyhow!("Failed to open rewards table: {}", e))?;
            let exists = table.get(key.as_str())
                .map_err(|e| anyhow!("Failed to get reward: {}", e))?
                .is_some();
            if exists {
                return Err(anyhow!("Reward for {} already claimed by {}", quest_id, wallet));
            }
            table.insert(key.as_str(), value.as_slice())
                .map_err(|e| anyhow!("Failed to insert reward: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("Pending reward claim: {}", key);
        Ok(record)
    }

    pub fn mark_sent(&self, quest_id: &str, wallet: &str, transaction_hash: &str) -> Result<()> {
        let mut record = self
            .get_reward(quest_id, wallet)?
            .ok_or_else(|| anyhow!("No reward claim for {} / {}", quest_id, wallet))?;

        record.status = RewardStatus::Sent;
        record.transaction_hash = Some(transaction_hash.to_string());
        record.sent_at = Some(chrono::Utc::now().timestamp());

        self.put(&record)?;
        debug!("Reward marked sent: {} / {} ({})", quest_id, wallet, transaction_hash);
        Ok(())
    }

    /// Drop a pending claim after a failed transfer. Sent rows are kept.
    pub fn abandon_claim(&self, quest_id: &str, wallet: &str) -> Result<bool> {
        match self.get_reward(quest_id, wallet)? {
            Some(record) if record.status == RewardStatus::Pending => self.delete(quest_id, wallet),
            Some(_) => {
                warn!("Refusing to abandon a sent reward: {} / {}", quest_id, wallet);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    /// Manual recovery for a pending claim whose transfer was checked by hand
    pub fn clear_pending(&self, quest_id: &str, wallet: &str) -> Result<bool> {
        self.abandon_claim(quest_id, wallet)
    }

    fn delete(&self, quest_id: &str, wallet: &str) -> Result<bool> {
        let key = reward_key(quest_id, wallet);

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let removed;
        {
            let mut table = write_txn.open_table(REWARDS)
                .map_err(|e| anyhow!("Failed to open rewards table: {}", e))?;
            removed = table.remove(key.as_str())
                .map_err(|e| anyhow!("Failed to remove reward: {}", e))?
                .is_some();
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit delete: {}", e))?;

        if removed {
            debug!("Deleted reward claim: {}", key);
        }
        Ok(removed)
    }

    pub fn list_rewards(&self, status_filter: Option<&RewardStatus>) -> Result<Vec<RewardRecord>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(REWARDS)
            .map_err(|e| anyhow!("Failed to open rewards table: {}", e))?;

        let mut results = Vec::new();
        let iter = table.range::<&str>(..)
            .map_err(|e| anyhow!("Failed to iterate rewards: {}", e))?;
        for entry in iter {
            let (_key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
            let record: RewardRecord = bincode::deserialize(value.value())
                .map_err(|e| anyhow!("Failed to deserialize reward: {}", e))?;

            match status_filter {
                Some(filter) if &record.status != filter => {}
                _ => results.push(record),
            }
        }
        Ok(results)
    }

    pub fn stats(&self) -> Result<LedgerStats> {
        let all = self.list_rewards(None)?;
        let sent: Vec<_> = all.iter().filter(|r| r.status == RewardStatus::Sent).collect();

        Ok(LedgerStats {
            total_rewards: all.len(),
            pending: all.len() - sent.len(),
            sent: sent.len(),
            sent_minor_units: sent.iter().map(|r| r.amount_minor_units).sum(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{temp_db, ALICE, BOB};

    #[test]
    fn test_claim_lifecycle() {
        let db = temp_db();
        assert!(db.get_reward("first-swap", ALICE).unwrap().is_none());

        db.begin_claim("first-swap", ALICE, 750_000).unwrap();
        let pending = db.get_reward("first-swap", ALICE).unwrap().unwrap();
        assert_eq!(pending.status, RewardStatus::Pending);

        db.mark_sent("first-swap", ALICE, "0xabc").unwrap();
        let sent = db.get_reward("first-swap", ALICE).unwrap().unwrap();
        assert_eq!(sent.status, RewardStatus::Sent);
        assert_eq!(sent.transaction_hash.as_deref(), Some("0xabc"));
        assert!(sent.sent_at.is_some());
    }

    #[test]
    fn test_double_claim_rejected() {
        let db = temp_db();
        db.begin_claim("first-swap", ALICE, 750_000).unwrap();
        assert!(db.begin_claim("first-swap", ALICE, 750_000).is_err());

        // Same quest, other wallet; same wallet, other quest
        assert!(db.begin_claim("first-swap", BOB, 750_000).is_ok());
        assert!(db.begin_claim("first-nft", ALICE, 500_000).is_ok());
    }

    #[test]
    fn test_wallet_key_is_case_insensitive() {
        let db = temp_db();
        db.begin_claim("first-swap", &ALICE.to_uppercase().replacen("0X", "0x", 1), 1).unwrap();
        assert!(db.get_reward("first-swap", ALICE).unwrap().is_some());
    }

    #[test]
    fn test_abandon_only_removes_pending() {
        let db = temp_db();
        db.begin_claim("first-swap", ALICE, 750_000).unwrap();
        assert!(db.abandon_claim("first-swap", ALICE).unwrap());
        assert!(db.get_reward("first-swap", ALICE).unwrap().is_none());

        db.begin_claim("first-swap", ALICE, 750_000).unwrap();
        db.mark_sent("first-swap", ALICE, "0xabc").unwrap();
        assert!(!db.abandon_claim("first-swap", ALICE).unwrap());
        assert!(db.get_reward("first-swap", ALICE).unwrap().is_some());
    }

    #[test]
    fn test_list_and_stats() {
        let db = temp_db();
        db.begin_claim("first-swap", ALICE, 750_000).unwrap();
        db.mark_sent("first-swap", ALICE, "0xabc").unwrap();
        db.begin_claim("first-nft", ALICE, 500_000).unwrap();

        assert_eq!(db.list_rewards(None).unwrap().len(), 2);
        assert_eq!(db.list_rewards(Some(&RewardStatus::Pending)).unwrap().len(), 1);

        let stats = db.stats().unwrap();
        assert_eq!(stats.total_rewards, 2);
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.sent_minor_units, 750_000);
    }
}
