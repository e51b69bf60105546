//! Caches for computed subledgers and IRR buckets.
//!
//! Both caches are collaborators: the engine reads and writes them through
//! the [`SubledgerCache`] and [`IrrCache`] traits. The in-memory versions
//! here keep subledgers serialized as JSON, so every `get` hands out an
//! independent copy.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;

use crate::subledger::Subledger;

/// Fiscal-quarter key (e.g. `Y2Q3`) to accumulated signed amount.
pub type IrrBuckets = BTreeMap<String, Decimal>;

/// Whole-snapshot cache of computed subledgers, keyed by account id.
pub trait SubledgerCache {
    /// Cached snapshot, if any.
    fn get(&self, account_id: &str) -> Option<Subledger>;

    /// Store a snapshot, overwriting any previous one.
    fn set(&self, subledger: &Subledger);

    /// Drop the snapshot of an account.
    fn delete(&self, account_id: &str);
}

/// IRR bucket cache keyed by `(account, counterparty)`.
pub trait IrrCache {
    /// Buckets for the pair; empty when nothing is stored.
    fn get(&self, account_id: &str, counterparty_id: &str) -> IrrBuckets;

    /// Replace the buckets for the pair.
    fn set(&self, account_id: &str, counterparty_id: &str, buckets: IrrBuckets);

    /// Drop every bucket set of an account.
    fn clear_account(&self, account_id: &str);
}

/// In-memory subledger cache storing JSON snapshots.
#[derive(Debug, Default)]
pub struct MemorySubledgerCache {
    entries: RefCell<HashMap<String, String>>,
}

impl MemorySubledgerCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a snapshot is stored for the account.
    #[must_use]
    pub fn contains(&self, account_id: &str) -> bool {
        self.entries.borrow().contains_key(account_id)
    }

    /// Number of stored snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl SubledgerCache for MemorySubledgerCache {
    fn get(&self, account_id: &str) -> Option<Subledger> {
        let entries = self.entries.borrow();
        let raw = entries.get(account_id)?;
        match serde_json::from_str(raw) {
            Ok(subledger) => Some(subledger),
            Err(err) => {
                tracing::warn!(
                    account = account_id,
                    error = %err,
                    "discarding unreadable snapshot"
                );
                None
            }
        }
    }

    fn set(&self, subledger: &Subledger) {
        match serde_json::to_string(subledger) {
            Ok(raw) => {
                self.entries
                    .borrow_mut()
                    .insert(subledger.account_id.clone(), raw);
            }
            Err(err) => {
                tracing::warn!(
                    account = %subledger.account_id,
                    error = %err,
                    "snapshot not cached"
                );
            }
        }
    }

    fn delete(&self, account_id: &str) {
        self.entries.borrow_mut().remove(account_id);
    }
}

/// In-memory IRR bucket cache.
#[derive(Debug, Default)]
pub struct MemoryIrrCache {
    entries: RefCell<HashMap<(String, String), IrrBuckets>>,
}

impl MemoryIrrCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counterparties with buckets stored for an account, sorted.
    #[must_use]
    pub fn counterparties(&self, account_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .entries
            .borrow()
            .keys()
            .filter(|(account, _)| account == account_id)
            .map(|(_, counterparty)| counterparty.clone())
            .collect();
        ids.sort();
        ids
    }
}

impl IrrCache for MemoryIrrCache {
    fn get(&self, account_id: &str, counterparty_id: &str) -> IrrBuckets {
        self.entries
            .borrow()
            .get(&(account_id.to_string(), counterparty_id.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    fn set(&self, account_id: &str, counterparty_id: &str, buckets: IrrBuckets) {
        self.entries
            .borrow_mut()
            .insert((account_id.to_string(), counterparty_id.to_string()), buckets);
    }

    fn clear_account(&self, account_id: &str) {
        self.entries
            .borrow_mut()
            .retain(|(account, _), _| account != account_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use subledger_core::{ExecuteType, Investor, LedgerType, Transaction};

    fn sample() -> Subledger {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut sl = Subledger::new("escrow");
        sl.grand_total = dec!(100);
        sl.transactions.push(Transaction::new(
            "s1",
            "",
            "escrow",
            ExecuteType::Subscription,
            LedgerType::Debit,
            dec!(100),
            ts,
        ));
        sl.investments.push(Investor::new("s1", "alice", dec!(100), ts));
        sl
    }

    #[test]
    fn test_snapshot_roundtrip_is_independent_copy() {
        let cache = MemorySubledgerCache::new();
        let original = sample();
        cache.set(&original);

        let mut copy = cache.get("escrow").unwrap();
        assert_eq!(copy, original);
        copy.investments[0].amount = dec!(0);

        assert_eq!(cache.get("escrow").unwrap().investments[0].amount, dec!(100));
    }

    #[test]
    fn test_delete() {
        let cache = MemorySubledgerCache::new();
        cache.set(&sample());
        assert!(cache.contains("escrow"));
        cache.delete("escrow");
        assert!(cache.get("escrow").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_irr_clear_account_keeps_others() {
        let cache = MemoryIrrCache::new();
        let buckets: IrrBuckets = [("Y1Q1".to_string(), dec!(5))].into_iter().collect();
        cache.set("a", "x", buckets.clone());
        cache.set("a", "y", buckets.clone());
        cache.set("b", "x", buckets);

        assert_eq!(cache.counterparties("a"), vec!["x", "y"]);
        cache.clear_account("a");
        assert!(cache.counterparties("a").is_empty());
        assert_eq!(cache.get("b", "x")["Y1Q1"], dec!(5));
        assert!(cache.get("a", "x").is_empty());
    }
}
