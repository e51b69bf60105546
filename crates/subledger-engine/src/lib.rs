//! Investment subledger aggregation.
//!
//! This crate builds the subledger of one account: it pulls the account's
//! activities from an [`ActivitySource`], turns each executed thread entry
//! into a classified [`Transaction`](subledger_core::Transaction), runs the
//! event rules for investment accounts, and walks the time-ordered result to
//! maintain the running total and the FIFO investment pool.
//!
//! # Features
//!
//! - Classification of activity envelopes into ledger types
//! - Cross-account resolution of allocation chains with cycle detection
//! - Whole-snapshot cache-aside through [`SubledgerCache`]
//! - Fiscal-quarter IRR bucketing through [`IrrCache`]
//! - Options with validation warnings
//!
//! # Example
//!
//! ```
//! use subledger_engine::{Engine, MemoryIrrCache, MemoryStore, MemorySubledgerCache};
//! use subledger_core::{Account, AccountType};
//!
//! let store = MemoryStore::new()
//!     .with_account(Account::new("escrow", "fund", AccountType::Escrow));
//! let cache = MemorySubledgerCache::new();
//! let irr = MemoryIrrCache::new();
//!
//! let engine = Engine::new(&store, &store, &cache, &irr);
//! let subledger = engine.build("escrow").unwrap();
//! assert!(subledger.transactions.is_empty());
//! assert!(cache.contains("escrow"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod classify;
mod error;
mod ingest;
mod irr;
mod options;
mod source;
mod subledger;

pub use cache::{IrrBuckets, IrrCache, MemoryIrrCache, MemorySubledgerCache, SubledgerCache};
pub use classify::{classify, Classification};
pub use error::{EngineError, Result, SourceError};
pub use irr::{fiscal_quarter_key, reference_entity, FiscalReference, IrrBucketer};
pub use options::{OptionWarning, Options};
pub use source::{ActivitySource, MemoryStore, Resolver};
pub use subledger::Subledger;

use chrono::{DateTime, Utc};
use subledger_booking::AllocationMethod;
use subledger_core::{Account, AccountType};

use crate::ingest::Ingestor;

/// Builds and caches subledgers.
///
/// Every collaborator is borrowed, so one set of stores can back several
/// engines with different options or evaluation instants.
pub struct Engine<'a> {
    source: &'a dyn ActivitySource,
    resolver: &'a dyn Resolver,
    cache: &'a dyn SubledgerCache,
    irr_cache: &'a dyn IrrCache,
    options: Options,
    now: DateTime<Utc>,
}

impl<'a> Engine<'a> {
    /// Create an engine with default options, evaluating at the current time.
    #[must_use]
    pub fn new(
        source: &'a dyn ActivitySource,
        resolver: &'a dyn Resolver,
        cache: &'a dyn SubledgerCache,
        irr_cache: &'a dyn IrrCache,
    ) -> Self {
        Self {
            source,
            resolver,
            cache,
            irr_cache,
            options: Options::new(),
            now: Utc::now(),
        }
    }

    /// Use the given options.
    #[must_use]
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Evaluate time-dependent rules at `now`.
    #[must_use]
    pub const fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// The engine's options.
    #[must_use]
    pub const fn options(&self) -> &Options {
        &self.options
    }

    /// The subledger of an account, from the cache when present.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Source`] when activities for the account or a
    /// counterpart cannot be retrieved, and [`EngineError::Cycle`] when
    /// cross-account resolution loops back to an account still being
    /// computed. Nothing is cached on error.
    pub fn build(&self, account_id: &str) -> Result<Subledger> {
        let mut in_flight = Vec::new();
        self.resolve(account_id, &mut in_flight)
    }

    /// Drop the cached subledger of an account and compute it again.
    ///
    /// Counterpart subledgers are still served from the cache.
    ///
    /// # Errors
    ///
    /// See [`Engine::build`].
    pub fn rebuild(&self, account_id: &str) -> Result<Subledger> {
        self.clear_cache(account_id);
        self.build(account_id)
    }

    /// Drop the cached subledger of an account.
    pub fn clear_cache(&self, account_id: &str) {
        tracing::debug!(account = account_id, "clearing cached subledger");
        self.cache.delete(account_id);
    }

    fn resolve(&self, account_id: &str, in_flight: &mut Vec<String>) -> Result<Subledger> {
        if let Some(pos) = in_flight.iter().position(|id| id == account_id) {
            let mut cycle = in_flight[pos..].to_vec();
            cycle.push(account_id.to_string());
            tracing::warn!(cycle = %cycle.join(" -> "), "subledger cycle detected");
            return Err(EngineError::Cycle { cycle });
        }

        if let Some(cached) = self.cache.get(account_id) {
            tracing::trace!(account = account_id, "subledger served from cache");
            return Ok(cached);
        }

        in_flight.push(account_id.to_string());
        let computed = self.compute(account_id, in_flight);
        in_flight.pop();
        let subledger = computed?;

        self.cache.set(&subledger);
        tracing::info!(
            account = account_id,
            transactions = subledger.transactions.len(),
            grand_total = %subledger.grand_total,
            depth = in_flight.len(),
            "built subledger"
        );
        Ok(subledger)
    }

    fn compute(&self, account_id: &str, in_flight: &mut Vec<String>) -> Result<Subledger> {
        let account = self.resolver.account(account_id).unwrap_or_else(|| {
            tracing::warn!(account = account_id, "account not found, building without details");
            Account::new(account_id, "", AccountType::default())
        });

        self.irr_cache.clear_account(account_id);
        let activities = self.source.activities(account_id)?;

        let rules = self.options.event_rules();
        let bucketer =
            IrrBucketer::new(self.resolver, self.irr_cache, self.options.fiscal_year_end);
        let ingested = Ingestor {
            account: &account,
            resolver: self.resolver,
            rules: &rules,
            irr: &bucketer,
            now: self.now,
        }
        .run(&activities);

        let mut subledger = Subledger::new(account_id);
        subledger.accounts = ingested.accounts;
        subledger.transactions = ingested.transactions;
        subledger.aggregate(
            account.kind,
            |asset_id| self.allocation_method(asset_id),
            |counterpart| self.resolve(counterpart, in_flight),
        )?;
        Ok(subledger)
    }

    /// Allocation method configured by the fund issuing the asset, or the
    /// engine's default when the fund names none it recognizes.
    fn allocation_method(&self, asset_id: &str) -> AllocationMethod {
        self.resolver
            .asset(asset_id)
            .and_then(|asset| self.resolver.entity(&asset.entity_id))
            .and_then(|fund| fund.subaccounting_method)
            .and_then(|method| match method.trim().parse() {
                Ok(parsed) => Some(parsed),
                Err(err) => {
                    tracing::debug!(
                        asset = asset_id,
                        error = %err,
                        "using default allocation method"
                    );
                    None
                }
            })
            .unwrap_or(self.options.allocation_method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use subledger_core::{Asset, Entity, EntityType};

    fn store(method: &str) -> MemoryStore {
        MemoryStore::new()
            .with_entity(Entity::new("fund", EntityType::Fund).with_subaccounting_method(method))
            .with_asset(Asset::new("units", "fund"))
    }

    #[test]
    fn test_fund_method_used_when_recognized() {
        let store = store(" fifo ");
        let cache = MemorySubledgerCache::new();
        let irr = MemoryIrrCache::new();
        let engine = Engine::new(&store, &store, &cache, &irr);
        assert_eq!(engine.allocation_method("units"), AllocationMethod::Fifo);
    }

    #[test]
    fn test_unrecognized_fund_method_falls_back_to_options() {
        let store = store("weighted");
        let cache = MemorySubledgerCache::new();
        let irr = MemoryIrrCache::new();
        let mut options = Options::new();
        options.set("allocation_method", "fifo");
        let engine = Engine::new(&store, &store, &cache, &irr).with_options(options);

        let expected = engine.options().allocation_method;
        assert_eq!(engine.allocation_method("units"), expected);
        assert_eq!(engine.allocation_method("missing"), expected);
    }
}
