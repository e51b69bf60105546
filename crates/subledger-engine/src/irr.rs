//! Fiscal-quarter bucketing of IRR inputs.
//!
//! Transactions relevant to an internal-rate-of-return calculation are summed
//! into buckets keyed by a fiscal year/quarter label relative to the
//! reference entity's incorporation date. Solving the IRR is left to the
//! consumer of the buckets.
//!
//! The quarter label is `Y<n>Q<q>` where `n` is the one-based fiscal year
//! since the quarter anchor and `q` is the month count (plus one when any
//! days are left over) divided by four, rounded up.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use subledger_core::calendar::{add_date, date_diff, normalized_date};
use subledger_core::{Account, Entity, EntityType, ExecuteType, FiscalYearEnd, Transaction};

use crate::cache::IrrCache;
use crate::source::Resolver;

/// Fiscal calendar of the entity an IRR bucket is measured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiscalReference {
    /// Fiscal-year end.
    pub fiscal_year_end: FiscalYearEnd,
    /// Start of the entity's fiscal history.
    pub start: NaiveDate,
}

/// Which entity's fiscal calendar applies to a transaction, if any.
///
/// `owner` is the entity owning the account, `counterparty` the transaction's
/// counterparty entity.
#[must_use]
pub fn reference_entity<'a>(
    owner: Option<&'a Entity>,
    counterparty: Option<&'a Entity>,
    transaction: &Transaction,
) -> Option<&'a Entity> {
    let owner_kind = owner.map(|e| e.kind);
    let counterparty_kind = counterparty.map(|e| e.kind);
    let kind = transaction.execute_type;
    let non_fund_equity = kind.canonical() == ExecuteType::NonFundEquity;
    let counterparty_id = transaction.counter_entity_id.as_str();

    // Fund investing into a business.
    if owner_kind == Some(EntityType::Fund)
        && counterparty_kind == Some(EntityType::Business)
        && !non_fund_equity
    {
        return owner;
    }
    // Business investing into its own projects.
    if owner_kind == Some(EntityType::Business)
        && (counterparty_id.is_empty() || owner.is_some_and(|o| o.id == counterparty_id))
    {
        return owner;
    }
    // Investor subscribing to or selling out of a fund.
    if (kind.is_subscription() || kind == ExecuteType::Sale)
        && counterparty_kind == Some(EntityType::Fund)
    {
        return counterparty;
    }
    // Direct investment into a business.
    if non_fund_equity && counterparty_kind == Some(EntityType::Business) {
        return counterparty;
    }
    None
}

/// First quarter boundary on or before `start`.
fn quarter_anchor(start: NaiveDate, fiscal_year_end: FiscalYearEnd) -> Option<NaiveDate> {
    let mut anchor = normalized_date(
        start.year(),
        fiscal_year_end.month as i32,
        fiscal_year_end.day as i32 + 1,
    )?;

    if anchor > start {
        while anchor > start {
            anchor = add_date(anchor, 0, -3, 0)?;
        }
    } else {
        loop {
            let next = add_date(anchor, 0, 3, 0)?;
            if next >= start {
                break;
            }
            anchor = next;
        }
    }
    Some(anchor)
}

/// Quarter label of `timestamp` relative to a fiscal reference.
#[must_use]
pub fn fiscal_quarter_key(reference: FiscalReference, timestamp: DateTime<Utc>) -> Option<String> {
    let anchor = quarter_anchor(reference.start, reference.fiscal_year_end)?;
    let diff = date_diff(anchor.and_time(NaiveTime::MIN), timestamp.naive_utc());

    let months = if diff.days > 0 {
        diff.months + 1
    } else {
        diff.months
    };
    let quarter = (months + 3) / 4;
    Some(format!("Y{}Q{}", diff.years + 1, quarter))
}

/// Accumulates IRR inputs for one account into an [`IrrCache`].
pub struct IrrBucketer<'a> {
    resolver: &'a dyn Resolver,
    cache: &'a dyn IrrCache,
    default_fiscal_year_end: FiscalYearEnd,
}

impl<'a> IrrBucketer<'a> {
    /// Create a bucketer.
    #[must_use]
    pub fn new(
        resolver: &'a dyn Resolver,
        cache: &'a dyn IrrCache,
        default_fiscal_year_end: FiscalYearEnd,
    ) -> Self {
        Self {
            resolver,
            cache,
            default_fiscal_year_end,
        }
    }

    /// Fiscal reference for a transaction of `account`, if it is relevant.
    #[must_use]
    pub fn reference(
        &self,
        account: &Account,
        transaction: &Transaction,
    ) -> Option<FiscalReference> {
        let owner = self.resolver.entity(&account.entity_id);
        let counterparty = self.resolver.entity(&transaction.counter_entity_id);
        let entity = reference_entity(owner.as_ref(), counterparty.as_ref(), transaction)?;

        let start = entity.incorporation_date.unwrap_or_else(|| {
            tracing::debug!(
                entity = %entity.id,
                transaction = %transaction.id,
                "no incorporation date, using transaction date"
            );
            transaction.timestamp.date_naive()
        });
        Some(FiscalReference {
            fiscal_year_end: entity
                .fiscal_year_end()
                .unwrap_or(self.default_fiscal_year_end),
            start,
        })
    }

    /// Add the transaction's amount to its quarter bucket.
    ///
    /// Returns the bucket key, or `None` when the transaction is not an IRR
    /// input. The read-merge-write on the cache is not atomic.
    pub fn bucket(&self, account: &Account, transaction: &Transaction) -> Option<String> {
        let reference = self.reference(account, transaction)?;
        let key = fiscal_quarter_key(reference, transaction.timestamp)?;

        let counterparty = transaction.counter_entity_id.as_str();
        let mut buckets = self.cache.get(&account.id, counterparty);
        *buckets.entry(key.clone()).or_default() += transaction.amount;
        self.cache.set(&account.id, counterparty, buckets);

        tracing::trace!(
            account = %account.id,
            counterparty,
            key = %key,
            amount = %transaction.amount,
            "bucketed IRR input"
        );
        Some(key)
    }
}
