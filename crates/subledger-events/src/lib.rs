//! Event calculation rules for the investment subledger.
//!
//! This crate turns a classified [`Transaction`] into capital-account and
//! cost-basis values, appending one [`EventCalculationEntry`] per adjustment
//! so the derived numbers can always be traced back to their cause.
//!
//! Rules are keyed on the canonical execution type (domestic and external
//! variants behave the same) and are evaluated as independent blocks:
//!
//! | Execution type            | Effect                                             |
//! |---------------------------|----------------------------------------------------|
//! | Subscription              | qualified step-up schedule, or full basis at once  |
//! | Debt                      | guarantor or real-estate basis, closing entry      |
//! | Preferred return, return of capital, tax distribution, sponsor promote | negated amount |
//! | Cash transfer + waterfall | negated amount when the weighted values are non-zero |
//!
//! The qualified subscription schedule depends on the evaluation instant, so
//! it is an explicit argument. Evaluating the same transaction before and
//! after a five-year, seven-year or cutoff boundary gives different results.
//!
//! ```
//! use subledger_core::{ActivityMetaData, ExecuteType, LedgerType, Transaction};
//! use subledger_events::{EventReferences, EventRules};
//! use rust_decimal_macros::dec;
//! use chrono::{TimeZone, Utc};
//!
//! let mut txn = Transaction::new(
//!     "t1", "bank", "escrow",
//!     ExecuteType::Subscription, LedgerType::Purchase,
//!     dec!(10000),
//!     Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
//! );
//! let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
//!
//! EventRules::default().apply(
//!     &mut txn,
//!     &ActivityMetaData::default(),
//!     &EventReferences::default(),
//!     now,
//! );
//! assert_eq!(txn.cost_basis, dec!(10000));
//! assert_eq!(txn.event_calculations.len(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod debt;
mod distribution;
mod subscription;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use subledger_core::{
    ActivityMetaData, Entity, EventCalculationEntry, ExecuteType, Transaction, WaterfallElement,
};

/// Labels written to the audit trail.
pub mod labels {
    /// Qualified subscription, initial entry.
    pub const QUALIFIED: &str = "Initial Investment is a Qualified Investment";
    /// Non-qualified subscription.
    pub const NON_QUALIFIED: &str = "Initial Investment is a Non-Qualified Investment";
    /// Five-year basis step-up.
    pub const FIVE_YEAR_STEP_UP: &str = "Five Year step up";
    /// Seven-year basis step-up.
    pub const SEVEN_YEAR_STEP_UP: &str = "Seven Year step up";
    /// Deferred gains recognized after the cutoff.
    pub const TAXES_PAID: &str = "2026 Taxes Paid";
    /// Debt entries.
    pub const DEBT: &str = "Debt";
    /// Preferred return.
    pub const PREFERRED_RETURN: &str = "Preferred Return";
    /// Return of capital.
    pub const RETURN_OF_CAPITAL: &str = "Return of Capital";
    /// Tax distribution.
    pub const TAX_DISTRIBUTION: &str = "Tax Distribution";
    /// Sponsor promote.
    pub const PROFIT_DISTRIBUTION: &str = "Profit Distribution";
}

/// Snapshots the rules may consult, resolved by the caller beforehand.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventReferences<'a> {
    /// Entity owning the destination account (debt real-estate check).
    pub destination_entity: Option<&'a Entity>,
    /// Waterfall element named by the transaction.
    pub waterfall_element: Option<&'a WaterfallElement>,
}

/// Tunable parameters of the rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRules {
    /// Date after which deferred gains on qualified investments are
    /// recognized, and before which step-ups must fall.
    pub qualified_cutoff: NaiveDate,
    /// Basis step-up after five years, as a fraction of the amount.
    pub five_year_step_up: Decimal,
    /// Additional basis step-up after seven years.
    pub seven_year_step_up: Decimal,
}

impl Default for EventRules {
    fn default() -> Self {
        Self {
            qualified_cutoff: NaiveDate::from_ymd_opt(2026, 12, 31).unwrap_or_default(),
            five_year_step_up: Decimal::new(10, 2),
            seven_year_step_up: Decimal::new(5, 2),
        }
    }
}

impl EventRules {
    /// The cutoff as an instant (midnight UTC).
    #[must_use]
    pub fn cutoff_instant(&self) -> DateTime<Utc> {
        self.qualified_cutoff.and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// Run every rule block against the transaction.
    ///
    /// Sets `capital_account`/`cost_basis` and appends audit entries. `now`
    /// is the evaluation instant used by the qualified step-up schedule.
    pub fn apply(
        &self,
        transaction: &mut Transaction,
        meta: &ActivityMetaData,
        references: &EventReferences<'_>,
        now: DateTime<Utc>,
    ) {
        let before = transaction.event_calculations.len();
        let kind = transaction.execute_type.canonical();

        if kind == ExecuteType::Subscription {
            subscription::apply(self, transaction, meta.is_qualified_capital_gains(), now);
        }

        if kind == ExecuteType::Debt {
            debt::apply(transaction, references.destination_entity);
        }

        distribution::apply_withdrawal(transaction, kind);

        if kind == ExecuteType::CashTransfer && !transaction.waterfall_id.is_empty() {
            match references.waterfall_element {
                Some(element) => distribution::apply_waterfall(transaction, element),
                None => tracing::debug!(
                    transaction = %transaction.id,
                    waterfall = %transaction.waterfall_id,
                    "waterfall element not found, skipping"
                ),
            }
        }

        let added = transaction.event_calculations.len() - before;
        if added > 0 {
            tracing::trace!(
                transaction = %transaction.id,
                entries = added,
                capital_account = %transaction.capital_account,
                cost_basis = %transaction.cost_basis,
                "computed events"
            );
        }
    }
}

/// Run the default rule set. See [`EventRules::apply`].
pub fn compute_events(
    transaction: &mut Transaction,
    meta: &ActivityMetaData,
    references: &EventReferences<'_>,
    now: DateTime<Utc>,
) {
    EventRules::default().apply(transaction, meta, references, now);
}

/// Overwrite both values with the negated amount and log the entry.
fn record_reversal(transaction: &mut Transaction, label: &str) {
    transaction.capital_account = -transaction.amount;
    transaction.cost_basis = -transaction.amount;
    transaction.add_event(EventCalculationEntry::new(
        label,
        transaction.capital_account,
        transaction.cost_basis,
    ));
}
