//! Core types for subledger
//!
//! This crate provides the fundamental types used throughout the subledger
//! workspace:
//!
//! - [`Transaction`] - A classified monetary movement with its audit trail
//! - [`EventCalculationEntry`] - One capital-account/cost-basis adjustment
//! - [`Investor`] - A lot of invested capital, or a draw on one
//! - [`TransactionList`] - Ordered transactions with typed lookups
//! - [`Activity`] - Raw activity records as supplied by the activity source
//! - [`Account`], [`Entity`], [`Asset`], [`WaterfallElement`] - Domain snapshots
//!
//! # Example
//!
//! ```
//! use subledger_core::{EventCalculationEntry, ExecuteType, LedgerType, Transaction};
//! use rust_decimal_macros::dec;
//! use chrono::{TimeZone, Utc};
//!
//! let mut txn = Transaction::new(
//!     "t1",
//!     "investor-bank",
//!     "fund-escrow",
//!     ExecuteType::Subscription,
//!     LedgerType::Purchase,
//!     dec!(10000),
//!     Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap(),
//! );
//!
//! txn.capital_account = dec!(10000);
//! txn.cost_basis = dec!(10000);
//! txn.add_event(EventCalculationEntry::new("Initial Investment", dec!(10000), dec!(10000)));
//!
//! assert!(txn.is_audit_consistent());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod activity;
pub mod calendar;
pub mod model;
pub mod money;
pub mod transaction;

pub use activity::{
    AccountDetail, Activity, ActivityContext, ActivityMetaData, ConversionInfo, DebtTerms,
    InvestmentClassInfo, ThreadEntry,
};
pub use model::{
    Account, AccountType, Asset, Entity, EntityType, FiscalYearEnd, InvestmentClass,
    ParseFiscalYearError, WaterfallElement,
};
pub use money::round_money;
pub use transaction::{
    EventCalculationEntry, ExecuteType, Guarantor, Investor, LedgerType, Transaction,
    TransactionList,
};

// Re-export commonly used external types
pub use chrono::{DateTime, NaiveDate, Utc};
pub use rust_decimal::Decimal;
