//! Pool allocation for the investment subledger.
//!
//! An account's investment pool is an ordered list of [`Investor`] lots. When
//! money leaves the account, the withdrawal is matched against the pool and
//! the matching slices become the outflow's allocation chain.
//!
//! # Allocation methods
//!
//! | Method | Order                         |
//! |--------|-------------------------------|
//! | FIFO   | Pool order, oldest lot first  |
//!
//! The method is configured per fund; unrecognized values fall back to
//! [`AllocationMethod::default`].
//!
//! # Example
//!
//! ```
//! use subledger_booking::{allocate, AllocationMethod};
//! use subledger_core::Investor;
//! use rust_decimal_macros::dec;
//! use chrono::{TimeZone, Utc};
//!
//! let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let mut pool = vec![
//!     Investor::new("s1", "alice", dec!(100), ts),
//!     Investor::new("s2", "bob", dec!(100), ts),
//! ];
//!
//! let result = allocate(AllocationMethod::Fifo, &mut pool, dec!(150), ts);
//! assert_eq!(result.allocated(), dec!(150));
//! assert_eq!(pool[0].amount, dec!(0));
//! assert_eq!(pool[1].amount, dec!(50));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use subledger_core::Investor;

/// How withdrawals are matched against the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AllocationMethod {
    /// First In, First Out. Lots are drained in pool order.
    #[default]
    Fifo,
}

impl FromStr for AllocationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FIFO" => Ok(Self::Fifo),
            _ => Err(format!("unknown allocation method: {s}")),
        }
    }
}

impl fmt::Display for AllocationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fifo => write!(f, "FIFO"),
        }
    }
}

/// Result of matching a withdrawal against a pool.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Allocation {
    /// Slices drawn from the pool, in pool order.
    pub investors: Vec<Investor>,
    /// Part of the withdrawal the pool could not cover.
    pub shortfall: Decimal,
}

impl Allocation {
    /// Sum of the allocated slices.
    #[must_use]
    pub fn allocated(&self) -> Decimal {
        self.investors.iter().map(|i| i.amount).sum()
    }

    /// Whether the pool covered the whole withdrawal.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.shortfall.is_zero()
    }
}

/// Match a withdrawal against the pool with the given method.
///
/// Lots are reduced in place as they are drawn. A withdrawal the pool cannot
/// cover is fulfilled partially and the rest is reported as
/// [`Allocation::shortfall`].
pub fn allocate(
    method: AllocationMethod,
    pool: &mut [Investor],
    withdrawal: Decimal,
    timestamp: DateTime<Utc>,
) -> Allocation {
    let allocation = match method {
        AllocationMethod::Fifo => allocate_fifo(pool, withdrawal, timestamp),
    };

    if !allocation.is_complete() {
        tracing::debug!(
            method = %method,
            withdrawal = %withdrawal,
            shortfall = %allocation.shortfall,
            "pool could not cover withdrawal"
        );
    }

    allocation
}

/// FIFO walk over the pool.
///
/// Lots with a non-positive amount are skipped. Every slice carries the lot's
/// source and investor account and the withdrawal's timestamp.
pub fn allocate_fifo(
    pool: &mut [Investor],
    withdrawal: Decimal,
    timestamp: DateTime<Utc>,
) -> Allocation {
    if withdrawal <= Decimal::ZERO {
        return Allocation::default();
    }

    let mut remaining = withdrawal;
    let mut investors = Vec::new();

    for lot in pool.iter_mut() {
        if remaining.is_zero() {
            break;
        }
        if lot.amount <= Decimal::ZERO {
            continue;
        }

        let take = remaining.min(lot.amount);
        lot.amount -= take;
        remaining -= take;

        investors.push(Investor::new(
            lot.source_id.clone(),
            lot.investor_account.clone(),
            take,
            timestamp,
        ));
    }

    Allocation {
        investors,
        shortfall: remaining,
    }
}

/// Total remaining in the pool.
#[must_use]
pub fn pool_balance(pool: &[Investor]) -> Decimal {
    pool.iter()
        .map(|lot| lot.amount)
        .filter(|amount| *amount > Decimal::ZERO)
        .sum()
}
