//! Monetary rounding and lenient decimal parsing.
//!
//! Every derived monetary value in the subledger is rounded to a fixed
//! two-decimal unit before it is stored or compared to zero. Activity
//! envelopes carry money either as JSON numbers or as numeric strings, so
//! the serde helpers here accept both and treat an empty string as absent.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

/// Number of decimal places in the monetary unit.
pub const MONEY_SCALE: u32 = 2;

/// Round a value to the monetary unit, midpoint away from zero.
///
/// # Examples
///
/// ```
/// use subledger_core::money::round_money;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(round_money(dec!(10.005)), dec!(10.01));
/// assert_eq!(round_money(dec!(-10.005)), dec!(-10.01));
/// assert_eq!(round_money(dec!(1.234)), dec!(1.23));
/// ```
#[must_use]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Parse a decimal from a loosely formatted string.
///
/// Surrounding whitespace and thousands separators are ignored. Returns
/// `None` for empty or malformed input.
#[must_use]
pub fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let cleaned: String = trimmed.chars().filter(|c| *c != ',').collect();
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(Decimal),
    Text(String),
}

/// Deserialize an optional decimal from a number, a numeric string, an empty
/// string or `null`.
pub fn deserialize_opt_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<NumberOrString>::deserialize(deserializer)?;
    Ok(match raw {
        None => None,
        Some(NumberOrString::Number(n)) => Some(n),
        Some(NumberOrString::Text(s)) => parse_decimal(&s),
    })
}
