//! Snapshots of the surrounding domain model.
//!
//! The subledger never owns accounts, entities, assets or waterfall
//! definitions. It receives read-only snapshots of them from a resolver and
//! only reads the handful of fields listed here.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind of account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// A regular bank or cash account.
    #[default]
    Bank,
    /// An investor's position in a fund.
    Investment,
    /// A fund's escrow account receiving subscriptions.
    Escrow,
    /// An account held outside the platform.
    External,
    /// An account imported from historical records.
    Historical,
    /// A fund sponsor's account.
    Sponsor,
}

impl AccountType {
    /// Whether the account lives outside the platform's own books.
    #[must_use]
    pub const fn is_off_platform(self) -> bool {
        matches!(self, Self::External | Self::Historical)
    }
}

/// Snapshot of an account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Account {
    /// Account identifier.
    pub id: String,
    /// Entity owning the account.
    pub entity_id: String,
    /// Custodial entity (the fund, for investment accounts).
    #[serde(default)]
    pub custodial_entity_id: String,
    /// Kind of account.
    #[serde(default)]
    pub kind: AccountType,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Bank account number, used to match envelopes without account ids.
    #[serde(default)]
    pub account_number: String,
    /// Bank routing number.
    #[serde(default)]
    pub routing_number: String,
}

impl Account {
    /// Create an account snapshot.
    #[must_use]
    pub fn new(id: impl Into<String>, entity_id: impl Into<String>, kind: AccountType) -> Self {
        Self {
            id: id.into(),
            entity_id: entity_id.into(),
            kind,
            ..Self::default()
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the custodial entity.
    #[must_use]
    pub fn with_custodian(mut self, entity_id: impl Into<String>) -> Self {
        self.custodial_entity_id = entity_id.into();
        self
    }

    /// Set the bank account and routing numbers.
    #[must_use]
    pub fn with_numbers(mut self, account: impl Into<String>, routing: impl Into<String>) -> Self {
        self.account_number = account.into();
        self.routing_number = routing.into();
        self
    }
}

/// Kind of entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// A natural person or household.
    #[default]
    Individual,
    /// An investment fund.
    Fund,
    /// An operating business or project company.
    Business,
    /// Any other legal entity.
    Other,
}

/// A fiscal-year end as month and day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FiscalYearEnd {
    /// Month, 1-12.
    pub month: u32,
    /// Day of month.
    pub day: u32,
}

impl Default for FiscalYearEnd {
    fn default() -> Self {
        Self { month: 12, day: 31 }
    }
}

/// Error parsing a fiscal-year end.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseFiscalYearError {
    /// Not of the form `MMDD`.
    #[error("invalid fiscal year end: {0}")]
    Format(String),
    /// Month or day outside the calendar.
    #[error("fiscal year end out of range: {0}")]
    OutOfRange(String),
}

impl FromStr for FiscalYearEnd {
    type Err = ParseFiscalYearError;

    /// Parse the `MMDD` form stored in entity details.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() < 3 || !s.is_ascii() {
            return Err(ParseFiscalYearError::Format(s.to_string()));
        }
        let (month, day) = s.split_at(2);
        let (Ok(month), Ok(day)) = (month.parse::<u32>(), day.parse::<u32>()) else {
            return Err(ParseFiscalYearError::Format(s.to_string()));
        };
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return Err(ParseFiscalYearError::OutOfRange(s.to_string()));
        }
        Ok(Self { month, day })
    }
}

impl fmt::Display for FiscalYearEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{:02}", self.month, self.day)
    }
}

/// Snapshot of an entity (investor, fund or business).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Entity {
    /// Entity identifier.
    pub id: String,
    /// Kind of entity.
    #[serde(default)]
    pub kind: EntityType,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Fiscal-year end in `MMDD` form, if configured.
    #[serde(default)]
    pub fiscal_year: Option<String>,
    /// Incorporation date, if known.
    #[serde(default)]
    pub incorporation_date: Option<NaiveDate>,
    /// Whether the entity holds real estate.
    #[serde(default)]
    pub is_real_estate: bool,
    /// Configured subaccounting (allocation) method for funds.
    #[serde(default)]
    pub subaccounting_method: Option<String>,
}

impl Entity {
    /// Create an entity snapshot.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: EntityType) -> Self {
        Self {
            id: id.into(),
            kind,
            ..Self::default()
        }
    }

    /// Set the fiscal-year end (`MMDD`).
    #[must_use]
    pub fn with_fiscal_year(mut self, mmdd: impl Into<String>) -> Self {
        self.fiscal_year = Some(mmdd.into());
        self
    }

    /// Set the incorporation date.
    #[must_use]
    pub const fn with_incorporation_date(mut self, date: NaiveDate) -> Self {
        self.incorporation_date = Some(date);
        self
    }

    /// Flag the entity as a real-estate holder.
    #[must_use]
    pub const fn real_estate(mut self) -> Self {
        self.is_real_estate = true;
        self
    }

    /// Set the subaccounting method.
    #[must_use]
    pub fn with_subaccounting_method(mut self, method: impl Into<String>) -> Self {
        self.subaccounting_method = Some(method.into());
        self
    }

    /// The parsed fiscal-year end, if set and well formed.
    #[must_use]
    pub fn fiscal_year_end(&self) -> Option<FiscalYearEnd> {
        self.fiscal_year
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .and_then(|s| s.parse().ok())
    }
}

/// A share class of an asset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InvestmentClass {
    /// Class name, e.g. "Class A".
    #[serde(default)]
    pub investment_type: String,
    /// Price per unit in this class.
    #[serde(default)]
    pub unit_price: Decimal,
}

/// Snapshot of an asset (the thing a fund sells units of).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Asset {
    /// Asset identifier.
    pub id: String,
    /// Entity (fund) issuing the asset.
    #[serde(default)]
    pub entity_id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Share classes with their unit prices.
    #[serde(default)]
    pub investment_classes: Vec<InvestmentClass>,
}

impl Asset {
    /// Create an asset snapshot.
    #[must_use]
    pub fn new(id: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity_id: entity_id.into(),
            ..Self::default()
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Add a share class.
    #[must_use]
    pub fn with_class(mut self, investment_type: impl Into<String>, unit_price: Decimal) -> Self {
        self.investment_classes.push(InvestmentClass {
            investment_type: investment_type.into(),
            unit_price,
        });
        self
    }

    /// Unit price of the named share class.
    #[must_use]
    pub fn class_price(&self, investment_type: &str) -> Option<Decimal> {
        self.investment_classes
            .iter()
            .find(|c| c.investment_type == investment_type)
            .map(|c| c.unit_price)
    }
}

/// A named distribution-weighting rule applied to cash transfers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WaterfallElement {
    /// Waterfall identifier.
    pub id: String,
    /// Element name, used as the event entry label.
    pub name: String,
    /// Capital-account weight.
    #[serde(default)]
    pub capital_account: Decimal,
    /// Cost-basis weight.
    #[serde(default)]
    pub cost_basis: Decimal,
}
