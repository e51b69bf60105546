//! Raw activity records as supplied by the activity source.
//!
//! An [`Activity`] is a workflow thread; each [`ThreadEntry`] carries an
//! envelope ([`ActivityMetaData`]) describing one executed movement. Monetary
//! fields arrive as JSON numbers or numeric strings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::deserialize_opt_decimal;
use crate::transaction::{ExecuteType, Guarantor};

/// Bank details of one side of a movement, used when no account id is given.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountDetail {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Bank account number.
    #[serde(default)]
    pub account_number: String,
    /// Bank routing number.
    #[serde(default)]
    pub routing_number: String,
}

/// Entities the activity was started on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActivityContext {
    /// Investor entity.
    #[serde(default)]
    pub investor: String,
    /// Fund entity.
    #[serde(default)]
    pub fund: String,
    /// Any other entity the activity is scoped to.
    #[serde(default)]
    pub entity: String,
}

impl ActivityContext {
    /// The entity whose accounts are searched for bank-detail matches.
    #[must_use]
    pub fn known_entity(&self) -> &str {
        if self.entity.is_empty() {
            &self.investor
        } else {
            &self.entity
        }
    }
}

/// Share class and qualification flags of an investment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InvestmentClassInfo {
    /// Share class name.
    #[serde(default)]
    pub investment_type: String,
    /// Unit price declared on the envelope.
    #[serde(default, deserialize_with = "deserialize_opt_decimal")]
    pub unit_price: Option<Decimal>,
    /// Whether the investment qualifies for deferred capital-gains treatment.
    #[serde(default)]
    pub qualified_capital_gains: bool,
}

/// Debt terms.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DebtTerms {
    /// Guarantors and their shares.
    #[serde(default)]
    pub guarantors: Vec<Guarantor>,
}

/// Asset conversion details.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConversionInfo {
    /// Asset converted from.
    #[serde(default)]
    pub from_asset: String,
    /// Asset converted into.
    #[serde(default)]
    pub to_asset: String,
}

/// The envelope of one executed thread entry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityMetaData {
    /// How the movement was executed.
    pub execute_type: ExecuteType,
    /// Requested amount.
    #[serde(deserialize_with = "deserialize_opt_decimal")]
    pub amount: Option<Decimal>,
    /// Amount reported by the bank; preferred over `amount` when present.
    #[serde(deserialize_with = "deserialize_opt_decimal")]
    pub bank_amount: Option<Decimal>,
    /// Total fee for the whole activity.
    #[serde(deserialize_with = "deserialize_opt_decimal")]
    pub total_fee: Option<Decimal>,
    /// Source account.
    pub from_account_id: String,
    /// Destination account.
    pub to_account_id: String,
    /// Source entity.
    pub from_entity_id: String,
    /// Destination entity.
    pub to_entity_id: String,
    /// Legacy source entity field, used when `from_entity_id` is empty.
    pub from: String,
    /// Account holding non-monetary positions (the investment account).
    pub non_monetary_account_id: String,
    /// Bank details of the source.
    pub from_account_detail: AccountDetail,
    /// Bank details of the destination.
    pub to_account_detail: AccountDetail,
    /// Entities behind the activity.
    pub context: ActivityContext,
    /// Asset the movement denominates in.
    pub asset_id: String,
    /// Share class.
    pub investment_class: InvestmentClassInfo,
    /// Waterfall element.
    pub waterfall_id: String,
    /// Debt terms.
    pub debt: DebtTerms,
    /// Conversion details.
    pub conversion: ConversionInfo,
}

impl ActivityMetaData {
    /// Whether the investment is flagged as qualified for deferred gains.
    #[must_use]
    pub const fn is_qualified_capital_gains(&self) -> bool {
        self.investment_class.qualified_capital_gains
    }

    /// The gross amount: bank amount when present, else the requested amount.
    #[must_use]
    pub fn gross_amount(&self) -> Decimal {
        self.bank_amount.or(self.amount).unwrap_or_default()
    }

    /// The source entity, falling back to the legacy `from` field.
    #[must_use]
    pub fn source_entity(&self) -> &str {
        if self.from_entity_id.is_empty() {
            &self.from
        } else {
            &self.from_entity_id
        }
    }
}

/// One step of an activity thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadEntry {
    /// Entry identifier; becomes the transaction id.
    pub id: String,
    /// When the entry was executed.
    pub created: DateTime<Utc>,
    /// Movement details.
    #[serde(default)]
    pub envelope: ActivityMetaData,
}

/// A workflow activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Activity identifier.
    pub id: String,
    /// Thread entries in workflow order.
    #[serde(default)]
    pub thread: Vec<ThreadEntry>,
}
