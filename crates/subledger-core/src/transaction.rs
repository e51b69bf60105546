//! The canonical transaction record and its audit trail.
//!
//! A [`Transaction`] is one classified monetary movement as seen from the
//! account whose subledger is being computed. Its capital-account and
//! cost-basis values are derived by the event calculation rules, which also
//! append an [`EventCalculationEntry`] for every adjustment they make. Outflow
//! transactions carry the chain of [`Investor`] allocations that funded them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How an activity was executed.
///
/// Most kinds come in a domestic and an "external" flavour (money moving to or
/// from an account held off-platform). Calculation rules treat the two alike;
/// use [`ExecuteType::canonical`] to collapse them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum ExecuteType {
    /// No execution; the thread entry is informational only.
    #[default]
    Default,
    Subscription,
    ExternalSubscription,
    Debt,
    ExternalDebt,
    PreferredReturn,
    ExternalPreferredReturn,
    ReturnOfCapital,
    ExternalReturnOfCapital,
    TaxDistribution,
    ExternalTaxDistribution,
    FundSponsorPromote,
    ExternalFundSponsorPromote,
    CashTransfer,
    ExternalCashTransfer,
    CashReserves,
    ExternalCashReserves,
    OperatingExpense,
    ExternalOperatingExpense,
    OrganizationalExpense,
    ExternalOrganizationalExpense,
    InvestorPreferred,
    ExternalInvestorPreferred,
    FundSponsorManagementFee,
    ExternalFundSponsorManagementFee,
    TaxCredit,
    ExternalTaxCredit,
    NonFundEquity,
    ExternalNonFundEquity,
    Historical,
    Sale,
    Conversion,
    Sponsor,
}

impl ExecuteType {
    /// Collapse an external variant onto its domestic counterpart.
    #[must_use]
    pub const fn canonical(self) -> Self {
        match self {
            Self::ExternalSubscription => Self::Subscription,
            Self::ExternalDebt => Self::Debt,
            Self::ExternalPreferredReturn => Self::PreferredReturn,
            Self::ExternalReturnOfCapital => Self::ReturnOfCapital,
            Self::ExternalTaxDistribution => Self::TaxDistribution,
            Self::ExternalFundSponsorPromote => Self::FundSponsorPromote,
            Self::ExternalCashTransfer => Self::CashTransfer,
            Self::ExternalCashReserves => Self::CashReserves,
            Self::ExternalOperatingExpense => Self::OperatingExpense,
            Self::ExternalOrganizationalExpense => Self::OrganizationalExpense,
            Self::ExternalInvestorPreferred => Self::InvestorPreferred,
            Self::ExternalFundSponsorManagementFee => Self::FundSponsorManagementFee,
            Self::ExternalTaxCredit => Self::TaxCredit,
            Self::ExternalNonFundEquity => Self::NonFundEquity,
            other => other,
        }
    }

    /// Whether this is an external variant.
    #[must_use]
    pub fn is_external(self) -> bool {
        self.canonical() != self
    }

    /// Whether this is a subscription (domestic or external).
    #[must_use]
    pub fn is_subscription(self) -> bool {
        self.canonical() == Self::Subscription
    }
}

/// Ledger classification of a transaction from the account's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerType {
    /// Money leaving the account.
    Credit,
    /// Money entering the account.
    Debit,
    /// A transfer whose source and destination are the same account.
    CreditDebit,
    /// Purchase of fund units.
    Purchase,
    /// Sale of fund units.
    Sale,
    /// Conversion between assets.
    Conversion,
    /// A distribution to investors.
    Distribution,
    /// A sponsor movement.
    Sponsor,
}

impl fmt::Display for LedgerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
            Self::CreditDebit => "credit-debit",
            Self::Purchase => "purchase",
            Self::Sale => "sale",
            Self::Conversion => "conversion",
            Self::Distribution => "distribution",
            Self::Sponsor => "sponsor",
        };
        f.write_str(s)
    }
}

/// One line of a transaction's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventCalculationEntry {
    /// Free-text label, e.g. "Five Year step up".
    pub entry: String,
    /// Whether a user may edit the entry. Metadata only.
    #[serde(default)]
    pub editable: bool,
    /// Entity the entry is attributed to, when not the transaction's account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Signed capital-account delta.
    pub capital_account: Decimal,
    /// Signed cost-basis delta.
    pub cost_basis: Decimal,
}

impl EventCalculationEntry {
    /// Create a non-editable entry attributed to the transaction itself.
    #[must_use]
    pub fn new(entry: impl Into<String>, capital_account: Decimal, cost_basis: Decimal) -> Self {
        Self {
            entry: entry.into(),
            editable: false,
            entity_id: None,
            capital_account,
            cost_basis,
        }
    }

    /// Attribute the entry to another entity.
    #[must_use]
    pub fn for_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Whether the entry belongs to the transaction's own account.
    #[must_use]
    pub const fn is_own(&self) -> bool {
        self.entity_id.is_none()
    }
}

/// One allocation slice: a lot of invested capital or a draw on one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Investor {
    /// Identifier of the transaction that created the lot.
    pub source_id: String,
    /// Investment account the capital belongs to.
    pub investor_account: String,
    /// Amount (remaining amount, for a pool lot).
    pub amount: Decimal,
    /// When the slice was created.
    pub timestamp: DateTime<Utc>,
}

impl Investor {
    /// Create an allocation slice.
    #[must_use]
    pub fn new(
        source_id: impl Into<String>,
        investor_account: impl Into<String>,
        amount: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            investor_account: investor_account.into(),
            amount,
            timestamp,
        }
    }
}

/// A debt guarantor and the share of the debt they cover.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Guarantor {
    /// Guarantor entity.
    pub entity_id: String,
    /// Guaranteed amount.
    #[serde(default, deserialize_with = "crate::money::deserialize_opt_decimal")]
    pub amount: Option<Decimal>,
}

impl Guarantor {
    /// Create a guarantor.
    #[must_use]
    pub fn new(entity_id: impl Into<String>, amount: Decimal) -> Self {
        Self {
            entity_id: entity_id.into(),
            amount: Some(amount),
        }
    }

    /// The guaranteed share, zero when not declared.
    #[must_use]
    pub fn share(&self) -> Decimal {
        self.amount.unwrap_or_default()
    }
}

/// A classified monetary movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction (thread entry) identifier.
    pub id: String,
    /// Activity the transaction was ingested from.
    #[serde(default)]
    pub activity_id: String,
    /// Source account.
    pub from: String,
    /// Destination account.
    pub to: String,
    /// Investment account of the investor behind the movement.
    #[serde(default)]
    pub fund_account: String,
    /// How the activity was executed.
    pub execute_type: ExecuteType,
    /// Ledger classification.
    pub ledger_type: LedgerType,
    /// Counterparty entity.
    #[serde(default)]
    pub counter_entity_id: String,
    /// Asset the movement denominates in.
    #[serde(default)]
    pub asset_id: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Net amount (`total_amount - fee`).
    pub amount: Decimal,
    /// Fee charged on the movement.
    #[serde(default)]
    pub fee: Decimal,
    /// Units bought or sold.
    #[serde(default)]
    pub units: Decimal,
    /// Gross amount.
    pub total_amount: Decimal,
    /// Amount reported by the bank, when present.
    #[serde(default)]
    pub bank_amount: Decimal,
    /// Capital-account value, derived from the event entries.
    #[serde(default)]
    pub capital_account: Decimal,
    /// Cost-basis value, derived from the event entries.
    #[serde(default)]
    pub cost_basis: Decimal,
    /// Audit trail.
    #[serde(default)]
    pub event_calculations: Vec<EventCalculationEntry>,
    /// When the movement happened.
    pub timestamp: DateTime<Utc>,
    /// Debt guarantors.
    #[serde(default)]
    pub guarantors: Vec<Guarantor>,
    /// Waterfall element applied to the movement.
    #[serde(default)]
    pub waterfall_id: String,
    /// Allocation chain.
    #[serde(default)]
    pub investors: Vec<Investor>,
}

impl Transaction {
    /// Create a transaction with no fee.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        execute_type: ExecuteType,
        ledger_type: LedgerType,
        amount: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            activity_id: String::new(),
            from: from.into(),
            to: to.into(),
            fund_account: String::new(),
            execute_type,
            ledger_type,
            counter_entity_id: String::new(),
            asset_id: String::new(),
            description: String::new(),
            amount,
            fee: Decimal::ZERO,
            units: Decimal::ZERO,
            total_amount: amount,
            bank_amount: Decimal::ZERO,
            capital_account: Decimal::ZERO,
            cost_basis: Decimal::ZERO,
            event_calculations: Vec::new(),
            timestamp,
            guarantors: Vec::new(),
            waterfall_id: String::new(),
            investors: Vec::new(),
        }
    }

    /// Set the fee, keeping `amount = total_amount - fee`.
    #[must_use]
    pub fn with_fee(mut self, fee: Decimal) -> Self {
        self.fee = fee;
        self.amount = self.total_amount - fee;
        self
    }

    /// Set the fund (investment) account.
    #[must_use]
    pub fn with_fund_account(mut self, account: impl Into<String>) -> Self {
        self.fund_account = account.into();
        self
    }

    /// Set the counterparty entity.
    #[must_use]
    pub fn with_counter_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.counter_entity_id = entity_id.into();
        self
    }

    /// Set the asset.
    #[must_use]
    pub fn with_asset(mut self, asset_id: impl Into<String>) -> Self {
        self.asset_id = asset_id.into();
        self
    }

    /// Add a debt guarantor.
    #[must_use]
    pub fn with_guarantor(mut self, guarantor: Guarantor) -> Self {
        self.guarantors.push(guarantor);
        self
    }

    /// Set the waterfall element.
    #[must_use]
    pub fn with_waterfall(mut self, waterfall_id: impl Into<String>) -> Self {
        self.waterfall_id = waterfall_id.into();
        self
    }

    /// Append an entry to the audit trail.
    pub fn add_event(&mut self, entry: EventCalculationEntry) {
        self.event_calculations.push(entry);
    }

    /// Sum of the capital-account and cost-basis deltas of the entries
    /// attributed to this transaction's own account.
    #[must_use]
    pub fn event_totals(&self) -> (Decimal, Decimal) {
        self.event_calculations
            .iter()
            .filter(|e| e.is_own())
            .fold((Decimal::ZERO, Decimal::ZERO), |(ca, cb), e| {
                (ca + e.capital_account, cb + e.cost_basis)
            })
    }

    /// Whether the capital-account and cost-basis values agree with the
    /// audit trail.
    #[must_use]
    pub fn is_audit_consistent(&self) -> bool {
        self.event_totals() == (self.capital_account, self.cost_basis)
    }

    /// Sum of the allocation chain.
    #[must_use]
    pub fn allocated(&self) -> Decimal {
        self.investors.iter().map(|i| i.amount).sum()
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} -> {} {} ({:?})",
            self.timestamp.format("%Y-%m-%d"),
            self.ledger_type,
            self.from,
            self.to,
            self.amount,
            self.execute_type
        )
    }
}

/// Predicate used by [`TransactionList::filter`].
pub type FilterBy<'a> = &'a dyn Fn(&Transaction) -> bool;

/// An ordered list of transactions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionList(Vec<Transaction>);

impl TransactionList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transaction.
    pub fn push(&mut self, transaction: Transaction) {
        self.0.push(transaction);
    }

    /// Number of transactions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the transactions.
    pub fn iter(&self) -> std::slice::Iter<'_, Transaction> {
        self.0.iter()
    }

    /// Mutable access to the transactions.
    pub fn as_mut_slice(&mut self) -> &mut [Transaction] {
        &mut self.0
    }

    /// Independent copies of the transactions matching `predicate`.
    #[must_use]
    pub fn filter(&self, predicate: FilterBy<'_>) -> Self {
        self.0.iter().filter(|t| predicate(t)).cloned().collect()
    }

    /// Stable sort by timestamp, ascending.
    ///
    /// Transactions sharing a timestamp keep their ingestion order.
    pub fn sort(&mut self) {
        self.0.sort_by_key(|t| t.timestamp);
    }

    /// Find a transaction by identifier.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Transaction> {
        self.0.iter().find(|t| t.id == id)
    }

    /// All transactions with the given execution and ledger types.
    #[must_use]
    pub fn by_execute_and_ledger_type(&self, execute: ExecuteType, ledger: LedgerType) -> Self {
        self.filter(&|t| t.execute_type == execute && t.ledger_type == ledger)
    }

    /// Like [`by_execute_and_ledger_type`](Self::by_execute_and_ledger_type),
    /// restricted to one counterparty entity.
    #[must_use]
    pub fn by_execute_and_ledger_type_with_counter_entity(
        &self,
        execute: ExecuteType,
        ledger: LedgerType,
        counter_entity_id: &str,
    ) -> Self {
        self.filter(&|t| {
            t.execute_type == execute
                && t.ledger_type == ledger
                && t.counter_entity_id == counter_entity_id
        })
    }

    /// All transactions with the given waterfall and ledger type.
    #[must_use]
    pub fn by_waterfall_and_ledger_type(&self, waterfall_id: &str, ledger: LedgerType) -> Self {
        self.filter(&|t| t.waterfall_id == waterfall_id && t.ledger_type == ledger)
    }

    /// Like [`by_waterfall_and_ledger_type`](Self::by_waterfall_and_ledger_type),
    /// restricted to one counterparty entity.
    #[must_use]
    pub fn by_waterfall_and_ledger_type_with_counter_entity(
        &self,
        waterfall_id: &str,
        ledger: LedgerType,
        counter_entity_id: &str,
    ) -> Self {
        self.filter(&|t| {
            t.waterfall_id == waterfall_id
                && t.ledger_type == ledger
                && t.counter_entity_id == counter_entity_id
        })
    }
}

impl FromIterator<Transaction> for TransactionList {
    fn from_iter<I: IntoIterator<Item = Transaction>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for TransactionList {
    type Item = Transaction;
    type IntoIter = std::vec::IntoIter<Transaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a TransactionList {
    type Item = &'a Transaction;
    type IntoIter = std::slice::Iter<'a, Transaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::ops::Index<usize> for TransactionList {
    type Output = Transaction;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ts(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    fn txn(id: &str, day: u32) -> Transaction {
        Transaction::new(
            id,
            "bank",
            "escrow",
            ExecuteType::CashTransfer,
            LedgerType::Debit,
            dec!(100),
            ts(2024, 1, day),
        )
    }

    #[test]
    fn test_canonical_collapses_external() {
        assert_eq!(
            ExecuteType::ExternalSubscription.canonical(),
            ExecuteType::Subscription
        );
        assert_eq!(ExecuteType::Sale.canonical(), ExecuteType::Sale);
        assert!(ExecuteType::ExternalDebt.is_external());
        assert!(!ExecuteType::Debt.is_external());
        assert!(ExecuteType::ExternalSubscription.is_subscription());
    }

    #[test]
    fn test_execute_type_serde_names() {
        let json = serde_json::to_string(&ExecuteType::ExternalReturnOfCapital).unwrap();
        assert_eq!(json, "\"external_return_of_capital\"");
    }

    #[test]
    fn test_with_fee_keeps_amount_invariant() {
        let t = txn("t1", 1).with_fee(dec!(2.50));
        assert_eq!(t.amount, t.total_amount - t.fee);
        assert_eq!(t.amount, dec!(97.50));
    }

    #[test]
    fn test_event_totals_skip_foreign_entries() {
        let mut t = txn("t1", 1);
        t.add_event(EventCalculationEntry::new("Debt", dec!(0), dec!(500)).for_entity("g1"));
        t.add_event(EventCalculationEntry::new("Debt", dec!(0), dec!(0)));
        assert_eq!(t.event_totals(), (dec!(0), dec!(0)));
        assert!(t.is_audit_consistent());
    }

    #[test]
    fn test_sort_is_stable() {
        let mut list: TransactionList = vec![txn("c", 3), txn("a", 1), txn("b", 1)]
            .into_iter()
            .collect();
        list.sort();
        let ids: Vec<&str> = list.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_filter_returns_independent_copies() {
        let list: TransactionList = vec![txn("a", 1), txn("b", 2)].into_iter().collect();
        let mut filtered = list.filter(&|t| t.id == "b");
        filtered.as_mut_slice()[0].amount = dec!(1);
        assert_eq!(list.find("b").unwrap().amount, dec!(100));
    }

    #[test]
    fn test_typed_lookups() {
        let mut list = TransactionList::new();
        list.push(txn("a", 1).with_counter_entity("fund"));
        list.push(txn("b", 2).with_waterfall("wf"));
        list.push(
            Transaction::new(
                "c",
                "x",
                "y",
                ExecuteType::Sale,
                LedgerType::Sale,
                dec!(5),
                ts(2024, 2, 1),
            )
            .with_counter_entity("fund"),
        );

        assert_eq!(
            list.by_execute_and_ledger_type(ExecuteType::CashTransfer, LedgerType::Debit).len(),
            2
        );
        assert_eq!(
            list.by_execute_and_ledger_type_with_counter_entity(
                ExecuteType::CashTransfer,
                LedgerType::Debit,
                "fund"
            )
            .len(),
            1
        );
        assert_eq!(
            list.by_waterfall_and_ledger_type("wf", LedgerType::Debit)
                .len(),
            1
        );
        assert!(list
            .by_waterfall_and_ledger_type_with_counter_entity("wf", LedgerType::Debit, "fund")
            .is_empty());
    }
}
