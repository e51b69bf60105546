//! Withdrawal-like reductions and waterfall-weighted cash transfers.

use subledger_core::{round_money, ExecuteType, Transaction, WaterfallElement};

use crate::{labels, record_reversal};

/// Label for the withdrawal kinds that reduce the investor's position.
const fn withdrawal_label(kind: ExecuteType) -> Option<&'static str> {
    match kind {
        ExecuteType::PreferredReturn => Some(labels::PREFERRED_RETURN),
        ExecuteType::ReturnOfCapital => Some(labels::RETURN_OF_CAPITAL),
        ExecuteType::TaxDistribution => Some(labels::TAX_DISTRIBUTION),
        ExecuteType::FundSponsorPromote => Some(labels::PROFIT_DISTRIBUTION),
        _ => None,
    }
}

pub(crate) fn apply_withdrawal(transaction: &mut Transaction, kind: ExecuteType) {
    if let Some(label) = withdrawal_label(kind) {
        record_reversal(transaction, label);
    }
}

/// The weighted values only gate the rule; the recorded values are the
/// negated full amount.
pub(crate) fn apply_waterfall(transaction: &mut Transaction, element: &WaterfallElement) {
    let capital_account = round_money(transaction.capital_account * element.capital_account);
    let cost_basis = round_money(transaction.cost_basis * element.cost_basis);

    if capital_account.is_zero() && cost_basis.is_zero() {
        tracing::trace!(
            transaction = %transaction.id,
            waterfall = %element.id,
            "weighted values are zero, waterfall not applied"
        );
        return;
    }

    record_reversal(transaction, &element.name);
}
