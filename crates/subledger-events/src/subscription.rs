//! Subscription rules: the qualified step-up schedule.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use subledger_core::calendar::add_date_time;
use subledger_core::{round_money, EventCalculationEntry, Transaction};

use crate::{labels, EventRules};

pub(crate) fn apply(
    rules: &EventRules,
    transaction: &mut Transaction,
    qualified: bool,
    now: DateTime<Utc>,
) {
    let amount = round_money(transaction.amount);

    if !qualified {
        transaction.capital_account = amount;
        transaction.cost_basis = amount;
        transaction.add_event(EventCalculationEntry::new(
            labels::NON_QUALIFIED,
            transaction.capital_account,
            transaction.cost_basis,
        ));
        return;
    }

    let cutoff = rules.cutoff_instant();

    transaction.capital_account = amount;
    transaction.cost_basis = Decimal::ZERO;
    transaction.add_event(EventCalculationEntry::new(
        labels::QUALIFIED,
        amount,
        Decimal::ZERO,
    ));

    for (years, rate, label) in [
        (5, rules.five_year_step_up, labels::FIVE_YEAR_STEP_UP),
        (7, rules.seven_year_step_up, labels::SEVEN_YEAR_STEP_UP),
    ] {
        let Some(mark) = add_date_time(transaction.timestamp, years, 0, 0) else {
            continue;
        };
        if now > mark && mark < cutoff {
            let step = round_money(amount * rate);
            transaction.cost_basis += step;
            transaction.add_event(EventCalculationEntry::new(label, Decimal::ZERO, step));
        }
    }

    if now > cutoff {
        let remaining = amount - transaction.cost_basis;
        transaction.cost_basis += remaining;
        transaction.add_event(EventCalculationEntry::new(
            labels::TAXES_PAID,
            Decimal::ZERO,
            remaining,
        ));
    }
}
