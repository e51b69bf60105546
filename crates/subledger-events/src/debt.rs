//! Debt rules.

use rust_decimal::Decimal;
use subledger_core::{Entity, EventCalculationEntry, Transaction};

use crate::labels;

/// Guarantor shares are recorded against the guarantors' own entities. The
/// debtor's basis only covers the full amount for real-estate destinations.
pub(crate) fn apply(transaction: &mut Transaction, destination_entity: Option<&Entity>) {
    transaction.capital_account = Decimal::ZERO;
    transaction.cost_basis = Decimal::ZERO;

    if transaction.guarantors.is_empty() {
        if destination_entity.is_some_and(|e| e.is_real_estate) {
            transaction.cost_basis = transaction.amount;
        }
    } else {
        let entries: Vec<EventCalculationEntry> = transaction
            .guarantors
            .iter()
            .map(|g| {
                EventCalculationEntry::new(labels::DEBT, transaction.capital_account, g.share())
                    .for_entity(g.entity_id.clone())
            })
            .collect();
        for entry in entries {
            transaction.add_event(entry);
        }
    }

    transaction.add_event(EventCalculationEntry::new(
        labels::DEBT,
        transaction.capital_account,
        transaction.cost_basis,
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use subledger_core::{EntityType, ExecuteType, Guarantor, LedgerType};

    fn debt(amount: Decimal) -> Transaction {
        Transaction::new(
            "debt-1",
            "lender-bank",
            "project-bank",
            ExecuteType::Debt,
            LedgerType::Debit,
            amount,
            Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_guarantors_get_their_own_entries() {
        let mut t = debt(dec!(1000))
            .with_guarantor(Guarantor::new("g1", dec!(500)))
            .with_guarantor(Guarantor::new("g2", dec!(500)));
        apply(&mut t, None);

        assert_eq!(t.event_calculations.len(), 3);
        assert_eq!(t.event_calculations[0].entity_id.as_deref(), Some("g1"));
        assert_eq!(t.event_calculations[0].cost_basis, dec!(500));
        assert_eq!(t.event_calculations[1].entity_id.as_deref(), Some("g2"));
        assert_eq!(t.event_calculations[1].cost_basis, dec!(500));

        let closing = &t.event_calculations[2];
        assert!(closing.is_own());
        assert_eq!(closing.capital_account, Decimal::ZERO);
        assert_eq!(closing.cost_basis, Decimal::ZERO);
        assert!(t.is_audit_consistent());
    }

    #[test]
    fn test_guarantors_take_precedence_over_real_estate() {
        let property = Entity::new("project", EntityType::Business).real_estate();
        let mut t = debt(dec!(1000)).with_guarantor(Guarantor::new("g1", dec!(1000)));
        apply(&mut t, Some(&property));
        assert_eq!(t.cost_basis, Decimal::ZERO);
    }

    #[test]
    fn test_real_estate_debt_adds_basis() {
        let property = Entity::new("project", EntityType::Business).real_estate();
        let mut t = debt(dec!(2500));
        apply(&mut t, Some(&property));
        assert_eq!(t.capital_account, Decimal::ZERO);
        assert_eq!(t.cost_basis, dec!(2500));
        assert_eq!(t.event_calculations.len(), 1);
        assert!(t.is_audit_consistent());
    }

    #[test]
    fn test_plain_debt_records_zero_closing_entry() {
        let business = Entity::new("project", EntityType::Business);
        let mut t = debt(dec!(2500));
        apply(&mut t, Some(&business));
        assert_eq!(t.cost_basis, Decimal::ZERO);
        assert_eq!(t.event_calculations.len(), 1);
        assert_eq!(t.event_calculations[0].entry, labels::DEBT);
    }

    #[test]
    fn test_undeclared_guarantor_share_is_zero() {
        let mut t = debt(dec!(1000)).with_guarantor(Guarantor {
            entity_id: "g1".to_string(),
            amount: None,
        });
        apply(&mut t, None);
        assert_eq!(t.event_calculations[0].cost_basis, Decimal::ZERO);
    }
}
