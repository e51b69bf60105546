//! Property-based tests for pool allocation.
//!
//! Run with: cargo test -p subledger-booking --test `property_tests`

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use subledger_booking::{allocate_fifo, pool_balance};
use subledger_core::Investor;

fn arb_pool() -> impl Strategy<Value = Vec<Investor>> {
    prop::collection::vec(0i64..100_000i64, 0..20).prop_map(|cents| {
        let ts = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        cents
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                Investor::new(format!("s{i}"), format!("acct{i}"), Decimal::new(c, 2), ts)
            })
            .collect()
    })
}

fn arb_withdrawal() -> impl Strategy<Value = Decimal> {
    (1i64..2_000_000i64).prop_map(|c| Decimal::new(c, 2))
}

proptest! {
    #[test]
    fn covered_withdrawal_is_allocated_exactly(pool in arb_pool(), withdrawal in arb_withdrawal()) {
        let total = pool_balance(&pool);
        prop_assume!(withdrawal <= total);
        let mut pool = pool;
        let result = allocate_fifo(&mut pool, withdrawal, Utc::now());
        prop_assert_eq!(result.allocated(), withdrawal);
        prop_assert!(result.shortfall.is_zero());
        prop_assert_eq!(pool_balance(&pool), total - withdrawal);
    }

    #[test]
    fn uncovered_withdrawal_drains_pool(pool in arb_pool(), withdrawal in arb_withdrawal()) {
        let total = pool_balance(&pool);
        prop_assume!(withdrawal > total);
        let mut pool = pool;
        let result = allocate_fifo(&mut pool, withdrawal, Utc::now());
        prop_assert_eq!(result.allocated(), total);
        prop_assert_eq!(result.shortfall, withdrawal - total);
        prop_assert!(pool.iter().all(|lot| lot.amount.is_zero()));
    }

    #[test]
    fn lots_are_consumed_in_order(pool in arb_pool(), withdrawal in arb_withdrawal()) {
        let original = pool.clone();
        let mut pool = pool;
        let result = allocate_fifo(&mut pool, withdrawal, Utc::now());

        // Every lot before the last touched one is fully drained.
        if let Some(last) = result.investors.last() {
            let idx = original.iter().position(|l| l.source_id == last.source_id).unwrap();
            prop_assert!(pool[..idx].iter().all(|lot| lot.amount.is_zero()));
            prop_assert!(pool[idx + 1..]
                .iter()
                .zip(&original[idx + 1..])
                .all(|(now, before)| now.amount == before.amount));
        }

        let order: Vec<_> = result.investors.iter().map(|i| i.source_id.clone()).collect();
        let expected: Vec<_> = original
            .iter()
            .filter(|l| order.contains(&l.source_id))
            .map(|l| l.source_id.clone())
            .collect();
        prop_assert_eq!(order, expected);
    }
}
