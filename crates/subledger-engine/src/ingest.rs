//! Turning raw activities into classified transactions.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use subledger_core::{
    Account, AccountDetail, AccountType, Activity, ActivityMetaData, Asset, ExecuteType,
    LedgerType, ThreadEntry, Transaction, TransactionList,
};
use subledger_events::{EventReferences, EventRules};

use crate::classify::classify;
use crate::irr::IrrBucketer;
use crate::source::Resolver;

/// Transactions and related accounts collected from an account's activities.
#[derive(Debug, Default)]
pub(crate) struct Ingested {
    pub(crate) transactions: TransactionList,
    pub(crate) accounts: BTreeMap<String, Account>,
}

/// Ingestion context for one account.
pub(crate) struct Ingestor<'a> {
    pub(crate) account: &'a Account,
    pub(crate) resolver: &'a dyn Resolver,
    pub(crate) rules: &'a EventRules,
    pub(crate) irr: &'a IrrBucketer<'a>,
    pub(crate) now: DateTime<Utc>,
}

impl Ingestor<'_> {
    /// Ingest activities in retrieval order.
    pub(crate) fn run(&self, activities: &[Activity]) -> Ingested {
        let mut ingested = Ingested::default();
        let mut charged: HashSet<&str> = HashSet::new();
        let mut asset: Option<Asset> = None;

        for activity in activities {
            for entry in &activity.thread {
                if entry.envelope.execute_type != ExecuteType::Default {
                    // Only the first executed entry of an activity carries its fee.
                    let fee = if charged.insert(activity.id.as_str()) {
                        entry.envelope.total_fee.unwrap_or_default()
                    } else {
                        Decimal::ZERO
                    };

                    let asset_id = entry.envelope.asset_id.as_str();
                    if asset.as_ref().map(|a| a.id.as_str()) != Some(asset_id) {
                        asset = self.resolver.asset(asset_id);
                    }

                    if let Some((to, transactions)) =
                        self.ingest_entry(activity, entry, fee, asset.as_ref())
                    {
                        for transaction in transactions {
                            ingested.transactions.push(transaction);
                        }
                        self.record_account(&mut ingested.accounts, &to);
                    }
                } else {
                    self.record_account(&mut ingested.accounts, &entry.envelope.to_account_id);
                }
            }
        }

        ingested
    }

    fn record_account(&self, accounts: &mut BTreeMap<String, Account>, id: &str) {
        if id.is_empty() || accounts.contains_key(id) {
            return;
        }
        let snapshot = self
            .resolver
            .account(id)
            .unwrap_or_else(|| Account::new(id, "", AccountType::default()));
        accounts.insert(id.to_string(), snapshot);
    }

    /// Ingest one executed thread entry, returning the resolved destination
    /// account id with the transactions. Yields `None` for unclassified
    /// entries and two copies for credit-debit transfers.
    fn ingest_entry(
        &self,
        activity: &Activity,
        entry: &ThreadEntry,
        fee: Decimal,
        asset: Option<&Asset>,
    ) -> Option<(String, Vec<Transaction>)> {
        let mut meta = entry.envelope.clone();
        meta.from_account_id = self.source_account_id(&meta);
        meta.to_account_id = self.destination_account_id(&meta);

        let Some(classification) = classify(self.account, &meta, self.resolver) else {
            tracing::trace!(
                entry = %entry.id,
                kind = ?meta.execute_type,
                "unclassified entry skipped"
            );
            return None;
        };

        let price = asset
            .and_then(|a| a.class_price(&meta.investment_class.investment_type))
            .or(meta.investment_class.unit_price)
            .unwrap_or_default();

        let from = self.side_account_id(
            &meta.from_account_id,
            meta.source_entity(),
            &meta.from_account_detail,
        );
        let to = self.side_account_id(
            &meta.to_account_id,
            &meta.to_entity_id,
            &meta.to_account_detail,
        );
        let mut transaction = Transaction::new(
            entry.id.clone(),
            from,
            to,
            meta.execute_type,
            classification.ledger_type,
            meta.gross_amount(),
            entry.created,
        )
        .with_fee(fee)
        .with_fund_account(self.fund_account_id(&meta))
        .with_counter_entity(classification.counter_entity_id)
        .with_asset(meta.asset_id.clone())
        .with_waterfall(meta.waterfall_id.clone());

        transaction.activity_id.clone_from(&activity.id);
        transaction.description = classification.description;
        transaction.bank_amount = meta.bank_amount.unwrap_or_default();
        transaction.guarantors.clone_from(&meta.debt.guarantors);
        if price > Decimal::ZERO {
            transaction.units = transaction.amount / price;
        }

        if self.account.kind == AccountType::Investment {
            self.apply_events(&mut transaction, &meta);
        }

        tracing::debug!(
            account = %self.account.id,
            transaction = %transaction,
            "ingested"
        );

        let transactions = if transaction.ledger_type == LedgerType::CreditDebit {
            transaction.amount = meta.amount.unwrap_or_default();
            let mut credit = transaction.clone();
            credit.ledger_type = LedgerType::Credit;
            transaction.ledger_type = LedgerType::Debit;
            vec![credit, transaction]
        } else {
            vec![transaction]
        };

        if let Some(last) = transactions.last() {
            self.irr.bucket(self.account, last);
        }
        Some((meta.to_account_id, transactions))
    }

    fn apply_events(&self, transaction: &mut Transaction, meta: &ActivityMetaData) {
        let destination_entity = self
            .resolver
            .account(&transaction.to)
            .and_then(|a| self.resolver.entity(&a.entity_id));
        let waterfall_element = if transaction.waterfall_id.is_empty() {
            None
        } else {
            self.resolver.waterfall_element(&transaction.waterfall_id)
        };

        let references = EventReferences {
            destination_entity: destination_entity.as_ref(),
            waterfall_element: waterfall_element.as_ref(),
        };
        self.rules.apply(transaction, meta, &references, self.now);
    }

    /// Source account: explicit id, the non-monetary account, or a bank
    /// detail match among the context entity's accounts.
    fn source_account_id(&self, meta: &ActivityMetaData) -> String {
        if !meta.from_account_id.is_empty() {
            return meta.from_account_id.clone();
        }
        if !meta.non_monetary_account_id.is_empty() {
            return meta.non_monetary_account_id.clone();
        }
        self.match_by_number(meta.context.known_entity(), &meta.from_account_detail)
    }

    /// Destination account: explicit id or a bank detail match among the
    /// context entity's accounts.
    fn destination_account_id(&self, meta: &ActivityMetaData) -> String {
        if !meta.to_account_id.is_empty() {
            return meta.to_account_id.clone();
        }
        self.match_by_number(meta.context.known_entity(), &meta.to_account_detail)
    }

    /// A side's account id, falling back to a match among the side's own
    /// entity's accounts.
    fn side_account_id(&self, account_id: &str, entity_id: &str, detail: &AccountDetail) -> String {
        if account_id.is_empty() {
            self.match_by_number(entity_id, detail)
        } else {
            account_id.to_string()
        }
    }

    fn match_by_number(&self, entity_id: &str, detail: &AccountDetail) -> String {
        match self.resolver.find_account_by_number(
            entity_id,
            &detail.account_number,
            &detail.routing_number,
        ) {
            Some(account) => account.id,
            None => {
                tracing::debug!(
                    entity = entity_id,
                    account_number = %detail.account_number,
                    "no account matches bank details"
                );
                String::new()
            }
        }
    }

    /// Investment account of the investor behind the movement.
    fn fund_account_id(&self, meta: &ActivityMetaData) -> String {
        if !meta.non_monetary_account_id.is_empty() {
            return meta.non_monetary_account_id.clone();
        }
        self.resolver
            .find_investment_account(&meta.context.investor, &meta.context.fund)
            .map(|a| a.id)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{IrrCache, MemoryIrrCache};
    use crate::source::MemoryStore;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use subledger_core::{ActivityContext, Entity, EntityType, FiscalYearEnd, InvestmentClassInfo};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, day, 9, 0, 0).unwrap()
    }

    fn entry(id: &str, day: u32, envelope: ActivityMetaData) -> ThreadEntry {
        ThreadEntry {
            id: id.to_string(),
            created: at(day),
            envelope,
        }
    }

    fn transfer(from: &str, to: &str, amount: Decimal) -> ActivityMetaData {
        ActivityMetaData {
            execute_type: ExecuteType::CashTransfer,
            amount: Some(amount),
            from_account_id: from.to_string(),
            to_account_id: to.to_string(),
            ..ActivityMetaData::default()
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_entity(Entity::new("fund", EntityType::Fund))
            .with_entity(Entity::new("alice", EntityType::Individual))
            .with_account(Account::new("escrow", "fund", AccountType::Escrow).with_name("Escrow"))
            .with_account(Account::new("ops", "fund", AccountType::Bank).with_name("Operating"))
            .with_account(
                Account::new("alice-bank", "alice", AccountType::Bank).with_numbers("12345", "021"),
            )
            .with_account(
                Account::new("alice-inv", "alice", AccountType::Investment).with_custodian("fund"),
            )
            .with_asset(
                Asset::new("units", "fund")
                    .with_name("Fund Units")
                    .with_class("A", dec!(10)),
            )
    }

    fn run(
        account_id: &str,
        store: &MemoryStore,
        activities: &[Activity],
    ) -> (Ingested, MemoryIrrCache) {
        let cache = MemoryIrrCache::new();
        let ingested = {
            let bucketer = IrrBucketer::new(store, &cache, FiscalYearEnd::default());
            let account = store.account(account_id).unwrap();
            let rules = EventRules::default();
            let ingestor = Ingestor {
                account: &account,
                resolver: store,
                rules: &rules,
                irr: &bucketer,
                now: at(28),
            };
            ingestor.run(activities)
        };
        (ingested, cache)
    }

    #[test]
    fn test_fee_charged_on_first_entry_only() {
        let mut first = transfer("escrow", "ops", dec!(100));
        first.total_fee = Some(dec!(5));
        first.to_entity_id = "fund".to_string();
        let mut second = transfer("escrow", "ops", dec!(50));
        second.total_fee = Some(dec!(5));
        let activity = Activity {
            id: "act".to_string(),
            thread: vec![
                entry("d", 1, ActivityMetaData::default()),
                entry("t1", 2, first),
                entry("t2", 3, second),
            ],
        };

        let (ingested, _) = run("escrow", &store(), &[activity]);
        let list = &ingested.transactions;
        assert_eq!(list.len(), 2);
        assert_eq!(
            (list[0].total_amount, list[0].fee, list[0].amount),
            (dec!(100), dec!(5), dec!(95))
        );
        assert_eq!((list[1].fee, list[1].amount), (dec!(0), dec!(50)));
        assert_eq!(list[0].activity_id, "act");
        assert_eq!(list[0].ledger_type, LedgerType::Credit);
        assert_eq!(list[0].description, "Fund Transfer to Operating");
    }

    #[test]
    fn test_bank_amount_preferred_and_units_from_class_price() {
        let meta = ActivityMetaData {
            execute_type: ExecuteType::Subscription,
            amount: Some(dec!(1000)),
            bank_amount: Some(dec!(990)),
            from_account_id: "alice-bank".to_string(),
            to_account_id: "escrow".to_string(),
            asset_id: "units".to_string(),
            investment_class: InvestmentClassInfo {
                investment_type: "A".to_string(),
                unit_price: Some(dec!(99)),
                qualified_capital_gains: false,
            },
            context: ActivityContext {
                investor: "alice".to_string(),
                fund: "fund".to_string(),
                entity: String::new(),
            },
            ..ActivityMetaData::default()
        };
        let activity = Activity {
            id: "sub".to_string(),
            thread: vec![entry("s1", 1, meta)],
        };

        let (ingested, _) = run("escrow", &store(), &[activity]);
        let t = &ingested.transactions[0];
        assert_eq!(t.total_amount, dec!(990));
        assert_eq!(t.bank_amount, dec!(990));
        assert_eq!(t.units, dec!(99));
        assert_eq!(t.fund_account, "alice-inv");
        assert_eq!(t.ledger_type, LedgerType::Debit);
        // escrow is not an investment account, so no events run
        assert!(t.event_calculations.is_empty());
    }

    #[test]
    fn test_events_run_for_investment_accounts() {
        let meta = ActivityMetaData {
            execute_type: ExecuteType::Subscription,
            amount: Some(dec!(1000)),
            from_account_id: "alice-bank".to_string(),
            to_account_id: "escrow".to_string(),
            non_monetary_account_id: "alice-inv".to_string(),
            ..ActivityMetaData::default()
        };
        let activity = Activity {
            id: "sub".to_string(),
            thread: vec![entry("s1", 1, meta)],
        };

        let (ingested, _) = run("alice-inv", &store(), &[activity]);
        let t = &ingested.transactions[0];
        assert_eq!(t.ledger_type, LedgerType::Purchase);
        assert_eq!(t.fund_account, "alice-inv");
        assert_eq!(t.cost_basis, dec!(1000));
        assert_eq!(t.event_calculations.len(), 1);
    }

    #[test]
    fn test_source_resolved_from_bank_details() {
        let mut meta = transfer("", "escrow", dec!(10));
        meta.execute_type = ExecuteType::ExternalCashTransfer;
        meta.context.investor = "alice".to_string();
        meta.from_account_detail = AccountDetail {
            name: "Alice Checking".to_string(),
            account_number: "12345".to_string(),
            routing_number: "021".to_string(),
        };
        let activity = Activity {
            id: "a".to_string(),
            thread: vec![entry("t", 1, meta)],
        };

        let (ingested, _) = run("escrow", &store(), &[activity]);
        let t = &ingested.transactions[0];
        assert_eq!(t.from, "alice-bank");
        assert_eq!(t.ledger_type, LedgerType::Debit);
        assert_eq!(t.description, "Fund Transfer from Alice Checking");
    }

    #[test]
    fn test_credit_debit_split_uses_raw_amount() {
        let mut meta = transfer("ops", "ops", dec!(300));
        meta.bank_amount = Some(dec!(310));
        meta.total_fee = Some(dec!(10));
        let activity = Activity {
            id: "a".to_string(),
            thread: vec![entry("t", 1, meta)],
        };

        let (ingested, _) = run("ops", &store(), &[activity]);
        let list = &ingested.transactions;
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].ledger_type, LedgerType::Credit);
        assert_eq!(list[1].ledger_type, LedgerType::Debit);
        assert!(list.iter().all(|t| t.id == "t" && t.amount == dec!(300)));
    }

    #[test]
    fn test_unclassified_entries_are_skipped_without_accounts() {
        let meta = ActivityMetaData {
            execute_type: ExecuteType::Sponsor,
            to_account_id: "ops".to_string(),
            ..ActivityMetaData::default()
        };
        let activity = Activity {
            id: "a".to_string(),
            thread: vec![entry("t", 1, meta)],
        };
        let (ingested, _) = run("escrow", &store(), &[activity]);
        assert!(ingested.transactions.is_empty());
        assert!(ingested.accounts.is_empty());
    }

    #[test]
    fn test_default_entries_record_their_destination() {
        let meta = ActivityMetaData {
            to_account_id: "ops".to_string(),
            ..ActivityMetaData::default()
        };
        let activity = Activity {
            id: "a".to_string(),
            thread: vec![entry("req", 1, meta)],
        };
        let (ingested, _) = run("escrow", &store(), &[activity]);
        assert!(ingested.transactions.is_empty());
        assert_eq!(ingested.accounts["ops"].name, "Operating");
    }

    #[test]
    fn test_destination_resolved_from_bank_details_is_recorded() {
        let store = store().with_account(
            Account::new("vendor", "alice", AccountType::Bank)
                .with_name("Vendor")
                .with_numbers("777", "021"),
        );
        let mut meta = transfer("escrow", "", dec!(20));
        meta.context.entity = "alice".to_string();
        meta.to_account_detail = AccountDetail {
            name: "Vendor".to_string(),
            account_number: "777".to_string(),
            routing_number: "021".to_string(),
        };
        let activity = Activity {
            id: "a".to_string(),
            thread: vec![entry("t", 1, meta)],
        };

        let (ingested, _) = run("escrow", &store, &[activity]);
        assert_eq!(ingested.transactions[0].to, "vendor");
        assert_eq!(ingested.transactions[0].ledger_type, LedgerType::Credit);
        let recorded: Vec<&str> = ingested.accounts.keys().map(String::as_str).collect();
        assert_eq!(recorded, vec!["vendor"]);
        assert_eq!(ingested.accounts["vendor"].name, "Vendor");
    }

    #[test]
    fn test_irr_inputs_bucketed() {
        let store = store()
            .with_entity(
                Entity::new("fund", EntityType::Fund)
                    .with_incorporation_date(chrono::NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()),
            )
            .with_entity(Entity::new("biz", EntityType::Business))
            .with_account(Account::new("biz-bank", "biz", AccountType::Bank).with_name("Biz"));
        let mut meta = transfer("ops", "biz-bank", dec!(100));
        meta.to_entity_id = "biz".to_string();
        let activity = Activity {
            id: "a".to_string(),
            thread: vec![entry("t", 1, meta)],
        };

        let (ingested, cache) = run("ops", &store, &[activity]);
        assert_eq!(ingested.transactions[0].counter_entity_id, "biz");
        assert_eq!(cache.get("ops", "biz")["Y2Q1"], dec!(100));
    }
}
