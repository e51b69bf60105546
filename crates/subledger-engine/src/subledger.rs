//! The computed subledger of one account and its sequential aggregation.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use subledger_booking::{allocate, AllocationMethod};
use subledger_core::{Account, AccountType, Investor, Transaction, TransactionList};

use crate::error::Result;

/// One account's computed result.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Subledger {
    /// Account the subledger belongs to.
    pub account_id: String,
    /// Destination accounts seen while ingesting, by id.
    #[serde(default)]
    pub accounts: BTreeMap<String, Account>,
    /// Signed net of all transactions touching the account.
    pub grand_total: Decimal,
    /// Time-ordered transactions with their allocation chains.
    pub transactions: TransactionList,
    /// Copy of the transactions taken before allocation chains are attached.
    #[serde(default)]
    pub transactions_net: TransactionList,
    /// The live investment pool.
    pub investments: Vec<Investor>,
    /// Asset the pool denominates in.
    #[serde(default)]
    pub asset_id: String,
}

impl Subledger {
    /// Create an empty subledger for an account.
    #[must_use]
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            ..Self::default()
        }
    }

    /// Transaction by id.
    #[must_use]
    pub fn find_transaction(&self, id: &str) -> Option<&Transaction> {
        self.transactions.find(id)
    }

    /// Remaining balance of the investment pool.
    #[must_use]
    pub fn pool_balance(&self) -> Decimal {
        subledger_booking::pool_balance(&self.investments)
    }

    /// Create a lot from a subscription and add it to the pool.
    fn add_investment(&mut self, transaction: &Transaction) -> Investor {
        let lot = Investor::new(
            transaction.id.clone(),
            transaction.fund_account.clone(),
            transaction.amount,
            transaction.timestamp,
        );
        self.investments.push(lot.clone());
        lot
    }

    /// Sort, snapshot and walk the transactions.
    ///
    /// The source side of a non-investment account subtracts the amount and
    /// draws an allocation chain from the pool, using the method returned by
    /// `method_for` for the pool's asset. Every other transaction adds its
    /// amount: subscriptions open a lot, other inflows copy the chain of the
    /// matching transaction in the counterpart subledger returned by
    /// `resolve_counterpart`.
    pub(crate) fn aggregate<M, R>(
        &mut self,
        kind: AccountType,
        method_for: M,
        mut resolve_counterpart: R,
    ) -> Result<()>
    where
        M: Fn(&str) -> AllocationMethod,
        R: FnMut(&str) -> Result<Self>,
    {
        self.transactions.sort();
        self.transactions_net = self.transactions.clone();
        self.grand_total = Decimal::ZERO;

        for i in 0..self.transactions.len() {
            let transaction = self.transactions[i].clone();

            if transaction.from == self.account_id && kind != AccountType::Investment {
                self.grand_total -= transaction.amount;

                let method = method_for(&self.asset_id);
                let allocation = allocate(
                    method,
                    &mut self.investments,
                    transaction.amount,
                    transaction.timestamp,
                );
                if !allocation.is_complete() {
                    tracing::warn!(
                        account = %self.account_id,
                        transaction = %transaction.id,
                        shortfall = %allocation.shortfall,
                        "outflow exceeds investment pool"
                    );
                }
                self.transactions.as_mut_slice()[i].investors = allocation.investors;
                continue;
            }

            self.grand_total += transaction.amount;

            if transaction.execute_type.is_subscription() {
                let lot = self.add_investment(&transaction);
                self.transactions.as_mut_slice()[i].investors = vec![lot];
                self.asset_id.clone_from(&transaction.asset_id);
                continue;
            }

            let chain = self.counterpart_chain(&transaction, &mut resolve_counterpart)?;
            self.investments.extend(chain.iter().cloned());
            self.transactions.as_mut_slice()[i].investors = chain;
        }

        tracing::debug!(
            account = %self.account_id,
            transactions = self.transactions.len(),
            grand_total = %self.grand_total,
            pool = %self.pool_balance(),
            "aggregated subledger"
        );
        Ok(())
    }

    /// Allocation chain of the counterpart's copy of an inflow.
    fn counterpart_chain<R>(
        &mut self,
        transaction: &Transaction,
        resolve_counterpart: &mut R,
    ) -> Result<Vec<Investor>>
    where
        R: FnMut(&str) -> Result<Self>,
    {
        if transaction.from.is_empty() {
            tracing::debug!(transaction = %transaction.id, "inflow without source account");
            return Ok(Vec::new());
        }
        // The counterpart is this subledger; its copy carries no chain yet.
        if transaction.from == self.account_id {
            return Ok(Vec::new());
        }

        let counterpart = resolve_counterpart(&transaction.from)?;
        if self.asset_id.is_empty() {
            self.asset_id.clone_from(&counterpart.asset_id);
        }

        match counterpart.find_transaction(&transaction.id) {
            Some(source) => Ok(source.investors.clone()),
            None => {
                tracing::warn!(
                    account = %self.account_id,
                    counterpart = %transaction.from,
                    transaction = %transaction.id,
                    "counterpart transaction not found, allocation chain left empty"
                );
                Ok(Vec::new())
            }
        }
    }
}
