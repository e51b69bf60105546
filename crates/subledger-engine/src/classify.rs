//! Ledger classification of activity envelopes.
//!
//! Given the account whose subledger is being built and an envelope whose
//! account ids have already been resolved, decide the ledger type, the
//! counterparty entity and a human-readable description. An execution type
//! with no classification for this account yields `None` and the record is
//! skipped.

use subledger_core::{Account, AccountType, ActivityMetaData, ExecuteType, LedgerType};

use crate::source::Resolver;

/// Outcome of classifying one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Ledger type from the account's point of view.
    pub ledger_type: LedgerType,
    /// Counterparty entity.
    pub counter_entity_id: String,
    /// Human-readable description.
    pub description: String,
}

impl Classification {
    fn new(ledger_type: LedgerType) -> Self {
        Self {
            ledger_type,
            counter_entity_id: String::new(),
            description: String::new(),
        }
    }
}

/// Cash-like movements: transfers, reserves, expenses and distributions.
const fn is_cash_like(kind: ExecuteType) -> bool {
    matches!(
        kind,
        ExecuteType::CashTransfer
            | ExecuteType::ExternalCashTransfer
            | ExecuteType::CashReserves
            | ExecuteType::ExternalCashReserves
            | ExecuteType::OperatingExpense
            | ExecuteType::ExternalOperatingExpense
            | ExecuteType::OrganizationalExpense
            | ExecuteType::ExternalOrganizationalExpense
            | ExecuteType::TaxDistribution
            | ExecuteType::ExternalTaxDistribution
            | ExecuteType::InvestorPreferred
            | ExecuteType::ExternalInvestorPreferred
            | ExecuteType::FundSponsorPromote
            | ExecuteType::ExternalFundSponsorPromote
            | ExecuteType::ReturnOfCapital
            | ExecuteType::ExternalReturnOfCapital
            | ExecuteType::FundSponsorManagementFee
            | ExecuteType::ExternalFundSponsorManagementFee
    )
}

/// Capital movements classified by direction only.
const fn is_directional(kind: ExecuteType) -> bool {
    matches!(
        kind,
        ExecuteType::Historical
            | ExecuteType::TaxCredit
            | ExecuteType::ExternalTaxCredit
            | ExecuteType::NonFundEquity
            | ExecuteType::ExternalNonFundEquity
            | ExecuteType::Debt
            | ExecuteType::ExternalDebt
    )
}

/// Classify an envelope for `account`.
pub fn classify(
    account: &Account,
    meta: &ActivityMetaData,
    resolver: &dyn Resolver,
) -> Option<Classification> {
    let kind = meta.execute_type;

    if is_cash_like(kind) {
        let mut classification = directional(account, meta, resolver);
        if meta.to_account_id == meta.from_account_id {
            classification.ledger_type = LedgerType::CreditDebit;
        }
        return Some(classification);
    }
    if is_directional(kind) {
        return Some(directional(account, meta, resolver));
    }

    match kind {
        ExecuteType::Subscription | ExecuteType::ExternalSubscription => {
            let ledger_type = if account.kind == AccountType::Escrow {
                LedgerType::Debit
            } else {
                LedgerType::Purchase
            };
            let mut description =
                format!("Subscription to {}", asset_name(resolver, &meta.asset_id));
            let conversion = &meta.conversion;
            if !conversion.to_asset.is_empty() && conversion.to_asset == meta.asset_id {
                description.push_str(&format!(
                    " (Converted from {})",
                    asset_name(resolver, &conversion.from_asset)
                ));
            }
            Some(Classification {
                description,
                ..Classification::new(ledger_type)
            })
        }
        ExecuteType::Sale => Some(Classification {
            description: format!("Selling of {}", asset_name(resolver, &meta.asset_id)),
            ..Classification::new(LedgerType::Sale)
        }),
        ExecuteType::Conversion => Some(Classification {
            description: format!(
                "Converting to {}",
                asset_name(resolver, &meta.conversion.to_asset)
            ),
            ..Classification::new(LedgerType::Conversion)
        }),
        ExecuteType::PreferredReturn => Some(Classification::new(LedgerType::Distribution)),
        ExecuteType::Sponsor if account.kind == AccountType::Sponsor => {
            Some(Classification::new(LedgerType::Sponsor))
        }
        _ => None,
    }
}

/// Debit when the money arrives in `account`, credit otherwise.
fn directional(
    account: &Account,
    meta: &ActivityMetaData,
    resolver: &dyn Resolver,
) -> Classification {
    if meta.to_account_id == account.id {
        Classification {
            counter_entity_id: meta.from_entity_id.clone(),
            description: describe(
                "from",
                &meta.from_entity_id,
                &meta.from_account_id,
                &meta.from_account_detail.name,
                meta.execute_type,
                resolver,
            ),
            ..Classification::new(LedgerType::Debit)
        }
    } else {
        Classification {
            counter_entity_id: meta.to_entity_id.clone(),
            description: describe(
                "to",
                &meta.to_entity_id,
                &meta.to_account_id,
                &meta.to_account_detail.name,
                meta.execute_type,
                resolver,
            ),
            ..Classification::new(LedgerType::Credit)
        }
    }
}

fn describe(
    direction: &str,
    entity_id: &str,
    account_id: &str,
    detail_name: &str,
    kind: ExecuteType,
    resolver: &dyn Resolver,
) -> String {
    if !entity_id.is_empty() {
        let other = resolver.account(account_id);
        if other.as_ref().is_some_and(|a| a.kind.is_off_platform()) {
            return format!("Cash Transfer {direction} External Account");
        }
        let name = other.map(|a| a.name).unwrap_or_default();
        return format!("Fund Transfer {direction} {name}");
    }
    if kind == ExecuteType::Historical {
        let name = resolver
            .account(account_id)
            .map(|a| a.name)
            .unwrap_or_default();
        return format!("Fund Transfer {direction} {name}");
    }
    format!("Fund Transfer {direction} {detail_name}")
}

fn asset_name(resolver: &dyn Resolver, asset_id: &str) -> String {
    resolver
        .asset(asset_id)
        .map_or_else(|| asset_id.to_string(), |a| a.name)
}
