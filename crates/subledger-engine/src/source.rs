//! Collaborators supplying activity records and domain snapshots.
//!
//! The engine never talks to a database. It asks an [`ActivitySource`] for
//! the raw activities touching an account and a [`Resolver`] for point
//! lookups of accounts, entities, assets and waterfall elements. A lookup
//! miss is `None` and degrades to "no enrichment"; only activity retrieval
//! can fail a computation.
//!
//! [`MemoryStore`] implements both traits over in-memory collections.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use subledger_core::{Account, AccountType, Activity, Asset, Entity, WaterfallElement};

use crate::error::SourceError;

/// Supplies the activities touching an account.
pub trait ActivitySource {
    /// All activities whose thread references `account_id`, in retrieval
    /// order.
    fn activities(&self, account_id: &str) -> Result<Vec<Activity>, SourceError>;
}

/// Point lookups into the surrounding domain model.
pub trait Resolver {
    /// Account by id.
    fn account(&self, id: &str) -> Option<Account>;

    /// Entity by id.
    fn entity(&self, id: &str) -> Option<Entity>;

    /// Asset by id.
    fn asset(&self, id: &str) -> Option<Asset>;

    /// Waterfall element by id.
    fn waterfall_element(&self, id: &str) -> Option<WaterfallElement>;

    /// First account of `entity_id` with the given bank numbers.
    fn find_account_by_number(
        &self,
        entity_id: &str,
        account_number: &str,
        routing_number: &str,
    ) -> Option<Account>;

    /// The investment account `investor_id` holds in `fund_id`.
    fn find_investment_account(&self, investor_id: &str, fund_id: &str) -> Option<Account>;
}

/// In-memory activity source and resolver.
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: Vec<Account>,
    entities: HashMap<String, Entity>,
    assets: HashMap<String, Asset>,
    waterfall_elements: HashMap<String, WaterfallElement>,
    activities: Vec<Activity>,
    unavailable: HashSet<String>,
    fetches: RefCell<HashMap<String, usize>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account snapshot.
    #[must_use]
    pub fn with_account(mut self, account: Account) -> Self {
        self.accounts.push(account);
        self
    }

    /// Add an entity snapshot.
    #[must_use]
    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entities.insert(entity.id.clone(), entity);
        self
    }

    /// Add an asset snapshot.
    #[must_use]
    pub fn with_asset(mut self, asset: Asset) -> Self {
        self.assets.insert(asset.id.clone(), asset);
        self
    }

    /// Add a waterfall element.
    #[must_use]
    pub fn with_waterfall_element(mut self, element: WaterfallElement) -> Self {
        self.waterfall_elements.insert(element.id.clone(), element);
        self
    }

    /// Add an activity.
    #[must_use]
    pub fn with_activity(mut self, activity: Activity) -> Self {
        self.activities.push(activity);
        self
    }

    /// Make activity retrieval fail for an account.
    #[must_use]
    pub fn unavailable_for(mut self, account_id: impl Into<String>) -> Self {
        self.unavailable.insert(account_id.into());
        self
    }

    /// Append activities decoded from a JSON array.
    ///
    /// Returns the number of activities added.
    pub fn load_activities_json(&mut self, json: &str) -> Result<usize, SourceError> {
        let activities: Vec<Activity> = serde_json::from_str(json)?;
        let count = activities.len();
        self.activities.extend(activities);
        Ok(count)
    }

    /// How many times activities were requested for an account.
    #[must_use]
    pub fn fetch_count(&self, account_id: &str) -> usize {
        self.fetches.borrow().get(account_id).copied().unwrap_or(0)
    }
}

fn references(activity: &Activity, account_id: &str) -> bool {
    activity.thread.iter().any(|entry| {
        let env = &entry.envelope;
        env.from_account_id == account_id
            || env.to_account_id == account_id
            || env.non_monetary_account_id == account_id
    })
}

impl ActivitySource for MemoryStore {
    fn activities(&self, account_id: &str) -> Result<Vec<Activity>, SourceError> {
        *self
            .fetches
            .borrow_mut()
            .entry(account_id.to_string())
            .or_default() += 1;

        if self.unavailable.contains(account_id) {
            return Err(SourceError::Unavailable {
                account: account_id.to_string(),
                message: "store marked unavailable".to_string(),
            });
        }

        Ok(self
            .activities
            .iter()
            .filter(|a| references(a, account_id))
            .cloned()
            .collect())
    }
}

impl Resolver for MemoryStore {
    fn account(&self, id: &str) -> Option<Account> {
        if id.is_empty() {
            return None;
        }
        self.accounts.iter().find(|a| a.id == id).cloned()
    }

    fn entity(&self, id: &str) -> Option<Entity> {
        self.entities.get(id).cloned()
    }

    fn asset(&self, id: &str) -> Option<Asset> {
        self.assets.get(id).cloned()
    }

    fn waterfall_element(&self, id: &str) -> Option<WaterfallElement> {
        self.waterfall_elements.get(id).cloned()
    }

    fn find_account_by_number(
        &self,
        entity_id: &str,
        account_number: &str,
        routing_number: &str,
    ) -> Option<Account> {
        if entity_id.is_empty() || account_number.is_empty() {
            return None;
        }
        self.accounts
            .iter()
            .find(|a| {
                a.entity_id == entity_id
                    && a.account_number == account_number
                    && a.routing_number == routing_number
            })
            .cloned()
    }

    fn find_investment_account(&self, investor_id: &str, fund_id: &str) -> Option<Account> {
        if investor_id.is_empty() || fund_id.is_empty() {
            return None;
        }
        self.accounts
            .iter()
            .find(|a| {
                a.kind == AccountType::Investment
                    && a.entity_id == investor_id
                    && a.custodial_entity_id == fund_id
            })
            .cloned()
    }
}
