//! Deterministic reconciliation of budget and savings goal sets.
//!
//! Goals are matched by canonical key (trimmed, case-folded name). Merges
//! never produce two goals with the same key, and merging an already merged
//! list again yields the same list.

use std::collections::{HashMap, HashSet};

use cadence_domain::{Amounted, BudgetGoal, Identifiable, NamedEntity, SavingsGoal};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{error::CoreResult, repository::GoalRepository, settings::EngineSettings};

/// Case- and whitespace-insensitive goal identity.
pub fn canonical_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn budget_goal_id(key: &str) -> String {
    format!("budget:{key}")
}

pub fn savings_goal_id(key: &str) -> String {
    format!("savings:{key}")
}

/// Which goal table a row or write belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalKind {
    Budget,
    Savings,
}

/// Persisted goal row. Row ids increase monotonically per store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalRow {
    pub row_id: u64,
    pub plan_id: Uuid,
    pub kind: GoalKind,
    pub key: String,
    pub goal_id: String,
    pub name: String,
    pub amount_minor: i64,
}

impl GoalRow {
    pub fn to_budget_goal(&self) -> BudgetGoal {
        BudgetGoal::new(self.name.clone(), self.amount_minor).with_id(self.goal_id.clone())
    }

    pub fn to_savings_goal(&self) -> SavingsGoal {
        SavingsGoal::new(self.name.clone(), self.amount_minor).with_id(self.goal_id.clone())
    }
}

/// A single mutation against a plan's goal rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoalWrite {
    Upsert {
        key: String,
        goal_id: String,
        name: String,
        amount_minor: i64,
    },
    /// Tombstone: the row for `key` is removed, never written as zero.
    Delete { key: String },
}

impl GoalWrite {
    pub fn key(&self) -> &str {
        match self {
            GoalWrite::Upsert { key, .. } | GoalWrite::Delete { key } => key,
        }
    }
}

/// First positive variant per key wins; keys keep first-appearance order.
fn index_by_key<'a, G>(goals: &'a [G]) -> (Vec<String>, HashMap<String, &'a G>)
where
    G: NamedEntity + Amounted,
{
    let mut order = Vec::new();
    let mut chosen: HashMap<String, &G> = HashMap::new();
    for goal in goals {
        let key = canonical_key(goal.name());
        if key.is_empty() {
            continue;
        }
        match chosen.get(&key) {
            None => {
                order.push(key.clone());
                chosen.insert(key, goal);
            }
            Some(existing) if existing.amount_minor() <= 0 && goal.amount_minor() > 0 => {
                chosen.insert(key, goal);
            }
            Some(_) => {}
        }
    }
    (order, chosen)
}

fn non_empty(id: &str) -> Option<&str> {
    let trimmed = id.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Merges server budget goals into the default category list.
///
/// Defaults keep their order and ids. A positive server limit overrides the
/// default limit; categories only the server knows are appended in server
/// order. Goals whose resulting limit is not positive are dropped.
pub fn merge_budget_goals(defaults: &[BudgetGoal], server: &[BudgetGoal]) -> Vec<BudgetGoal> {
    let (server_order, server_goals) = index_by_key(server);
    let mut merged = Vec::with_capacity(defaults.len() + server_order.len());
    let mut seen = HashSet::new();

    for default in defaults {
        let key = canonical_key(&default.category);
        if key.is_empty() || !seen.insert(key.clone()) {
            continue;
        }
        let limit_minor = server_goals
            .get(&key)
            .filter(|goal| goal.is_set())
            .map_or(default.limit_minor, |goal| goal.limit_minor);
        if limit_minor <= 0 {
            continue;
        }
        let id = non_empty(&default.id).map_or_else(|| budget_goal_id(&key), str::to_string);
        merged.push(BudgetGoal {
            id,
            category: default.category.trim().to_string(),
            limit_minor,
        });
    }

    for key in server_order {
        if seen.contains(&key) {
            continue;
        }
        let Some(goal) = server_goals.get(&key).filter(|goal| goal.is_set()) else {
            continue;
        };
        merged.push(BudgetGoal {
            id: budget_goal_id(&key),
            category: goal.category.trim().to_string(),
            limit_minor: goal.limit_minor,
        });
        seen.insert(key);
    }
    merged
}

/// Merges server savings goals with the goals the client currently holds.
///
/// Server goals come first in server order. Ids prefer the client's id for
/// the same key, then the server id, then a derived `savings:<key>`. Client
/// goals the server has never seen are appended so local edits survive a
/// refresh. A server tombstone for a key suppresses the client copy.
pub fn merge_savings_goals(client: &[SavingsGoal], server: &[SavingsGoal]) -> Vec<SavingsGoal> {
    let (client_order, client_goals) = index_by_key(client);
    let (server_order, server_goals) = index_by_key(server);
    let mut merged = Vec::with_capacity(server_order.len() + client_order.len());

    for key in &server_order {
        let Some(goal) = server_goals.get(key).filter(|goal| goal.is_set()) else {
            continue;
        };
        let id = client_goals
            .get(key)
            .and_then(|client| non_empty(&client.id))
            .or_else(|| non_empty(&goal.id))
            .map_or_else(|| savings_goal_id(key), str::to_string);
        merged.push(SavingsGoal {
            id,
            name: goal.name.trim().to_string(),
            target_minor: goal.target_minor,
        });
    }

    for key in client_order {
        if server_goals.contains_key(&key) {
            continue;
        }
        let Some(goal) = client_goals.get(&key).filter(|goal| goal.is_set()) else {
            continue;
        };
        let id = non_empty(&goal.id).map_or_else(|| savings_goal_id(&key), str::to_string);
        merged.push(SavingsGoal {
            id,
            name: goal.name.trim().to_string(),
            target_minor: goal.target_minor,
        });
    }
    merged
}

fn goal_writes<G>(desired: &[G], derive_id: fn(&str) -> String) -> Vec<GoalWrite>
where
    G: Identifiable + NamedEntity + Amounted,
{
    // The last entry for a key is the user's latest edit.
    let mut order = Vec::new();
    let mut latest: HashMap<String, &G> = HashMap::new();
    for goal in desired {
        let key = canonical_key(goal.name());
        if key.is_empty() {
            continue;
        }
        if latest.insert(key.clone(), goal).is_none() {
            order.push(key);
        }
    }

    order
        .into_iter()
        .filter_map(|key| {
            let goal = latest.get(&key)?;
            Some(if goal.amount_minor() > 0 {
                GoalWrite::Upsert {
                    goal_id: non_empty(goal.identifier())
                        .map_or_else(|| derive_id(&key), str::to_string),
                    name: goal.name().trim().to_string(),
                    amount_minor: goal.amount_minor(),
                    key,
                }
            } else {
                GoalWrite::Delete { key }
            })
        })
        .collect()
}

/// Turns a desired budget goal list into row writes.
pub fn budget_goal_writes(desired: &[BudgetGoal]) -> Vec<GoalWrite> {
    goal_writes(desired, budget_goal_id)
}

/// Turns a desired savings goal list into row writes.
pub fn savings_goal_writes(desired: &[SavingsGoal]) -> Vec<GoalWrite> {
    goal_writes(desired, savings_goal_id)
}

/// Splits rows into survivors (lowest row id per key, in row order) and the
/// row ids of duplicates that should be deleted.
pub fn resolve_duplicate_rows(mut rows: Vec<GoalRow>) -> (Vec<GoalRow>, Vec<u64>) {
    rows.sort_by_key(|row| row.row_id);
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(rows.len());
    let mut extras = Vec::new();
    for row in rows {
        if seen.insert((row.kind, canonical_key(&row.key))) {
            kept.push(row);
        } else {
            extras.push(row.row_id);
        }
    }
    (kept, extras)
}

/// Loads and saves plan goals through a [`GoalRepository`].
pub struct GoalService;

impl GoalService {
    fn load_rows(
        repo: &dyn GoalRepository,
        plan_id: Uuid,
        kind: GoalKind,
    ) -> CoreResult<Vec<GoalRow>> {
        let (kept, extras) = resolve_duplicate_rows(repo.goal_rows(plan_id, kind)?);
        if !extras.is_empty() {
            warn!(
                %plan_id,
                ?kind,
                duplicates = extras.len(),
                "removing duplicate goal rows"
            );
            repo.delete_goal_rows(&extras)?;
        }
        Ok(kept
            .into_iter()
            .filter(|row| row.amount_minor > 0)
            .collect())
    }

    /// Budget goals stored for a plan, duplicates resolved.
    pub fn load_budget_goals(
        repo: &dyn GoalRepository,
        plan_id: Uuid,
    ) -> CoreResult<Vec<BudgetGoal>> {
        Ok(Self::load_rows(repo, plan_id, GoalKind::Budget)?
            .iter()
            .map(GoalRow::to_budget_goal)
            .collect())
    }

    /// Savings goals stored for a plan, duplicates resolved.
    pub fn load_savings_goals(
        repo: &dyn GoalRepository,
        plan_id: Uuid,
    ) -> CoreResult<Vec<SavingsGoal>> {
        Ok(Self::load_rows(repo, plan_id, GoalKind::Savings)?
            .iter()
            .map(GoalRow::to_savings_goal)
            .collect())
    }

    /// Writes the desired budget goals and returns what is now stored.
    pub fn save_budget_goals(
        repo: &dyn GoalRepository,
        plan_id: Uuid,
        desired: &[BudgetGoal],
    ) -> CoreResult<Vec<BudgetGoal>> {
        let writes = budget_goal_writes(desired);
        debug!(%plan_id, writes = writes.len(), "saving budget goals");
        repo.apply_budget_goal_writes(plan_id, &writes)?;
        Self::load_budget_goals(repo, plan_id)
    }

    /// Writes the desired savings goals and returns what is now stored.
    pub fn save_savings_goals(
        repo: &dyn GoalRepository,
        plan_id: Uuid,
        desired: &[SavingsGoal],
    ) -> CoreResult<Vec<SavingsGoal>> {
        let writes = savings_goal_writes(desired);
        debug!(%plan_id, writes = writes.len(), "saving savings goals");
        repo.apply_savings_goal_writes(plan_id, &writes)?;
        Self::load_savings_goals(repo, plan_id)
    }

    /// Stored budget goals merged over the default categories.
    pub fn reconcile_budget_goals(
        repo: &dyn GoalRepository,
        plan_id: Uuid,
        defaults: &[BudgetGoal],
    ) -> CoreResult<Vec<BudgetGoal>> {
        let server = Self::load_budget_goals(repo, plan_id)?;
        Ok(merge_budget_goals(defaults, &server))
    }

    /// Stored budget goals merged over the configured default categories.
    pub fn reconcile_with_default_categories(
        repo: &dyn GoalRepository,
        plan_id: Uuid,
        settings: &EngineSettings,
    ) -> CoreResult<Vec<BudgetGoal>> {
        let defaults = default_budget_goals(&settings.default_budget_categories);
        Self::reconcile_budget_goals(repo, plan_id, &defaults)
    }

    /// Stored savings goals merged with the client's current list.
    pub fn reconcile_savings_goals(
        repo: &dyn GoalRepository,
        plan_id: Uuid,
        client: &[SavingsGoal],
    ) -> CoreResult<Vec<SavingsGoal>> {
        let server = Self::load_savings_goals(repo, plan_id)?;
        Ok(merge_savings_goals(client, &server))
    }
}

/// Default budget categories with zero limits, ready for merging.
pub fn default_budget_goals(categories: &[String]) -> Vec<BudgetGoal> {
    categories
        .iter()
        .filter(|name| !name.trim().is_empty())
        .map(|name| BudgetGoal::new(name.trim(), 0).with_id(budget_goal_id(&canonical_key(name))))
        .collect()
}
