//! Serializable plan/goal/transaction state and its in-memory repository.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use cadence_domain::{PeriodWindow, Plan, PlanFields, PlanKey, Transaction, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{CoreError, CoreResult},
    goals::{
        budget_goal_writes, canonical_key, resolve_duplicate_rows, savings_goal_writes, GoalKind,
        GoalRow, GoalWrite,
    },
    repository::{GoalRepository, PlanRepository, TransactionQuery},
};

/// Transaction tagged with its owner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserTransaction {
    pub user_id: UserId,
    pub transaction: Transaction,
}

/// Everything a single authoritative store holds.
///
/// Plans are kept without goals; goals live in `goal_rows` and are
/// hydrated into plans on read.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlanStore {
    #[serde(default)]
    plans: Vec<Plan>,
    #[serde(default)]
    active: BTreeMap<UserId, Uuid>,
    #[serde(default)]
    goal_rows: Vec<GoalRow>,
    #[serde(default)]
    next_row_id: u64,
    #[serde(default)]
    transactions: Vec<UserTransaction>,
}

impl PlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn hydrate(&self, plan: &Plan) -> Plan {
        let mut plan = plan.clone();
        plan.budget_goals = self
            .live_rows(plan.id, GoalKind::Budget)
            .iter()
            .map(GoalRow::to_budget_goal)
            .collect();
        plan.savings_goals = self
            .live_rows(plan.id, GoalKind::Savings)
            .iter()
            .map(GoalRow::to_savings_goal)
            .collect();
        plan
    }

    fn live_rows(&self, plan_id: Uuid, kind: GoalKind) -> Vec<GoalRow> {
        let (kept, _) = resolve_duplicate_rows(self.goal_rows(plan_id, kind));
        kept.into_iter().filter(|row| row.amount_minor > 0).collect()
    }

    pub fn find_active_plan(&self, user_id: &str) -> Option<Plan> {
        let plan_id = self.active.get(user_id)?;
        self.plans
            .iter()
            .find(|plan| plan.id == *plan_id)
            .map(|plan| self.hydrate(plan))
    }

    pub fn upsert_plan(&mut self, user_id: &str, window: &PeriodWindow, fields: PlanFields) -> Plan {
        let key = PlanKey::for_window(user_id, window);
        if let Some(index) = self.plans.iter().position(|plan| plan.key() == key) {
            let existing = &mut self.plans[index];
            existing.currency = fields.currency;
            existing.total_budget_limit_minor = fields.total_budget_limit_minor;
            existing.touch();
            debug!(plan_id = %existing.id, "plan already exists for period");
            return self.hydrate(&self.plans[index]);
        }

        let budget_writes = budget_goal_writes(&fields.budget_goals);
        let savings_writes = savings_goal_writes(&fields.savings_goals);
        let mut plan = Plan::new(user_id, *window, fields);
        plan.budget_goals.clear();
        plan.savings_goals.clear();
        let plan_id = plan.id;
        let index = self.plans.len();
        self.plans.push(plan);
        self.apply_goal_writes(plan_id, GoalKind::Budget, &budget_writes);
        self.apply_goal_writes(plan_id, GoalKind::Savings, &savings_writes);
        debug!(%plan_id, start = %window.period_start_utc, "plan created");
        self.hydrate(&self.plans[index])
    }

    pub fn set_active_plan(&mut self, user_id: &str, plan_id: Uuid) -> CoreResult<()> {
        let owned = self
            .plans
            .iter()
            .any(|plan| plan.id == plan_id && plan.user_id == user_id);
        if !owned {
            return Err(CoreError::PlanNotFound(format!("{user_id}/{plan_id}")));
        }
        self.active.insert(user_id.to_string(), plan_id);
        Ok(())
    }

    pub fn list_plans(&self, user_id: &str) -> Vec<Plan> {
        let mut plans: Vec<Plan> = self
            .plans
            .iter()
            .filter(|plan| plan.user_id == user_id)
            .map(|plan| self.hydrate(plan))
            .collect();
        plans.sort_by_key(|plan| (plan.period_start, plan.created_at));
        plans
    }

    pub fn goal_rows(&self, plan_id: Uuid, kind: GoalKind) -> Vec<GoalRow> {
        self.goal_rows
            .iter()
            .filter(|row| row.plan_id == plan_id && row.kind == kind)
            .cloned()
            .collect()
    }

    pub fn apply_goal_writes(&mut self, plan_id: Uuid, kind: GoalKind, writes: &[GoalWrite]) {
        for write in writes {
            let key = canonical_key(write.key());
            match write {
                GoalWrite::Upsert {
                    goal_id,
                    name,
                    amount_minor,
                    ..
                } => {
                    let existing = self
                        .goal_rows
                        .iter_mut()
                        .filter(|row| {
                            row.plan_id == plan_id && row.kind == kind && canonical_key(&row.key) == key
                        })
                        .min_by_key(|row| row.row_id);
                    match existing {
                        Some(row) => {
                            row.goal_id = goal_id.clone();
                            row.name = name.clone();
                            row.amount_minor = *amount_minor;
                        }
                        None => {
                            self.next_row_id += 1;
                            self.goal_rows.push(GoalRow {
                                row_id: self.next_row_id,
                                plan_id,
                                kind,
                                key,
                                goal_id: goal_id.clone(),
                                name: name.clone(),
                                amount_minor: *amount_minor,
                            });
                        }
                    }
                }
                GoalWrite::Delete { .. } => {
                    self.goal_rows.retain(|row| {
                        !(row.plan_id == plan_id && row.kind == kind && canonical_key(&row.key) == key)
                    });
                }
            }
        }
        self.touch_plan(plan_id);
    }

    pub fn delete_goal_rows(&mut self, row_ids: &[u64]) {
        self.goal_rows.retain(|row| !row_ids.contains(&row.row_id));
    }

    /// Appends rows verbatim, e.g. when importing data from another store.
    /// Row ids at or above the counter advance it.
    pub fn import_goal_rows(&mut self, rows: impl IntoIterator<Item = GoalRow>) {
        for row in rows {
            self.next_row_id = self.next_row_id.max(row.row_id);
            self.goal_rows.push(row);
        }
    }

    pub fn record_transaction(&mut self, user_id: &str, transaction: Transaction) {
        self.transactions.push(UserTransaction {
            user_id: user_id.to_string(),
            transaction,
        });
    }

    pub fn transactions_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<Transaction> {
        self.transactions
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| &entry.transaction)
            .filter(|txn| start <= txn.occurred_at && txn.occurred_at < end)
            .cloned()
            .collect()
    }

    fn touch_plan(&mut self, plan_id: Uuid) {
        if let Some(plan) = self.plans.iter_mut().find(|plan| plan.id == plan_id) {
            plan.touch();
        }
    }
}

/// [`PlanRepository`], [`GoalRepository`] and [`TransactionQuery`] over a
/// mutex-guarded [`PlanStore`].
#[derive(Debug, Default)]
pub struct InMemoryPlanStore {
    inner: Mutex<PlanStore>,
}

impl InMemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_store(store: PlanStore) -> Self {
        Self {
            inner: Mutex::new(store),
        }
    }

    /// Locks the underlying store for direct access.
    pub fn lock(&self) -> CoreResult<MutexGuard<'_, PlanStore>> {
        self.inner
            .lock()
            .map_err(|_| CoreError::Storage("plan store lock poisoned".into()))
    }

    pub fn snapshot(&self) -> CoreResult<PlanStore> {
        Ok(self.lock()?.clone())
    }
}

impl PlanRepository for InMemoryPlanStore {
    fn find_active_plan(&self, user_id: &str) -> CoreResult<Option<Plan>> {
        Ok(self.lock()?.find_active_plan(user_id))
    }

    fn upsert_plan(
        &self,
        user_id: &str,
        window: &PeriodWindow,
        fields: PlanFields,
    ) -> CoreResult<Plan> {
        Ok(self.lock()?.upsert_plan(user_id, window, fields))
    }

    fn set_active_plan(&self, user_id: &str, plan_id: Uuid) -> CoreResult<()> {
        self.lock()?.set_active_plan(user_id, plan_id)
    }

    fn list_plans(&self, user_id: &str) -> CoreResult<Vec<Plan>> {
        Ok(self.lock()?.list_plans(user_id))
    }
}

impl GoalRepository for InMemoryPlanStore {
    fn goal_rows(&self, plan_id: Uuid, kind: GoalKind) -> CoreResult<Vec<GoalRow>> {
        Ok(self.lock()?.goal_rows(plan_id, kind))
    }

    fn apply_goal_writes(
        &self,
        plan_id: Uuid,
        kind: GoalKind,
        writes: &[GoalWrite],
    ) -> CoreResult<()> {
        self.lock()?.apply_goal_writes(plan_id, kind, writes);
        Ok(())
    }

    fn delete_goal_rows(&self, row_ids: &[u64]) -> CoreResult<()> {
        self.lock()?.delete_goal_rows(row_ids);
        Ok(())
    }
}

impl TransactionQuery for InMemoryPlanStore {
    fn transactions_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CoreResult<Vec<Transaction>> {
        Ok(self.lock()?.transactions_between(user_id, start, end))
    }
}

#[cfg(test)]
mod tests {
    use cadence_domain::{BudgetGoal, CurrencyCode, PeriodType, SavingsGoal, TransactionKind};
    use chrono::TimeZone;

    use super::*;

    fn window(month: u32) -> PeriodWindow {
        PeriodWindow::new(
            PeriodType::Monthly,
            Utc.with_ymd_and_hms(2025, month, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, month + 1, 1, 0, 0, 0).unwrap(),
            None,
        )
        .unwrap()
    }

    fn fields() -> PlanFields {
        PlanFields {
            time_zone: "UTC".into(),
            currency: CurrencyCode::new("USD"),
            total_budget_limit_minor: 100_000,
            budget_goals: vec![BudgetGoal::new("Food", 5_000), BudgetGoal::new("Fun", 0)],
            savings_goals: vec![SavingsGoal::new("Trip", 20_000)],
        }
    }

    #[test]
    fn upsert_is_get_or_create() {
        let mut store = PlanStore::new();
        let first = store.upsert_plan("u1", &window(1), fields());
        let mut changed = fields();
        changed.time_zone = "Europe/Paris".into();
        changed.total_budget_limit_minor = 1;
        changed.budget_goals.clear();
        let second = store.upsert_plan("u1", &window(1), changed);
        assert_eq!(first.id, second.id);
        assert_eq!(second.total_budget_limit_minor, 1);
        assert_eq!(second.time_zone, "UTC");
        assert_eq!(second.budget_goals, first.budget_goals);
        assert_eq!(store.list_plans("u1").len(), 1);
    }

    #[test]
    fn plans_are_keyed_by_user_type_and_start() {
        let mut store = PlanStore::new();
        let monthly = store.upsert_plan("u1", &window(1), fields());
        let weekly_window = PeriodWindow::new(
            PeriodType::Weekly,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 8, 0, 0, 0).unwrap(),
            None,
        )
        .unwrap();
        let weekly = store.upsert_plan("u1", &weekly_window, fields());
        let other_user = store.upsert_plan("u2", &window(1), fields());

        assert_ne!(monthly.id, weekly.id);
        assert_ne!(monthly.id, other_user.id);
        assert_eq!(monthly.key(), PlanKey::for_window("u1", &window(1)));
        assert_eq!(store.list_plans("u1").len(), 2);
    }

    #[test]
    fn created_plan_carries_positive_goals_only() {
        let mut store = PlanStore::new();
        let plan = store.upsert_plan("u1", &window(1), fields());
        assert_eq!(
            plan.budget_goals,
            vec![BudgetGoal::new("Food", 5_000).with_id("budget:food")]
        );
        assert_eq!(plan.savings_goals.len(), 1);
        assert_eq!(store.goal_rows(plan.id, GoalKind::Budget).len(), 1);
    }

    #[test]
    fn active_pointer_requires_owned_plan() {
        let mut store = PlanStore::new();
        let plan = store.upsert_plan("u1", &window(1), fields());
        assert!(store.find_active_plan("u1").is_none());
        store.set_active_plan("u1", plan.id).unwrap();
        assert_eq!(store.find_active_plan("u1").unwrap().id, plan.id);
        assert!(matches!(
            store.set_active_plan("u2", plan.id),
            Err(CoreError::PlanNotFound(_))
        ));
    }

    #[test]
    fn writes_update_and_tombstone_rows() {
        let mut store = PlanStore::new();
        let plan = store.upsert_plan("u1", &window(1), fields());
        store.apply_goal_writes(
            plan.id,
            GoalKind::Budget,
            &[
                GoalWrite::Upsert {
                    key: "FOOD".into(),
                    goal_id: "budget:food".into(),
                    name: "Food".into(),
                    amount_minor: 7_000,
                },
                GoalWrite::Upsert {
                    key: "rent".into(),
                    goal_id: "budget:rent".into(),
                    name: "Rent".into(),
                    amount_minor: 90_000,
                },
            ],
        );
        store.apply_goal_writes(
            plan.id,
            GoalKind::Budget,
            &[GoalWrite::Delete { key: "rent".into() }],
        );
        let rows = store.goal_rows(plan.id, GoalKind::Budget);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount_minor, 7_000);
    }

    #[test]
    fn imported_duplicates_hydrate_lowest_row() {
        let mut store = PlanStore::new();
        let plan = store.upsert_plan("u1", &window(1), PlanFields::default());
        let row = |row_id: u64, amount: i64| GoalRow {
            row_id,
            plan_id: plan.id,
            kind: GoalKind::Budget,
            key: "Food".into(),
            goal_id: "budget:food".into(),
            name: "Food".into(),
            amount_minor: amount,
        };
        store.import_goal_rows([row(12, 900), row(10, 400)]);
        store.set_active_plan("u1", plan.id).unwrap();
        let active = store.find_active_plan("u1").unwrap();
        assert_eq!(active.budget_goals[0].limit_minor, 400);
        store.apply_goal_writes(
            plan.id,
            GoalKind::Budget,
            &[GoalWrite::Upsert {
                key: "food".into(),
                goal_id: "budget:food".into(),
                name: "Food".into(),
                amount_minor: 1_000,
            }],
        );
        let rows = store.goal_rows(plan.id, GoalKind::Budget);
        assert_eq!(rows.iter().find(|r| r.row_id == 10).unwrap().amount_minor, 1_000);
        assert_eq!(rows.iter().find(|r| r.row_id == 12).unwrap().amount_minor, 900);
    }

    #[test]
    fn transactions_are_filtered_by_user_and_range() {
        let mut store = PlanStore::new();
        let at = |day: u32| Utc.with_ymd_and_hms(2025, 1, day, 12, 0, 0).unwrap();
        let usd = CurrencyCode::new("USD");
        store.record_transaction("u1", Transaction::new(TransactionKind::Expense, 100, usd.clone(), at(2)));
        store.record_transaction("u1", Transaction::new(TransactionKind::Expense, 200, usd.clone(), at(20)));
        store.record_transaction("u2", Transaction::new(TransactionKind::Expense, 300, usd, at(3)));
        let found = store.transactions_between("u1", at(1), at(20));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].amount_minor, 100);
    }
}
