//! Persistence seams used by the rollover, goal and aggregation services.

use cadence_domain::{Plan, PlanFields, PeriodWindow, Transaction};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::CoreResult,
    goals::{GoalKind, GoalRow, GoalWrite},
};

/// Storage of plans and the per-user active pointer.
pub trait PlanRepository: Send + Sync {
    fn find_active_plan(&self, user_id: &str) -> CoreResult<Option<Plan>>;

    /// Upsert keyed by (user, period type, period start).
    ///
    /// A new plan takes all of `fields`, goals included. An existing plan
    /// keeps its window, zone and goals; only currency and total limit are
    /// updated.
    fn upsert_plan(&self, user_id: &str, window: &PeriodWindow, fields: PlanFields)
        -> CoreResult<Plan>;

    fn set_active_plan(&self, user_id: &str, plan_id: Uuid) -> CoreResult<()>;

    /// All plans of a user, oldest period first.
    fn list_plans(&self, user_id: &str) -> CoreResult<Vec<Plan>>;
}

/// Row-level storage of plan goals.
pub trait GoalRepository: Send + Sync {
    fn goal_rows(&self, plan_id: Uuid, kind: GoalKind) -> CoreResult<Vec<GoalRow>>;

    fn apply_goal_writes(&self, plan_id: Uuid, kind: GoalKind, writes: &[GoalWrite])
        -> CoreResult<()>;

    fn delete_goal_rows(&self, row_ids: &[u64]) -> CoreResult<()>;

    fn budget_goal_rows(&self, plan_id: Uuid) -> CoreResult<Vec<GoalRow>> {
        self.goal_rows(plan_id, GoalKind::Budget)
    }

    fn savings_goal_rows(&self, plan_id: Uuid) -> CoreResult<Vec<GoalRow>> {
        self.goal_rows(plan_id, GoalKind::Savings)
    }

    fn apply_budget_goal_writes(&self, plan_id: Uuid, writes: &[GoalWrite]) -> CoreResult<()> {
        self.apply_goal_writes(plan_id, GoalKind::Budget, writes)
    }

    fn apply_savings_goal_writes(&self, plan_id: Uuid, writes: &[GoalWrite]) -> CoreResult<()> {
        self.apply_goal_writes(plan_id, GoalKind::Savings, writes)
    }
}

/// Read access to a user's transactions.
pub trait TransactionQuery: Send + Sync {
    /// Transactions with `start <= occurred_at < end`.
    fn transactions_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CoreResult<Vec<Transaction>>;
}
