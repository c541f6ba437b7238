//! Budget plans and the goals attached to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    common::*,
    currency::CurrencyCode,
    window::{PeriodWindow, PeriodWindowError},
};

/// Opaque identifier of the user owning a plan.
pub type UserId = String;

/// One budget cycle for a user, unique per (user, period type, period start).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: Uuid,
    pub user_id: UserId,
    pub period_type: PeriodType,
    #[serde(rename = "periodStartUTC")]
    pub period_start: DateTime<Utc>,
    #[serde(rename = "periodEndUTC")]
    pub period_end: DateTime<Utc>,
    #[serde(rename = "periodAnchorUTC", default)]
    pub period_anchor: Option<DateTime<Utc>>,
    /// Zone the boundaries were computed in; never re-derived from the device.
    pub time_zone: String,
    pub currency: CurrencyCode,
    pub total_budget_limit_minor: i64,
    #[serde(default)]
    pub budget_goals: Vec<BudgetGoal>,
    #[serde(default)]
    pub savings_goals: Vec<SavingsGoal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    pub fn new(user_id: impl Into<UserId>, window: PeriodWindow, fields: PlanFields) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            period_type: window.period_type,
            period_start: window.period_start_utc,
            period_end: window.period_end_utc,
            period_anchor: window.period_anchor_utc,
            time_zone: fields.time_zone,
            currency: fields.currency,
            total_budget_limit_minor: fields.total_budget_limit_minor,
            budget_goals: fields.budget_goals,
            savings_goals: fields.savings_goals,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds the window this plan covers.
    pub fn window(&self) -> Result<PeriodWindow, PeriodWindowError> {
        PeriodWindow::new(
            self.period_type,
            self.period_start,
            self.period_end,
            self.period_anchor,
        )
    }

    pub fn key(&self) -> PlanKey {
        PlanKey {
            user_id: self.user_id.clone(),
            period_type: self.period_type,
            period_start: self.period_start,
        }
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.period_end
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// The unique triple a plan is upserted by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanKey {
    pub user_id: UserId,
    pub period_type: PeriodType,
    pub period_start: DateTime<Utc>,
}

impl PlanKey {
    pub fn for_window(user_id: &str, window: &PeriodWindow) -> Self {
        Self {
            user_id: user_id.to_string(),
            period_type: window.period_type,
            period_start: window.period_start_utc,
        }
    }
}

/// Mutable plan attributes written by an upsert.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlanFields {
    pub time_zone: String,
    pub currency: CurrencyCode,
    pub total_budget_limit_minor: i64,
    pub budget_goals: Vec<BudgetGoal>,
    pub savings_goals: Vec<SavingsGoal>,
}

impl PlanFields {
    /// Copies the carry-over attributes of an existing plan.
    pub fn carried_from(plan: &Plan) -> Self {
        Self {
            time_zone: plan.time_zone.clone(),
            currency: plan.currency.clone(),
            total_budget_limit_minor: plan.total_budget_limit_minor,
            budget_goals: plan.budget_goals.clone(),
            savings_goals: plan.savings_goals.clone(),
        }
    }
}

/// Spending cap for one category within a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BudgetGoal {
    #[serde(default)]
    pub id: String,
    pub category: String,
    pub limit_minor: i64,
}

impl BudgetGoal {
    pub fn new(category: impl Into<String>, limit_minor: i64) -> Self {
        Self {
            id: String::new(),
            category: category.into(),
            limit_minor,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Non-positive limits mean the goal is unset.
    pub fn is_set(&self) -> bool {
        self.limit_minor > 0
    }
}

impl Identifiable for BudgetGoal {
    fn identifier(&self) -> &str {
        &self.id
    }
}

impl NamedEntity for BudgetGoal {
    fn name(&self) -> &str {
        &self.category
    }
}

impl Amounted for BudgetGoal {
    fn amount_minor(&self) -> i64 {
        self.limit_minor
    }
}

/// Savings target tracked within a plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SavingsGoal {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub target_minor: i64,
}

impl SavingsGoal {
    pub fn new(name: impl Into<String>, target_minor: i64) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            target_minor,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn is_set(&self) -> bool {
        self.target_minor > 0
    }
}

impl Identifiable for SavingsGoal {
    fn identifier(&self) -> &str {
        &self.id
    }
}

impl NamedEntity for SavingsGoal {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Amounted for SavingsGoal {
    fn amount_minor(&self) -> i64 {
        self.target_minor
    }
}

impl Displayable for Plan {
    fn display_label(&self) -> String {
        format!(
            "{} plan {} ({})",
            self.period_type,
            self.period_start.format("%Y-%m-%d"),
            self.currency.as_str()
        )
    }
}
