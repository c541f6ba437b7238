//! Aggregated period results and status helpers.

use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};

use crate::{currency::CurrencyCode, window::PeriodWindow};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Aggregated totals for a single budgeting bucket, in minor units.
pub struct BudgetTotals {
    pub budgeted: i64,
    pub real: i64,
    pub remaining: i64,
    pub percent_used: Option<u32>,
    pub status: BudgetStatus,
}

impl BudgetTotals {
    pub fn from_parts(budgeted: i64, real: i64, incomplete: bool) -> Self {
        let remaining = budgeted.saturating_sub(real);
        let percent_used = if budgeted > 0 {
            Some(percent(real, budgeted))
        } else if real > 0 {
            Some(100)
        } else {
            None
        };
        let status = if incomplete {
            BudgetStatus::Incomplete
        } else if budgeted == 0 && real == 0 {
            BudgetStatus::Empty
        } else {
            match real.cmp(&budgeted) {
                Ordering::Greater => BudgetStatus::OverBudget,
                Ordering::Less => BudgetStatus::UnderBudget,
                Ordering::Equal => BudgetStatus::OnTrack,
            }
        };
        Self {
            budgeted,
            real,
            remaining,
            percent_used,
            status,
        }
    }
}

/// `part` as a whole percentage of a positive `whole`, clamped to `u32`.
fn percent(part: i64, whole: i64) -> u32 {
    let ratio = i128::from(part.max(0)) * 100 / i128::from(whole);
    u32::try_from(ratio).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
/// Describes whether spending is aligned with the plan.
pub enum BudgetStatus {
    OnTrack,
    OverBudget,
    UnderBudget,
    Empty,
    Incomplete,
}

impl fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BudgetStatus::OnTrack => "On Track",
            BudgetStatus::OverBudget => "Over Budget",
            BudgetStatus::UnderBudget => "Under Budget",
            BudgetStatus::Empty => "Empty",
            BudgetStatus::Incomplete => "Incomplete",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Spend for one category compared against its budget goal.
pub struct CategoryProgress {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<String>,
    pub totals: BudgetTotals,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
/// Contributions toward one savings goal.
pub struct SavingsProgress {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<String>,
    pub target_minor: i64,
    pub saved_minor: i64,
    pub percent_complete: Option<u32>,
}

impl SavingsProgress {
    pub fn new(name: String, goal_id: Option<String>, target_minor: i64, saved_minor: i64) -> Self {
        let percent_complete = if target_minor > 0 {
            Some(percent(saved_minor, target_minor))
        } else {
            None
        };
        Self {
            name,
            goal_id,
            target_minor,
            saved_minor,
            percent_complete,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Complete evaluation of what a period window contained.
pub struct PeriodSummary {
    pub window: PeriodWindow,
    pub currency: CurrencyCode,
    pub income_minor: i64,
    pub expense_minor: i64,
    pub savings_minor: i64,
    pub totals: BudgetTotals,
    pub per_category: Vec<CategoryProgress>,
    pub per_savings_goal: Vec<SavingsProgress>,
    pub unconverted_transactions: usize,
    #[serde(default)]
    pub disclosures: Vec<String>,
}

impl PeriodSummary {
    pub fn is_incomplete(&self) -> bool {
        self.unconverted_transactions > 0
    }
}
