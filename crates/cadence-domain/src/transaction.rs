//! Ledger transactions evaluated against a plan window.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::CurrencyCode;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub kind: TransactionKind,
    pub amount_minor: i64,
    pub currency: CurrencyCode,
    /// Fixed rate into the plan currency captured when the transaction was booked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fx_rate_to_plan: Option<f64>,
    pub occurred_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub savings_goal: Option<String>,
}

impl Transaction {
    pub fn new(
        kind: TransactionKind,
        amount_minor: i64,
        currency: CurrencyCode,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            amount_minor,
            currency,
            fx_rate_to_plan: None,
            occurred_at,
            category: None,
            savings_goal: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_savings_goal(mut self, goal: impl Into<String>) -> Self {
        self.savings_goal = Some(goal.into());
        self
    }

    pub fn with_fx_rate(mut self, rate: f64) -> Self {
        self.fx_rate_to_plan = Some(rate);
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Income,
    Expense,
    Savings,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TransactionKind::Income => "Income",
            TransactionKind::Expense => "Expense",
            TransactionKind::Savings => "Savings",
        };
        f.write_str(label)
    }
}
