//! Currency-aware evaluation of what a plan window contained.

use std::collections::{HashMap, HashSet};

use cadence_domain::{
    format_minor, BudgetTotals, CategoryProgress, CurrencyCode, PeriodSummary, Plan,
    SavingsProgress, Transaction, TransactionKind,
};
use tracing::debug;

use crate::{error::CoreResult, goals::canonical_key, repository::TransactionQuery};

const UNCATEGORIZED: &str = "Uncategorized";

/// Converts a transaction amount into the plan currency.
///
/// Same-currency amounts pass through. Otherwise the transaction's fixed rate
/// is applied across the two currencies' minor units, rounding half away
/// from zero. `None` means no usable rate.
pub fn convert_to_plan(txn: &Transaction, plan_currency: &CurrencyCode) -> Option<i64> {
    if txn.currency == *plan_currency {
        return Some(txn.amount_minor);
    }
    let rate = txn.fx_rate_to_plan.filter(|rate| rate.is_finite() && *rate > 0.0)?;
    let exponent = i32::from(plan_currency.minor_units()) - i32::from(txn.currency.minor_units());
    let converted = (txn.amount_minor as f64 * rate * 10f64.powi(exponent)).round();
    (converted.is_finite() && converted.abs() < i64::MAX as f64).then_some(converted as i64)
}

#[derive(Default)]
struct Bucket {
    display: String,
    spent: i64,
    incomplete: bool,
}

/// Totals for `plan`'s window over `transactions`.
///
/// Transactions outside `[start, end)` are ignored. Ones that cannot be
/// converted are left out of every total and listed as disclosures.
pub fn summarize_period(plan: &Plan, transactions: &[Transaction]) -> CoreResult<PeriodSummary> {
    let window = plan.window()?;
    let currency = &plan.currency;

    let mut income_minor = 0_i64;
    let mut expense_minor = 0_i64;
    let mut savings_minor = 0_i64;
    let mut unconverted = 0_usize;
    let mut disclosures = Vec::new();
    let mut categories: HashMap<String, Bucket> = HashMap::new();
    let mut category_order = Vec::new();
    let mut saved: HashMap<String, i64> = HashMap::new();

    for txn in transactions.iter().filter(|txn| window.contains(txn.occurred_at)) {
        let converted = convert_to_plan(txn, currency);
        if converted.is_none() {
            unconverted += 1;
            disclosures.push(format!(
                "{} of {} on {} has no {} rate and is excluded from totals",
                txn.kind,
                format_minor(txn.amount_minor, &txn.currency),
                txn.occurred_at.format("%Y-%m-%d"),
                currency.as_str()
            ));
        }

        match txn.kind {
            TransactionKind::Income => {
                income_minor = income_minor.saturating_add(converted.unwrap_or_default());
            }
            TransactionKind::Savings => {
                let amount = converted.unwrap_or_default();
                savings_minor = savings_minor.saturating_add(amount);
                if let Some(goal) = txn.savings_goal.as_deref() {
                    let total = saved.entry(canonical_key(goal)).or_default();
                    *total = total.saturating_add(amount);
                }
            }
            TransactionKind::Expense => {
                expense_minor = expense_minor.saturating_add(converted.unwrap_or_default());
                let display = txn
                    .category
                    .as_deref()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .unwrap_or(UNCATEGORIZED);
                let key = canonical_key(display);
                let bucket = categories.entry(key.clone()).or_insert_with(|| {
                    category_order.push(key);
                    Bucket {
                        display: display.to_string(),
                        ..Bucket::default()
                    }
                });
                match converted {
                    Some(amount) => bucket.spent = bucket.spent.saturating_add(amount),
                    None => bucket.incomplete = true,
                }
            }
        }
    }

    let mut per_category = Vec::new();
    let mut covered = HashSet::new();
    for goal in &plan.budget_goals {
        let key = canonical_key(&goal.category);
        if !covered.insert(key.clone()) {
            continue;
        }
        let (spent, incomplete) = categories
            .get(&key)
            .map_or((0, false), |bucket| (bucket.spent, bucket.incomplete));
        per_category.push(CategoryProgress {
            category: goal.category.clone(),
            goal_id: Some(goal.id.clone()).filter(|id| !id.is_empty()),
            totals: BudgetTotals::from_parts(goal.limit_minor, spent, incomplete),
        });
    }
    for key in category_order {
        if covered.contains(&key) {
            continue;
        }
        if let Some(bucket) = categories.get(&key) {
            per_category.push(CategoryProgress {
                category: bucket.display.clone(),
                goal_id: None,
                totals: BudgetTotals::from_parts(0, bucket.spent, bucket.incomplete),
            });
        }
    }

    let per_savings_goal = plan
        .savings_goals
        .iter()
        .map(|goal| {
            SavingsProgress::new(
                goal.name.clone(),
                Some(goal.id.clone()).filter(|id| !id.is_empty()),
                goal.target_minor,
                saved.get(&canonical_key(&goal.name)).copied().unwrap_or_default(),
            )
        })
        .collect();

    if unconverted > 0 {
        debug!(plan_id = %plan.id, unconverted, "period summary is incomplete");
    }

    Ok(PeriodSummary {
        window,
        currency: currency.clone(),
        income_minor,
        expense_minor,
        savings_minor,
        totals: BudgetTotals::from_parts(plan.total_budget_limit_minor, expense_minor, unconverted > 0),
        per_category,
        per_savings_goal,
        unconverted_transactions: unconverted,
        disclosures,
    })
}

/// Loads the plan window's transactions and summarizes them.
pub fn summarize_plan(query: &dyn TransactionQuery, plan: &Plan) -> CoreResult<PeriodSummary> {
    let transactions = query.transactions_between(&plan.user_id, plan.period_start, plan.period_end)?;
    summarize_period(plan, &transactions)
}

#[cfg(test)]
mod tests {
    use cadence_domain::{BudgetGoal, BudgetStatus, PeriodType, PeriodWindow, PlanFields, SavingsGoal};
    use chrono::{TimeZone, Utc};

    use super::*;

    fn plan() -> Plan {
        let window = PeriodWindow::new(
            PeriodType::Monthly,
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
            None,
        )
        .unwrap();
        Plan::new(
            "u1",
            window,
            PlanFields {
                time_zone: "UTC".into(),
                currency: CurrencyCode::new("USD"),
                total_budget_limit_minor: 50_000,
                budget_goals: vec![BudgetGoal::new("Food", 10_000).with_id("budget:food")],
                savings_goals: vec![SavingsGoal::new("Trip", 20_000).with_id("savings:trip")],
            },
        )
    }

    fn txn(kind: TransactionKind, amount: i64, code: &str, day: u32) -> Transaction {
        Transaction::new(
            kind,
            amount,
            CurrencyCode::new(code),
            Utc.with_ymd_and_hms(2025, 1, day, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn converts_across_minor_units_with_half_away_rounding() {
        let usd = CurrencyCode::new("USD");
        let yen = txn(TransactionKind::Expense, 1_000, "JPY", 2).with_fx_rate(0.00645);
        assert_eq!(convert_to_plan(&yen, &usd), Some(645));
        let eur = txn(TransactionKind::Expense, 1_005, "EUR", 2).with_fx_rate(0.5);
        assert_eq!(convert_to_plan(&eur, &usd), Some(503));
        let refund = txn(TransactionKind::Expense, -1_005, "EUR", 2).with_fx_rate(0.5);
        assert_eq!(convert_to_plan(&refund, &usd), Some(-503));
        let missing = txn(TransactionKind::Expense, 100, "EUR", 2);
        assert_eq!(convert_to_plan(&missing, &usd), None);
    }

    #[test]
    fn summarizes_window_only() {
        let plan = plan();
        let mut outside = txn(TransactionKind::Expense, 99_999, "USD", 1);
        outside.occurred_at = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let transactions = vec![
            txn(TransactionKind::Income, 300_000, "USD", 1),
            txn(TransactionKind::Expense, 4_000, "USD", 3).with_category(" food"),
            txn(TransactionKind::Expense, 2_000, "USD", 4).with_category("Games"),
            txn(TransactionKind::Savings, 5_000, "USD", 5).with_savings_goal("trip"),
            outside,
        ];
        let summary = summarize_period(&plan, &transactions).unwrap();
        assert_eq!(summary.income_minor, 300_000);
        assert_eq!(summary.expense_minor, 6_000);
        assert_eq!(summary.savings_minor, 5_000);
        assert_eq!(summary.totals.remaining, 44_000);
        assert_eq!(summary.totals.status, BudgetStatus::UnderBudget);

        assert_eq!(summary.per_category.len(), 2);
        assert_eq!(summary.per_category[0].category, "Food");
        assert_eq!(summary.per_category[0].totals.real, 4_000);
        assert_eq!(summary.per_category[1].category, "Games");
        assert_eq!(summary.per_category[1].totals.status, BudgetStatus::OverBudget);

        assert_eq!(summary.per_savings_goal[0].saved_minor, 5_000);
        assert_eq!(summary.per_savings_goal[0].percent_complete, Some(25));
        assert!(!summary.is_incomplete());
    }

    #[test]
    fn missing_rate_marks_summary_incomplete() {
        let plan = plan();
        let transactions = vec![
            txn(TransactionKind::Expense, 1_000, "USD", 2).with_category("Food"),
            txn(TransactionKind::Expense, 700, "GBP", 3).with_category("Food"),
        ];
        let summary = summarize_period(&plan, &transactions).unwrap();
        assert_eq!(summary.expense_minor, 1_000);
        assert_eq!(summary.unconverted_transactions, 1);
        assert_eq!(summary.disclosures.len(), 1);
        assert!(summary.disclosures[0].contains("USD"));
        assert_eq!(summary.totals.status, BudgetStatus::Incomplete);
        assert_eq!(summary.per_category[0].totals.status, BudgetStatus::Incomplete);
    }

    #[test]
    fn huge_amounts_saturate_instead_of_overflowing() {
        let plan = plan();
        let big = i64::MAX / 2 + 10;
        let transactions = vec![
            txn(TransactionKind::Income, big, "USD", 2),
            txn(TransactionKind::Income, big, "USD", 3),
            txn(TransactionKind::Expense, big, "USD", 4).with_category("Food"),
            txn(TransactionKind::Expense, big, "USD", 5).with_category("Food"),
            txn(TransactionKind::Savings, big, "USD", 6).with_savings_goal("Trip"),
            txn(TransactionKind::Savings, big, "USD", 7).with_savings_goal("Trip"),
        ];
        let summary = summarize_period(&plan, &transactions).unwrap();
        assert_eq!(summary.income_minor, i64::MAX);
        assert_eq!(summary.expense_minor, i64::MAX);
        assert_eq!(summary.savings_minor, i64::MAX);
        assert_eq!(summary.per_category[0].totals.real, i64::MAX);
        assert_eq!(summary.per_savings_goal[0].saved_minor, i64::MAX);
        assert_eq!(summary.totals.status, BudgetStatus::OverBudget);
    }
}
