use std::{fs, sync::Arc};

use cadence_core::{
    GoalKind, GoalRepository, GoalService, PeriodCalculator, PlanRepository, PlanRequest,
    PlanService, RolloverService, TransactionQuery,
};
use cadence_domain::{
    BudgetGoal, CurrencyCode, PeriodType, PeriodWindow, PlanFields, Transaction, TransactionKind,
};
use cadence_storage_json::{load_store_from_path, JsonPlanStorage};
use chrono::{TimeZone, Utc};
use tempfile::tempdir;

fn january() -> PeriodWindow {
    PeriodWindow::new(
        PeriodType::Monthly,
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
        None,
    )
    .expect("window")
}

fn fields() -> PlanFields {
    PlanFields {
        time_zone: "UTC".into(),
        currency: CurrencyCode::new("USD"),
        total_budget_limit_minor: 80_000,
        budget_goals: vec![BudgetGoal::new("Food", 20_000)],
        savings_goals: Vec::new(),
    }
}

#[test]
fn upsert_and_active_pointer_survive_reopen() {
    let dir = tempdir().expect("tempdir");
    let storage = JsonPlanStorage::in_dir(dir.path()).expect("open storage");

    let plan = storage.upsert_plan("u1", &january(), fields()).expect("upsert");
    storage.set_active_plan("u1", plan.id).expect("activate");
    assert!(storage.path().exists());

    let reopened = JsonPlanStorage::in_dir(dir.path()).expect("reopen storage");
    let active = reopened
        .find_active_plan("u1")
        .expect("query")
        .expect("active plan");
    assert_eq!(active.id, plan.id);
    assert_eq!(active.period_start, january().period_start_utc);
    assert_eq!(active.total_budget_limit_minor, 80_000);
    assert_eq!(active.budget_goals.len(), 1);
    assert_eq!(active.budget_goals[0].id, "budget:food");
}

#[test]
fn second_upsert_for_same_period_reuses_plan() {
    let dir = tempdir().expect("tempdir");
    let storage = JsonPlanStorage::in_dir(dir.path()).expect("open storage");

    let first = storage.upsert_plan("u1", &january(), fields()).expect("upsert");
    let second = storage.upsert_plan("u1", &january(), fields()).expect("upsert");

    assert_eq!(first.id, second.id);
    let on_disk = load_store_from_path(storage.path()).expect("load file");
    assert_eq!(on_disk.list_plans("u1").len(), 1);
}

#[test]
fn failed_mutation_leaves_file_untouched() {
    let dir = tempdir().expect("tempdir");
    let storage = JsonPlanStorage::in_dir(dir.path()).expect("open storage");
    storage.upsert_plan("u1", &january(), fields()).expect("upsert");
    let before = fs::read_to_string(storage.path()).expect("read file");

    let missing = uuid::Uuid::new_v4();
    assert!(storage.set_active_plan("u1", missing).is_err());

    assert_eq!(fs::read_to_string(storage.path()).expect("read file"), before);
    assert!(storage.find_active_plan("u1").expect("query").is_none());
}

#[test]
fn goal_service_persists_rows() {
    let dir = tempdir().expect("tempdir");
    let storage = JsonPlanStorage::in_dir(dir.path()).expect("open storage");
    let plan = storage.upsert_plan("u1", &january(), fields()).expect("upsert");

    GoalService::save_budget_goals(
        &storage,
        plan.id,
        &[BudgetGoal::new("Food", 0), BudgetGoal::new("Rent", 150_000)],
    )
    .expect("save goals");

    storage.reload().expect("reload");
    let rows = storage.goal_rows(plan.id, GoalKind::Budget).expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Rent");
}

#[test]
fn rollover_writes_next_plan_to_disk() {
    let dir = tempdir().expect("tempdir");
    let storage = Arc::new(JsonPlanStorage::in_dir(dir.path()).expect("open storage"));
    let now = Utc.with_ymd_and_hms(2025, 1, 10, 12, 0, 0).unwrap();
    PlanService::new(storage.clone(), PeriodCalculator::default())
        .ensure_active_plan("u1", now, &PlanRequest::new(PeriodType::Weekly, "Europe/Berlin"))
        .expect("ensure plan");

    let later = Utc.with_ymd_and_hms(2025, 1, 14, 12, 0, 0).unwrap();
    let response = RolloverService::new(storage.clone(), PeriodCalculator::default())
        .attempt_rollover("u1", later)
        .expect("rollover");
    assert!(response.rolled);

    let reopened = JsonPlanStorage::in_dir(dir.path()).expect("reopen storage");
    let plans = reopened.list_plans("u1").expect("list");
    assert_eq!(plans.len(), 2);
    // Monday 2025-01-13 00:00 in Berlin.
    assert_eq!(
        plans[1].period_start,
        Utc.with_ymd_and_hms(2025, 1, 12, 23, 0, 0).unwrap()
    );
    assert_eq!(
        reopened.find_active_plan("u1").expect("query").expect("active").id,
        plans[1].id
    );
}

#[test]
fn transactions_are_queried_by_range() {
    let dir = tempdir().expect("tempdir");
    let storage = JsonPlanStorage::in_dir(dir.path()).expect("open storage");
    let usd = CurrencyCode::new("USD");
    for day in [2, 15, 31] {
        let txn = Transaction::new(
            TransactionKind::Expense,
            1_000,
            usd.clone(),
            Utc.with_ymd_and_hms(2025, 1, day, 9, 0, 0).unwrap(),
        );
        storage.record_transaction("u1", txn).expect("record");
    }

    let found = storage
        .transactions_between(
            "u1",
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap(),
        )
        .expect("query");
    assert_eq!(found.len(), 2);
}

#[test]
fn corrupt_file_is_a_storage_error() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("plans.json"), "{ not json").expect("write");
    let result = JsonPlanStorage::in_dir(dir.path());
    assert!(matches!(result, Err(cadence_core::CoreError::Storage(_))));
}

#[test]
fn configured_data_dir_holds_the_store() {
    let dir = tempdir().expect("tempdir");
    let mut config = cadence_config::Config::default();
    config.data_dir = Some(dir.path().join("data"));

    let storage = JsonPlanStorage::from_config(&config).expect("open storage");
    storage.upsert_plan("u1", &january(), fields()).expect("upsert");

    assert_eq!(storage.path(), dir.path().join("data").join("plans.json"));
    assert!(storage.path().exists());
}
