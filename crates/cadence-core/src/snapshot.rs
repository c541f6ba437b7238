//! Client-side plan snapshot and the boundary DTO it is parsed from.

use cadence_domain::{BudgetGoal, CurrencyCode, PeriodType, PeriodWindow, Plan, SavingsGoal};
use chrono::{DateTime, Datelike, Duration, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    calendar::{local_date, local_midnight_utc, parse_local_day, resolve_time_zone, shift_days},
    error::{CoreError, CoreResult},
    period::PeriodCalculator,
};

/// The plan state a client holds between refreshes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSnapshot {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(flatten)]
    pub window: PeriodWindow,
    pub time_zone: String,
    pub currency: CurrencyCode,
    pub total_budget_limit_minor: i64,
    #[serde(default)]
    pub budget_goals: Vec<BudgetGoal>,
    #[serde(default)]
    pub savings_goals: Vec<SavingsGoal>,
}

/// Localized labels derived from a snapshot's UTC fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodDisplay {
    pub start_local: String,
    /// Last local day inside the window.
    pub end_local: String,
    pub label: String,
}

impl PlanSnapshot {
    pub fn from_plan(plan: &Plan) -> CoreResult<Self> {
        Ok(Self {
            id: Some(plan.id),
            window: plan.window()?,
            time_zone: plan.time_zone.clone(),
            currency: plan.currency.clone(),
            total_budget_limit_minor: plan.total_budget_limit_minor,
            budget_goals: plan.budget_goals.clone(),
            savings_goals: plan.savings_goals.clone(),
        })
    }

    pub fn period_end(&self) -> DateTime<Utc> {
        self.window.period_end_utc
    }

    /// Rollover dedupe key of the held window.
    pub fn key(&self) -> String {
        self.window.dedupe_key()
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.window.has_ended(now)
    }

    pub fn zone(&self, fallback: Tz) -> Tz {
        resolve_time_zone(&self.time_zone, fallback)
    }

    /// Recomputes the display strings in the plan's own zone.
    pub fn display(&self, fallback: Tz) -> PeriodDisplay {
        let zone = self.zone(fallback);
        let start = local_date(&zone, self.window.period_start_utc);
        let last = local_date(&zone, self.window.period_end_utc - Duration::seconds(1));
        let label = match self.window.period_type {
            PeriodType::Monthly if (start.year(), start.month()) == (last.year(), last.month()) => {
                start.format("%B %Y").to_string()
            }
            _ => format!("{} - {}", start.format("%b %-d, %Y"), last.format("%b %-d, %Y")),
        };
        PeriodDisplay {
            start_local: start.format("%Y-%m-%d").to_string(),
            end_local: last.format("%Y-%m-%d").to_string(),
            label,
        }
    }
}

/// Plan payload as received from the server or a cache.
///
/// Period bounds arrive either as UTC instants or as local-day strings under
/// several historical names. Local end days are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanPayload {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub period_type: Option<String>,
    #[serde(default, rename = "periodStartUTC", alias = "periodStart", alias = "periodStartUtc")]
    pub period_start_utc: Option<String>,
    #[serde(default, alias = "startDate")]
    pub period_start_local: Option<String>,
    #[serde(default, rename = "periodEndUTC", alias = "periodEnd", alias = "periodEndUtc")]
    pub period_end_utc: Option<String>,
    #[serde(default, alias = "endDate")]
    pub period_end_local: Option<String>,
    #[serde(default, rename = "periodAnchorUTC", alias = "periodAnchor", alias = "periodAnchorUtc")]
    pub period_anchor_utc: Option<String>,
    #[serde(default, alias = "anchorDate")]
    pub period_anchor_local: Option<String>,
    #[serde(default, alias = "timezone")]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, alias = "totalBudgetLimit")]
    pub total_budget_limit_minor: Option<i64>,
    #[serde(default)]
    pub budget_goals: Vec<BudgetGoal>,
    #[serde(default)]
    pub savings_goals: Vec<SavingsGoal>,
}

/// How a local-day string maps onto an instant.
#[derive(Clone, Copy)]
enum DayEdge {
    Start,
    InclusiveEnd,
}

fn resolve_instant(
    utc: Option<&str>,
    local: Option<&str>,
    zone: &Tz,
    edge: DayEdge,
) -> CoreResult<Option<DateTime<Utc>>> {
    let raw_day = match (utc.map(str::trim), local.map(str::trim)) {
        (Some(value), _) if !value.is_empty() => {
            if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
                return Ok(Some(instant.with_timezone(&Utc)));
            }
            value
        }
        (_, Some(value)) if !value.is_empty() => value,
        _ => return Ok(None),
    };
    let day = parse_local_day(raw_day)?;
    let day = match edge {
        DayEdge::Start => day,
        DayEdge::InclusiveEnd => shift_days(day, 1)?,
    };
    Ok(Some(local_midnight_utc(zone, day)))
}

impl PlanPayload {
    pub fn from_json(raw: &str) -> CoreResult<Self> {
        serde_json::from_str(raw).map_err(|err| CoreError::Validation(err.to_string()))
    }

    /// Resolves the payload into a snapshot.
    ///
    /// A missing end is derived from the start with `calculator`.
    pub fn normalize(&self, calculator: &PeriodCalculator) -> CoreResult<PlanSnapshot> {
        let raw_type = self
            .period_type
            .as_deref()
            .ok_or_else(|| CoreError::Validation("plan payload has no period type".into()))?;
        let period_type = PeriodType::parse(raw_type)
            .ok_or_else(|| CoreError::Validation(format!("unknown period type `{raw_type}`")))?;

        let fallback = calculator.fallback_zone();
        let zone = resolve_time_zone(self.time_zone.as_deref().unwrap_or_default(), fallback);

        let anchor = resolve_instant(
            self.period_anchor_utc.as_deref(),
            self.period_anchor_local.as_deref(),
            &zone,
            DayEdge::Start,
        )?;
        let start = resolve_instant(
            self.period_start_utc.as_deref(),
            self.period_start_local.as_deref(),
            &zone,
            DayEdge::Start,
        )?
        .ok_or_else(|| CoreError::Validation("plan payload has no period start".into()))?;
        let end = resolve_instant(
            self.period_end_utc.as_deref(),
            self.period_end_local.as_deref(),
            &zone,
            DayEdge::InclusiveEnd,
        )?;

        let window = match end {
            Some(end) => PeriodWindow::new(period_type, start, end, anchor)?,
            None => calculator.compute_window(period_type, zone.name(), start, anchor)?,
        };

        Ok(PlanSnapshot {
            id: self.id,
            window,
            time_zone: zone.name().to_string(),
            currency: self
                .currency
                .as_deref()
                .map(CurrencyCode::new)
                .unwrap_or_default(),
            total_budget_limit_minor: self.total_budget_limit_minor.unwrap_or_default(),
            budget_goals: self.budget_goals.clone(),
            savings_goals: self.savings_goals.clone(),
        })
    }
}
