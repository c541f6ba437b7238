use std::sync::Arc;

use cadence_domain::{CurrencyCode, PeriodType, Plan, PlanFields};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::{
    error::CoreResult, period::PeriodCalculator, repository::PlanRepository,
    settings::EngineSettings,
};

use super::RolloverResponse;

/// Moves a user's active plan into the period containing `now`.
pub struct RolloverService<R> {
    repo: Arc<R>,
    calculator: PeriodCalculator,
}

impl<R: PlanRepository> RolloverService<R> {
    pub fn new(repo: Arc<R>, calculator: PeriodCalculator) -> Self {
        Self { repo, calculator }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Rolls the active plan forward once it has ended.
    ///
    /// The next window is computed in the plan's stored zone and, for
    /// biweekly plans, from the plan's own anchor. Calling this again after
    /// a roll is a no-op because the new plan has not ended.
    pub fn attempt_rollover(&self, user_id: &str, now: DateTime<Utc>) -> CoreResult<RolloverResponse> {
        let Some(plan) = self.repo.find_active_plan(user_id)? else {
            debug!(user_id, "no active plan to roll");
            return Ok(RolloverResponse { rolled: false });
        };
        if !plan.has_ended(now) {
            return Ok(RolloverResponse { rolled: false });
        }

        let window = self.calculator.compute_window(
            plan.period_type,
            &plan.time_zone,
            now,
            plan.period_anchor,
        )?;
        if window.period_start_utc <= plan.period_start {
            warn!(
                user_id,
                plan_id = %plan.id,
                next_start = %window.period_start_utc,
                "computed window does not advance past the active plan"
            );
            return Ok(RolloverResponse { rolled: false });
        }

        let next = self
            .repo
            .upsert_plan(user_id, &window, PlanFields::carried_from(&plan))?;
        self.repo.set_active_plan(user_id, next.id)?;
        info!(
            user_id,
            from = %plan.period_start,
            to = %next.period_start,
            period = %plan.period_type,
            "plan rolled over"
        );
        Ok(RolloverResponse { rolled: true })
    }
}

/// Parameters for creating or switching the active plan.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub period_type: PeriodType,
    pub time_zone: String,
    pub anchor: Option<DateTime<Utc>>,
    pub currency: Option<CurrencyCode>,
    pub total_budget_limit_minor: Option<i64>,
}

impl PlanRequest {
    pub fn new(period_type: PeriodType, time_zone: impl Into<String>) -> Self {
        Self {
            period_type,
            time_zone: time_zone.into(),
            anchor: None,
            currency: None,
            total_budget_limit_minor: None,
        }
    }

    pub fn with_anchor(mut self, anchor: DateTime<Utc>) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn with_currency(mut self, currency: CurrencyCode) -> Self {
        self.currency = Some(currency);
        self
    }

    pub fn with_total_budget_limit(mut self, limit_minor: i64) -> Self {
        self.total_budget_limit_minor = Some(limit_minor);
        self
    }
}

/// First-use and explicit period/currency switch path.
pub struct PlanService<R> {
    repo: Arc<R>,
    calculator: PeriodCalculator,
    default_currency: CurrencyCode,
}

impl<R: PlanRepository> PlanService<R> {
    pub fn new(repo: Arc<R>, calculator: PeriodCalculator) -> Self {
        Self {
            repo,
            calculator,
            default_currency: CurrencyCode::default(),
        }
    }

    /// Calculator and first-plan currency both taken from `settings`.
    pub fn from_settings(repo: Arc<R>, settings: &EngineSettings) -> Self {
        Self::new(repo, PeriodCalculator::new(settings))
            .with_default_currency(settings.default_currency.clone())
    }

    /// Currency for a user's first plan when the request names none.
    pub fn with_default_currency(mut self, currency: CurrencyCode) -> Self {
        self.default_currency = currency;
        self
    }

    /// Returns the active plan when it already matches `request` at `now`,
    /// otherwise gets or creates the matching plan and makes it active.
    ///
    /// Attributes not named in the request carry over from the current
    /// active plan, or start from the service defaults on first use.
    pub fn ensure_active_plan(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        request: &PlanRequest,
    ) -> CoreResult<Plan> {
        let active = self.repo.find_active_plan(user_id)?;
        if let Some(plan) = &active {
            let same_type = plan.period_type == request.period_type;
            let same_currency = request
                .currency
                .as_ref()
                .map_or(true, |currency| *currency == plan.currency);
            if same_type && same_currency && plan.window()?.contains(now) {
                return Ok(plan.clone());
            }
        }

        let anchor = request.anchor.or_else(|| {
            active
                .as_ref()
                .filter(|plan| plan.period_type == request.period_type)
                .and_then(|plan| plan.period_anchor)
        });
        let window =
            self.calculator
                .compute_window(request.period_type, &request.time_zone, now, anchor)?;

        let mut fields = match &active {
            Some(plan) => PlanFields::carried_from(plan),
            None => PlanFields {
                currency: self.default_currency.clone(),
                ..PlanFields::default()
            },
        };
        fields.time_zone = request.time_zone.trim().to_string();
        if let Some(currency) = &request.currency {
            fields.currency = currency.clone();
        }
        if let Some(limit) = request.total_budget_limit_minor {
            fields.total_budget_limit_minor = limit;
        }

        let plan = self.repo.upsert_plan(user_id, &window, fields)?;
        self.repo.set_active_plan(user_id, plan.id)?;
        info!(
            user_id,
            plan_id = %plan.id,
            period = %plan.period_type,
            start = %plan.period_start,
            "active plan ensured"
        );
        Ok(plan)
    }
}
