//! Period boundary calculation for weekly, biweekly and monthly plans.

use std::collections::BTreeSet;

use cadence_domain::{PeriodType, PeriodWindow};
use chrono::{DateTime, Duration, Utc, Weekday};
use chrono_tz::Tz;
use tracing::{debug, warn};

use crate::{
    calendar::{
        day_number, first_of_month, first_of_next_month, local_date, local_midnight_utc,
        resolve_time_zone, shift_days, week_start_on_or_before, YearBounds,
    },
    error::{CoreError, CoreResult},
    settings::EngineSettings,
};

/// Computes the `[start, end)` window a plan covers at a given instant.
#[derive(Debug, Clone)]
pub struct PeriodCalculator {
    week_start: Weekday,
    fallback_zone: Tz,
    year_bounds: YearBounds,
    max_window_list: usize,
}

impl Default for PeriodCalculator {
    fn default() -> Self {
        Self::new(&EngineSettings::default())
    }
}

impl PeriodCalculator {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            week_start: settings.week_start,
            fallback_zone: settings.fallback_zone,
            year_bounds: settings.year_bounds,
            max_window_list: settings.max_window_list,
        }
    }

    pub fn week_start(&self) -> Weekday {
        self.week_start
    }

    pub fn fallback_zone(&self) -> Tz {
        self.fallback_zone
    }

    /// Returns the window of `period_type` containing `now` in `time_zone`.
    ///
    /// Biweekly windows need `anchor`. A window whose bounds leave the
    /// configured year range is recomputed in UTC; if that also fails the
    /// error is returned rather than a corrupt boundary.
    pub fn compute_window(
        &self,
        period_type: PeriodType,
        time_zone: &str,
        now: DateTime<Utc>,
        anchor: Option<DateTime<Utc>>,
    ) -> CoreResult<PeriodWindow> {
        if period_type.requires_anchor() && anchor.is_none() {
            return Err(CoreError::MissingAnchor);
        }
        if let Some(anchor) = anchor.filter(|_| period_type.requires_anchor()) {
            if !self.year_bounds.contains(anchor) {
                return Err(CoreError::Validation(format!(
                    "period anchor {anchor} is outside years {}..={}",
                    self.year_bounds.min_year, self.year_bounds.max_year
                )));
            }
        }
        self.year_bounds.check(now)?;
        let zone = resolve_time_zone(time_zone, self.fallback_zone);
        match self
            .window_in_zone(period_type, &zone, now, anchor)
            .and_then(|window| self.validate(window))
        {
            Ok(window) => Ok(window),
            Err(err) => {
                warn!(
                    %err,
                    zone = %zone.name(),
                    period = %period_type,
                    "period window rejected; recomputing in UTC"
                );
                let window = self.window_in_zone(period_type, &chrono_tz::UTC, now, anchor)?;
                self.validate(window)
            }
        }
    }

    /// Walks back from the window containing `starting_at`, newest first.
    pub fn list_windows(
        &self,
        period_type: PeriodType,
        time_zone: &str,
        starting_at: DateTime<Utc>,
        count: usize,
        anchor: Option<DateTime<Utc>>,
    ) -> CoreResult<Vec<PeriodWindow>> {
        self.walk(period_type, time_zone, starting_at, count, anchor, |window| {
            window.period_start_utc - Duration::seconds(1)
        })
    }

    /// Walks forward from the window containing `starting_at`, oldest first.
    pub fn upcoming_windows(
        &self,
        period_type: PeriodType,
        time_zone: &str,
        starting_at: DateTime<Utc>,
        count: usize,
        anchor: Option<DateTime<Utc>>,
    ) -> CoreResult<Vec<PeriodWindow>> {
        self.walk(period_type, time_zone, starting_at, count, anchor, |window| {
            window.period_end_utc
        })
    }

    fn walk(
        &self,
        period_type: PeriodType,
        time_zone: &str,
        starting_at: DateTime<Utc>,
        count: usize,
        anchor: Option<DateTime<Utc>>,
        step: impl Fn(&PeriodWindow) -> DateTime<Utc>,
    ) -> CoreResult<Vec<PeriodWindow>> {
        let count = count.min(self.max_window_list);
        let mut seen = BTreeSet::new();
        let mut windows = Vec::with_capacity(count);
        let mut cursor = starting_at;
        while windows.len() < count && self.year_bounds.contains(cursor) {
            let window = self.compute_window(period_type, time_zone, cursor, anchor)?;
            if !seen.insert(window.period_start_utc) {
                debug!(start = %window.period_start_utc, "window walk stopped on repeat");
                break;
            }
            cursor = step(&window);
            windows.push(window);
        }
        Ok(windows)
    }

    fn window_in_zone(
        &self,
        period_type: PeriodType,
        zone: &Tz,
        now: DateTime<Utc>,
        anchor: Option<DateTime<Utc>>,
    ) -> CoreResult<PeriodWindow> {
        let today = local_date(zone, now);
        let (start, end, anchor_day) = match period_type {
            PeriodType::Weekly => {
                let start = week_start_on_or_before(today, self.week_start)?;
                (start, shift_days(start, 7)?, None)
            }
            PeriodType::Monthly => (first_of_month(today)?, first_of_next_month(today)?, None),
            PeriodType::Biweekly => {
                let anchor = anchor.ok_or(CoreError::MissingAnchor)?;
                let anchor_week =
                    week_start_on_or_before(local_date(zone, anchor), self.week_start)?;
                let current_week = week_start_on_or_before(today, self.week_start)?;
                let weeks = (day_number(current_week) - day_number(anchor_week)).div_euclid(7);
                let start = if weeks.rem_euclid(2) == 0 {
                    current_week
                } else {
                    shift_days(current_week, -7)?
                };
                (start, shift_days(start, 14)?, Some(anchor_week))
            }
        };
        let window = PeriodWindow::new(
            period_type,
            local_midnight_utc(zone, start),
            local_midnight_utc(zone, end),
            anchor_day.map(|day| local_midnight_utc(zone, day)),
        )?;
        Ok(window)
    }

    fn validate(&self, window: PeriodWindow) -> CoreResult<PeriodWindow> {
        self.year_bounds.check(window.period_start_utc)?;
        self.year_bounds.check(window.period_end_utc)?;
        if let Some(anchor) = window.period_anchor_utc {
            self.year_bounds.check(anchor)?;
        }
        Ok(window)
    }
}
