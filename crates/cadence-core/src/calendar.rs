//! Conversions between timezone-local calendar dates and UTC instants.
//!
//! Everything here is pure. Period boundaries are always a local midnight
//! converted to UTC, and day arithmetic happens on calendar dates so that
//! 23- and 25-hour days around DST transitions never shift a boundary.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, Months, NaiveDate, NaiveDateTime, NaiveTime,
    TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;
use tracing::warn;

use crate::error::{CoreError, CoreResult};

/// Zone used when nothing else is configured.
pub const DEFAULT_ZONE: Tz = chrono_tz::UTC;

const GAP_STEP_MINUTES: i64 = 15;
const GAP_MAX_STEPS: i64 = 16;

/// Inclusive range of calendar years a derived instant may fall in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearBounds {
    pub min_year: i32,
    pub max_year: i32,
}

impl Default for YearBounds {
    fn default() -> Self {
        Self::new(1970, 2100)
    }
}

impl YearBounds {
    pub fn new(min_year: i32, max_year: i32) -> Self {
        Self { min_year, max_year }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        (self.min_year..=self.max_year).contains(&instant.year())
    }

    pub fn check(&self, instant: DateTime<Utc>) -> CoreResult<DateTime<Utc>> {
        if self.contains(instant) {
            Ok(instant)
        } else {
            Err(CoreError::Computation(format!(
                "derived instant {instant} is outside years {}..={}",
                self.min_year, self.max_year
            )))
        }
    }
}

/// Resolves an IANA identifier, falling back to `fallback` when unknown.
pub fn resolve_time_zone(name: &str, fallback: Tz) -> Tz {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return fallback;
    }
    if trimmed.eq_ignore_ascii_case("utc") || trimmed.eq_ignore_ascii_case("z") {
        return chrono_tz::UTC;
    }
    match trimmed.parse::<Tz>() {
        Ok(zone) => zone,
        Err(_) => {
            warn!(zone = %trimmed, fallback = %fallback.name(), "unknown time zone");
            fallback
        }
    }
}

/// Calendar date `instant` falls on in `tz`.
pub fn local_date(tz: &Tz, instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}

/// UTC instant of local midnight starting `date` in `tz`.
///
/// Ambiguous midnights resolve to the earlier instant. A midnight skipped by
/// a DST gap resolves to the first local instant after the gap.
pub fn local_midnight_utc(tz: &Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(at) => at.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => first_instant_after_gap(tz, midnight),
    }
}

fn first_instant_after_gap(tz: &Tz, local: NaiveDateTime) -> DateTime<Utc> {
    for step in 1..=GAP_MAX_STEPS {
        let candidate = local + Duration::minutes(step * GAP_STEP_MINUTES);
        if let Some(at) = tz.from_local_datetime(&candidate).earliest() {
            return at.with_timezone(&Utc);
        }
    }
    Utc.from_utc_datetime(&local)
}

/// Next local midnight strictly after `instant`, in UTC.
pub fn next_local_midnight(tz: &Tz, instant: DateTime<Utc>) -> CoreResult<DateTime<Utc>> {
    let tomorrow = shift_days(local_date(tz, instant), 1)?;
    Ok(local_midnight_utc(tz, tomorrow))
}

/// Moves `date` by whole calendar days.
pub fn shift_days(date: NaiveDate, days: i64) -> CoreResult<NaiveDate> {
    date.checked_add_signed(Duration::days(days))
        .ok_or_else(|| CoreError::Computation(format!("{date} shifted by {days} days overflows")))
}

/// Day index that is stable across DST, suitable for week counting.
pub fn day_number(date: NaiveDate) -> i64 {
    i64::from(date.num_days_from_ce())
}

/// Most recent `week_start` weekday on or before `date`.
pub fn week_start_on_or_before(date: NaiveDate, week_start: Weekday) -> CoreResult<NaiveDate> {
    let offset = (date.weekday().num_days_from_monday() + 7
        - week_start.num_days_from_monday())
        % 7;
    step_back(date, offset)
}

pub fn first_of_month(date: NaiveDate) -> CoreResult<NaiveDate> {
    step_back(date, date.day0())
}

pub fn first_of_next_month(date: NaiveDate) -> CoreResult<NaiveDate> {
    first_of_month(date)?
        .checked_add_months(Months::new(1))
        .ok_or_else(|| CoreError::Computation(format!("month after {date} overflows")))
}

fn step_back(date: NaiveDate, days: u32) -> CoreResult<NaiveDate> {
    date.checked_sub_signed(Duration::days(i64::from(days)))
        .ok_or_else(|| CoreError::Computation(format!("{date} minus {days} days underflows")))
}

/// Parses a `YYYY-MM-DD` local-day string.
pub fn parse_local_day(raw: &str) -> CoreResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| CoreError::InvalidLocalDay(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use chrono_tz::America::{New_York, Santiago};
    use chrono_tz::Europe::London;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn midnight_uses_local_offset() {
        let winter = local_midnight_utc(&New_York, date(2025, 1, 1));
        assert_eq!(winter, Utc.with_ymd_and_hms(2025, 1, 1, 5, 0, 0).unwrap());
        let summer = local_midnight_utc(&New_York, date(2025, 7, 1));
        assert_eq!(summer, Utc.with_ymd_and_hms(2025, 7, 1, 4, 0, 0).unwrap());
    }

    #[test]
    fn skipped_midnight_resolves_after_gap() {
        // Chile springs forward at local midnight on 2024-09-08.
        let start = local_midnight_utc(&Santiago, date(2024, 9, 8));
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 9, 8, 4, 0, 0).unwrap());
        assert_eq!(local_date(&Santiago, start), date(2024, 9, 8));
    }

    #[test]
    fn days_across_dst_are_calendar_days() {
        // London's 2025-03-30 lasts 23 hours.
        let start = local_midnight_utc(&London, date(2025, 3, 30));
        let end = local_midnight_utc(&London, shift_days(date(2025, 3, 30), 1).unwrap());
        assert_eq!((end - start).num_hours(), 23);
    }

    #[test]
    fn week_start_alignment() {
        let start = |day: NaiveDate, weekday| week_start_on_or_before(day, weekday).unwrap();
        // 2025-01-19 is a Sunday.
        assert_eq!(start(date(2025, 1, 19), Weekday::Mon), date(2025, 1, 13));
        assert_eq!(start(date(2025, 1, 19), Weekday::Sun), date(2025, 1, 19));
        assert_eq!(start(date(2025, 1, 13), Weekday::Mon), date(2025, 1, 13));
    }

    #[test]
    fn stepping_back_past_the_earliest_date_is_an_error() {
        // Any other weekday lies before the earliest representable date.
        let later_weekday = NaiveDate::MIN.weekday().succ();
        let err = week_start_on_or_before(NaiveDate::MIN, later_weekday).unwrap_err();
        assert!(matches!(err, CoreError::Computation(_)));
    }

    #[test]
    fn month_helpers() {
        assert_eq!(first_of_month(date(2024, 2, 29)).unwrap(), date(2024, 2, 1));
        assert_eq!(first_of_next_month(date(2024, 12, 31)).unwrap(), date(2025, 1, 1));
    }

    #[test]
    fn unknown_zone_falls_back() {
        assert_eq!(resolve_time_zone("Not/AZone", London), London);
        assert_eq!(resolve_time_zone("  ", New_York), New_York);
        assert_eq!(resolve_time_zone("utc", New_York), chrono_tz::UTC);
        assert_eq!(resolve_time_zone("America/New_York", London), New_York);
    }

    #[test]
    fn parses_local_days() {
        assert_eq!(parse_local_day(" 2025-01-06 ").unwrap(), date(2025, 1, 6));
        assert!(matches!(
            parse_local_day("2025/01/06"),
            Err(CoreError::InvalidLocalDay(_))
        ));
    }

    #[test]
    fn year_bounds_guard() {
        let bounds = YearBounds::default();
        assert!(bounds.contains(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()));
        assert!(bounds
            .check(Utc.with_ymd_and_hms(2101, 1, 1, 0, 0, 0).unwrap())
            .is_err());
    }
}
