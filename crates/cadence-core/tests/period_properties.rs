use cadence_core::{
    calendar::{local_date, local_midnight_utc, shift_days, week_start_on_or_before},
    EngineSettings, PeriodCalculator,
};
use cadence_domain::PeriodType;
use chrono::{DateTime, Datelike, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use proptest::prelude::*;

// Zones with DST at or near midnight, half-hour shifts and no DST at all.
const ZONES: &[&str] = &[
    "UTC",
    "America/New_York",
    "America/Santiago",
    "America/Sao_Paulo",
    "Europe/London",
    "Asia/Beirut",
    "Asia/Kolkata",
    "Australia/Lord_Howe",
    "Pacific/Chatham",
];

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

// 2000-01-01T00:00:00Z
const MIN_SECS: i64 = 946_684_800;
// 2099-01-01T00:00:00Z
const MAX_SECS: i64 = 4_070_908_800;
// Leaves room for a few hundred weeks before the year guard.
const ANCHOR_MAX_SECS: i64 = 3_900_000_000;

fn instant(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().expect("valid instant")
}

fn zone(name: &str) -> Tz {
    name.parse().expect("known zone")
}

fn calculator(week_start: Weekday) -> PeriodCalculator {
    PeriodCalculator::new(&EngineSettings::default().with_week_start(week_start))
}

fn period_type() -> impl Strategy<Value = PeriodType> {
    prop_oneof![
        Just(PeriodType::Weekly),
        Just(PeriodType::Biweekly),
        Just(PeriodType::Monthly),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn every_window_contains_now_and_ends_after_start(
        zone_name in prop::sample::select(ZONES),
        secs in MIN_SECS..MAX_SECS,
        anchor_secs in MIN_SECS..MAX_SECS,
        kind in period_type(),
    ) {
        let now = instant(secs);
        let window = calculator(Weekday::Mon)
            .compute_window(kind, zone_name, now, Some(instant(anchor_secs)))
            .expect("window");
        prop_assert!(window.period_end_utc > window.period_start_utc);
        prop_assert!(window.contains(now));
    }

    #[test]
    fn weekly_start_falls_on_configured_weekday(
        zone_name in prop::sample::select(ZONES),
        secs in MIN_SECS..MAX_SECS,
        week_start in prop::sample::select(WEEKDAYS.to_vec()),
    ) {
        let tz = zone(zone_name);
        let window = calculator(week_start)
            .compute_window(PeriodType::Weekly, zone_name, instant(secs), None)
            .expect("window");
        let start = local_date(&tz, window.period_start_utc);
        let end = local_date(&tz, window.period_end_utc);
        prop_assert_eq!(start.weekday(), week_start);
        prop_assert_eq!((end - start).num_days(), 7);
    }

    #[test]
    fn monthly_start_is_first_local_day(
        zone_name in prop::sample::select(ZONES),
        secs in MIN_SECS..MAX_SECS,
    ) {
        let tz = zone(zone_name);
        let now = instant(secs);
        let window = calculator(Weekday::Mon)
            .compute_window(PeriodType::Monthly, zone_name, now, None)
            .expect("window");
        let start = local_date(&tz, window.period_start_utc);
        let end = local_date(&tz, window.period_end_utc);
        prop_assert_eq!(start.day(), 1);
        prop_assert_eq!(end.day(), 1);
        prop_assert_eq!(start.month(), local_date(&tz, now).month());
    }

    #[test]
    fn biweekly_is_deterministic(
        zone_name in prop::sample::select(ZONES),
        secs in MIN_SECS..MAX_SECS,
        anchor_secs in MIN_SECS..MAX_SECS,
    ) {
        let calculator = calculator(Weekday::Mon);
        let anchor = Some(instant(anchor_secs));
        let first = calculator
            .compute_window(PeriodType::Biweekly, zone_name, instant(secs), anchor)
            .expect("window");
        let second = calculator
            .compute_window(PeriodType::Biweekly, zone_name, instant(secs), anchor)
            .expect("window");
        prop_assert_eq!(first, second);
    }

    #[test]
    fn biweekly_boundaries_alternate(
        zone_name in prop::sample::select(ZONES),
        anchor_secs in MIN_SECS..ANCHOR_MAX_SECS,
        offset_weeks in 0_i64..200,
    ) {
        let tz = zone(zone_name);
        let calculator = calculator(Weekday::Mon);
        let anchor = instant(anchor_secs);
        let anchor_week = week_start_on_or_before(local_date(&tz, anchor), Weekday::Mon)
            .expect("week start");

        for step in 0..4 {
            let weeks = offset_weeks + step;
            let day = shift_days(anchor_week, weeks * 7).expect("day");
            let at = local_midnight_utc(&tz, day);
            let window = calculator
                .compute_window(PeriodType::Biweekly, zone_name, at, Some(anchor))
                .expect("window");
            prop_assert_eq!(window.period_start_utc == at, weeks % 2 == 0);
            let start = local_date(&tz, window.period_start_utc);
            let end = local_date(&tz, window.period_end_utc);
            prop_assert_eq!((end - start).num_days(), 14);
        }
    }
}
