//! Engine-wide settings derived from the persisted configuration.

use std::time::Duration;

use cadence_config::Config;
use cadence_domain::CurrencyCode;
use chrono::Weekday;
use chrono_tz::Tz;
use tracing::warn;

use crate::calendar::{self, YearBounds};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub week_start: Weekday,
    pub fallback_zone: Tz,
    pub year_bounds: YearBounds,
    pub rollover_cooldown: Duration,
    pub max_window_list: usize,
    pub default_currency: CurrencyCode,
    pub default_budget_categories: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        let fallback_zone = match config.default_time_zone.trim().parse::<Tz>() {
            Ok(zone) => zone,
            Err(_) => {
                warn!(
                    zone = %config.default_time_zone,
                    "configured default time zone is not recognized; using UTC"
                );
                calendar::DEFAULT_ZONE
            }
        };
        Self {
            week_start: config.week_start,
            fallback_zone,
            year_bounds: YearBounds::new(
                config.year_bounds.min_year,
                config.year_bounds.max_year,
            ),
            rollover_cooldown: Duration::from_secs(config.rollover_cooldown_secs),
            max_window_list: config.max_window_list.max(1),
            default_currency: CurrencyCode::new(&config.currency),
            default_budget_categories: config.default_budget_categories.clone(),
        }
    }

    pub fn with_week_start(mut self, week_start: Weekday) -> Self {
        self.week_start = week_start;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_config_values() {
        let mut config = Config::default();
        config.default_time_zone = "Europe/Lisbon".into();
        config.week_start = Weekday::Sun;
        config.rollover_cooldown_secs = 45;
        config.currency = "eur ".into();
        let settings = EngineSettings::from_config(&config);
        assert_eq!(settings.fallback_zone, chrono_tz::Europe::Lisbon);
        assert_eq!(settings.week_start, Weekday::Sun);
        assert_eq!(settings.rollover_cooldown, Duration::from_secs(45));
        assert_eq!(settings.default_currency, CurrencyCode::new("EUR"));
    }

    #[test]
    fn unknown_default_zone_falls_back_to_utc() {
        let mut config = Config::default();
        config.default_time_zone = "Mars/Olympus".into();
        let settings = EngineSettings::from_config(&config);
        assert_eq!(settings.fallback_zone, chrono_tz::UTC);
    }
}
