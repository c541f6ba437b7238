use std::path::PathBuf;

use chrono::Weekday;
use serde::{de::Deserializer, Deserialize, Serialize};

use crate::ConfigError;

/// Stores user-configurable engine preferences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// ISO 4217 code new plans start in.
    pub currency: String,
    /// Zone used when a stored or supplied identifier is not recognized.
    #[serde(default = "Config::default_time_zone_value")]
    pub default_time_zone: String,
    #[serde(
        default = "Config::default_week_start",
        deserialize_with = "lenient_weekday"
    )]
    pub week_start: Weekday,
    #[serde(default = "Config::default_rollover_cooldown_secs")]
    pub rollover_cooldown_secs: u64,
    #[serde(default)]
    pub year_bounds: YearBoundsConfig,
    #[serde(default = "Config::default_max_window_list")]
    pub max_window_list: usize,
    /// Categories offered as zero-limit budget goals on every plan.
    #[serde(default = "Config::default_budget_categories_value")]
    pub default_budget_categories: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Directory holding `plans.json`. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            currency: "USD".into(),
            default_time_zone: Self::default_time_zone_value(),
            week_start: Self::default_week_start(),
            rollover_cooldown_secs: Self::default_rollover_cooldown_secs(),
            year_bounds: YearBoundsConfig::default(),
            max_window_list: Self::default_max_window_list(),
            default_budget_categories: Self::default_budget_categories_value(),
            data_dir: None,
        }
    }
}

impl Config {
    pub fn default_time_zone_value() -> String {
        "UTC".into()
    }

    pub fn default_week_start() -> Weekday {
        Weekday::Mon
    }

    pub fn default_rollover_cooldown_secs() -> u64 {
        120
    }

    pub fn default_max_window_list() -> usize {
        104
    }

    pub fn default_budget_categories_value() -> Vec<String> {
        ["Housing", "Food", "Transport", "Utilities", "Health", "Entertainment"]
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    /// Checks invariants that serde alone cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.year_bounds.min_year >= self.year_bounds.max_year {
            return Err(ConfigError::Invalid(format!(
                "year bounds [{}, {}] are empty",
                self.year_bounds.min_year, self.year_bounds.max_year
            )));
        }
        if self.max_window_list == 0 {
            return Err(ConfigError::Invalid(
                "max_window_list must be at least 1".into(),
            ));
        }
        if self.currency.trim().is_empty() {
            return Err(ConfigError::Invalid("currency must not be empty".into()));
        }
        Ok(())
    }

    pub fn resolve_data_dir(&self) -> PathBuf {
        if let Some(path) = &self.data_dir {
            return path.clone();
        }

        let base = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        base.join("cadence")
    }
}

/// Sanity range for derived instants. Not a domain rule, only a guard.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct YearBoundsConfig {
    pub min_year: i32,
    pub max_year: i32,
}

impl Default for YearBoundsConfig {
    fn default() -> Self {
        Self {
            min_year: 1970,
            max_year: 2100,
        }
    }
}

fn lenient_weekday<'de, D>(deserializer: D) -> Result<Weekday, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .and_then(|raw| raw.trim().parse::<Weekday>().ok())
        .unwrap_or_else(Config::default_week_start))
}
