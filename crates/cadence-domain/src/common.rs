//! Shared traits and enums for budgeting primitives.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Exposes the stable identifier a client keys an entity by.
pub trait Identifiable {
    fn identifier(&self) -> &str;
}

/// Provides read-only access to an entity's display name.
pub trait NamedEntity {
    fn name(&self) -> &str;
}

/// Supplies a common contract for retrieving amounts in minor units.
pub trait Amounted {
    fn amount_minor(&self) -> i64;
}

/// Converts an entity into a user-facing display label.
pub trait Displayable {
    fn display_label(&self) -> String;
}

/// Enumerates the renewal cadences a plan can follow.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[derive(Default)]
pub enum PeriodType {
    Weekly,
    Biweekly,
    #[default]
    Monthly,
}

impl PeriodType {
    /// Stable upper-case tag used in dedupe keys and persisted rows.
    pub fn as_tag(self) -> &'static str {
        match self {
            PeriodType::Weekly => "WEEKLY",
            PeriodType::Biweekly => "BIWEEKLY",
            PeriodType::Monthly => "MONTHLY",
        }
    }

    /// Parses a cadence label, accepting any casing and surrounding whitespace.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "weekly" => Some(PeriodType::Weekly),
            "biweekly" | "bi-weekly" | "fortnightly" => Some(PeriodType::Biweekly),
            "monthly" => Some(PeriodType::Monthly),
            _ => None,
        }
    }

    pub fn requires_anchor(self) -> bool {
        matches!(self, PeriodType::Biweekly)
    }
}

impl fmt::Display for PeriodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PeriodType::Weekly => "Weekly",
            PeriodType::Biweekly => "Biweekly",
            PeriodType::Monthly => "Monthly",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labels_case_insensitively() {
        assert_eq!(PeriodType::parse(" Weekly "), Some(PeriodType::Weekly));
        assert_eq!(PeriodType::parse("BIWEEKLY"), Some(PeriodType::Biweekly));
        assert_eq!(PeriodType::parse("monthly"), Some(PeriodType::Monthly));
        assert_eq!(PeriodType::parse("yearly"), None);
    }

    #[test]
    fn serializes_as_screaming_tag() {
        let json = serde_json::to_string(&PeriodType::Biweekly).unwrap();
        assert_eq!(json, "\"BIWEEKLY\"");
        assert_eq!(PeriodType::Biweekly.as_tag(), "BIWEEKLY");
    }
}
