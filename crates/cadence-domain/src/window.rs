//! Half-open UTC windows that delimit a single budget cycle.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::common::PeriodType;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase", try_from = "RawPeriodWindow")]
/// The `[start, end)` range of one budget cycle, expressed in UTC.
pub struct PeriodWindow {
    pub period_type: PeriodType,
    #[serde(rename = "periodStartUTC")]
    pub period_start_utc: DateTime<Utc>,
    #[serde(rename = "periodEndUTC")]
    pub period_end_utc: DateTime<Utc>,
    #[serde(rename = "periodAnchorUTC", default)]
    pub period_anchor_utc: Option<DateTime<Utc>>,
}

/// Unchecked wire shape; deserialized windows go through [`PeriodWindow::new`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPeriodWindow {
    period_type: PeriodType,
    #[serde(rename = "periodStartUTC")]
    period_start_utc: DateTime<Utc>,
    #[serde(rename = "periodEndUTC")]
    period_end_utc: DateTime<Utc>,
    #[serde(rename = "periodAnchorUTC", default)]
    period_anchor_utc: Option<DateTime<Utc>>,
}

impl TryFrom<RawPeriodWindow> for PeriodWindow {
    type Error = PeriodWindowError;

    fn try_from(raw: RawPeriodWindow) -> Result<Self, Self::Error> {
        Self::new(
            raw.period_type,
            raw.period_start_utc,
            raw.period_end_utc,
            raw.period_anchor_utc,
        )
    }
}

impl PeriodWindow {
    pub fn new(
        period_type: PeriodType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        anchor: Option<DateTime<Utc>>,
    ) -> Result<Self, PeriodWindowError> {
        if end <= start {
            return Err(PeriodWindowError::NonPositiveDuration { start, end });
        }
        if period_type.requires_anchor() && anchor.is_none() {
            return Err(PeriodWindowError::MissingAnchor);
        }
        Ok(Self {
            period_type,
            period_start_utc: start,
            period_end_utc: end,
            period_anchor_utc: if period_type.requires_anchor() {
                anchor
            } else {
                None
            },
        })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.period_start_utc && instant < self.period_end_utc
    }

    /// Returns `true` once `now` has reached the exclusive end of the window.
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now >= self.period_end_utc
    }

    /// Key used to de-duplicate rollover attempts for this window.
    pub fn dedupe_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.period_type.as_tag(),
            self.period_start_utc
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            self.period_end_utc.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Errors that can occur when constructing [`PeriodWindow`] values.
pub enum PeriodWindowError {
    NonPositiveDuration {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    MissingAnchor,
}

impl fmt::Display for PeriodWindowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodWindowError::NonPositiveDuration { start, end } => {
                write!(f, "period end {end} must be after start {start}")
            }
            PeriodWindowError::MissingAnchor => {
                f.write_str("biweekly periods require an anchor")
            }
        }
    }
}

impl std::error::Error for PeriodWindowError {}
