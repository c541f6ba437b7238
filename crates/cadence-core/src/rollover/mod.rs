//! Period rollover: the client-side orchestrator and the service behind it.

mod client;
mod orchestrator;
mod service;
mod state;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::snapshot::PlanSnapshot;

pub use client::{LocalRolloverClient, RolloverClient};
pub use orchestrator::RolloverOrchestrator;
pub use service::{PlanRequest, PlanService, RolloverService};
pub use state::{RolloverPhase, RolloverState};

/// What asked the orchestrator to evaluate rollover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Launch,
    Resume,
    PeriodSwitch,
    CurrencySwitch,
    /// One-shot boundary timer; ignores the cooldown.
    Timer,
}

impl Trigger {
    pub fn bypasses_cooldown(self) -> bool {
        matches!(self, Trigger::Timer)
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Trigger::Launch => "launch",
            Trigger::Resume => "resume",
            Trigger::PeriodSwitch => "period-switch",
            Trigger::CurrencySwitch => "currency-switch",
            Trigger::Timer => "timer",
        };
        f.write_str(label)
    }
}

/// Answer of the rollover endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverResponse {
    pub rolled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No snapshot is held or its window has not ended.
    NotDue,
    /// The same window is already being, or was last, attempted.
    Duplicate,
    Cooldown,
}

/// Outcome of one trigger.
#[derive(Debug, Clone, PartialEq)]
pub enum RolloverDecision {
    Rolled(PlanSnapshot),
    NothingRolled,
    Skipped(SkipReason),
    /// Non-fatal: the stale snapshot stays visible.
    Failed { warning: String },
}
