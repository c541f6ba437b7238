use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::snapshot::PlanSnapshot;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RolloverPhase {
    #[default]
    Idle,
    Checking,
    Rolling,
}

/// Dedupe, cooldown and timer bookkeeping owned by one orchestrator.
#[derive(Debug, Clone, Default)]
pub struct RolloverState {
    pub last_key: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub cooldown: Duration,
    pub phase: RolloverPhase,
    /// Period end the boundary timer is armed for.
    pub armed_for: Option<DateTime<Utc>>,
    /// A roll was confirmed but the snapshot could not be refreshed.
    pub pending_refresh: bool,
    pub snapshot: Option<PlanSnapshot>,
}

impl RolloverState {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            ..Self::default()
        }
    }

    /// Whether a non-timer attempt at `now` falls inside the cooldown.
    pub fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_attempt_at else {
            return false;
        };
        match (now - last).to_std() {
            Ok(elapsed) => elapsed < self.cooldown,
            // Clock moved backwards.
            Err(_) => true,
        }
    }

    /// Moves `Idle` to `Checking`. Returns `false` when another step
    /// already owns the state.
    pub fn begin_check(&mut self) -> bool {
        if self.phase != RolloverPhase::Idle {
            return false;
        }
        self.phase = RolloverPhase::Checking;
        true
    }

    /// Returns to `Idle` after a check that claimed nothing.
    pub fn end_check(&mut self) {
        if self.phase == RolloverPhase::Checking {
            self.phase = RolloverPhase::Idle;
        }
    }

    /// Claims `key` for an attempt starting at `now`.
    pub fn claim(&mut self, key: String, now: DateTime<Utc>) {
        self.last_key = Some(key);
        self.last_attempt_at = Some(now);
        self.phase = RolloverPhase::Rolling;
    }

    /// Frees the key so the same window may be retried.
    pub fn release(&mut self) {
        self.last_key = None;
        self.phase = RolloverPhase::Idle;
    }
}
