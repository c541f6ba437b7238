use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::{
    calendar::next_local_midnight, settings::EngineSettings, snapshot::PlanSnapshot, time::Clock,
};

use super::{
    client::RolloverClient,
    state::{RolloverPhase, RolloverState},
    RolloverDecision, SkipReason, Trigger,
};

/// Decides when the held plan must roll and drives the transition.
///
/// Overlapping triggers share one orchestrator. Each trigger claims the
/// dedupe key synchronously before its first `.await`, so a concurrent
/// trigger for the same window is rejected without reaching the client.
pub struct RolloverOrchestrator<C> {
    client: C,
    clock: Arc<dyn Clock>,
    fallback_zone: Tz,
    state: Mutex<RolloverState>,
}

enum Claim {
    Proceed,
    Done(RolloverDecision),
}

/// Eligibility of the held window at `now`; `Ok` carries the key to claim.
///
/// `owns_check` is whether this trigger moved the state into `Checking`.
fn evaluate(
    state: &RolloverState,
    trigger: Trigger,
    now: DateTime<Utc>,
    owns_check: bool,
) -> Result<String, SkipReason> {
    let snapshot = state.snapshot.as_ref().ok_or(SkipReason::NotDue)?;
    if !snapshot.has_ended(now) {
        return Err(SkipReason::NotDue);
    }
    let key = snapshot.key();
    if state.last_key.as_deref() == Some(key.as_str()) {
        return Err(SkipReason::Duplicate);
    }
    if !owns_check {
        return Err(SkipReason::Duplicate);
    }
    if !trigger.bypasses_cooldown() && state.in_cooldown(now) {
        return Err(SkipReason::Cooldown);
    }
    Ok(key)
}

impl<C: RolloverClient> RolloverOrchestrator<C> {
    pub fn new(client: C, clock: Arc<dyn Clock>, settings: &EngineSettings) -> Self {
        Self {
            client,
            clock,
            fallback_zone: settings.fallback_zone,
            state: Mutex::new(RolloverState::new(settings.rollover_cooldown)),
        }
    }

    pub fn with_snapshot(self, snapshot: PlanSnapshot) -> Self {
        self.state().snapshot = Some(snapshot);
        self
    }

    // Every critical section leaves the state consistent, so a poisoned
    // lock is still usable.
    fn state(&self) -> MutexGuard<'_, RolloverState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn snapshot(&self) -> Option<PlanSnapshot> {
        self.state().snapshot.clone()
    }

    pub fn set_snapshot(&self, snapshot: PlanSnapshot) {
        self.state().snapshot = Some(snapshot);
    }

    pub fn phase(&self) -> RolloverPhase {
        self.state().phase
    }

    pub fn pending_refresh(&self) -> bool {
        self.state().pending_refresh
    }

    /// Copy of the bookkeeping, for inspection.
    pub fn state_snapshot(&self) -> RolloverState {
        self.state().clone()
    }

    /// Evaluates rollover for one trigger.
    pub async fn handle(&self, trigger: Trigger) -> RolloverDecision {
        if let Some(failed) = self.retry_pending_refresh().await {
            return failed;
        }

        let now = self.clock.now();
        match self.check_and_claim(trigger, now) {
            Claim::Done(decision) => decision,
            Claim::Proceed => self.roll(trigger).await,
        }
    }

    fn check_and_claim(&self, trigger: Trigger, now: DateTime<Utc>) -> Claim {
        let mut state = self.state();
        let owns_check = state.begin_check();
        match evaluate(&state, trigger, now, owns_check) {
            Ok(key) => {
                debug!(%trigger, %key, "claiming rollover");
                state.claim(key, now);
                Claim::Proceed
            }
            Err(reason) => {
                if owns_check {
                    state.end_check();
                }
                debug!(%trigger, ?reason, "rollover skipped");
                Claim::Done(RolloverDecision::Skipped(reason))
            }
        }
    }

    async fn roll(&self, trigger: Trigger) -> RolloverDecision {
        let response = self.client.attempt_rollover().await;
        match response {
            Ok(response) if response.rolled => {
                info!(%trigger, "rollover confirmed; refreshing plan");
                self.refresh_after_roll().await
            }
            Ok(_) => {
                debug!(%trigger, "nothing rolled; releasing key");
                self.state().release();
                RolloverDecision::NothingRolled
            }
            Err(err) => {
                warn!(%trigger, %err, "rollover attempt failed");
                self.state().release();
                RolloverDecision::Failed {
                    warning: format!("Could not start the new period: {err}"),
                }
            }
        }
    }

    async fn refresh_after_roll(&self) -> RolloverDecision {
        match self.client.fetch_plan_snapshot().await {
            Ok(snapshot) => {
                let mut state = self.state();
                state.snapshot = Some(snapshot.clone());
                state.pending_refresh = false;
                state.phase = RolloverPhase::Idle;
                RolloverDecision::Rolled(snapshot)
            }
            Err(err) => {
                warn!(%err, "plan refresh after rollover failed; will retry");
                let mut state = self.state();
                state.pending_refresh = true;
                state.phase = RolloverPhase::Idle;
                RolloverDecision::Failed {
                    warning: format!("The new period started but could not be loaded: {err}"),
                }
            }
        }
    }

    /// Retries a refresh owed from an earlier confirmed roll.
    ///
    /// Returns a decision only when the retry fails.
    async fn retry_pending_refresh(&self) -> Option<RolloverDecision> {
        {
            let mut state = self.state();
            if !state.pending_refresh || !state.begin_check() {
                return None;
            }
            state.pending_refresh = false;
        }
        match self.refresh_after_roll().await {
            RolloverDecision::Rolled(snapshot) => {
                info!(start = %snapshot.window.period_start_utc, "pending plan refresh completed");
                None
            }
            failed => Some(failed),
        }
    }

    /// Delay for the one-shot boundary timer, arming it for the held period.
    ///
    /// Returns `None` unless foregrounded, the period ends later in the
    /// current local day of the plan's zone, and no timer is armed for that
    /// boundary yet.
    pub fn boundary_timer_delay(&self, now: DateTime<Utc>, foregrounded: bool) -> Option<Duration> {
        if !foregrounded {
            return None;
        }
        let mut state = self.state();
        let snapshot = state.snapshot.as_ref()?;
        let end = snapshot.period_end();
        if end <= now || state.armed_for == Some(end) {
            return None;
        }
        let zone = snapshot.zone(self.fallback_zone);
        let midnight = next_local_midnight(&zone, now).ok()?;
        if end > midnight {
            return None;
        }
        let delay = (end - now).to_std().ok()?;
        state.armed_for = Some(end);
        debug!(boundary = %end, ?delay, "boundary timer armed");
        Some(delay)
    }

    /// Sleeps until the boundary and fires a [`Trigger::Timer`].
    ///
    /// Returns `None` when no timer should be armed.
    pub async fn run_boundary_timer(&self, foregrounded: bool) -> Option<RolloverDecision> {
        let delay = self.boundary_timer_delay(self.clock.now(), foregrounded)?;
        tokio::time::sleep(delay).await;
        self.state().armed_for = None;
        Some(self.handle(Trigger::Timer).await)
    }

    /// Forgets an armed timer, e.g. when the app leaves the foreground.
    pub fn disarm_timer(&self) {
        self.state().armed_for = None;
    }
}
