//! Cadence core: period boundaries, plan rollover and goal reconciliation.
//!
//! The calendar and period modules are pure. Rollover and goal services
//! reach persistence through the repository traits so that the in-memory
//! store, the JSON store and test doubles are interchangeable.

pub mod aggregation;
pub mod calendar;
pub mod error;
pub mod goals;
pub mod period;
pub mod repository;
pub mod rollover;
pub mod settings;
pub mod snapshot;
pub mod store;
pub mod time;

pub use aggregation::{summarize_period, summarize_plan};
pub use error::{CoreError, CoreResult};
pub use goals::{GoalKind, GoalRow, GoalService, GoalWrite};
pub use period::PeriodCalculator;
pub use repository::{GoalRepository, PlanRepository, TransactionQuery};
pub use rollover::{
    LocalRolloverClient, PlanRequest, PlanService, RolloverClient, RolloverDecision,
    RolloverOrchestrator, RolloverResponse, RolloverService, SkipReason, Trigger,
};
pub use settings::EngineSettings;
pub use snapshot::{PlanPayload, PlanSnapshot};
pub use store::{InMemoryPlanStore, PlanStore};
pub use time::{Clock, FixedClock, SystemClock};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Installs the global fmt subscriber once, honoring `RUST_LOG`.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::from_default_env();
        let filter = match "cadence_core=info".parse() {
            Ok(directive) => filter.add_directive(directive),
            Err(_) => filter,
        };
        if fmt().with_env_filter(filter).try_init().is_ok() {
            tracing::info!("cadence tracing initialized");
        }
    });
}
