use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::{CoreError, CoreResult},
    repository::PlanRepository,
    snapshot::PlanSnapshot,
    time::Clock,
};

use super::{service::RolloverService, RolloverResponse};

/// The orchestrator's view of the rollover endpoint.
#[async_trait]
pub trait RolloverClient: Send + Sync {
    async fn attempt_rollover(&self) -> CoreResult<RolloverResponse>;

    async fn fetch_plan_snapshot(&self) -> CoreResult<PlanSnapshot>;
}

/// Calls an in-process [`RolloverService`] for one user.
pub struct LocalRolloverClient<R: PlanRepository> {
    service: RolloverService<R>,
    clock: Arc<dyn Clock>,
    user_id: String,
}

impl<R: PlanRepository> LocalRolloverClient<R> {
    pub fn new(service: RolloverService<R>, clock: Arc<dyn Clock>, user_id: impl Into<String>) -> Self {
        Self {
            service,
            clock,
            user_id: user_id.into(),
        }
    }
}

#[async_trait]
impl<R: PlanRepository> RolloverClient for LocalRolloverClient<R> {
    async fn attempt_rollover(&self) -> CoreResult<RolloverResponse> {
        self.service
            .attempt_rollover(&self.user_id, self.clock.now())
    }

    async fn fetch_plan_snapshot(&self) -> CoreResult<PlanSnapshot> {
        let plan = self
            .service
            .repository()
            .find_active_plan(&self.user_id)?
            .ok_or_else(|| CoreError::PlanNotFound(self.user_id.clone()))?;
        PlanSnapshot::from_plan(&plan)
    }
}
