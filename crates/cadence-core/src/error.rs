use thiserror::Error;

use cadence_domain::PeriodWindowError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Biweekly periods require an anchor")]
    MissingAnchor,
    #[error("Invalid local day `{0}` (expected YYYY-MM-DD)")]
    InvalidLocalDay(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Period computation failed: {0}")]
    Computation(String),
    #[error("No active plan for user {0}")]
    PlanNotFound(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Collaborator failed: {0}")]
    Collaborator(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<PeriodWindowError> for CoreError {
    fn from(err: PeriodWindowError) -> Self {
        match err {
            PeriodWindowError::MissingAnchor => CoreError::MissingAnchor,
            other => CoreError::Computation(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Storage(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
