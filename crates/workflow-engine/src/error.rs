use card_gateway::GatewayError;
use checkout_repository::RepositoryError;
use thiserror::Error;

/// Error taxonomy shared by every saga step, per the retry/compensation
/// table this engine implements.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("card failed local validation: {0}")]
    CardInvalid(String),

    #[error("gateway declined the request: {0}")]
    GatewayDeclined(String),

    #[error("gateway rejected the request as invalid: {0}")]
    GatewayInvalid(String),

    #[error("gateway unreachable: {0}")]
    GatewayUnreachable(String),

    #[error("database conflict: {0}")]
    DbConflict(String),

    #[error("database unreachable: {0}")]
    DbUnreachable(String),

    #[error("unknown job type: {0}")]
    UnknownJobType(String),
}

impl WorkflowError {
    /// Whether the job store should schedule a backoff retry (`true`) or
    /// move the job straight to the dead-letter list (`false`).
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            WorkflowError::GatewayUnreachable(_) | WorkflowError::DbUnreachable(_)
        )
    }
}

impl From<GatewayError> for WorkflowError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::CardInvalid(msg) => WorkflowError::CardInvalid(msg),
            GatewayError::GatewayDeclined { code, message } => {
                WorkflowError::GatewayDeclined(format!("{code}: {message}"))
            }
            GatewayError::GatewayInvalid(msg) => WorkflowError::GatewayInvalid(msg),
            GatewayError::GatewayUnreachable(msg) => WorkflowError::GatewayUnreachable(msg),
            GatewayError::GatewayNotFound(msg) => WorkflowError::GatewayInvalid(msg),
            GatewayError::GatewayState(msg) => WorkflowError::GatewayInvalid(msg),
        }
    }
}

impl From<RepositoryError> for WorkflowError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(msg) => WorkflowError::DbConflict(msg),
            RepositoryError::Unreachable(msg) => WorkflowError::DbUnreachable(msg),
            RepositoryError::NotFound(msg) => WorkflowError::DbConflict(msg),
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
