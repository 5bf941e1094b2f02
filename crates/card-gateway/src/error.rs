use thiserror::Error;

/// Error kinds surfaced by the gateway, matching the taxonomy in
/// SPEC_FULL.md §7. The workflow engine dispatches on `retryable()` to
/// decide whether to fail the job with a retry or fail it final.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("card failed local validation: {0}")]
    CardInvalid(String),

    #[error("gateway declined the request: {code} {message}")]
    GatewayDeclined { code: String, message: String },

    #[error("gateway rejected the request as invalid: {0}")]
    GatewayInvalid(String),

    #[error("gateway unreachable: {0}")]
    GatewayUnreachable(String),

    #[error("gateway has no record of transaction {0}")]
    GatewayNotFound(String),

    #[error("gateway rejected the state transition: {0}")]
    GatewayState(String),
}

impl GatewayError {
    pub fn retryable(&self) -> bool {
        matches!(self, GatewayError::GatewayUnreachable(_))
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
