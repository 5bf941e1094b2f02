use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobStoreError {
    #[error("queue unreachable: {0}")]
    Unreachable(#[from] redis::RedisError),

    #[error("failed to (de)serialize job envelope: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("job {0} not found in failed queue")]
    NotFound(uuid::Uuid),

    #[error("unknown queue name: {0}")]
    UnknownQueue(String),
}

pub type JobStoreResult<T> = Result<T, JobStoreError>;
