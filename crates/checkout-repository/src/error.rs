use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("database unreachable: {0}")]
    Unreachable(String),

    #[error("row not found: {0}")]
    NotFound(String),

    #[error("conflicting row already present: {0}")]
    Conflict(String),
}

impl RepositoryError {
    pub fn retryable(&self) -> bool {
        matches!(self, RepositoryError::Unreachable(_))
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound(err.to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                RepositoryError::Conflict(err.to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                RepositoryError::Unreachable(err.to_string())
            }
            _ => RepositoryError::Unreachable(err.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;
