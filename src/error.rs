use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid event: {0}")]
    Validation(String),

    #[error("collaborator failure: {0}")]
    Collaborator(String),

    #[error("lifecycle error: {0}")]
    Lifecycle(String),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
