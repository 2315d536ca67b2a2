use common::types::FailureReason;
use thiserror::Error;

/// Failure talking to the context store. A 404 on update is not an error,
/// see [`crate::orion_client::PatchStatus::NotFound`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("remote rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl StoreError {
    pub fn transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Transport(format!("timed out: {}", err))
        } else {
            StoreError::Transport(err.to_string())
        }
    }
}

impl From<StoreError> for FailureReason {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Transport(msg) => FailureReason::Transport(msg),
            StoreError::Rejected { status, body } => FailureReason::Rejected { status, body },
        }
    }
}

/// The entity's data could not be produced this cycle.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("weather provider unreachable: {0}")]
    Transport(String),
    #[error("weather provider returned status {0}")]
    Status(u16),
    #[error("malformed weather payload: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("duplicate entity id '{0}'")]
    DuplicateId(String),
}
