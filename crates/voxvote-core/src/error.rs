//! Error taxonomy shared by the worker, the coordinator and the ballot store.

use crate::status::FailureKind;
use thiserror::Error;

/// Result type alias for voting operations
pub type VoteResult<T> = Result<T, VoteError>;

/// Errors that can occur while running or coordinating a voting session
#[derive(Error, Debug)]
pub enum VoteError {
    /// Retries ran out without hearing anything.
    #[error("{0}")]
    RecognitionTimeout(String),

    /// Retries ran out and the last utterance did not fit the step.
    #[error("{0}")]
    ValidationRejected(String),

    #[error("audio device failure: {0}")]
    DeviceFailure(String),

    #[error("worker exited unexpectedly")]
    WorkerLost,

    #[error("cannot launch voting worker: {0}")]
    ResourceExhausted(String),

    #[error("session not found: {0}")]
    NotFound(String),

    #[error("ballot store error: {0}")]
    Store(String),

    #[error("voter {0} has already voted")]
    DuplicateVote(String),

    #[error("status channel error: {0}")]
    Channel(String),

    #[error("session {0} already reached a terminal state")]
    AlreadyTerminal(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VoteError {
    /// Classification written into a `Failed` status event.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            VoteError::RecognitionTimeout(_) => FailureKind::RecognitionTimeout,
            VoteError::ValidationRejected(_) => FailureKind::ValidationRejected,
            VoteError::DeviceFailure(_) => FailureKind::DeviceFailure,
            VoteError::WorkerLost => FailureKind::WorkerLost,
            VoteError::Store(_) => FailureKind::StoreFailure,
            VoteError::DuplicateVote(_) => FailureKind::DuplicateVote,
            VoteError::ResourceExhausted(_)
            | VoteError::NotFound(_)
            | VoteError::Channel(_)
            | VoteError::AlreadyTerminal(_)
            | VoteError::Config(_)
            | VoteError::Io(_) => FailureKind::Internal,
        }
    }
}


impl From<rusqlite::Error> for VoteError {
    fn from(err: rusqlite::Error) -> Self {
        VoteError::Store(err.to_string())
    }
}

impl From<serde_json::Error> for VoteError {
    fn from(err: serde_json::Error) -> Self {
        VoteError::Channel(err.to_string())
    }
}

impl From<config::ConfigError> for VoteError {
    fn from(err: config::ConfigError) -> Self {
        VoteError::Config(err.to_string())
    }
}
