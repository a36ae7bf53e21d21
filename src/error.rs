use thiserror::Error;

/// Failure taxonomy for the client.
///
/// Read failures (`Fetch`) are swallowed at the aggregation boundary and
/// degrade to empty or partial data. Write failures (`Submission`) surface
/// to the caller verbatim and are never silently retried.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no wallet connected: {0}")]
    Connection(String),

    #[error("encryption session setup failed: {0}")]
    Initialization(String),

    #[error("vote encryption failed: {0}")]
    Encryption(String),

    #[error("chain submission rejected: {0}")]
    Submission(String),

    #[error("chain read failed: {0}")]
    Fetch(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type ClientResult<T> = Result<T, ClientError>;
