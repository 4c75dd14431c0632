use thiserror::Error;

/// Errors raised by the measurement engine and the worker around it
#[derive(Error, Debug)]
pub enum Error {
    #[error("Please select at least one RPC endpoint to test")]
    NoEndpointsEnabled,

    #[error("Invalid round count {0}: at least one round is required")]
    InvalidRounds(usize),

    #[error("A latency test is already running")]
    RunInProgress,

    #[error("Test cancelled after {completed} of {total} rounds")]
    Cancelled { completed: usize, total: usize },

    #[error("Round timed out after {0}ms")]
    RoundTimeout(u64),

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Unknown probe type: {0}")]
    UnknownProbeType(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Publisher channel closed")]
    PublisherClosed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProbeError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The probe task panicked or was aborted
    #[error("Probe task failed: {0}")]
    Task(String),
}

impl From<reqwest::Error> for ProbeError {
    fn from(e: reqwest::Error) -> Self {
        ProbeError::Transport(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
