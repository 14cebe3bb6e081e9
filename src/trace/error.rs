use std::time::Duration;
use thiserror::Error;

use crate::state::SessionState;

/// Marker the backend (and this client) embed in output on failure
pub const ERROR_SENTINEL: &str = "ERROR:";
/// Marker the backend (and this client) embed in output on timeout
pub const TIMEOUT_SENTINEL: &str = "TIMEOUT:";

/// Failure opening the request
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("{0}")]
    Connect(String),
}

/// Failure reading the response body
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReadError {
    /// Reader glitch; re-acquire and keep going
    #[error("transient read error: {0}")]
    Transient(String),
    #[error("{0}")]
    Fatal(String),
}

/// Why a session ended in something other than `Finished`
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Request could not be issued
    #[error("{0}")]
    ConnectFailure(String),
    /// Request issued but no response before the connect timeout
    #[error("fetch timed out.")]
    ConnectTimeout,
    #[error("{status} {reason}")]
    HttpError { status: u16, reason: String },
    #[error("no data received for {}s", .0.as_secs_f64())]
    ReadTimeout(Duration),
    #[error("stream read failed: {0}")]
    ReadFailure(String),
    #[error("backend reported an error")]
    BackendReportedError,
    #[error("backend reported a timeout")]
    BackendReportedTimeout,
}

impl SessionError {
    /// Terminal state this failure puts the session in
    pub fn terminal_state(&self) -> SessionState {
        match self {
            Self::ConnectTimeout | Self::ReadTimeout(_) | Self::BackendReportedTimeout => {
                SessionState::TimedOut
            }
            Self::ConnectFailure(_)
            | Self::HttpError { .. }
            | Self::ReadFailure(_)
            | Self::BackendReportedError => SessionState::Failed,
        }
    }

    /// Line appended to plain output for locally detected failures, so that
    /// output classification works the same for local and backend failures.
    /// Backend-reported failures already carry their own line.
    pub fn sentinel_line(&self) -> Option<String> {
        match self {
            Self::BackendReportedError | Self::BackendReportedTimeout => None,
            Self::ConnectTimeout | Self::ReadTimeout(_) => {
                Some(format!("{} {}", TIMEOUT_SENTINEL, self))
            }
            _ => Some(format!("{} {}", ERROR_SENTINEL, self)),
        }
    }

    /// Classify a cleanly finished stream by its plain output
    pub fn from_output(output: &[String]) -> Option<Self> {
        if output.iter().any(|l| l.contains(ERROR_SENTINEL)) {
            Some(Self::BackendReportedError)
        } else if output.iter().any(|l| l.contains(TIMEOUT_SENTINEL)) {
            Some(Self::BackendReportedTimeout)
        } else {
            None
        }
    }
}

impl From<TransportError> for SessionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => Self::ConnectTimeout,
            TransportError::Connect(cause) => Self::ConnectFailure(cause),
        }
    }
}
