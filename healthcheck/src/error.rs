//! describe errors in healthcheck

use std::any::Any;

use thiserror::Error;

use crate::report::Status;

/// Error type shared by the registry, the executor and every check
///
/// The first four variants form the taxonomy that checks use to signal a deliberate
/// negative result. Anything else reaching the executor is treated as a defect.
#[derive(Error, Debug)]
pub enum HealthError {
    /// Invalid setup: bad name, unknown check, malformed connection parameters
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// The probed dependency rejected or refused a connection
    #[error("Connection failure: {0}")]
    Connection(String),
    /// The probed operation did not complete in time
    #[error("Timeout: {0}")]
    Timeout(String),
    /// Any other deliberate negative signal from a check
    #[error("{0}")]
    Failure(String),
    /// A defect inside a check that does not belong to the taxonomy
    #[error("Unexpected error: {0}")]
    Unexpected(String),
    /// Error when starting a runtime or worker thread
    #[error("io::Error eg from tokio start")]
    IoError(#[from] std::io::Error),
    /// The run was cancelled before it completed
    #[error("Cancelled")]
    Cancelled,
    /// Error from the web service
    #[cfg(feature = "warp")]
    #[error("Web service error")]
    WarpError(#[from] warp::Error),
}

impl HealthError {
    /// Shorthand for [HealthError::Configuration]
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        HealthError::Configuration(msg.into())
    }

    /// Shorthand for [HealthError::Connection]
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        HealthError::Connection(msg.into())
    }

    /// Shorthand for [HealthError::Timeout]
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        HealthError::Timeout(msg.into())
    }

    /// Shorthand for [HealthError::Failure]
    pub fn failure<S: Into<String>>(msg: S) -> Self {
        HealthError::Failure(msg.into())
    }

    /// Wrap any displayable error as a defect
    pub fn unexpected<E: std::fmt::Display>(err: E) -> Self {
        HealthError::Unexpected(err.to_string())
    }

    /// Outcome status a check reporting this error ends up with
    pub fn status(&self) -> Status {
        match self {
            HealthError::Configuration(_)
            | HealthError::Connection(_)
            | HealthError::Failure(_) => Status::Fail,
            HealthError::Timeout(_) => Status::Timeout,
            _ => Status::Error,
        }
    }
}

/// Extract a readable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
