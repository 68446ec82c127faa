use thiserror::Error;

use healthcheck::HealthError;

/// Error type for the command line tool
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Health(#[from] HealthError),
    #[error("Config error: {0}")]
    Config(#[from] figment::Error),
    #[error("Output error: {0}")]
    Json(#[from] serde_json::Error),
}
