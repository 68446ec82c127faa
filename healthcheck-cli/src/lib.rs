//! Command line front end for the healthcheck engine

use std::time::Duration;

use healthcheck::{Executor, HealthConfig, Registry, Report};
use log::info;

pub mod config;
pub mod error;
pub mod format;
pub mod spec;

use error::CliError;
use spec::CheckSpec;

/// Name of the Crate
pub const NAME: &str = env!("CARGO_PKG_NAME");
/// Version of the Crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Append checks given on the command line after those from the config
pub fn with_specs(mut config: HealthConfig, specs: &[CheckSpec]) -> HealthConfig {
    config.checks.extend(spec::to_configs(specs));
    config
}

/// Override the config timeout with seconds from the command line
pub fn with_timeout(mut config: HealthConfig, secs: Option<f64>) -> Result<HealthConfig, CliError> {
    if let Some(secs) = secs {
        config.timeout = Duration::try_from_secs_f64(secs)
            .map_err(|err| CliError::Usage(format!("Invalid timeout {}: {}", secs, err)))?;
    }
    Ok(config)
}

/// Registry holding every configured check
pub fn registry(config: &HealthConfig) -> Result<Registry, CliError> {
    let registry = Registry::new();
    config.register_checks(&registry)?;
    Ok(registry)
}

/// Run every configured check once
pub fn run_checks(config: &HealthConfig) -> Result<Report, CliError> {
    if config.checks.is_empty() {
        return Err(CliError::Usage(
            "At least one --check option is required".to_string(),
        ));
    }

    let registry = registry(config)?;
    info!("Running checks: {:?}", registry.list_names());
    Ok(Executor::new(registry).run_blocking(&config.run_options())?)
}
