use std::path::Path;

use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use healthcheck::HealthConfig;

use crate::error::CliError;

/// Prefix for environment variables overriding the config file
pub const ENV_PREFIX: &str = "HEALTHCHECK_";

/// Sources for the configuration: an optional YAML file then the environment
pub fn figment<P: AsRef<Path>>(path: Option<P>) -> Figment {
    let figment = Figment::new();
    let figment = match path {
        Some(path) => figment.merge(Yaml::file(path)),
        None => figment,
    };
    figment.merge(Env::prefixed(ENV_PREFIX))
}

pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<HealthConfig, CliError> {
    Ok(figment(path).extract()?)
}
