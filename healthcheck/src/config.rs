use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use derive_builder::Builder;
use log::debug;
use serde::Deserialize;
use serde_with::{serde_as, DurationSecondsWithFrac};

use crate::{
    check::CheckDefinition,
    error::HealthError,
    executor::{RunOptions, DEFAULT_TIMEOUT},
    probe::{self, CheckKind},
    registry::Registry,
};

#[serde_as]
#[derive(Debug, Deserialize, Clone, PartialEq, Builder)]
#[serde(default)]
#[builder(default)]
pub struct HealthConfig {
    /// Name for the service
    #[builder(setter(into))]
    pub name: String,
    /// Address to start the webservice on
    /// This allows chainging to localhost for dev and 0.0.0.0 or specific address for deployment
    pub address: SocketAddr,
    /// Path segment the health routes are served under
    #[builder(setter(into))]
    pub prefix: String,
    /// Timeout in seconds for checks that do not set their own
    #[serde_as(as = "DurationSecondsWithFrac<f64>")]
    pub timeout: Duration,
    /// Keep detail messages in reports
    pub include_details: bool,
    /// Checks created from configuration
    pub checks: Vec<CheckConfig>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            name: "NO_NAME".to_string(),
            address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8079)),
            prefix: "health".to_string(),
            timeout: DEFAULT_TIMEOUT,
            include_details: true,
            checks: vec![],
        }
    }
}

/// One check of a known kind against a target
#[serde_as]
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CheckConfig {
    pub name: String,
    pub kind: CheckKind,
    /// URL or `host:port`
    pub target: String,
    #[serde_as(as = "Option<DurationSecondsWithFrac<f64>>")]
    pub timeout: Option<Duration>,
}

impl CheckConfig {
    pub fn new<S: Into<String>, T: Into<String>>(name: S, kind: CheckKind, target: T) -> Self {
        Self {
            name: name.into(),
            kind,
            target: target.into(),
            timeout: None,
        }
    }

    pub fn definition(&self) -> Result<CheckDefinition, HealthError> {
        let work = probe::from_spec(self.kind, &self.target)?;
        let definition = CheckDefinition::new(self.name.clone(), work)?;
        Ok(match self.timeout {
            Some(timeout) => definition.with_timeout(timeout),
            None => definition,
        })
    }
}

impl HealthConfig {
    /// Options for running every check with this config's policy
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            timeout: self.timeout,
            include_details: self.include_details,
            ..RunOptions::default()
        }
    }

    /// Register every configured check
    ///
    /// All definitions are built first so a bad entry leaves the registry untouched.
    pub fn register_checks(&self, registry: &Registry) -> Result<(), HealthError> {
        let definitions = self
            .checks
            .iter()
            .map(CheckConfig::definition)
            .collect::<Result<Vec<_>, _>>()?;

        for definition in definitions {
            debug!("Registering {} from config", definition.name());
            registry.insert(definition);
        }
        Ok(())
    }
}
