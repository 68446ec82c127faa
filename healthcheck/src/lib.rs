//! Health check aggregation engine
//!
//! Named checks are registered in a [Registry], run concurrently by an [Executor] under a
//! timeout, and aggregated into a [Report] whose overall status is ok only when every check is.
//!
//! ```
//! use std::time::Duration;
//! use healthcheck::{Executor, Registry, RunOptionsBuilder, Status};
//!
//! let registry = Registry::new();
//! registry.check("db").suspending(|| async { Ok(None) }).unwrap();
//!
//! let options = RunOptionsBuilder::default()
//!     .timeout(Duration::from_secs(1))
//!     .build()
//!     .unwrap();
//! let report = Executor::new(registry).run_blocking(&options).unwrap();
//! assert_eq!(report.status(), Status::Ok);
//! ```

pub mod check;
pub mod config;
pub mod error;
pub mod executor;
pub mod probe;
pub mod registry;
pub mod report;
pub mod tokio_tools;
#[cfg(feature = "warp")]
pub mod webservice;

use std::time::Duration;

pub use check::{CheckDefinition, CheckResult, Work};
pub use config::{CheckConfig, HealthConfig, HealthConfigBuilder};
pub use error::HealthError;
pub use executor::{Executor, RunOptions, RunOptionsBuilder, DEFAULT_TIMEOUT};
pub use probe::{CheckKind, Probe};
pub use registry::Registry;
pub use report::{Outcome, Report, Status, Summary};

/// Name of the Crate
pub const NAME: &str = env!("CARGO_PKG_NAME");
/// Version of the Crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Register a check in the process-wide registry
pub fn register_health_check<S: Into<String>>(
    name: S,
    work: Work,
    timeout: Option<Duration>,
) -> Result<(), HealthError> {
    registry::global().register(name, work, timeout)?;
    Ok(())
}

/// Remove a check from the process-wide registry, false when it was not registered
pub fn unregister_health_check(name: &str) -> bool {
    registry::global().unregister(name)
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Run checks from the process-wide registry
///
/// ```mermaid
/// sequenceDiagram
///     participant Caller
///     participant Executor
///     participant Registry
///     participant Check
///
///     Caller->>+Executor: run(options)
///     Executor->>Registry: snapshot()
///     Registry-->>Executor: checks in registration order
///     par every selected check
///         Executor->>+Check: launch under effective timeout
///         Check-->>-Executor: ok / failure / timeout / panic
///     end
///     Executor->>Executor: aggregate outcomes in request order
///     Executor-->>-Caller: Report
/// ```
pub async fn run_health_checks(options: &RunOptions) -> Result<Report, HealthError> {
    Executor::global().run(options).await
}

/// Synchronous form of [run_health_checks], must not be called from inside a tokio runtime
pub fn run_health_checks_blocking(options: &RunOptions) -> Result<Report, HealthError> {
    Executor::global().run_blocking(options)
}
