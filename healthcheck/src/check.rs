//! Definition of a named check and the work it runs

use std::{fmt, future::Future, sync::Arc, time::Duration};

use futures::future::{BoxFuture, FutureExt};

use crate::error::HealthError;

/// Reply from a unit of work: an optional short annotation on success
pub type CheckResult = Result<Option<String>, HealthError>;

/// Work that occupies a worker thread until it completes
pub type BlockingFn = dyn Fn() -> CheckResult + Send + Sync;

/// Work that yields to the scheduler at its I/O boundaries
pub type SuspendingFn = dyn Fn() -> BoxFuture<'static, CheckResult> + Send + Sync;

/// The callable part of a check, tagged by the execution substrate it needs
#[derive(Clone)]
pub enum Work {
    /// Runs on a dedicated worker thread
    Blocking(Arc<BlockingFn>),
    /// Runs as a task on the tokio scheduler
    Suspending(Arc<SuspendingFn>),
}

impl Work {
    /// Wrap a synchronous function
    pub fn blocking<F>(work: F) -> Self
    where
        F: Fn() -> CheckResult + Send + Sync + 'static,
    {
        Work::Blocking(Arc::new(work))
    }

    /// Wrap a function producing a future
    pub fn suspending<F, Fut>(work: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CheckResult> + Send + 'static,
    {
        Work::Suspending(Arc::new(move || work().boxed()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Work::Blocking(_) => "blocking",
            Work::Suspending(_) => "suspending",
        }
    }
}

impl fmt::Debug for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Work::{}", self.kind())
    }
}

/// Immutable descriptor of a registered check
#[derive(Debug, Clone)]
pub struct CheckDefinition {
    name: String,
    work: Work,
    timeout: Option<Duration>,
}

impl CheckDefinition {
    /// Create a definition, the name must not be blank
    pub fn new<S: Into<String>>(name: S, work: Work) -> Result<Self, HealthError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(HealthError::configuration("check name must not be empty"));
        }
        Ok(Self {
            name,
            work,
            timeout: None,
        })
    }

    pub fn blocking<S, F>(name: S, work: F) -> Result<Self, HealthError>
    where
        S: Into<String>,
        F: Fn() -> CheckResult + Send + Sync + 'static,
    {
        Self::new(name, Work::blocking(work))
    }

    pub fn suspending<S, F, Fut>(name: S, work: F) -> Result<Self, HealthError>
    where
        S: Into<String>,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CheckResult> + Send + 'static,
    {
        Self::new(name, Work::suspending(work))
    }

    /// Override the run's global timeout for this check
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn work(&self) -> &Work {
        &self.work
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Own timeout if set, else the global one
    pub fn effective_timeout(&self, global: Duration) -> Duration {
        self.timeout.unwrap_or(global)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_names_are_rejected() {
        for name in ["", "   "] {
            let reply = CheckDefinition::blocking(name, || Ok(None));
            assert!(matches!(reply, Err(HealthError::Configuration(_))));
        }
    }

    #[test]
    fn effective_timeout() {
        let check = CheckDefinition::blocking("disk", || Ok(None)).unwrap();
        assert_eq!(check.timeout(), None);
        assert_eq!(
            check.effective_timeout(Duration::from_secs(5)),
            Duration::from_secs(5)
        );

        let check = check.with_timeout(Duration::from_millis(200));
        assert_eq!(
            check.effective_timeout(Duration::from_secs(5)),
            Duration::from_millis(200)
        );
    }

    #[test]
    fn blocking_work_is_callable() {
        let check = CheckDefinition::blocking("disk", || Ok(Some("80% free".to_string()))).unwrap();
        assert_eq!(check.work().kind(), "blocking");
        match check.work() {
            Work::Blocking(work) => assert_eq!(work().unwrap().as_deref(), Some("80% free")),
            Work::Suspending(_) => panic!("expected blocking work"),
        }
    }

    #[tokio::test]
    async fn suspending_work_is_callable() {
        let check = CheckDefinition::suspending("remote", || async {
            Err(HealthError::connection("refused"))
        })
        .unwrap();
        assert_eq!(format!("{:?}", check.work()), "Work::suspending");
        match check.work() {
            Work::Suspending(work) => assert!(matches!(
                work().await,
                Err(HealthError::Connection(_))
            )),
            Work::Blocking(_) => panic!("expected suspending work"),
        }
    }
}
