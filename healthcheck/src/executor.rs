//! Concurrent execution of registered checks
//!
//! Every check in a run is launched independently. Suspending work is spawned as a tokio task
//! and cancelled by dropping its future when the timeout elapses. Blocking work runs on its own
//! detached worker thread; on timeout the executor stops waiting for it and the thread is left
//! to finish in the background, its eventual result is discarded.
//!
//! Whatever a check does (fail, hang, panic) is converted into an [Outcome] at the per-check
//! boundary in `execute`; nothing a check does can reach the caller or its siblings.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use derive_builder::Builder;
use futures::{
    future::join_all,
    stream::{self, StreamExt},
};
use log::{debug, info, warn};
use tokio::sync::oneshot;
use tokio_util::{sync::CancellationToken, task::AbortOnDropHandle};

use crate::{
    check::{BlockingFn, CheckDefinition, CheckResult, SuspendingFn, Work},
    error::{panic_message, HealthError},
    registry::{self, Registry},
    report::{Outcome, Report, Status},
    tokio_tools::{run_in_tokio, run_in_tokio_with_cancel},
};

/// Default global timeout applied to checks without their own
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Selection and policy for one run
#[derive(Debug, Clone, Builder)]
#[builder(default)]
pub struct RunOptions {
    /// Checks to run in reporting order, empty runs every registered check
    #[builder(setter(into))]
    pub names: Vec<String>,
    /// Timeout for checks that do not set their own
    pub timeout: Duration,
    /// Keep detail messages in the report
    pub include_details: bool,
    /// Limit on checks in flight at once, unlimited when not set
    #[builder(setter(strip_option))]
    pub max_concurrency: Option<usize>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            names: vec![],
            timeout: DEFAULT_TIMEOUT,
            include_details: true,
            max_concurrency: None,
        }
    }
}

/// How a launched unit of work ended, before it is turned into an [Outcome]
#[derive(Debug)]
enum Completion {
    Finished(CheckResult),
    TimedOut(Duration),
    Panicked(String),
}

/// Runs checks from a [Registry]
#[derive(Debug, Clone, Default)]
pub struct Executor {
    registry: Registry,
}

impl Executor {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Executor over the process-wide registry as it is now
    pub fn global() -> Self {
        Self::new(registry::global())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Resolve names against a single snapshot, failing on the first unknown name
    ///
    /// Empty names select every registered check. Repeated names keep their first position.
    fn resolve(&self, names: &[String]) -> Result<Vec<Arc<CheckDefinition>>, HealthError> {
        let snapshot = self.registry.snapshot();

        if names.is_empty() {
            return Ok(snapshot.iter().cloned().collect());
        }

        let mut resolved: Vec<Arc<CheckDefinition>> = Vec::with_capacity(names.len());
        for name in names {
            if resolved.iter().any(|check| check.name() == name) {
                continue;
            }
            resolved.push(snapshot.get(name)?);
        }
        Ok(resolved)
    }

    /// Run the selected checks concurrently and aggregate their outcomes
    ///
    /// Only configuration problems (unknown names, bad options) are returned as errors, and
    /// always before any check has started.
    pub async fn run(&self, options: &RunOptions) -> Result<Report, HealthError> {
        if options.max_concurrency == Some(0) {
            return Err(HealthError::configuration(
                "max_concurrency must be at least 1",
            ));
        }

        let checks = self.resolve(&options.names)?;
        if checks.is_empty() {
            debug!("No health checks to run");
            return Ok(Report::empty());
        }

        info!(
            "Running {} health checks with timeout {:?}",
            checks.len(),
            options.timeout
        );

        let start = Instant::now();
        let expected = checks.len();
        let launches = checks
            .into_iter()
            .map(|check| execute(check, options.timeout));

        // join_all and buffered both yield in the order the checks were requested
        let outcomes = match options.max_concurrency {
            None => join_all(launches).await,
            Some(limit) => stream::iter(launches).buffered(limit).collect::<Vec<_>>().await,
        };

        let report = Report::aggregate(outcomes, expected, start.elapsed())?;
        info!("Health check run complete: {}", report);

        Ok(if options.include_details {
            report
        } else {
            report.without_details()
        })
    }

    /// Synchronous form of [Executor::run] on a private current thread runtime
    ///
    /// Must not be called from inside a tokio runtime.
    pub fn run_blocking(&self, options: &RunOptions) -> Result<Report, HealthError> {
        run_in_tokio(self.run(options))
    }

    /// As [Executor::run_blocking], abandoning the run with [HealthError::Cancelled] once
    /// `cancel` fires
    pub fn run_blocking_with_cancel(
        &self,
        options: &RunOptions,
        cancel: CancellationToken,
    ) -> Result<Report, HealthError> {
        run_in_tokio_with_cancel(cancel, self.run(options))
    }
}

/// Execute one check under its effective timeout and classify how it ended
async fn execute(check: Arc<CheckDefinition>, global_timeout: Duration) -> Outcome {
    let timeout = check.effective_timeout(global_timeout);
    let start = Instant::now();

    let completion = match check.work() {
        Work::Suspending(work) => run_suspending(work.clone(), timeout).await,
        Work::Blocking(work) => run_blocking(check.name(), work.clone(), timeout).await,
    };

    let outcome = classify(check.name(), completion, start.elapsed());
    if !outcome.is_ok() {
        warn!(
            "Health check {} reported {}: {}",
            outcome.name(),
            outcome.status(),
            outcome.detail().unwrap_or("")
        );
    }
    outcome
}

/// Suspending work runs as its own task so that a panic is caught by the join
async fn run_suspending(work: Arc<SuspendingFn>, timeout: Duration) -> Completion {
    // Dropping the handle aborts the task, so a dropped run does not leave checks behind
    let task = AbortOnDropHandle::new(tokio::spawn(async move {
        tokio::time::timeout(timeout, work()).await
    }));

    match task.await {
        Ok(Ok(result)) => Completion::Finished(result),
        Ok(Err(_elapsed)) => Completion::TimedOut(timeout),
        Err(join_error) if join_error.is_panic() => {
            Completion::Panicked(panic_message(join_error.into_panic().as_ref()))
        }
        Err(join_error) => Completion::Finished(Err(HealthError::unexpected(join_error))),
    }
}

/// Blocking work gets a fresh detached thread, the executor never joins it
async fn run_blocking(name: &str, work: Arc<BlockingFn>, timeout: Duration) -> Completion {
    let (reply, receive) = oneshot::channel();

    let spawned = thread::Builder::new()
        .name(format!("check-{}", name))
        .spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| work()));
            // The receiver is gone once the run has given up on this worker
            let _ = reply.send(result);
        });

    if let Err(err) = spawned {
        return Completion::Finished(Err(HealthError::from(err)));
    }

    match tokio::time::timeout(timeout, receive).await {
        Ok(Ok(Ok(result))) => Completion::Finished(result),
        Ok(Ok(Err(payload))) => Completion::Panicked(panic_message(payload.as_ref())),
        Ok(Err(_closed)) => Completion::Panicked("worker exited without a result".to_string()),
        Err(_elapsed) => Completion::TimedOut(timeout),
    }
}

fn classify(name: &str, completion: Completion, duration: Duration) -> Outcome {
    let (status, detail) = match completion {
        Completion::Finished(Ok(annotation)) => (Status::Ok, annotation),
        Completion::Finished(Err(err)) => (err.status(), Some(err.to_string())),
        Completion::TimedOut(timeout) => (Status::Timeout, Some(format!("exceeded {:?}", timeout))),
        Completion::Panicked(msg) => (Status::Error, Some(format!("check panicked: {}", msg))),
    };
    Outcome::new(name, status, detail, duration)
}
