//! Specific Kick style for health Checks

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use crate::{
    check::{CheckResult, Work},
    error::HealthError,
};

#[derive(Debug)]
struct KickInner {
    latest: Instant,
    margin: Duration,
}

/// A liveness check that automatically fails when the timer has not been reset before
/// the margin. Equivalent of a dead mans handle.
#[derive(Debug, Clone)]
pub struct Kick {
    /// Name of the check for human reading
    name: String,
    inner: Arc<Mutex<KickInner>>,
}

impl Kick {
    /// Create a kick providing name and duration of time before triggering failure
    pub fn new<S: Into<String>>(name: S, margin: Duration) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(Mutex::new(KickInner {
                latest: Instant::now(),
                margin,
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn get_inner(&self) -> MutexGuard<'_, KickInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reset the timer
    pub fn kick(&self) {
        self.get_inner().latest = Instant::now();
    }

    /// Check against a given time, healthy while `time` is within the margin of the last kick
    pub fn check_at(&self, time: Instant) -> CheckResult {
        let inner = self.get_inner();
        if inner.latest + inner.margin >= time {
            Ok(Some(format!(
                "kicked {:?} ago",
                time.saturating_duration_since(inner.latest)
            )))
        } else {
            Err(HealthError::failure(format!(
                "{} not kicked within {:?}",
                self.name, inner.margin
            )))
        }
    }

    pub fn check(&self) -> CheckResult {
        self.check_at(Instant::now())
    }

    /// Blocking work reading the shared timer
    pub fn work(&self) -> Work {
        let probe = self.clone();
        Work::blocking(move || probe.check())
    }
}
