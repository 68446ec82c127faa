//! Manual probe provides a check that is explicitly enabled and disabled.
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{
    check::{CheckResult, Work},
    error::HealthError,
};

/// A check that is manually controlled. Allowing the developer to
/// enable,  disable or toggle it as appropriate.
///
/// Clones share the same state, so the application keeps one clone and the registry the other.
#[derive(Debug, Clone)]
pub struct Manual {
    name: String,
    enabled: Arc<AtomicBool>,
}

impl Manual {
    /// Create a new Manual probe with the given name and enabled state
    pub fn new<S: Into<String>>(name: S, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enable the probe
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    /// Disable the probe
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    /// Toggle the probe
    pub fn toggle(&self) {
        self.enabled.fetch_xor(true, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> CheckResult {
        if self.is_enabled() {
            Ok(None)
        } else {
            Err(HealthError::failure(format!("{} is disabled", self.name)))
        }
    }

    /// Blocking work reading the shared state
    pub fn work(&self) -> Work {
        let probe = self.clone();
        Work::blocking(move || probe.check())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual() {
        let probe = Manual::new("test", true);
        assert_eq!(probe.name(), "test");

        assert!(probe.check().is_ok());
        probe.disable();
        assert!(probe.check().is_err());
        probe.enable();
        assert!(probe.check().is_ok());
        probe.toggle();
        assert!(probe.check().is_err());
        probe.toggle();
        assert!(probe.check().is_ok());
    }

    // Test that clone of Manual refers to same state
    #[test]
    fn test_manual_clone() {
        let probe = Manual::new("test", true);
        let probe2 = probe.clone();

        assert!(probe2.is_enabled());
        probe.disable();
        assert!(!probe2.is_enabled());

        match probe2.check() {
            Err(HealthError::Failure(msg)) => assert_eq!(msg, "test is disabled"),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn work_follows_state() {
        let probe = Manual::new("maintenance", true);
        let work = probe.work();

        match &work {
            Work::Blocking(work) => {
                assert!(work().is_ok());
                probe.toggle();
                assert!(work().is_err());
            }
            Work::Suspending(_) => panic!("expected blocking work"),
        }
    }
}
