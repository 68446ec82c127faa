//! Keyed store of [CheckDefinition]s
//!
//! A [Registry] is a cheap handle; clones share the same entries. The entries live behind a
//! copy-on-write `Arc` so that a run takes a [Snapshot] once and is never affected by
//! registrations racing with it.
//!
//! A process-wide default registry is created lazily by [global] and can be swapped for an
//! explicitly constructed one with [init] or emptied with [reset].

use std::{
    fmt,
    future::Future,
    sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use log::{debug, warn};

use crate::{
    check::{CheckDefinition, CheckResult, Work},
    error::HealthError,
};

type Entries = Arc<Vec<Arc<CheckDefinition>>>;

/// Consistent view of the registry at one point in time
#[derive(Debug, Clone, Default)]
pub struct Snapshot(Entries);

impl Snapshot {
    /// Lookup a check by name
    pub fn get(&self, name: &str) -> Result<Arc<CheckDefinition>, HealthError> {
        self.0
            .iter()
            .find(|check| check.name() == name)
            .cloned()
            .ok_or_else(|| HealthError::configuration(format!("unknown check: {}", name)))
    }

    /// Names in registration order
    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|check| check.name().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CheckDefinition>> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Registry of named checks, insertion order is preserved
///
/// Registering a name that already exists replaces the previous definition in place.
#[derive(Clone, Default)]
pub struct Registry {
    entries: Arc<RwLock<Entries>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // A writer never leaves the entries half updated, so a poisoned lock is still usable
    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register work under a name, replacing any existing check of that name
    pub fn register<S: Into<String>>(
        &self,
        name: S,
        work: Work,
        timeout: Option<Duration>,
    ) -> Result<Arc<CheckDefinition>, HealthError> {
        let mut check = CheckDefinition::new(name, work)?;
        if let Some(timeout) = timeout {
            check = check.with_timeout(timeout);
        }
        Ok(self.insert(check))
    }

    /// Insert an already built definition
    pub fn insert(&self, check: CheckDefinition) -> Arc<CheckDefinition> {
        let check = Arc::new(check);
        let mut guard = self.write();
        let entries = Arc::make_mut(&mut *guard);

        match entries.iter().position(|entry| entry.name() == check.name()) {
            Some(index) => {
                warn!("Replacing health check: {}", check.name());
                entries[index] = check.clone();
            }
            None => {
                debug!("Registered health check: {}", check.name());
                entries.push(check.clone());
            }
        }
        check
    }

    /// Start registering a check with a builder
    ///
    /// ```
    /// use std::time::Duration;
    /// use healthcheck::Registry;
    ///
    /// let registry = Registry::new();
    /// registry
    ///     .check("disk")
    ///     .timeout(Duration::from_secs(1))
    ///     .blocking(|| Ok(Some("plenty of space".to_string())))
    ///     .unwrap();
    /// assert_eq!(registry.list_names(), vec!["disk"]);
    /// ```
    pub fn check<S: Into<String>>(&self, name: S) -> CheckBuilder<'_> {
        CheckBuilder {
            registry: self,
            name: name.into(),
            timeout: None,
        }
    }

    /// Remove a check, returns false when no check of that name was registered
    pub fn unregister(&self, name: &str) -> bool {
        let mut guard = self.write();
        if !guard.iter().any(|check| check.name() == name) {
            return false;
        }
        Arc::make_mut(&mut *guard).retain(|check| check.name() != name);
        debug!("Unregistered health check: {}", name);
        true
    }

    pub fn get(&self, name: &str) -> Result<Arc<CheckDefinition>, HealthError> {
        self.snapshot().get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().iter().any(|check| check.name() == name)
    }

    /// Names in registration order
    pub fn list_names(&self) -> Vec<String> {
        self.snapshot().names()
    }

    pub fn clear(&self) {
        *self.write() = Arc::default();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Take a consistent view of the current entries
    pub fn snapshot(&self) -> Snapshot {
        Snapshot(self.read().clone())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.list_names()).finish()
    }
}

/// Handle returned by [Registry::check] to finish a registration
#[must_use = "a check is only registered once blocking, suspending or work is called"]
pub struct CheckBuilder<'a> {
    registry: &'a Registry,
    name: String,
    timeout: Option<Duration>,
}

impl<'a> CheckBuilder<'a> {
    /// Override the run's global timeout for this check
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn work(self, work: Work) -> Result<Arc<CheckDefinition>, HealthError> {
        self.registry.register(self.name, work, self.timeout)
    }

    pub fn blocking<F>(self, work: F) -> Result<Arc<CheckDefinition>, HealthError>
    where
        F: Fn() -> CheckResult + Send + Sync + 'static,
    {
        self.work(Work::blocking(work))
    }

    pub fn suspending<F, Fut>(self, work: F) -> Result<Arc<CheckDefinition>, HealthError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CheckResult> + Send + 'static,
    {
        self.work(Work::suspending(work))
    }
}

static GLOBAL: OnceLock<RwLock<Registry>> = OnceLock::new();

fn global_slot() -> &'static RwLock<Registry> {
    GLOBAL.get_or_init(|| RwLock::new(Registry::new()))
}

/// The process-wide registry, created empty on first use
pub fn global() -> Registry {
    global_slot()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Replace the process-wide registry, returning the previous one
pub fn init(registry: Registry) -> Registry {
    let mut slot = global_slot().write().unwrap_or_else(PoisonError::into_inner);
    std::mem::replace(&mut *slot, registry)
}

/// Replace the process-wide registry with an empty one
pub fn reset() {
    init(Registry::new());
}
