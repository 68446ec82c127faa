//! Built-in probes
//!
//! Probes are the thin collaborators that do the actual talking to a dependency. Network probes
//! implement the async [Probe] trait and become suspending [Work]; [manual::Manual] and
//! [kick::Kick] are in-process flags and become blocking work.

use std::{fmt, fmt::Debug, str::FromStr, sync::Arc};

use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::{
    check::{CheckResult, Work},
    error::HealthError,
};

pub mod elasticsearch;
pub mod http;
pub mod kick;
pub mod manual;
pub mod tcp;

pub use elasticsearch::ElasticsearchProbe;
pub use http::{ExpectedStatus, HttpProbe};
pub use kick::Kick;
pub use manual::Manual;
pub use tcp::TcpProbe;

/// A probe of an external dependency
///
/// Every resource a probe opens must be owned by the future returned from [Probe::probe], so
/// that dropping the future on timeout releases it.
#[async_trait]
pub trait Probe: Debug + Send + Sync {
    /// What is being probed, for logging
    fn target(&self) -> String;

    async fn probe(&self) -> CheckResult;
}

impl Work {
    /// Suspending work that runs the probe on every invocation
    pub fn from_probe<P: Probe + 'static>(probe: P) -> Self {
        let probe = Arc::new(probe);
        Work::Suspending(Arc::new(move || {
            let probe = probe.clone();
            async move { probe.probe().await }.boxed()
        }))
    }
}

/// Kinds of check that can be created from configuration or the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    Http,
    Tcp,
    Postgres,
    Mysql,
    Redis,
    Mongodb,
    Elasticsearch,
}

impl CheckKind {
    pub const ALL: [CheckKind; 7] = [
        CheckKind::Postgres,
        CheckKind::Mysql,
        CheckKind::Redis,
        CheckKind::Mongodb,
        CheckKind::Elasticsearch,
        CheckKind::Http,
        CheckKind::Tcp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::Http => "http",
            CheckKind::Tcp => "tcp",
            CheckKind::Postgres => "postgres",
            CheckKind::Mysql => "mysql",
            CheckKind::Redis => "redis",
            CheckKind::Mongodb => "mongodb",
            CheckKind::Elasticsearch => "elasticsearch",
        }
    }

    /// Port used when a connection string does not name one
    pub fn default_port(&self) -> Option<u16> {
        match self {
            CheckKind::Postgres => Some(5432),
            CheckKind::Mysql => Some(3306),
            CheckKind::Redis => Some(6379),
            CheckKind::Mongodb => Some(27017),
            CheckKind::Elasticsearch => Some(9200),
            CheckKind::Http | CheckKind::Tcp => None,
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckKind {
    type Err = HealthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CheckKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let available: Vec<_> = CheckKind::ALL.iter().map(|kind| kind.as_str()).collect();
                HealthError::configuration(format!(
                    "Unknown check type: {}. Available types: {}",
                    s,
                    available.join(", ")
                ))
            })
    }
}

/// Build the work for a kind of check against a target (URL or `host:port`)
///
/// Databases and caches are probed for reachability over TCP; elasticsearch is asked for its
/// cluster health over HTTP and fails when the cluster is red.
pub fn from_spec(kind: CheckKind, target: &str) -> Result<Work, HealthError> {
    let work = match kind {
        CheckKind::Http => Work::from_probe(HttpProbe::new(target)?),
        CheckKind::Elasticsearch => Work::from_probe(ElasticsearchProbe::new(target)?),
        CheckKind::Tcp
        | CheckKind::Postgres
        | CheckKind::Mysql
        | CheckKind::Redis
        | CheckKind::Mongodb => Work::from_probe(TcpProbe::parse(target, kind.default_port())?),
    };
    Ok(work)
}
