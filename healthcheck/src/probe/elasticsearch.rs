//! Elasticsearch cluster health: reachable over HTTP and not red

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{HttpProbe, Probe};
use crate::{check::CheckResult, error::HealthError};

/// The part of `_cluster/health` that decides the outcome
#[derive(Debug, Deserialize)]
struct ClusterHealth {
    #[serde(default)]
    cluster_name: Option<String>,
    status: String,
}

#[derive(Debug, Clone)]
pub struct ElasticsearchProbe {
    http: HttpProbe,
}

impl ElasticsearchProbe {
    /// Probe the cluster behind `url`, eg `http://user:pass@es:9200`
    pub fn new(url: &str) -> Result<Self, HealthError> {
        Ok(Self {
            http: HttpProbe::new(&format!("{}/_cluster/health", url.trim_end_matches('/')))?,
        })
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.http = self.http.timeout(timeout);
        self
    }

    fn evaluate(body: &str) -> CheckResult {
        let health: ClusterHealth = serde_json::from_str(body).map_err(|err| {
            HealthError::failure(format!("Elasticsearch health check failed: {}", err))
        })?;

        if health.status == "red" {
            return Err(HealthError::failure(format!(
                "Elasticsearch cluster is unhealthy: {}",
                health.status
            )));
        }
        Ok(Some(format!(
            "cluster {} is {}",
            health.cluster_name.as_deref().unwrap_or("unnamed"),
            health.status
        )))
    }
}

#[async_trait]
impl Probe for ElasticsearchProbe {
    fn target(&self) -> String {
        self.http.target()
    }

    async fn probe(&self) -> CheckResult {
        let response = self.http.send().await?;
        self.http.check_status(response.status().as_u16())?;
        let body = self.http.body(response).await?;
        Self::evaluate(&body)
    }
}
