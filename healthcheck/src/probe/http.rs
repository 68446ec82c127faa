//! Probe an HTTP endpoint for status and optionally content

use std::{fmt, ops::RangeInclusive, time::Duration};

use async_trait::async_trait;
use reqwest::Method;
use url::Url;

use super::Probe;
use crate::{check::CheckResult, error::HealthError};

/// Status codes accepted as healthy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedStatus {
    Code(u16),
    Range(RangeInclusive<u16>),
}

impl ExpectedStatus {
    pub fn matches(&self, code: u16) -> bool {
        match self {
            ExpectedStatus::Code(expected) => *expected == code,
            ExpectedStatus::Range(range) => range.contains(&code),
        }
    }
}

impl Default for ExpectedStatus {
    fn default() -> Self {
        ExpectedStatus::Code(200)
    }
}

impl fmt::Display for ExpectedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedStatus::Code(code) => write!(f, "{}", code),
            ExpectedStatus::Range(range) => write!(f, "in {}..={}", range.start(), range.end()),
        }
    }
}

/// Request a URL and compare the reply with what is expected
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: Url,
    method: Method,
    headers: Vec<(String, String)>,
    expected_status: ExpectedStatus,
    expected_content: Option<String>,
    timeout: Duration,
}

impl HttpProbe {
    /// Probe with GET expecting a 200, the URL must be http or https
    pub fn new(url: &str) -> Result<Self, HealthError> {
        let url = Url::parse(url)
            .map_err(|err| HealthError::configuration(format!("Invalid URL {}: {}", url, err)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HealthError::configuration(format!(
                "Unsupported scheme for HTTP check: {}",
                url.scheme()
            )));
        }
        Ok(Self {
            url,
            method: Method::GET,
            headers: vec![],
            expected_status: ExpectedStatus::default(),
            expected_content: None,
            timeout: Duration::from_secs(5),
        })
    }

    pub fn method(mut self, method: &str) -> Result<Self, HealthError> {
        self.method = Method::from_bytes(method.to_ascii_uppercase().as_bytes()).map_err(|_| {
            HealthError::configuration(format!("Invalid HTTP method: {}", method))
        })?;
        Ok(self)
    }

    pub fn header<K: Into<String>, V: Into<String>>(mut self, name: K, value: V) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn expect_status(mut self, expected: ExpectedStatus) -> Self {
        self.expected_status = expected;
        self
    }

    /// Require the body to contain this text
    pub fn expect_content<S: Into<String>>(mut self, content: S) -> Self {
        self.expected_content = Some(content.into());
        self
    }

    /// Request timeout, independent of the executor's timeout for the check
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn classify(&self, err: reqwest::Error) -> HealthError {
        if err.is_timeout() {
            HealthError::timeout(format!(
                "HTTP request to {} timed out after {:?}",
                self.url, self.timeout
            ))
        } else if err.is_connect() {
            HealthError::connection(format!("Failed to connect to {}: {}", self.url, err))
        } else {
            HealthError::failure(format!("HTTP request to {} failed: {}", self.url, err))
        }
    }
}

impl HttpProbe {
    /// Send the request, transport errors are classified into the taxonomy
    pub(crate) async fn send(&self) -> Result<reqwest::Response, HealthError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|err| {
                HealthError::configuration(format!("Failed to build HTTP client: {}", err))
            })?;

        let mut request = client.request(self.method.clone(), self.url.clone());
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        request.send().await.map_err(|err| self.classify(err))
    }

    pub(crate) fn check_status(&self, code: u16) -> Result<(), HealthError> {
        if self.expected_status.matches(code) {
            Ok(())
        } else {
            Err(HealthError::failure(format!(
                "Expected status {}, got {}",
                self.expected_status, code
            )))
        }
    }

    pub(crate) async fn body(&self, response: reqwest::Response) -> Result<String, HealthError> {
        response.text().await.map_err(|err| self.classify(err))
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn target(&self) -> String {
        format!("{} {}", self.method, self.url)
    }

    async fn probe(&self) -> CheckResult {
        let response = self.send().await?;

        let code = response.status().as_u16();
        self.check_status(code)?;

        if let Some(expected) = &self.expected_content {
            let body = self.body(response).await?;
            if !body.contains(expected.as_str()) {
                return Err(HealthError::failure(format!(
                    "Expected content '{}' not found in response",
                    expected
                )));
            }
        }

        Ok(Some(format!("HTTP {}", code)))
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;
    use crate::probe::tests::serve_once;

    const HEALTHY: &str =
        "HTTP/1.1 200 OK\r\nContent-Length: 7\r\nConnection: close\r\n\r\nhealthy";
    const UNAVAILABLE: &str =
        "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 4\r\nConnection: close\r\n\r\ndown";

    #[test]
    fn expected_status() {
        assert!(ExpectedStatus::default().matches(200));
        assert!(!ExpectedStatus::default().matches(204));
        assert!(ExpectedStatus::Range(200..=299).matches(204));
        assert!(!ExpectedStatus::Range(200..=299).matches(301));
        assert_eq!(ExpectedStatus::Range(200..=299).to_string(), "in 200..=299");
    }

    #[test]
    fn rejects_bad_urls_and_methods() {
        assert!(matches!(
            HttpProbe::new("localhost"),
            Err(HealthError::Configuration(_))
        ));
        assert!(matches!(
            HttpProbe::new("ftp://example.com"),
            Err(HealthError::Configuration(_))
        ));
        assert!(matches!(
            HttpProbe::new("http://example.com").unwrap().method("NOT A METHOD"),
            Err(HealthError::Configuration(_))
        ));
        let probe = HttpProbe::new("http://example.com/health")
            .unwrap()
            .method("head")
            .unwrap();
        assert_eq!(probe.target(), "HEAD http://example.com/health");
    }

    #[tokio::test]
    async fn healthy_endpoint() {
        let addr = serve_once(HEALTHY).await;
        let probe = HttpProbe::new(&format!("http://{}/health", addr))
            .unwrap()
            .header("x-probe", "healthcheck")
            .expect_content("healthy");

        assert_eq!(probe.probe().await.unwrap().as_deref(), Some("HTTP 200"));
    }

    #[tokio::test]
    async fn unexpected_status_fails() {
        let addr = serve_once(UNAVAILABLE).await;
        let probe = HttpProbe::new(&format!("http://{}/health", addr)).unwrap();

        match probe.probe().await {
            Err(HealthError::Failure(msg)) => assert_eq!(msg, "Expected status 200, got 503"),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[tokio::test]
    async fn status_range_accepts() {
        let addr = serve_once(UNAVAILABLE).await;
        let probe = HttpProbe::new(&format!("http://{}/", addr))
            .unwrap()
            .expect_status(ExpectedStatus::Range(500..=599));

        assert!(probe.probe().await.is_ok());
    }

    #[tokio::test]
    async fn missing_content_fails() {
        let addr = serve_once(HEALTHY).await;
        let probe = HttpProbe::new(&format!("http://{}/", addr))
            .unwrap()
            .expect_content("ready");

        match probe.probe().await {
            Err(HealthError::Failure(msg)) => assert!(msg.contains("'ready' not found")),
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[tokio::test]
    async fn refused_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = HttpProbe::new(&format!("http://{}/", addr)).unwrap();
        assert!(matches!(
            probe.probe().await,
            Err(HealthError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let probe = HttpProbe::new(&format!("http://{}/", addr))
            .unwrap()
            .timeout(Duration::from_millis(100));
        assert!(matches!(probe.probe().await, Err(HealthError::Timeout(_))));
    }
}
