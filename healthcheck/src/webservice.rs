//! HTTP surface for health runs
//!
//! `GET /<prefix>` runs every registered check, `GET /<prefix>/<name>` runs one and
//! `GET /<prefix>/version` describes the service. Reports are answered with 200 when ok and
//! 503 otherwise.
//!
//! Check names in the path are percent-decoded. A check named `version` cannot be run on its
//! own here since that segment is taken by the version route.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread::{self, JoinHandle},
};

use log::{error, info};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use warp::{http::StatusCode, Filter};

use crate::{
    config::HealthConfig,
    error::{panic_message, HealthError},
    executor::{Executor, RunOptions},
    report::{Report, Status},
    tokio_tools::run_in_tokio,
};

/// Everything a request handler needs, cloned into each request
#[derive(Debug, Clone)]
struct ServiceState {
    name: String,
    executor: Executor,
    options: RunOptions,
}

/// Build the health routes for `executor` as configured
///
/// The prefix must be a single non-empty path segment.
pub fn health_service(
    executor: Executor,
    config: &HealthConfig,
) -> Result<impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone, HealthError>
{
    let prefix = config.prefix.trim_matches('/').to_string();
    if prefix.is_empty() || prefix.contains('/') {
        return Err(HealthError::configuration(format!(
            "Invalid route prefix: '{}'",
            config.prefix
        )));
    }

    let state = ServiceState {
        name: config.name.clone(),
        executor,
        options: config.run_options(),
    };

    let version = warp::path("version")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::version);

    let all = warp::path::end()
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::run_all);

    let one = warp::path::param::<String>()
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state))
        .and_then(handlers::run_one);

    Ok(warp::path(prefix).and(version.or(all).or(one)))
}

fn with_state(
    state: ServiceState,
) -> impl Filter<Extract = (ServiceState,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || state.clone())
}

impl warp::Reply for Report {
    fn into_response(self) -> warp::reply::Response {
        let code = if self.is_ok() {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        warp::reply::with_status(warp::reply::json(&self), code).into_response()
    }
}

/// Body returned when a run could not start
#[derive(Serialize, Debug)]
struct ErrorReply {
    status: Status,
    details: ErrorDetails,
}

#[derive(Serialize, Debug)]
struct ErrorDetails {
    error: String,
}

impl warp::Reply for ErrorReply {
    fn into_response(self) -> warp::reply::Response {
        warp::reply::with_status(warp::reply::json(&self), StatusCode::SERVICE_UNAVAILABLE)
            .into_response()
    }
}

mod handlers {
    use std::convert::Infallible;

    use log::error;
    use percent_encoding::percent_decode_str;
    use serde::Serialize;
    use warp::Reply;

    use super::{ErrorDetails, ErrorReply, ServiceState};
    use crate::{executor::RunOptions, report::Status};

    /// Reply structure for Version response
    #[derive(Serialize)]
    struct VersionReply {
        name: String,
        package: String,
        version: String,
    }

    /// Handler for version endpoint
    pub async fn version(state: ServiceState) -> Result<impl warp::Reply, Infallible> {
        Ok(warp::reply::json(&VersionReply {
            name: state.name,
            package: crate::NAME.to_string(),
            version: crate::VERSION.to_string(),
        }))
    }

    pub async fn run_all(state: ServiceState) -> Result<warp::reply::Response, Infallible> {
        Ok(run(state, vec![]).await)
    }

    pub async fn run_one(
        name: String,
        state: ServiceState,
    ) -> Result<warp::reply::Response, Infallible> {
        let name = percent_decode_str(&name).decode_utf8_lossy().into_owned();
        Ok(run(state, vec![name]).await)
    }

    async fn run(state: ServiceState, names: Vec<String>) -> warp::reply::Response {
        let options = RunOptions {
            names,
            ..state.options.clone()
        };
        match state.executor.run(&options).await {
            Ok(report) => report.into_response(),
            Err(err) => {
                error!("Health run for {:?} failed: {}", options.names, err);
                ErrorReply {
                    status: Status::Fail,
                    details: ErrorDetails {
                        error: err.to_string(),
                    },
                }
                .into_response()
            }
        }
    }
}

/// Serve the health routes until `shutdown` is cancelled
pub async fn serve(
    executor: Executor,
    config: &HealthConfig,
    shutdown: CancellationToken,
) -> Result<(), HealthError> {
    let api = health_service(executor, config)?.with(warp::log("healthcheck"));

    let (addr, server) = warp::serve(api)
        .try_bind_with_graceful_shutdown(config.address, async move {
            shutdown.cancelled().await;
            info!("Shutting down health service");
        })?;

    info!("Serving health for {} on http://{}", config.name, addr);
    server.await;
    Ok(())
}

/// Web service running on its own thread and runtime, stopped via a [CancellationToken]
#[derive(Debug, Clone)]
pub struct HealthService {
    /// Name for the service
    pub name: String,
    executor: Executor,
    config: HealthConfig,
    /// joinhandle to wait when shutting down service
    thread_jh: Arc<Mutex<Option<JoinHandle<Result<(), HealthError>>>>>,
    /// Value to indicate if service is running
    running: Arc<AtomicBool>,
    /// Cancellation token to enable easy shutdown
    ct: CancellationToken,
}

impl HealthService {
    pub fn new(executor: Executor, config: HealthConfig) -> Self {
        Self {
            name: config.name.clone(),
            executor,
            config,
            thread_jh: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            ct: CancellationToken::new(),
        }
    }

    fn get_thread(&self) -> MutexGuard<'_, Option<JoinHandle<Result<(), HealthError>>>> {
        self.thread_jh.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Token that stops the service when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.ct.clone()
    }

    pub fn start(&self) -> Result<(), HealthError> {
        if self.running.swap(true, Ordering::Relaxed) {
            return Err(HealthError::configuration(format!(
                "health service {} already started",
                self.name
            )));
        }
        info!("started health service {}", self.name);

        let executor = self.executor.clone();
        let config = self.config.clone();
        let ct = self.ct.clone();
        let running = self.running.clone();

        let spawned = thread::Builder::new()
            .name(format!("health-{}", self.name))
            .spawn(move || {
                let reply = run_in_tokio(serve(executor, &config, ct));
                if let Err(err) = &reply {
                    error!("health service stopped with error: {}", err);
                }
                running.store(false, Ordering::Relaxed);
                reply
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(err) => {
                self.running.store(false, Ordering::Relaxed);
                return Err(err.into());
            }
        };

        *self.get_thread() = Some(handle);
        Ok(())
    }

    /// Cancel the service and wait for its thread, reporting how it ended
    pub fn stop(&self) -> Result<(), HealthError> {
        info!("Stopping health service {}", self.name);
        self.ct.cancel();

        let handle = self.get_thread().take().ok_or_else(|| {
            HealthError::configuration(format!("health service {} not started", self.name))
        })?;

        handle
            .join()
            .map_err(|payload| HealthError::Unexpected(panic_message(payload.as_ref())))?
    }
}
