//! Module to handle easy sending functions to tokio
//!
//! run_in_tokio creates a current thread runtime and drives the future to completion.
//! run_in_tokio_with_cancel additionally takes a CancellationToken which can be used to abandon the future.

use crate::error::HealthError;
use futures::Future;
use log::{error, info};

use tokio_util::sync::CancellationToken;

/// run async function inside tokio instance on current thread
///
/// The runtime is shut down in the background once the future completes, so detached
/// blocking workers that are still running never delay the return.
/// Calling this from inside a runtime is a configuration error.
pub fn run_in_tokio<F, T>(my_function: F) -> Result<T, HealthError>
where
    F: Future<Output = Result<T, HealthError>>,
{
    if tokio::runtime::Handle::try_current().is_ok() {
        return Err(HealthError::configuration(
            "cannot start a blocking run from inside a tokio runtime",
        ));
    }

    info!("starting Tokio");

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let reply = rt.block_on(my_function);
    rt.shutdown_background();
    reply
}

/// Run async with cancellability via CancellationToken
pub fn run_in_tokio_with_cancel<F, T>(cancel: CancellationToken, my_function: F) -> F::Output
where
    F: Future<Output = Result<T, HealthError>>,
{
    run_in_tokio(async {
        tokio::select! {
            _ = cancel.cancelled() => {
                error!("Token cancelled");
                Err(HealthError::Cancelled)
            },
            z = my_function => {
                info!("Completed function");
                z
            },
        }
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn runs_to_completion() {
        let reply = run_in_tokio(async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(7)
        });
        assert_eq!(reply.unwrap(), 7);
    }

    #[test]
    fn cancel_stops_the_future() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let reply: Result<(), HealthError> =
            run_in_tokio_with_cancel(cancel, std::future::pending());
        assert!(matches!(reply, Err(HealthError::Cancelled)));
    }

    #[tokio::test]
    async fn refuses_nested_runtime() {
        let reply = run_in_tokio(async { Ok(()) });
        assert!(matches!(reply, Err(HealthError::Configuration(_))));
    }
}
