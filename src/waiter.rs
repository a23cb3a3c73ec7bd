//! Blocking waiters for remote state transitions and deletions.
//!
//! These are the only points where the reconciler blocks for an
//! extended, bounded duration. Both loops are plain async code, so the
//! caller's ambient deadline (dropping the future or wrapping it in
//! `tokio::time::timeout`) cancels a stuck wait.

use std::fmt;
use std::future::Future;

use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::backoff::{BackoffPolicy, DeletePollPolicy};
use crate::cloud::CloudResult;
use crate::error::{Error, Result};

/// Poll a resource until its status reaches `target`.
///
/// `fetch` returns the resource's current status. The loop polls
/// exactly `policy.steps` times; a fetch failure aborts immediately
/// unless it is classified transient (conflict/retryable), which counts
/// as an unsuccessful poll. Exhaustion surfaces as a timeout error
/// naming the resource and the target status.
pub async fn wait_for_status<S, F, Fut>(
    resource: &str,
    target: &S,
    policy: &BackoffPolicy,
    mut fetch: F,
) -> Result<()>
where
    S: PartialEq + fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = CloudResult<S>>,
{
    for step in 0..policy.steps {
        match fetch().await {
            Ok(status) if status == *target => {
                debug!(resource = %resource, status = %status, "target status reached");
                return Ok(());
            }
            Ok(status) => {
                debug!(resource = %resource, status = %status, target = %target, "still waiting");
            }
            Err(e) if e.is_retryable() => {
                warn!(resource = %resource, error = %e, "transient fetch failure, will poll again");
            }
            Err(e) => {
                return Err(Error::from(e)
                    .context(format!("fetching status of {resource} while waiting for {target}")));
            }
        }
        if step + 1 < policy.steps {
            sleep(policy.interval_for(step)).await;
        }
    }
    Err(Error::timeout(resource, target.to_string()))
}

/// Repeatedly attempt a delete until it goes through.
///
/// "Not found" is success: the resource is already gone and a double
/// invocation is a no-op. Conflict and retryable failures mean the
/// resource is still tearing down, so the loop polls again after
/// `policy.interval` until `policy.timeout` elapses. Any other failure
/// aborts immediately.
pub async fn wait_for_deleted<F, Fut>(
    resource: &str,
    policy: &DeletePollPolicy,
    mut delete: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CloudResult<()>>,
{
    let deadline = Instant::now() + policy.timeout;
    loop {
        match delete().await {
            Ok(()) => {
                debug!(resource = %resource, "deleted");
                return Ok(());
            }
            Err(e) if e.is_not_found() => {
                debug!(resource = %resource, "already gone");
                return Ok(());
            }
            Err(e) if e.is_retryable() => {
                if Instant::now() + policy.interval > deadline {
                    return Err(Error::timeout(resource, "deleted"));
                }
                warn!(resource = %resource, error = %e, "delete not ready, will retry");
                sleep(policy.interval).await;
            }
            Err(e) => {
                return Err(Error::from(e).context(format!("deleting {resource}")));
            }
        }
    }
}
