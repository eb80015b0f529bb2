//! Bounded polling used to await asynchronous SoftLayer transactions.
//!
//! Every wait takes its limits as a [`WaitSettings`] value so callers decide
//! per call site how long a transaction chain may run. Polls are strictly
//! sequential: the predicate is never invoked again before the previous
//! invocation has resolved.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::debug;

/// Default limit for provisioning and upgrade transactions.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(120 * 60);
/// Default delay between two polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Default limit for an operating system reload.
pub const DEFAULT_RELOAD_TIMEOUT: Duration = Duration::from_secs(4 * 60 * 60);

/// Timeout and polling interval for one wait.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WaitSettings {
    /// Total time the condition may take to hold.
    pub timeout: Duration,
    /// Delay between two polls.
    pub interval: Duration,
}

impl WaitSettings {
    /// Creates settings from explicit limits.
    #[must_use]
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Default settings for an operating system reload.
    #[must_use]
    pub const fn reload() -> Self {
        Self::new(DEFAULT_RELOAD_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self::new(DEFAULT_WAIT_TIMEOUT, DEFAULT_POLL_INTERVAL)
    }
}

/// Raised when a condition does not hold before the timeout elapses.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("timed out after {timeout:?} waiting for {action}")]
pub struct DeadlineExceeded {
    /// Description of the awaited condition.
    pub action: String,
    /// Timeout that elapsed.
    pub timeout: Duration,
}

/// Polls `predicate` until it reports `true`.
///
/// The predicate runs immediately and then once per interval. A predicate
/// error is returned at once without further polling.
///
/// # Errors
///
/// Returns the predicate's error unchanged, or [`DeadlineExceeded`] converted
/// into `E` once `settings.timeout` has elapsed without the condition holding.
pub async fn wait_until<F, Fut, E>(
    settings: WaitSettings,
    action: &str,
    mut predicate: F,
) -> Result<(), E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: From<DeadlineExceeded>,
{
    let deadline = Instant::now() + settings.timeout;
    loop {
        if predicate().await? {
            return Ok(());
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(DeadlineExceeded {
                action: action.to_owned(),
                timeout: settings.timeout,
            }
            .into());
        }

        debug!(action, "condition not met yet; polling again");
        sleep(settings.interval.min(deadline - now)).await;
    }
}
