//! Backoff and polling policies for the waiters.
//!
//! Both policies are explicit immutable values passed into each waiter
//! call rather than process-wide defaults, so tests can inject fast,
//! deterministic variants.

use std::time::Duration;

use rand::Rng;

/// Exponential backoff policy shared by all "wait for status" loops.
///
/// The waiter polls exactly `steps` times; between polls it sleeps the
/// current interval plus a jitter fraction, then multiplies the interval
/// by `factor`, capped at `cap`.
#[derive(Clone, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Number of polls before giving up
    pub steps: u32,
    /// Delay before the second poll
    pub initial_interval: Duration,
    /// Multiplier applied to the interval after each poll
    pub factor: f64,
    /// Jitter fraction added on top of each interval (0.0 = none)
    pub jitter: f64,
    /// Upper bound on the interval
    pub cap: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            steps: 10,
            initial_interval: Duration::from_secs(2),
            factor: 1.5,
            jitter: 0.1,
            cap: Duration::from_secs(30),
        }
    }
}

impl BackoffPolicy {
    /// A near-instant policy for tests
    pub fn fast() -> Self {
        Self {
            steps: 5,
            initial_interval: Duration::from_millis(1),
            factor: 1.0,
            jitter: 0.0,
            cap: Duration::from_millis(2),
        }
    }

    /// The jittered sleep interval for the given zero-based step
    pub fn interval_for(&self, step: u32) -> Duration {
        let base = self.initial_interval.as_secs_f64() * self.factor.powi(step as i32);
        let capped = base.min(self.cap.as_secs_f64());
        let jittered = if self.jitter > 0.0 {
            capped * (1.0 + self.jitter * rand::thread_rng().gen_range(0.0..1.0))
        } else {
            capped
        };
        Duration::from_secs_f64(jittered)
    }
}

/// Fixed-interval polling policy for delete-confirmation loops.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeletePollPolicy {
    /// Total budget for the delete to go through
    pub timeout: Duration,
    /// Delay between attempts
    pub interval: Duration,
}

impl DeletePollPolicy {
    /// Policy for port deletion
    pub fn port() -> Self {
        Self {
            timeout: Duration::from_secs(3 * 60),
            interval: Duration::from_secs(5),
        }
    }

    /// Policy for trunk deletion
    pub fn trunk() -> Self {
        Self {
            timeout: Duration::from_secs(3 * 60),
            interval: Duration::from_secs(5),
        }
    }

    /// Policy for subport detachment, which is slower than port teardown
    pub fn subport_removal() -> Self {
        Self {
            timeout: Duration::from_secs(5 * 60),
            interval: Duration::from_secs(30),
        }
    }

    /// A near-instant policy for tests
    pub fn fast() -> Self {
        Self {
            timeout: Duration::from_millis(50),
            interval: Duration::from_millis(1),
        }
    }
}
