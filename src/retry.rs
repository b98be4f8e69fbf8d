//! Bounded polling for asynchronous side effects
//!
//! systemd creates a scope's cgroup some time after StartTransientUnit
//! returns. Anything that needs to observe the cgroup polls with a
//! [`Backoff`] built from a [`RetryPolicy`], which gives up after the
//! policy's timeout or once its [`CancelToken`] fires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{Result, ScopeError};

/// Exponential backoff parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u32,
    /// `None` waits forever
    pub timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(100),
            multiplier: 2,
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl RetryPolicy {
    /// Poll until the condition holds, however long that takes
    pub fn unbounded() -> Self {
        Self {
            timeout: None,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn start(&self, what: impl Into<String>, cancel: &CancelToken) -> Backoff {
        Backoff {
            policy: self.clone(),
            what: what.into(),
            cancel: cancel.clone(),
            started: Instant::now(),
            next_delay: self.initial_delay,
            attempts: 0,
        }
    }
}

/// Shared flag to abandon a wait from another thread
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One polling loop in progress
#[derive(Debug)]
pub struct Backoff {
    policy: RetryPolicy,
    what: String,
    cancel: CancelToken,
    started: Instant,
    next_delay: Duration,
    attempts: u32,
}

impl Backoff {
    /// Sleep before the next attempt.
    ///
    /// Fails with `Timeout` once the policy's deadline has passed and with
    /// `Cancelled` when the token fires.
    pub fn wait(&mut self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ScopeError::Cancelled(self.what.clone()));
        }

        let elapsed = self.started.elapsed();
        let mut delay = self.next_delay;
        if let Some(timeout) = self.policy.timeout {
            if elapsed >= timeout {
                return Err(ScopeError::Timeout {
                    what: self.what.clone(),
                    waited: elapsed,
                });
            }
            delay = delay.min(timeout - elapsed);
        }

        std::thread::sleep(delay);
        self.attempts += 1;
        self.next_delay = self
            .next_delay
            .saturating_mul(self.policy.multiplier.max(1))
            .min(self.policy.max_delay);

        if self.cancel.is_cancelled() {
            return Err(ScopeError::Cancelled(self.what.clone()));
        }
        Ok(())
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick(timeout: Option<Duration>) -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            multiplier: 2,
            timeout,
        }
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let cancel = CancelToken::new();
        let mut backoff = quick(None).start("test", &cancel);
        assert_eq!(backoff.next_delay, Duration::from_millis(1));
        backoff.wait().unwrap();
        assert_eq!(backoff.next_delay, Duration::from_millis(2));
        backoff.wait().unwrap();
        assert_eq!(backoff.next_delay, Duration::from_millis(4));
        backoff.wait().unwrap();
        assert_eq!(backoff.next_delay, Duration::from_millis(4));
        assert_eq!(backoff.attempts(), 3);
    }

    #[test]
    fn test_times_out() {
        let cancel = CancelToken::new();
        let mut backoff = quick(Some(Duration::from_millis(20))).start("cgroup", &cancel);
        let err = loop {
            if let Err(e) = backoff.wait() {
                break e;
            }
        };
        assert!(matches!(err, ScopeError::Timeout { ref what, .. } if what == "cgroup"));
        assert!(backoff.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_cancelled_before_wait() {
        let cancel = CancelToken::new();
        let mut backoff = quick(None).start("cgroup", &cancel);
        cancel.cancel();
        assert!(matches!(backoff.wait(), Err(ScopeError::Cancelled(_))));
    }

    #[test]
    fn test_cancel_from_other_thread() {
        let cancel = CancelToken::new();
        let mut backoff = quick(None).start("cgroup", &cancel);
        let remote = cancel.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            remote.cancel();
        });
        let err = loop {
            if let Err(e) = backoff.wait() {
                break e;
            }
        };
        handle.join().unwrap();
        assert!(matches!(err, ScopeError::Cancelled(_)));
    }

    #[test]
    fn test_default_policy_is_bounded() {
        assert!(RetryPolicy::default().timeout.is_some());
        assert!(RetryPolicy::unbounded().timeout.is_none());
    }
}
