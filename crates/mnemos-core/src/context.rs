//! Deadline and cancellation context threaded through long-running operations.
//!
//! [`CancelToken`] is a cheap cloneable flag: the hot path (`is_cancelled`) is a
//! lock-free atomic load, and waiters park on a [`Notify`]. [`OperationContext`]
//! pairs a token with an optional deadline and wraps futures so they resolve to
//! [`Error::Timeout`] or [`Error::Cancelled`] instead of running unbounded.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel every operation observing this token. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Check the flag (hot path, lock-free).
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Relaxed)
    }

    /// Resolve once the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking so a concurrent cancel() is not missed.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Deadline plus cancellation token for one logical operation.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    deadline: Option<Instant>,
    token: CancelToken,
}

impl OperationContext {
    /// Context without a deadline and with a fresh token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that expires `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            token: CancelToken::new(),
        }
    }

    /// Replace the deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Observe an externally owned token.
    pub fn with_token(mut self, token: CancelToken) -> Self {
        self.token = token;
        self
    }

    /// Derive a context sharing this token whose deadline is the earlier of
    /// the current one and `timeout` from now.
    pub fn child(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            deadline: Some(deadline),
            token: self.token.clone(),
        }
    }

    /// The cancellation token.
    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline (`None` when unbounded).
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Fail fast if the operation is already cancelled or past its deadline.
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(Error::Cancelled(operation.to_string()));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::Timeout(format!("{} exceeded its deadline", operation)));
            }
        }
        Ok(())
    }

    /// Run `fut` under this context's deadline and token.
    pub async fn run<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check(operation)?;

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => Err(Error::Cancelled(operation.to_string())),
                    outcome = tokio::time::timeout_at(deadline, fut) => match outcome {
                        Ok(result) => result,
                        Err(_) => Err(Error::Timeout(format!("{} exceeded its deadline", operation))),
                    },
                }
            }
            None => {
                tokio::select! {
                    biased;
                    _ = self.token.cancelled() => Err(Error::Cancelled(operation.to_string())),
                    result = fut => result,
                }
            }
        }
    }
}
