//! Caller-supplied cancellation and deadlines for long-running operations.
//!
//! A [`CancelToken`] fires either when its [`CancelHandle`] is triggered or when
//! its deadline passes. Work wrapped in [`CancelToken::run`] is dropped at that
//! point, which aborts any in-flight HTTP request it owns.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// The token fired before the wrapped work finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Trigger side of a cancellation pair.
#[derive(Debug)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Cancel every token created from this handle.
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

/// Observer side of a cancellation pair; cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelToken {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// Create a linked handle and token.
    pub fn new() -> (CancelHandle, CancelToken) {
        let token = CancellationToken::new();
        (
            CancelHandle {
                token: token.clone(),
            },
            CancelToken {
                token,
                deadline: None,
            },
        )
    }

    /// A token that only fires if a deadline is added to it.
    pub fn never() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Same token, additionally firing once `timeout` has elapsed from now.
    ///
    /// An earlier existing deadline is kept.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    /// Whether the token has already fired.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled() || self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    /// Resolve once the token fires; pending forever if it never can.
    pub async fn cancelled(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }

    /// Drive `work` to completion unless the token fires first.
    pub async fn run<F: Future>(&self, work: F) -> Result<F::Output, Cancelled> {
        if self.is_cancelled() {
            return Err(Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(Cancelled),
            output = work => Ok(output),
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::never()
    }
}
