//! Per-call deadline and cancellation policy.
//!
//! Every remote engine call runs through [`CallPolicy::run`], which bounds
//! it by an optional timeout and aborts it when the associated
//! [`CancelHandle`] fires. Stop's grace period is one instance of this
//! policy, see [`StopTimeout`].

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

use crate::error::HarnessError;

/// Default bound for a single engine call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Default grace period for stopping a container before it is killed.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// Grace period for [`crate::Container::stop`].
///
/// There is no unbounded variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopTimeout {
    /// Three minutes, enough for a ledger node to flush its state.
    #[default]
    Default,
    /// Caller-chosen grace period.
    Explicit(Duration),
}

impl StopTimeout {
    /// The grace period the engine is given.
    pub fn grace(self) -> Duration {
        match self {
            StopTimeout::Default => DEFAULT_STOP_TIMEOUT,
            StopTimeout::Explicit(grace) => grace,
        }
    }
}

impl From<Duration> for StopTimeout {
    fn from(grace: Duration) -> Self {
        StopTimeout::Explicit(grace)
    }
}

/// Owner side of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Observer side of a cancellation signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelHandle {
    /// Create a handle and its first signal.
    pub fn pair() -> (Self, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, CancelSignal { rx })
    }

    /// Another signal observing this handle.
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Cancel every call observing this handle, now and in the future.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl CancelSignal {
    /// True once the handle has cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves when the handle cancels. Never resolves if the handle is
    /// dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Deadline and cancellation applied to each engine call.
#[derive(Debug, Clone)]
pub struct CallPolicy {
    timeout: Option<Duration>,
    cancel: Option<CancelSignal>,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_CALL_TIMEOUT),
            cancel: None,
        }
    }
}

impl CallPolicy {
    /// Policy with the given per-call timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            cancel: None,
        }
    }

    /// Policy without a timeout. Calls wait as long as the engine does.
    pub fn unbounded() -> Self {
        Self {
            timeout: None,
            cancel: None,
        }
    }

    /// Attach a cancellation signal.
    pub fn cancel_on(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    /// The per-call timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The attached cancellation signal, if any.
    pub fn cancel_signal(&self) -> Option<&CancelSignal> {
        self.cancel.as_ref()
    }

    /// Policy for a call that legitimately takes `extra` on top of the
    /// normal round trip, e.g. a stop with a grace period.
    pub fn extended_by(&self, extra: Duration) -> Self {
        Self {
            timeout: self.timeout.map(|t| t.saturating_add(extra)),
            cancel: self.cancel.clone(),
        }
    }

    /// Run `fut` under this policy.
    pub async fn run<T, F>(&self, op: &'static str, fut: F) -> Result<T, HarnessError>
    where
        F: Future<Output = Result<T, HarnessError>>,
    {
        let bounded = async {
            match self.timeout {
                Some(after) => match tokio::time::timeout(after, fut).await {
                    Ok(result) => result,
                    Err(_) => Err(HarnessError::Timeout { op, after }),
                },
                None => fut.await,
            }
        };

        match &self.cancel {
            Some(signal) => {
                if signal.is_cancelled() {
                    return Err(HarnessError::Cancelled { op });
                }
                tokio::select! {
                    result = bounded => result,
                    _ = signal.cancelled() => Err(HarnessError::Cancelled { op }),
                }
            }
            None => bounded.await,
        }
    }
}
