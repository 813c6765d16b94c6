//! Request-scoped cancellation.
//!
//! A [`CancelHandle`] fires at most once and is never reset. The first reason
//! wins; later cancels are no-ops, and cancelling after the run finished has no
//! observable effect because nothing is listening any more.

use std::fmt;
use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    ClientDisconnected,
    UserRequested,
    Shutdown,
}

impl CancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelReason::ClientDisconnected => "client_disconnected",
            CancelReason::UserRequested => "user_requested",
            CancelReason::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct CancelHandle {
    token: CancellationToken,
    reason: Arc<OnceLock<CancelReason>>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelHandle {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            reason: Arc::new(OnceLock::new()),
        }
    }

    /// A handle that also fires when `parent` is cancelled (server shutdown).
    pub fn child_of(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            reason: Arc::new(OnceLock::new()),
        }
    }

    /// Returns `true` only for the call that actually fired the signal.
    pub fn cancel(&self, reason: CancelReason) -> bool {
        if self.token.is_cancelled() || self.reason.set(reason).is_err() {
            return false;
        }
        self.token.cancel();
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// Why the handle fired. A handle cancelled through its parent token
    /// reports [`CancelReason::Shutdown`].
    pub fn reason(&self) -> Option<CancelReason> {
        if !self.token.is_cancelled() {
            return None;
        }
        Some(self.reason.get().copied().unwrap_or(CancelReason::Shutdown))
    }

    /// Cancels with `reason` when dropped unless disarmed first.
    pub fn cancel_on_drop(&self, reason: CancelReason) -> CancelOnDrop {
        CancelOnDrop {
            handle: Some(self.clone()),
            reason,
        }
    }
}

#[must_use = "dropping the guard cancels immediately"]
pub struct CancelOnDrop {
    handle: Option<CancelHandle>,
    reason: CancelReason,
}

impl CancelOnDrop {
    pub fn disarm(mut self) {
        self.handle = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.cancel(self.reason) {
                tracing::debug!(target: "txscope.engine", reason = %self.reason, "run cancelled on drop");
            }
        }
    }
}
