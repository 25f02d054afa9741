//! Per-operation deadline and cancellation

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::error::StoreError;

/// Why an operation stopped before the backend answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    /// The caller's cancellation token fired
    Cancelled,
    /// The deadline passed first
    DeadlineExceeded,
}

impl From<Interrupted> for StoreError {
    fn from(reason: Interrupted) -> Self {
        match reason {
            Interrupted::Cancelled => StoreError::Other("operation cancelled".to_string()),
            Interrupted::DeadlineExceeded => StoreError::Other("deadline exceeded".to_string()),
        }
    }
}

/// Caller-supplied deadline and cancellation signal for one store operation.
///
/// The default context has neither; the adapter's configured operation
/// timeout then applies.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl OperationContext {
    /// Context with no deadline and a fresh cancellation token
    pub fn new() -> Self {
        Self::default()
    }

    /// Context that expires `timeout` from now.
    ///
    /// A timeout too large to represent (such as `Duration::MAX`) means no deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: deadline_after(timeout),
            ..Self::new()
        }
    }

    /// Set an absolute deadline
    pub fn deadline_at(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Use an existing cancellation token (e.g. a child of the request's token)
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Deadline, if one was set
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Token that cancels operations run under this context
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run `fut` until it completes, the token is cancelled, or `deadline` passes.
    ///
    /// `fut` is dropped on interruption, releasing anything it holds.
    pub(crate) async fn race<F: Future>(
        &self,
        deadline: Option<Instant>,
        fut: F,
    ) -> Result<F::Output, Interrupted> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupted::Cancelled),
            _ = expire(deadline) => Err(Interrupted::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}

/// `timeout` from now, or `None` when that instant overflows
pub(crate) fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

async fn expire(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
