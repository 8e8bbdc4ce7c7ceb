//! Per-call cancellation and deadline tracking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use std::time::{Duration, Instant};

use tokio_stream::Stream;
use tonic::metadata::MetadataMap;

use crate::{Error, Result};

const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// Cancellation and deadline state of a single RPC.
///
/// Handlers poll [`CallContext::check`] once per loop iteration so a caller
/// that has gone away stops the work promptly instead of letting it run to
/// exhaustion. Clones share the same cancellation flag.
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl CallContext {
    /// Creates a context with no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context from request metadata, honouring `grpc-timeout`.
    pub fn from_metadata(metadata: &MetadataMap) -> Self {
        let deadline = metadata
            .get(GRPC_TIMEOUT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_grpc_timeout)
            .and_then(|timeout| Instant::now().checked_add(timeout));

        Self {
            deadline,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns a copy of this context with the given deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline of the call, if the caller set one.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Marks the call as cancelled.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns true once [`CallContext::cancel`] has been called on any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Fails with `Cancelled` or `DeadlineExceeded` if the caller gave up.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::DeadlineExceeded);
            }
        }

        Ok(())
    }
}

/// Response stream that cancels its call once tonic drops it.
///
/// Tonic drops the response stream when the client cancels or disconnects,
/// which is how a producer task learns the caller is gone.
pub struct CancelOnDrop<S> {
    inner: S,
    ctx: CallContext,
}

impl<S> CancelOnDrop<S> {
    /// Wraps `inner`, tying its lifetime to `ctx`.
    pub fn new(inner: S, ctx: CallContext) -> Self {
        Self { inner, ctx }
    }

    /// The wrapped stream.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S> Stream for CancelOnDrop<S>
where
    S: Stream + Unpin,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}

impl<S> Drop for CancelOnDrop<S> {
    fn drop(&mut self) {
        self.ctx.cancel();
    }
}

/// Parses a `grpc-timeout` value: up to eight ASCII digits and a unit.
fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    if value.len() < 2 || value.len() > 9 {
        return None;
    }

    let (digits, unit) = value.split_at(value.len() - 1);
    let amount: u64 = digits.parse().ok()?;

    let duration = match unit {
        "H" => Duration::from_secs(amount.checked_mul(3600)?),
        "M" => Duration::from_secs(amount.checked_mul(60)?),
        "S" => Duration::from_secs(amount),
        "m" => Duration::from_millis(amount),
        "u" => Duration::from_micros(amount),
        "n" => Duration::from_nanos(amount),
        _ => return None,
    };

    Some(duration)
}
