//! Telemetry for retry templates.
//!
//! A template with a sink attached emits one [`RetryEvent`] per lifecycle step:
//!
//! - `Opened` before the first attempt
//! - `AttemptFailed` after every failed attempt, carrying the delay about to be applied
//! - `Interrupted` when the interrupt signal closed the attempt state
//! - `Closed` after the loop, with the attempt count and whether the call succeeded
//!
//! Sinks are `tower::Service<RetryEvent>`s, so standard tower combinators apply.
//!
//! ```rust
//! use persevere::telemetry::{MemorySink, RetryEvent};
//! use tower::Service;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut sink = MemorySink::new();
//! sink.call(RetryEvent::Opened).await.unwrap();
//! assert_eq!(sink.events(), vec![RetryEvent::Opened]);
//! # }
//! ```

use futures::future::BoxFuture;
use std::convert::Infallible;
use std::fmt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;

/// A telemetry sink that consumes retry events.
pub trait TelemetrySink:
    Service<RetryEvent, Response = (), Error = Self::SinkError> + Clone + Send + 'static
{
    /// The error type for this sink.
    type SinkError: std::error::Error + Send + 'static;
}

/// Best-effort emit helper that honors `poll_ready` and swallows errors.
///
/// Telemetry never fails a retry: if the sink is not ready or errors, the event is dropped.
pub async fn emit_best_effort<S>(sink: S, event: RetryEvent)
where
    S: Service<RetryEvent, Response = ()> + Send + Clone + 'static,
    S::Error: std::error::Error + Send + 'static,
    S::Future: Send + 'static,
{
    use tower::ServiceExt;

    if let Ok(mut ready_sink) = sink.ready_oneshot().await {
        let _ = ready_sink.call(event).await;
    }
}

/// Events emitted by a retry template during `execute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryEvent {
    /// The loop is about to start.
    Opened,
    /// An attempt failed; the template will wait `delay` before re-checking the policy.
    AttemptFailed {
        /// 1-based attempt number.
        attempt: usize,
        /// Delay the policy requested.
        delay: Duration,
    },
    /// The interrupt signal fired and closed the attempt state.
    Interrupted {
        /// Attempts started when the loop observed the interrupt.
        attempts: usize,
    },
    /// The loop finished.
    Closed {
        /// Total attempts made.
        attempts: usize,
        /// Whether the final result was `Ok`.
        succeeded: bool,
    },
}

impl fmt::Display for RetryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryEvent::Opened => write!(f, "Opened"),
            RetryEvent::AttemptFailed { attempt, delay } => {
                write!(f, "AttemptFailed(#{}, delay={:?})", attempt, delay)
            }
            RetryEvent::Interrupted { attempts } => write!(f, "Interrupted(attempts={})", attempts),
            RetryEvent::Closed { attempts, succeeded } => {
                write!(f, "Closed(attempts={}, succeeded={})", attempts, succeeded)
            }
        }
    }
}

/// Logs events at INFO through `tracing`.
#[derive(Clone, Debug, Default)]
pub struct LogSink;

impl Service<RetryEvent> for LogSink {
    type Response = ();
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<(), Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: RetryEvent) -> Self::Future {
        tracing::info!(event = %event, "retry_event");
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for LogSink {
    type SinkError = Infallible;
}

/// Stores events in memory, evicting the oldest past `capacity`.
#[derive(Clone, Debug)]
pub struct MemorySink {
    events: Arc<Mutex<VecDeque<RetryEvent>>>,
    capacity: usize,
    evicted: Arc<AtomicU64>,
}

impl MemorySink {
    /// Bounded sink with the default capacity of 10,000 events.
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            capacity: capacity.max(1),
            evicted: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Snapshot of the stored events, oldest first.
    pub fn events(&self) -> Vec<RetryEvent> {
        self.lock().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Events dropped to stay within capacity.
    pub fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<RetryEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<RetryEvent> for MemorySink {
    type Response = ();
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<(), Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: RetryEvent) -> Self::Future {
        let mut guard = self.lock();
        if guard.len() >= self.capacity {
            guard.pop_front();
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        guard.push_back(event);
        Box::pin(async { Ok(()) })
    }
}

impl TelemetrySink for MemorySink {
    type SinkError = Infallible;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_event_display() {
        let event = RetryEvent::AttemptFailed { attempt: 2, delay: Duration::from_millis(100) };
        assert!(event.to_string().contains("AttemptFailed"));
        assert!(event.to_string().contains("#2"));

        let closed = RetryEvent::Closed { attempts: 3, succeeded: false };
        assert_eq!(closed.to_string(), "Closed(attempts=3, succeeded=false)");
    }

    #[tokio::test]
    async fn log_sink_accepts_events() {
        let mut sink = LogSink;
        sink.call(RetryEvent::Interrupted { attempts: 1 }).await.unwrap();
    }

    #[tokio::test]
    async fn memory_sink_evicts_oldest() {
        let mut sink = MemorySink::with_capacity(2);
        assert!(sink.is_empty());

        sink.call(RetryEvent::Opened).await.unwrap();
        sink.call(RetryEvent::AttemptFailed { attempt: 1, delay: Duration::ZERO }).await.unwrap();
        sink.call(RetryEvent::Closed { attempts: 1, succeeded: false }).await.unwrap();

        assert_eq!(sink.len(), 2);
        assert_eq!(sink.evicted(), 1);
        assert_eq!(sink.events()[0], RetryEvent::AttemptFailed { attempt: 1, delay: Duration::ZERO });
    }

    #[tokio::test]
    async fn zero_capacity_still_keeps_the_latest_event() {
        let mut sink = MemorySink::with_capacity(0);
        sink.call(RetryEvent::Opened).await.unwrap();
        sink.call(RetryEvent::Interrupted { attempts: 0 }).await.unwrap();
        assert_eq!(sink.events(), vec![RetryEvent::Interrupted { attempts: 0 }]);
        assert_eq!(sink.evicted(), 1);
    }

    #[tokio::test]
    async fn emit_best_effort_delivers_to_clone() {
        let sink = MemorySink::new();
        emit_best_effort(sink.clone(), RetryEvent::Opened).await;
        assert_eq!(sink.events(), vec![RetryEvent::Opened]);
    }
}
