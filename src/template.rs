//! Retry template: runs a fallible operation under a backoff policy.
//!
//! Semantics:
//! - Every `execute` call gets a fresh [`AttemptState`]; nothing carries over between calls.
//! - The loop asks the policy `should_stop` before each attempt, bumps the attempt count, runs the
//!   operation, and on failure records the error, fires `on_error`, and waits `policy.delay`.
//! - `on_open` fires once before the first attempt; `on_close` fires once after the loop with the
//!   final result, whether it succeeded, ran out of attempts, or was interrupted.
//! - The result is returned verbatim: `Ok` on success, the last failure otherwise, and
//!   `Ok(T::default())` if the policy stopped before any attempt ran.
//!
//! Interrupts are cooperative. The loop polls the configured signal without waiting before every
//! policy check and closes the attempt state once it has fired, so a blocking operation or a signal
//! that fired before the call is still noticed. An in-flight operation is never cancelled. A signal
//! that has not fired when `execute` returns (or when its future is dropped) is kept for the next
//! call.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use persevere::{CountLimited, RetryTemplate};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let template = RetryTemplate::<u32, std::io::Error>::builder()
//!     .policy(CountLimited::new(3))
//!     .on_error(|e| eprintln!("attempt failed: {e}"))
//!     .build()
//!     .unwrap();
//!
//! let value = template.execute(|| async { Ok::<_, std::io::Error>(7) }).await;
//! assert_eq!(value.unwrap(), 7);
//! # });
//! ```

use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::BuildError;
use crate::policy::BackoffPolicy;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::state::{AttemptState, Lifecycle, LifecycleCell};
use crate::telemetry::{emit_best_effort, RetryEvent, TelemetrySink};

type OpenHook = Arc<dyn Fn() + Send + Sync>;
type ErrorHook<E> = Arc<dyn Fn(&E) + Send + Sync>;
type CloseHook<T, E> = Arc<dyn Fn(&Result<T, E>) + Send + Sync>;
type Emitter = Arc<dyn Fn(RetryEvent) -> BoxFuture<'static, ()> + Send + Sync>;
type InterruptSignal = BoxFuture<'static, ()>;
type InterruptSlot = Arc<Mutex<Option<InterruptSignal>>>;

/// Outcome of [`RetryTemplate::execute_with_report`].
#[derive(Debug)]
pub struct Execution<T, E> {
    /// Value or last error, exactly as `execute` would return it.
    pub result: Result<T, E>,
    /// Attempts made (operation invocations).
    pub attempts: usize,
    /// Final lifecycle; `Closed` if the interrupt fired during the call.
    pub lifecycle: Lifecycle,
}

impl<T, E> Execution<T, E> {
    /// True if the interrupt closed the attempt state.
    pub fn was_interrupted(&self) -> bool {
        self.lifecycle.is_closed()
    }
}

/// Reusable retry configuration: policy, callbacks, sleeper, sink, and interrupt.
pub struct RetryTemplate<T, E> {
    policy: Arc<dyn BackoffPolicy>,
    on_open: Option<OpenHook>,
    on_error: Option<ErrorHook<E>>,
    on_close: Option<CloseHook<T, E>>,
    sleeper: Arc<dyn Sleeper>,
    emitter: Option<Emitter>,
    interrupt: InterruptSlot,
}

impl<T, E> Clone for RetryTemplate<T, E> {
    fn clone(&self) -> Self {
        Self {
            policy: self.policy.clone(),
            on_open: self.on_open.clone(),
            on_error: self.on_error.clone(),
            on_close: self.on_close.clone(),
            sleeper: self.sleeper.clone(),
            emitter: self.emitter.clone(),
            interrupt: self.interrupt.clone(),
        }
    }
}

impl<T, E> std::fmt::Debug for RetryTemplate<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryTemplate")
            .field("policy", &self.policy)
            .field("sleeper", &self.sleeper)
            .field("on_open", &self.on_open.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("telemetry", &self.emitter.is_some())
            .field("interrupt_pending", &self.has_pending_interrupt())
            .finish()
    }
}

impl<T, E> RetryTemplate<T, E> {
    pub fn builder() -> RetryTemplateBuilder<T, E> {
        RetryTemplateBuilder::new()
    }

    pub fn policy(&self) -> &Arc<dyn BackoffPolicy> {
        &self.policy
    }

    /// True while an interrupt signal is configured and has not fired yet.
    pub fn has_pending_interrupt(&self) -> bool {
        self.interrupt.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Install (or replace) the interrupt signal used by subsequent `execute` calls.
    pub fn set_interrupt<F>(&self, signal: F)
    where
        F: Future + Send + 'static,
    {
        *self.interrupt.lock().unwrap_or_else(PoisonError::into_inner) = Some(boxed_signal(signal));
    }

    /// Run `operation` until it succeeds, the policy stops, or the interrupt fires.
    pub async fn execute<Op, Fut>(&self, operation: Op) -> Result<T, E>
    where
        T: Default + Send,
        E: Send,
        Op: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        self.execute_with_report(operation).await.result
    }

    /// Like [`execute`](Self::execute) but also reports attempt count and final lifecycle.
    pub async fn execute_with_report<Op, Fut>(&self, mut operation: Op) -> Execution<T, E>
    where
        T: Default + Send,
        E: Send,
        Op: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        let mut state: AttemptState<E> = AttemptState::new();

        if let Some(on_open) = &self.on_open {
            on_open();
        }
        self.emit(RetryEvent::Opened).await;

        let mut interrupt = ArmedInterrupt::take(&self.interrupt);

        let mut success: Option<T> = None;
        loop {
            interrupt.check(state.lifecycle());
            if self.policy.should_stop(&state.snapshot()) {
                break;
            }
            let attempt = state.begin_attempt();
            match operation().await {
                Ok(value) => {
                    success = Some(value);
                    break;
                }
                Err(err) => {
                    let err = state.record_failure(err);
                    if let Some(on_error) = &self.on_error {
                        on_error(err);
                    }
                    interrupt.check(state.lifecycle());
                    let delay = self.policy.delay(&state.snapshot());
                    tracing::debug!(attempt, ?delay, "attempt failed");
                    self.emit(RetryEvent::AttemptFailed { attempt, delay }).await;
                    self.sleeper.sleep(delay).await;
                }
            }
        }

        drop(interrupt);

        let attempts = state.count();
        let lifecycle = state.lifecycle().get();
        if lifecycle.is_closed() {
            self.emit(RetryEvent::Interrupted { attempts }).await;
        }

        let result = match success {
            Some(value) => Ok(value),
            None => match state.take_last_error() {
                Some(err) => Err(err),
                None => Ok(T::default()),
            },
        };
        tracing::debug!(attempts, succeeded = result.is_ok(), ?lifecycle, "retry loop finished");

        if let Some(on_close) = &self.on_close {
            on_close(&result);
        }
        self.emit(RetryEvent::Closed { attempts, succeeded: result.is_ok() }).await;

        Execution { result, attempts, lifecycle }
    }

    async fn emit(&self, event: RetryEvent) {
        if let Some(emitter) = &self.emitter {
            emitter(event).await;
        }
    }
}

/// The interrupt signal while one `execute` call holds it.
///
/// Dropping the guard hands a signal that has not fired back to the template, including when the
/// `execute` future itself is dropped mid-loop.
struct ArmedInterrupt<'a> {
    signal: Option<InterruptSignal>,
    slot: &'a InterruptSlot,
}

impl<'a> ArmedInterrupt<'a> {
    fn take(slot: &'a InterruptSlot) -> Self {
        let signal = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        Self { signal, slot }
    }

    /// Poll the signal once without waiting; close `lifecycle` if it has fired.
    fn check(&mut self, lifecycle: &LifecycleCell) {
        let fired = match self.signal.as_mut() {
            Some(signal) => signal.now_or_never().is_some(),
            None => false,
        };
        if !fired {
            return;
        }
        self.signal = None;
        if lifecycle.close() {
            tracing::info!("interrupt received; no further attempts will be scheduled");
        }
    }
}

impl Drop for ArmedInterrupt<'_> {
    fn drop(&mut self) {
        let Some(signal) = self.signal.take() else {
            return;
        };
        let mut guard = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        // a signal installed while this call held one takes precedence
        if guard.is_none() {
            *guard = Some(signal);
        }
    }
}

fn boxed_signal<F>(signal: F) -> InterruptSignal
where
    F: Future + Send + 'static,
{
    signal.map(|_| ()).boxed()
}

/// Builder for [`RetryTemplate`].
pub struct RetryTemplateBuilder<T, E> {
    policy: Option<Arc<dyn BackoffPolicy>>,
    on_open: Option<OpenHook>,
    on_error: Option<ErrorHook<E>>,
    on_close: Option<CloseHook<T, E>>,
    sleeper: Arc<dyn Sleeper>,
    emitter: Option<Emitter>,
    interrupt: Option<InterruptSignal>,
}

impl<T, E> RetryTemplateBuilder<T, E> {
    /// Builder with no policy, no callbacks, and the tokio sleeper.
    pub fn new() -> Self {
        Self {
            policy: None,
            on_open: None,
            on_error: None,
            on_close: None,
            sleeper: Arc::new(TokioSleeper),
            emitter: None,
            interrupt: None,
        }
    }

    /// Set the backoff policy. Required.
    pub fn policy<P>(mut self, policy: P) -> Self
    where
        P: BackoffPolicy + 'static,
    {
        self.policy = Some(Arc::new(policy));
        self
    }

    /// Set an already-shared policy, e.g. one resolved from a [`PolicyConfig`](crate::config::PolicyConfig).
    pub fn shared_policy(mut self, policy: Arc<dyn BackoffPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Called once per `execute`, before the first attempt.
    pub fn on_open<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_open = Some(Arc::new(f));
        self
    }

    /// Called with the error of every failed attempt.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Called once per `execute`, after the loop, with the final result.
    pub fn on_close<F>(mut self, f: F) -> Self
    where
        F: Fn(&Result<T, E>) + Send + Sync + 'static,
    {
        self.on_close = Some(Arc::new(f));
        self
    }

    /// One-shot interrupt. Completion of `signal` (with any output) closes the attempt state of
    /// the `execute` call that is running at the time.
    ///
    /// A `tokio::sync::oneshot::Receiver` fits directly: it completes on send and on sender drop.
    pub fn with_interrupt<F>(mut self, signal: F) -> Self
    where
        F: Future + Send + 'static,
    {
        self.interrupt = Some(boxed_signal(signal));
        self
    }

    /// Provide a custom sleeper implementation.
    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Emit [`RetryEvent`]s to `sink`, best-effort.
    pub fn with_sink<S>(mut self, sink: S) -> Self
    where
        S: TelemetrySink + Sync,
        S::Future: Send + 'static,
    {
        self.emitter = Some(Arc::new(move |event| emit_best_effort(sink.clone(), event).boxed()));
        self
    }

    pub fn build(self) -> Result<RetryTemplate<T, E>, BuildError> {
        let policy = self.policy.ok_or(BuildError::MissingPolicy)?;
        Ok(RetryTemplate {
            policy,
            on_open: self.on_open,
            on_error: self.on_error,
            on_close: self.on_close,
            sleeper: self.sleeper,
            emitter: self.emitter,
            interrupt: Arc::new(Mutex::new(self.interrupt)),
        })
    }
}

impl<T, E> Default for RetryTemplateBuilder<T, E> {
    fn default() -> Self {
        Self::new()
    }
}
