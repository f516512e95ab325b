//! Per-call attempt bookkeeping.
//!
//! An [`AttemptState`] is created at the start of every `execute` call and dropped when it
//! returns. The loop owns it exclusively; the interrupt check closes it through the
//! [`LifecycleCell`], a lock-free Open/Closed flag.
//!
//! Invariants:
//! - `count` is incremented exactly once per attempt, before the operation runs.
//! - `last_error` is overwritten on every failure and left alone on success.
//! - Lifecycle moves Open → Closed at most once and never back.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const LIFECYCLE_OPEN: u8 = 0;
const LIFECYCLE_CLOSED: u8 = 1;

/// Lifecycle of a single `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// Attempts may still be scheduled.
    #[default]
    Open,
    /// An interrupt arrived; no further attempts are scheduled.
    Closed,
}

impl Lifecycle {
    fn from_u8(v: u8) -> Self {
        if v == LIFECYCLE_CLOSED {
            Lifecycle::Closed
        } else {
            Lifecycle::Open
        }
    }

    /// True for [`Lifecycle::Closed`].
    pub fn is_closed(self) -> bool {
        matches!(self, Lifecycle::Closed)
    }
}

/// Shared Open/Closed flag. Clones observe the same underlying value.
#[derive(Debug, Clone, Default)]
pub struct LifecycleCell {
    state: Arc<AtomicU8>,
}

impl LifecycleCell {
    /// A new cell in the `Open` state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current lifecycle.
    pub fn get(&self) -> Lifecycle {
        Lifecycle::from_u8(self.state.load(Ordering::Acquire))
    }

    /// True once the cell has been closed.
    pub fn is_closed(&self) -> bool {
        self.get().is_closed()
    }

    /// Close the cell. Idempotent; returns `true` only for the call that performed the transition.
    pub fn close(&self) -> bool {
        self.state.swap(LIFECYCLE_CLOSED, Ordering::AcqRel) == LIFECYCLE_OPEN
    }
}

/// Point-in-time view of an [`AttemptState`] handed to backoff policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttemptSnapshot {
    /// Attempts started so far.
    pub count: usize,
    /// Lifecycle at the time the snapshot was taken.
    pub lifecycle: Lifecycle,
}

impl AttemptSnapshot {
    /// Snapshot of an open state after `count` attempts.
    pub fn open(count: usize) -> Self {
        Self { count, lifecycle: Lifecycle::Open }
    }

    /// Snapshot of a closed state after `count` attempts.
    pub fn closed(count: usize) -> Self {
        Self { count, lifecycle: Lifecycle::Closed }
    }

    /// True if the lifecycle was `Closed` when the snapshot was taken.
    pub fn is_closed(&self) -> bool {
        self.lifecycle.is_closed()
    }
}

/// Mutable record of one `execute` call: attempt count, last failure, lifecycle.
#[derive(Debug)]
pub struct AttemptState<E> {
    count: usize,
    last_error: Option<E>,
    lifecycle: LifecycleCell,
}

impl<E> Default for AttemptState<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> AttemptState<E> {
    /// Fresh state: zero attempts, no error, `Open`.
    pub fn new() -> Self {
        Self { count: 0, last_error: None, lifecycle: LifecycleCell::new() }
    }

    /// Attempts started so far.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Most recent failure, if any attempt has failed.
    pub fn last_error(&self) -> Option<&E> {
        self.last_error.as_ref()
    }

    /// Handle to the shared lifecycle flag.
    pub fn lifecycle(&self) -> &LifecycleCell {
        &self.lifecycle
    }

    pub fn is_closed(&self) -> bool {
        self.lifecycle.is_closed()
    }

    /// Close the lifecycle; see [`LifecycleCell::close`].
    pub fn close(&self) -> bool {
        self.lifecycle.close()
    }

    /// Count a new attempt and return its 1-based number.
    pub fn begin_attempt(&mut self) -> usize {
        self.count = self.count.saturating_add(1);
        self.count
    }

    /// Store `err` as the last failure and return a reference to it.
    pub fn record_failure(&mut self, err: E) -> &E {
        self.last_error.insert(err)
    }

    /// Move the last failure out of the state.
    pub fn take_last_error(&mut self) -> Option<E> {
        self.last_error.take()
    }

    pub fn snapshot(&self) -> AttemptSnapshot {
        AttemptSnapshot { count: self.count, lifecycle: self.lifecycle.get() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_is_open_and_empty() {
        let state: AttemptState<String> = AttemptState::new();
        assert_eq!(state.count(), 0);
        assert!(state.last_error().is_none());
        assert!(!state.is_closed());
        assert_eq!(state.snapshot(), AttemptSnapshot::open(0));
    }

    #[test]
    fn is_closed_reflects_lifecycle() {
        let state: AttemptState<String> = AttemptState::new();
        let opened = state.is_closed();
        state.close();
        let closed = state.is_closed();
        assert!(!opened);
        assert!(closed);
    }

    #[test]
    fn close_is_idempotent() {
        let cell = LifecycleCell::new();
        assert!(cell.close(), "first close performs the transition");
        assert!(!cell.close(), "second close is a no-op");
        assert_eq!(cell.get(), Lifecycle::Closed);
    }

    #[test]
    fn clones_share_lifecycle() {
        let state: AttemptState<()> = AttemptState::new();
        let other = state.lifecycle().clone();
        other.close();
        assert!(state.is_closed());
        assert!(state.snapshot().is_closed());
    }

    #[test]
    fn begin_attempt_counts_up() {
        let mut state: AttemptState<()> = AttemptState::new();
        assert_eq!(state.begin_attempt(), 1);
        assert_eq!(state.begin_attempt(), 2);
        assert_eq!(state.count(), 2);
        assert_eq!(state.snapshot().count, 2);
    }

    #[test]
    fn record_failure_overwrites_last_error() {
        let mut state = AttemptState::new();
        assert_eq!(state.record_failure("first"), &"first");
        state.record_failure("second");
        assert_eq!(state.last_error(), Some(&"second"));
        assert_eq!(state.take_last_error(), Some("second"));
        assert!(state.last_error().is_none());
    }
}
