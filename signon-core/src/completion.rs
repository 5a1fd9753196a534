//! Single-shot completion handlers keyed by sign-in attempt.
//!
//! A [`CompletionSlot`] holds the success/error handlers of the latest
//! attempt only. Starting another attempt drops the previous handlers, so an
//! outcome that arrives late for a superseded attempt finds nothing to fire.
//! Handlers are taken out of the slot before they run, which makes firing
//! at-most-once and never both.

use parking_lot::Mutex;
use std::fmt;
use uuid::Uuid;

/// Identifier of one sign-in attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptId(Uuid);

impl AttemptId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type SuccessHandler<T> = Box<dyn FnOnce(T) + Send + 'static>;
pub type ErrorHandler<E> = Box<dyn FnOnce(E) + Send + 'static>;

/// The handler pair of one attempt.
pub struct CompletionHandlers<T, E> {
    on_success: SuccessHandler<T>,
    on_error: ErrorHandler<E>,
}

impl<T, E> CompletionHandlers<T, E> {
    pub fn new(on_success: SuccessHandler<T>, on_error: ErrorHandler<E>) -> Self {
        Self {
            on_success,
            on_error,
        }
    }

    /// Fire exactly one of the two handlers. Consumes the pair.
    pub fn fire(self, outcome: Result<T, E>) {
        match outcome {
            Ok(value) => (self.on_success)(value),
            Err(error) => (self.on_error)(error),
        }
    }
}

struct Pending<T, E> {
    attempt: AttemptId,
    handlers: CompletionHandlers<T, E>,
}

/// Slot holding the handlers of the current attempt.
pub struct CompletionSlot<T, E> {
    current: Mutex<Option<Pending<T, E>>>,
}

impl<T, E> CompletionSlot<T, E> {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    /// Register handlers for a new attempt, replacing any pending ones.
    pub fn begin(&self, handlers: CompletionHandlers<T, E>) -> AttemptId {
        let attempt = AttemptId::new();
        let previous = self.current.lock().replace(Pending { attempt, handlers });
        if let Some(previous) = previous {
            tracing::debug!(
                superseded = %previous.attempt,
                attempt = %attempt,
                "sign-in attempt superseded; its handlers will not fire"
            );
        }
        attempt
    }

    /// Take the handlers if `attempt` is still the current one.
    ///
    /// Returns `None` for superseded or already-completed attempts.
    pub fn take(&self, attempt: AttemptId) -> Option<CompletionHandlers<T, E>> {
        let mut current = self.current.lock();
        match current.as_ref() {
            Some(pending) if pending.attempt == attempt => current.take().map(|p| p.handlers),
            _ => None,
        }
    }

    /// Fire the handlers for `attempt` with `outcome`.
    ///
    /// Returns `false` and discards the outcome when the attempt is stale.
    pub fn complete(&self, attempt: AttemptId, outcome: Result<T, E>) -> bool {
        match self.take(attempt) {
            Some(handlers) => {
                handlers.fire(outcome);
                true
            }
            None => {
                tracing::debug!(attempt = %attempt, "dropping outcome of stale sign-in attempt");
                false
            }
        }
    }

    /// Whether `attempt` is still waiting for its outcome.
    pub fn is_pending(&self, attempt: AttemptId) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|p| p.attempt == attempt)
    }
}

impl<T, E> Default for CompletionSlot<T, E> {
    fn default() -> Self {
        Self::new()
    }
}
