//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a container field or a
//! box is read, the current computation is registered as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing subscriber.
//! When a subscriber runs we push it onto the stack, and when the run
//! completes, we pop it. The pop happens in a `Drop` guard, so the stack is
//! restored even if the computation panics.
//!
//! This design supports nested reactive contexts (e.g., an effect that reads
//! a computed value, which runs its own getter).
//!
//! A second stack saves and restores the "should track" flag. Tracking can
//! be paused for a stretch of code without leaving the current context.

use std::cell::{Cell, RefCell};

use super::{Subscriber, SubscriberId};

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Subscriber>> = const { RefCell::new(Vec::new()) };
    static SHOULD_TRACK: Cell<bool> = const { Cell::new(true) };
    static TRACK_STACK: RefCell<Vec<bool>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the context when dropped.
///
/// Entering a context also enables tracking; the previous flag comes back
/// when the guard drops.
pub struct ReactiveContext {
    subscriber_id: SubscriberId,
    previous_tracking: bool,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While this context is active, reads register the subscriber as a
    /// dependent. The context is exited when the returned guard is dropped.
    pub fn enter(subscriber: &Subscriber) -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(subscriber.clone()));
        let previous_tracking = SHOULD_TRACK.with(|flag| flag.replace(true));

        Self {
            subscriber_id: subscriber.id(),
            previous_tracking,
        }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(Subscriber::id))
    }

    pub(crate) fn current() -> Option<Subscriber> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// The subscriber reads should be recorded against right now: the
    /// current one, unless tracking is paused.
    pub(crate) fn tracking_subscriber() -> Option<Subscriber> {
        if !SHOULD_TRACK.with(Cell::get) {
            return None;
        }
        Self::current()
    }

    /// Whether the subscriber is anywhere on the stack.
    pub fn contains(id: SubscriberId) -> bool {
        CONTEXT_STACK.with(|stack| stack.borrow().iter().any(|entry| entry.id() == id))
    }

    /// Number of nested contexts.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // Dropped after the borrow ends: the entry may be the last handle.
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        // Verify we're popping the right context.
        if let Some(entry) = &popped {
            debug_assert_eq!(
                entry.id(),
                self.subscriber_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.subscriber_id,
                entry.id()
            );
        }
        SHOULD_TRACK.with(|flag| flag.set(self.previous_tracking));
        drop(popped);
    }
}

/// Stop recording dependencies until the matching [`reset_tracking`].
pub fn pause_tracking() {
    let previous = SHOULD_TRACK.with(|flag| flag.replace(false));
    TRACK_STACK.with(|stack| stack.borrow_mut().push(previous));
}

/// Resume recording dependencies until the matching [`reset_tracking`].
pub fn enable_tracking() {
    let previous = SHOULD_TRACK.with(|flag| flag.replace(true));
    TRACK_STACK.with(|stack| stack.borrow_mut().push(previous));
}

/// Restore the flag saved by the last pause or enable.
pub fn reset_tracking() {
    let previous = TRACK_STACK.with(|stack| stack.borrow_mut().pop());
    SHOULD_TRACK.with(|flag| flag.set(previous.unwrap_or(true)));
}

/// Whether reads would currently be recorded.
pub fn is_tracking() -> bool {
    SHOULD_TRACK.with(Cell::get) && ReactiveContext::is_active()
}

/// Run `f` without recording any dependency.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    pause_tracking();
    let _reset = ResetTracking;
    f()
}

struct ResetTracking;

impl Drop for ResetTracking {
    fn drop(&mut self) {
        reset_tracking();
    }
}
