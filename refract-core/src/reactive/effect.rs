//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies (unless created lazy).
//!
//! 2. When any dependency changes, the effect re-runs, or its scheduler is
//!    called instead.
//!
//! 3. Before re-running, the effect clears its old dependencies and tracks
//!    new ones during execution. A branch not taken on the latest run is
//!    not a dependency.
//!
//! # Differences from Computed
//!
//! - Computed values return a value; effects do not.
//! - Computed values are lazy (compute on access); effects are eager.
//! - Computed values cache results; effects just run their side effect.

use super::scope::record_subscriber;
use super::subscriber::{Subscriber, SubscriberKind, SubscriberOptions};

/// Create an effect that runs now and after every change to what it read.
///
/// # Example
///
/// ```rust
/// use refract_core::{effect, value_ref};
///
/// let count = value_ref(0);
/// let source = count.clone();
/// let _effect = effect(move || {
///     println!("Count is: {}", source.get());
/// });
///
/// count.set(5); // Prints: "Count is: 5"
/// ```
pub fn effect(f: impl FnMut() + 'static) -> Subscriber {
    create_subscriber(f, SubscriberOptions::default())
}

/// Create a subscriber with explicit options.
///
/// The subscriber is recorded in the current [`EffectScope`](super::EffectScope),
/// if any.
pub fn create_subscriber(f: impl FnMut() + 'static, options: SubscriberOptions) -> Subscriber {
    let subscriber = Subscriber::new(SubscriberKind::Effect, Box::new(f), &options);
    record_subscriber(&subscriber);
    if !options.lazy {
        subscriber.run();
    }
    subscriber
}

/// Stop a subscriber. Later changes never re-run it.
pub fn stop(subscriber: &Subscriber) {
    subscriber.stop();
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
