#![forbid(unsafe_code)]

//! Versioned broadcast value with ordered, re-entrancy-safe delivery.
//!
//! # Design
//!
//! [`Broadcast<T>`] wraps a value in shared, reference-counted storage
//! (`Rc<RefCell<..>>`). When the value changes (determined by `PartialEq`),
//! every live subscriber is notified in registration order with a snapshot
//! of the value as it was right after that mutation.
//!
//! A mutation made while a notification is being delivered does not nest:
//! its snapshot is queued and delivered after the current round finishes.
//! Every subscriber therefore sees mutations in exactly the order they were
//! applied, including intermediate values.
//!
//! # Invariants
//!
//! 1. `version` increments by exactly 1 on each value-changing mutation.
//! 2. `set(v)` where `v == current` is a no-op.
//! 3. Subscribers are notified in registration order.
//! 4. Snapshots are delivered FIFO; no snapshot is skipped or coalesced.
//! 5. `published()` is the snapshot most recently handed to subscribers,
//!    which lags `get()` while queued snapshots are pending.
//!
//! # Failure Modes
//!
//! - **Subscriber leak**: dropped [`Subscription`] guards leave dead weak
//!   references behind until the next delivery prunes them.
//! - **Panicking subscriber**: the delivery flag is reset and pending
//!   snapshots are discarded so later mutations are still delivered.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use tracing::debug_span;
use web_time::Instant;

type CallbackRc<T> = Rc<dyn Fn(&T)>;
type CallbackWeak<T> = Weak<dyn Fn(&T)>;

struct BroadcastInner<T> {
    value: T,
    published: T,
    version: u64,
    subscribers: Vec<CallbackWeak<T>>,
    delivering: bool,
    pending: VecDeque<T>,
}

/// A shared, version-tracked value with ordered change notification.
///
/// Cloning a `Broadcast` creates a new handle to the **same** inner state.
pub struct Broadcast<T> {
    inner: Rc<RefCell<BroadcastInner<T>>>,
}

impl<T> Clone for Broadcast<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Broadcast<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Broadcast")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscriber_count", &inner.subscribers.len())
            .field("pending", &inner.pending.len())
            .finish()
    }
}

/// Resets the delivery flag even if a subscriber panics.
struct DeliveryGuard<'a, T> {
    inner: &'a RefCell<BroadcastInner<T>>,
}

impl<T> Drop for DeliveryGuard<'_, T> {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.try_borrow_mut() {
            inner.delivering = false;
            inner.pending.clear();
        }
    }
}

impl<T: Clone + PartialEq + 'static> Broadcast<T> {
    /// Create a broadcast with the given initial value, version 0.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(BroadcastInner {
                published: value.clone(),
                value,
                version: 0,
                subscribers: Vec::new(),
                delivering: false,
                pending: VecDeque::new(),
            })),
        }
    }

    /// Clone of the latest written value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Clone of the snapshot most recently delivered to subscribers.
    #[must_use]
    pub fn published(&self) -> T {
        self.inner.borrow().published.clone()
    }

    /// Borrow the latest value without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Borrow the published snapshot without cloning.
    pub fn with_published<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().published)
    }

    /// Replace the value. Returns `true` if it changed and a notification
    /// was delivered or queued.
    pub fn set(&self, value: T) -> bool {
        let snapshot = {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return false;
            }
            inner.value = value;
            inner.version += 1;
            inner.value.clone()
        };
        self.publish(snapshot);
        true
    }

    /// Modify the value in place. Returns `true` if it changed.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> bool {
        let snapshot = {
            let mut inner = self.inner.borrow_mut();
            let old = inner.value.clone();
            f(&mut inner.value);
            if inner.value == old {
                return false;
            }
            inner.version += 1;
            inner.value.clone()
        };
        self.publish(snapshot);
        true
    }

    /// Subscribe to future changes.
    ///
    /// Dropping the returned guard unsubscribes the callback.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let strong: CallbackRc<T> = Rc::new(callback);
        self.inner
            .borrow_mut()
            .subscribers
            .push(Rc::downgrade(&strong));
        Subscription {
            _guard: Box::new(strong),
        }
    }

    /// Subscribe and immediately receive the published snapshot.
    ///
    /// Called from inside a delivery round, the replayed value is the one
    /// being delivered, and queued snapshots follow through the normal
    /// path, so the subscriber never sees a value twice or out of order.
    pub fn subscribe_replay(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let strong: CallbackRc<T> = Rc::new(callback);
        self.inner
            .borrow_mut()
            .subscribers
            .push(Rc::downgrade(&strong));
        let current = self.published();
        strong(&current);
        Subscription {
            _guard: Box::new(strong),
        }
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Registered subscribers, including dead ones not yet pruned.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Whether a delivery round is currently running.
    #[must_use]
    pub fn is_delivering(&self) -> bool {
        self.inner.borrow().delivering
    }

    fn publish(&self, snapshot: T) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.delivering {
                inner.pending.push_back(snapshot);
                return;
            }
            inner.delivering = true;
        }
        let _guard = DeliveryGuard { inner: &self.inner };

        let mut next = Some(snapshot);
        while let Some(value) = next {
            let callbacks: Vec<CallbackRc<T>> = {
                let mut inner = self.inner.borrow_mut();
                inner.published = value.clone();
                inner.subscribers.retain(|w| w.strong_count() > 0);
                inner.subscribers.iter().filter_map(|w| w.upgrade()).collect()
            };

            if !callbacks.is_empty() {
                let start = Instant::now();
                let span = debug_span!(
                    "popup.broadcast",
                    subscribers = callbacks.len() as u64,
                    duration_us = tracing::field::Empty
                );
                let _entered = span.enter();
                for cb in &callbacks {
                    cb(&value);
                }
                span.record("duration_us", start.elapsed().as_micros() as u64);
            }

            next = self.inner.borrow_mut().pending.pop_front();
        }
    }
}

/// RAII guard for a subscriber callback.
///
/// Dropping it makes the callback unreachable; the weak entry in the
/// subscriber list is pruned on the next delivery.
pub struct Subscription {
    _guard: Box<dyn std::any::Any>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
