#![forbid(unsafe_code)]

//! Animation registry: the single source of truth for every popup.
//!
//! The registry owns one [`AnimationRecord`] per id. Anchors write frames,
//! the orchestrator and trigger handles write states, and everything else
//! observes through [`ChangeStream`]s. Every mutation is broadcast to all
//! streams in the order it was applied.
//!
//! # Invariants
//!
//! 1. At most one record per id.
//! 2. A record's state only moves along `Hidden → Growing → Displayed →
//!    Shrinking → Hidden`; any other write is refused and reported as
//!    [`StateWrite::IllegalEdge`].
//! 3. Records are never removed.
//! 4. Writes that do not change anything are not broadcast.
//!
//! # Failure Modes
//!
//! | Condition | Behavior |
//! |-----------|----------|
//! | `set_state` on unknown id | [`StateWrite::UnknownId`], nothing broadcast |
//! | Trigger mid-transition | [`StateWrite::IllegalEdge`], trigger dropped |
//! | Write from inside a delivery | Queued, delivered after the current round |

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use anchored_popup_core::{AnimationRecord, IntRect, LifecycleState, PopupId};
use tracing::{debug, debug_span};

use crate::reactive::{Broadcast, Subscription};
use crate::stream::{ChangeStream, Projection};

/// Outcome of [`Registry::set_state`].
///
/// None of these are errors: refused writes are benign races between a
/// stale trigger and a transition in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateWrite {
    /// The state changed and was broadcast.
    Applied,
    /// The record was already in the requested state.
    Unchanged,
    /// No record exists for the id.
    UnknownId,
    /// The requested state is not the successor of the current one.
    IllegalEdge {
        from: LifecycleState,
        to: LifecycleState,
    },
}

impl StateWrite {
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

struct RegistryInner {
    table: Broadcast<Vec<AnimationRecord>>,
    streams: RefCell<AHashMap<(PopupId, Projection), ChangeStream>>,
}

/// Shared handle to the registry.
///
/// Create one per execution context and pass it by reference; clones share
/// the same table.
#[derive(Clone)]
pub struct Registry {
    inner: Rc<RegistryInner>,
}

/// Non-owning registry handle, held by long-lived callbacks.
#[derive(Clone)]
pub struct WeakRegistry {
    inner: Weak<RegistryInner>,
}

impl WeakRegistry {
    pub fn upgrade(&self) -> Option<Registry> {
        self.inner.upgrade().map(|inner| Registry { inner })
    }
}

impl fmt::Debug for WeakRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakRegistry")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("records", &self.records())
            .field("streams", &self.inner.streams.borrow().len())
            .finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RegistryInner {
                table: Broadcast::new(Vec::new()),
                streams: RefCell::new(AHashMap::new()),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakRegistry {
        WeakRegistry {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Current record for `id`.
    pub fn get(&self, id: impl AsRef<str>) -> Option<AnimationRecord> {
        let id = id.as_ref();
        self.inner
            .table
            .with(|records| records.iter().find(|r| r.id.as_str() == id).cloned())
    }

    /// Snapshot of every record, in creation order.
    pub fn records(&self) -> Vec<AnimationRecord> {
        self.inner.table.get()
    }

    pub fn contains(&self, id: impl AsRef<str>) -> bool {
        let id = id.as_ref();
        self.inner
            .table
            .with(|records| records.iter().any(|r| r.id.as_str() == id))
    }

    /// Number of broadcast mutations so far.
    pub fn version(&self) -> u64 {
        self.inner.table.version()
    }

    /// Create a `Hidden`, unmeasured record if `id` has none.
    ///
    /// Returns `true` if a record was created.
    pub fn ensure(&self, id: impl Into<PopupId>) -> bool {
        let id = id.into();
        self.inner.table.update(|records| {
            if !records.iter().any(|r| r.id == id) {
                debug!(popup_id = %id, "record created");
                records.push(AnimationRecord::hidden(id.clone()));
            }
        })
    }

    /// Record the anchor frame for `id`, creating a `Hidden` record if
    /// needed. Only the frame is touched on an existing record.
    ///
    /// Returns `true` if anything changed.
    pub fn set_frame(&self, id: impl Into<PopupId>, frame: IntRect) -> bool {
        let id = id.into();
        self.inner.table.update(|records| {
            match records.iter_mut().find(|r| r.id == id) {
                Some(record) => record.anchor_frame = frame,
                None => {
                    debug!(popup_id = %id, ?frame, "record created from frame report");
                    records.push(AnimationRecord::hidden(id.clone()).with_frame(frame));
                }
            }
        })
    }

    /// Move `id` to `to` if that is the legal next state.
    pub fn set_state(&self, id: impl AsRef<str>, to: LifecycleState) -> StateWrite {
        let id = id.as_ref();
        let Some(from) = self.get(id).map(|r| r.state) else {
            debug!(popup_id = id, %to, "state write for unknown id ignored");
            return StateWrite::UnknownId;
        };

        let span = debug_span!("popup.state", popup_id = id, %from, %to);
        let _entered = span.enter();

        if from == to {
            debug!("state unchanged");
            return StateWrite::Unchanged;
        }
        if !from.can_transition_to(to) {
            debug!("illegal lifecycle edge refused");
            return StateWrite::IllegalEdge { from, to };
        }

        self.inner.table.update(|records| {
            if let Some(record) = records.iter_mut().find(|r| r.id.as_str() == id) {
                record.state = to;
            }
        });
        StateWrite::Applied
    }

    /// The shared stream for `(id, projection)`, created on first use.
    pub fn stream(&self, id: impl Into<PopupId>, projection: Projection) -> ChangeStream {
        let id = id.into();
        let key = (id, projection);
        if let Some(stream) = self.inner.streams.borrow().get(&key) {
            return stream.clone();
        }
        let stream = ChangeStream::new(key.0.clone(), projection, &self.inner.table);
        debug!(
            popup_id = %key.0,
            projection = projection.as_str(),
            "change stream created"
        );
        self.inner.streams.borrow_mut().insert(key, stream.clone());
        stream
    }

    /// Stream that emits only when the state of `id` changes.
    pub fn state_changes(&self, id: impl Into<PopupId>) -> ChangeStream {
        self.stream(id, Projection::State)
    }

    /// Stream that emits only when the anchor frame of `id` changes.
    pub fn frame_changes(&self, id: impl Into<PopupId>) -> ChangeStream {
        self.stream(id, Projection::Frame)
    }

    /// Observe every change to `id`'s record, starting with the current one.
    pub fn subscribe(
        &self,
        id: impl Into<PopupId>,
        callback: impl Fn(&AnimationRecord) + 'static,
    ) -> Subscription {
        self.stream(id, Projection::Record).subscribe(callback)
    }
}
