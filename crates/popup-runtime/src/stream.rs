#![forbid(unsafe_code)]

//! Per-id change streams derived from the registry table.
//!
//! A [`ChangeStream`] watches the registry's broadcast, picks out the record
//! for one id, and re-emits it only when its [`Projection`] of that record
//! changes. New subscribers are replayed the latest emitted record first.
//!
//! Filtering is local to each stream: the registry fans out every mutation
//! to every stream, and each stream decides on its own whether the record
//! it cares about moved.

use std::fmt;
use std::rc::Rc;

use anchored_popup_core::{AnimationRecord, PopupId};

use crate::reactive::{Broadcast, Subscription};

/// Which part of a record a stream reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Projection {
    /// Any structural change to the record.
    Record,
    /// Lifecycle state changes only.
    State,
    /// Anchor frame changes only.
    Frame,
}

impl Projection {
    /// Whether `next` should be emitted after `prev`.
    pub fn changed(self, prev: Option<&AnimationRecord>, next: &AnimationRecord) -> bool {
        let Some(prev) = prev else {
            return true;
        };
        match self {
            Self::Record => prev != next,
            Self::State => prev.state != next.state,
            Self::Frame => prev.anchor_frame != next.anchor_frame,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Record => "record",
            Self::State => "state",
            Self::Frame => "frame",
        }
    }
}

struct StreamInner {
    id: PopupId,
    projection: Projection,
    subject: Broadcast<Option<AnimationRecord>>,
    _upstream: Subscription,
}

/// Deduplicating, replaying view of one id's record.
///
/// Cloning shares the same underlying stream.
#[derive(Clone)]
pub struct ChangeStream {
    inner: Rc<StreamInner>,
}

impl fmt::Debug for ChangeStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeStream")
            .field("id", &self.inner.id)
            .field("projection", &self.inner.projection)
            .field("latest", &self.latest())
            .finish()
    }
}

impl ChangeStream {
    /// Derive a stream from the registry table.
    ///
    /// Starts from the table's published snapshot so a stream created in the
    /// middle of a delivery round does not skip ahead of queued mutations.
    pub(crate) fn new(
        id: PopupId,
        projection: Projection,
        table: &Broadcast<Vec<AnimationRecord>>,
    ) -> Self {
        let initial = table.with_published(|records| find(records, &id).cloned());
        let subject = Broadcast::new(initial);

        let sink = subject.clone();
        let key = id.clone();
        let upstream = table.subscribe(move |records| {
            let Some(next) = find(records, &key) else {
                return;
            };
            if sink.with(|prev| projection.changed(prev.as_ref(), next)) {
                sink.set(Some(next.clone()));
            }
        });

        Self {
            inner: Rc::new(StreamInner {
                id,
                projection,
                subject,
                _upstream: upstream,
            }),
        }
    }

    pub fn id(&self) -> &PopupId {
        &self.inner.id
    }

    pub fn projection(&self) -> Projection {
        self.inner.projection
    }

    /// The record most recently emitted, if the id exists yet.
    pub fn latest(&self) -> Option<AnimationRecord> {
        self.inner.subject.published()
    }

    /// Number of emissions so far, not counting replays.
    pub fn emissions(&self) -> u64 {
        self.inner.subject.version()
    }

    /// Receive the latest record now (if any) and every later emission.
    ///
    /// Dropping the returned guard stops delivery.
    pub fn subscribe(&self, callback: impl Fn(&AnimationRecord) + 'static) -> Subscription {
        self.inner.subject.subscribe_replay(move |record| {
            if let Some(record) = record {
                callback(record);
            }
        })
    }

    /// Whether both handles point at the same stream.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

fn find<'a>(records: &'a [AnimationRecord], id: &PopupId) -> Option<&'a AnimationRecord> {
    records.iter().find(|record| &record.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchored_popup_core::{IntRect, LifecycleState};
    use std::cell::RefCell;

    fn record(id: &str, frame: IntRect, state: LifecycleState) -> AnimationRecord {
        AnimationRecord::hidden(PopupId::from(id))
            .with_frame(frame)
            .with_state(state)
    }

    #[test]
    fn projection_filters() {
        let a = record("x", IntRect::new(1, 1, 2, 2), LifecycleState::Hidden);
        let moved = a.clone().with_frame(IntRect::new(5, 5, 2, 2));
        let grown = a.clone().with_state(LifecycleState::Growing);

        assert!(Projection::State.changed(None, &a));
        assert!(!Projection::State.changed(Some(&a), &moved));
        assert!(Projection::State.changed(Some(&a), &grown));
        assert!(Projection::Frame.changed(Some(&a), &moved));
        assert!(!Projection::Frame.changed(Some(&a), &grown));
        assert!(Projection::Record.changed(Some(&a), &grown));
        assert!(!Projection::Record.changed(Some(&a), &a));
    }

    #[test]
    fn stream_ignores_other_ids() {
        let table = Broadcast::new(Vec::new());
        let stream = ChangeStream::new(PopupId::from("a"), Projection::Record, &table);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = stream.subscribe(move |r| s.borrow_mut().push(r.id.to_string()));

        table.set(vec![record("b", IntRect::ZERO, LifecycleState::Hidden)]);
        assert!(seen.borrow().is_empty());

        table.update(|t| t.push(record("a", IntRect::ZERO, LifecycleState::Hidden)));
        assert_eq!(*seen.borrow(), vec!["a".to_string()]);
    }

    #[test]
    fn state_stream_skips_frame_only_changes() {
        let table = Broadcast::new(vec![record("a", IntRect::ZERO, LifecycleState::Hidden)]);
        let stream = ChangeStream::new(PopupId::from("a"), Projection::State, &table);
        let states = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&states);
        let _sub = stream.subscribe(move |r| s.borrow_mut().push(r.state));

        table.set(vec![record("a", IntRect::new(3, 3, 3, 3), LifecycleState::Hidden)]);
        table.set(vec![record("a", IntRect::new(3, 3, 3, 3), LifecycleState::Growing)]);

        assert_eq!(
            *states.borrow(),
            vec![LifecycleState::Hidden, LifecycleState::Growing]
        );
        assert_eq!(stream.emissions(), 1);
    }

    #[test]
    fn late_subscriber_gets_replay() {
        let table = Broadcast::new(vec![record("a", IntRect::ZERO, LifecycleState::Displayed)]);
        let stream = ChangeStream::new(PopupId::from("a"), Projection::State, &table);
        let first = Rc::new(RefCell::new(None));
        let f = Rc::clone(&first);
        let _sub = stream.subscribe(move |r| {
            f.borrow_mut().get_or_insert(r.state);
        });
        assert_eq!(*first.borrow(), Some(LifecycleState::Displayed));
    }

    #[test]
    fn unknown_id_has_no_replay() {
        let table: Broadcast<Vec<AnimationRecord>> = Broadcast::new(Vec::new());
        let stream = ChangeStream::new(PopupId::from("ghost"), Projection::Record, &table);
        let hits = Rc::new(RefCell::new(0));
        let h = Rc::clone(&hits);
        let _sub = stream.subscribe(move |_| *h.borrow_mut() += 1);
        assert_eq!(*hits.borrow(), 0);
        assert!(stream.latest().is_none());
    }
}
