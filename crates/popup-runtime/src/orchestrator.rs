#![forbid(unsafe_code)]

//! Lifecycle orchestrator: drives one overlay's visuals from the registry.
//!
//! [`OverlayVisuals`] subscribes to the state-only and frame-only streams of
//! its id. When it observes `Growing` it animates from the hidden transform
//! to the displayed one and, when the transition's duration has elapsed,
//! writes `Displayed` back into the registry. `Shrinking` runs the reverse
//! and writes `Hidden`.
//!
//! # Invariants
//!
//! 1. At most one transition is in flight; a trigger observed while one runs
//!    is dropped, not queued.
//! 2. A grow never starts until both the anchor frame and the content size
//!    are known; it is deferred and retried on the next measurement.
//! 3. A transition starts from the most recent measurements.
//! 4. The completion write happens even if every visuals handle has been
//!    dropped or detached, so the record never gets stuck mid-transition.
//! 5. Detached visuals stop observing the registry; clones held elsewhere
//!    keep their last pose and never start another transition.
//!
//! The backdrop fades independently of the content: towards 1 on `Growing`,
//! towards 0 on `Shrinking`, with its own timing.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use anchored_popup_core::{
    IntRect, IntSize, LifecycleState, Placement, Point, PopupConfig, PopupGeometry, PopupId,
    ScreenBounds, Timing, VisualTransform,
};
use tracing::{debug, trace};

use crate::reactive::Subscription;
use crate::registry::Registry;
use crate::scheduler::Scheduler;

/// Values a transition can interpolate.
trait Interpolate: Copy {
    fn interpolate(&self, to: &Self, t: f64) -> Self;
}

impl Interpolate for VisualTransform {
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        self.lerp(to, t)
    }
}

impl Interpolate for f64 {
    fn interpolate(&self, to: &Self, t: f64) -> Self {
        (self + (to - self) * t).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Motion<T> {
    Rest(T),
    Moving {
        from: T,
        to: T,
        started: Duration,
        timing: Timing,
    },
}

impl<T: Interpolate> Motion<T> {
    fn sample(&self, now: Duration) -> T {
        match *self {
            Self::Rest(value) => value,
            Self::Moving {
                from,
                to,
                started,
                timing,
            } => {
                let elapsed = now.saturating_sub(started);
                if elapsed >= timing.duration {
                    to
                } else {
                    from.interpolate(&to, timing.progress(elapsed))
                }
            }
        }
    }

    fn target(&self) -> T {
        match *self {
            Self::Rest(value) | Self::Moving { to: value, .. } => value,
        }
    }
}

/// Everything an overlay needs from the runtime that owns it.
#[derive(Clone)]
pub struct OverlayContext {
    pub registry: Registry,
    pub scheduler: Scheduler,
    pub screen: Rc<Cell<ScreenBounds>>,
    pub backdrop_timing: Timing,
}

impl fmt::Debug for OverlayContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlayContext")
            .field("screen", &self.screen.get())
            .field("backdrop_timing", &self.backdrop_timing)
            .finish_non_exhaustive()
    }
}

struct VisualsState {
    observed: LifecycleState,
    anchor: IntRect,
    content: IntSize,
    in_flight: bool,
    pending_grow: bool,
    motion: Motion<VisualTransform>,
    backdrop: Motion<f64>,
}

struct VisualsInner {
    id: PopupId,
    registry: Registry,
    scheduler: Scheduler,
    screen: Rc<Cell<ScreenBounds>>,
    placement: Placement,
    timing: Timing,
    backdrop_timing: Timing,
    backdrop_visible: bool,
    state: RefCell<VisualsState>,
    subscriptions: RefCell<Vec<Subscription>>,
    detached: Cell<bool>,
}

/// Live visuals of one overlay: the host reads its transform every frame.
///
/// Clones share state. Dropping the last clone, or closing the surface
/// that shows it, stops observing the registry.
#[derive(Clone)]
pub struct OverlayVisuals {
    inner: Rc<VisualsInner>,
}

impl fmt::Debug for OverlayVisuals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.inner.state.borrow();
        f.debug_struct("OverlayVisuals")
            .field("id", &self.inner.id)
            .field("observed", &st.observed)
            .field("anchor", &st.anchor)
            .field("content", &st.content)
            .field("in_flight", &st.in_flight)
            .finish()
    }
}

impl OverlayVisuals {
    /// Create visuals for `id` and start observing its streams.
    ///
    /// The current frame and state are replayed immediately, so attaching
    /// while the record is already `Growing` starts (or defers) the grow.
    pub fn attach(id: PopupId, config: &PopupConfig, ctx: &OverlayContext) -> Self {
        let inner = Rc::new(VisualsInner {
            id: id.clone(),
            registry: ctx.registry.clone(),
            scheduler: ctx.scheduler.clone(),
            screen: Rc::clone(&ctx.screen),
            placement: config.placement_policy(),
            timing: config.transition_timing(),
            backdrop_timing: ctx.backdrop_timing,
            backdrop_visible: config.backdrop().is_visible(),
            state: RefCell::new(VisualsState {
                observed: LifecycleState::Hidden,
                anchor: IntRect::ZERO,
                content: IntSize::ZERO,
                in_flight: false,
                pending_grow: false,
                motion: Motion::Rest(VisualTransform::TRANSPARENT),
                backdrop: Motion::Rest(0.0),
            }),
            subscriptions: RefCell::new(Vec::new()),
            detached: Cell::new(false),
        });

        // Frames first so a replayed `Growing` already sees the anchor.
        let weak = Rc::downgrade(&inner);
        let frames = ctx.registry.frame_changes(id.clone()).subscribe(move |record| {
            if let Some(inner) = weak.upgrade() {
                inner.on_frame(record.anchor_frame);
            }
        });
        let weak = Rc::downgrade(&inner);
        let states = ctx.registry.state_changes(id).subscribe(move |record| {
            if let Some(inner) = weak.upgrade() {
                inner.on_state(record.state);
            }
        });
        inner.subscriptions.borrow_mut().extend([frames, states]);

        Self { inner }
    }

    pub fn id(&self) -> &PopupId {
        &self.inner.id
    }

    /// Report the overlay content's laid-out size.
    ///
    /// A deferred grow starts as soon as both measurements are known.
    pub fn content_measured(&self, size: impl Into<IntSize>) {
        if self.inner.detached.get() {
            return;
        }
        let size = size.into();
        {
            let mut st = self.inner.state.borrow_mut();
            if st.content == size {
                return;
            }
            st.content = size;
        }
        trace!(popup_id = %self.inner.id, ?size, "content measured");
        self.inner.refresh_rest();
        self.inner.try_start_grow();
    }

    /// Scale, offset and opacity at the current instant.
    pub fn transform(&self) -> VisualTransform {
        let now = self.inner.scheduler.now();
        self.inner.state.borrow().motion.sample(now)
    }

    /// Backdrop opacity at the current instant, in `[0, 1]`.
    pub fn backdrop_opacity(&self) -> f64 {
        let now = self.inner.scheduler.now();
        self.inner.state.borrow().backdrop.sample(now)
    }

    /// Where the content's centre is laid out before the transform: the
    /// anchor's quantized midpoint.
    pub fn position(&self) -> Point {
        self.inner.state.borrow().anchor.center()
    }

    /// Whether a grow or shrink is in flight.
    pub fn is_transitioning(&self) -> bool {
        self.inner.state.borrow().in_flight
    }

    /// Whether a grow is waiting for a measurement.
    pub fn is_deferred(&self) -> bool {
        self.inner.state.borrow().pending_grow
    }

    /// Last lifecycle state observed from the registry.
    pub fn observed_state(&self) -> LifecycleState {
        self.inner.state.borrow().observed
    }

    pub fn content_size(&self) -> IntSize {
        self.inner.state.borrow().content
    }

    pub fn anchor_frame(&self) -> IntRect {
        self.inner.state.borrow().anchor
    }

    /// Stop observing the registry.
    ///
    /// Called when the surface showing these visuals closes. Every clone is
    /// affected, so a host that keeps an old request around cannot drive
    /// the next open of the same id. A completion already scheduled still
    /// writes its terminal state.
    pub(crate) fn detach(&self) {
        if self.inner.detached.replace(true) {
            return;
        }
        self.inner.subscriptions.borrow_mut().clear();
        self.inner.state.borrow_mut().pending_grow = false;
        debug!(popup_id = %self.inner.id, "overlay visuals detached");
    }

    /// Whether [`Self::detach`] has run; detached visuals are inert.
    pub fn is_detached(&self) -> bool {
        self.inner.detached.get()
    }
}

impl VisualsInner {
    fn backdrop_level(&self, level: f64) -> f64 {
        if self.backdrop_visible { level } else { 0.0 }
    }

    fn on_frame(self: &Rc<Self>, frame: IntRect) {
        if self.detached.get() {
            return;
        }
        {
            let mut st = self.state.borrow_mut();
            if st.anchor == frame {
                return;
            }
            st.anchor = frame;
        }
        self.refresh_rest();
        self.try_start_grow();
    }

    fn on_state(self: &Rc<Self>, observed: LifecycleState) {
        // a delivery round may still reach a subscription dropped mid-round
        if self.detached.get() {
            return;
        }
        let now = self.scheduler.now();
        {
            let mut st = self.state.borrow_mut();
            st.observed = observed;
            let fade_to = match observed {
                LifecycleState::Growing => Some(self.backdrop_level(1.0)),
                LifecycleState::Shrinking => Some(0.0),
                LifecycleState::Hidden | LifecycleState::Displayed => None,
            };
            if let Some(to) = fade_to {
                st.backdrop = Motion::Moving {
                    from: st.backdrop.sample(now),
                    to,
                    started: now,
                    timing: self.backdrop_timing,
                };
            }
        }

        match observed {
            LifecycleState::Growing => self.try_start_grow(),
            LifecycleState::Shrinking => self.start_shrink(),
            LifecycleState::Displayed | LifecycleState::Hidden => self.refresh_rest(),
        }
    }

    /// Put the visuals at the rest pose of the observed state, unless a
    /// transition owns them.
    fn refresh_rest(&self) {
        let screen = self.screen.get();
        let mut st = self.state.borrow_mut();
        if st.in_flight {
            return;
        }
        let geometry = PopupGeometry::measured(st.anchor, st.content);
        let rest = match (st.observed, geometry) {
            (LifecycleState::Displayed, Some(g)) => g.displayed(self.placement, screen),
            (LifecycleState::Displayed, None) => VisualTransform::IDENTITY,
            (_, Some(g)) => g.hidden(),
            (_, None) => VisualTransform::TRANSPARENT,
        };
        st.motion = Motion::Rest(rest);

        let settle = match st.observed {
            LifecycleState::Displayed => Some(self.backdrop_level(1.0)),
            LifecycleState::Hidden => Some(0.0),
            LifecycleState::Growing | LifecycleState::Shrinking => None,
        };
        if let Some(level) = settle
            && st.backdrop.target() != level
        {
            st.backdrop = Motion::Rest(level);
        }
    }

    fn try_start_grow(self: &Rc<Self>) {
        let now = self.scheduler.now();
        let screen = self.screen.get();
        let mut st = self.state.borrow_mut();
        if st.observed != LifecycleState::Growing {
            return;
        }
        if st.in_flight {
            // measurement changed mid-grow; the running transition keeps its geometry
            trace!(popup_id = %self.id, "grow already in flight");
            return;
        }
        let Some(geometry) = PopupGeometry::measured(st.anchor, st.content) else {
            if !st.pending_grow {
                debug!(
                    popup_id = %self.id,
                    anchor = ?st.anchor,
                    content = ?st.content,
                    "grow deferred until anchor and content are measured"
                );
            }
            st.pending_grow = true;
            return;
        };

        st.pending_grow = false;
        st.in_flight = true;
        st.motion = Motion::Moving {
            from: geometry.hidden(),
            to: geometry.displayed(self.placement, screen),
            started: now,
            timing: self.timing,
        };
        drop(st);

        debug!(
            popup_id = %self.id,
            duration_ms = self.timing.duration.as_millis() as u64,
            "grow started"
        );
        self.schedule_completion(LifecycleState::Displayed);
    }

    fn start_shrink(self: &Rc<Self>) {
        let now = self.scheduler.now();
        let mut st = self.state.borrow_mut();
        if st.in_flight {
            debug!(popup_id = %self.id, "transition in flight, shrink trigger dropped");
            return;
        }
        st.pending_grow = false;
        let from = st.motion.sample(now);
        let to = match PopupGeometry::measured(st.anchor, st.content) {
            Some(g) => g.hidden(),
            None => VisualTransform {
                opacity: 0.0,
                ..from
            },
        };
        st.in_flight = true;
        st.motion = Motion::Moving {
            from,
            to,
            started: now,
            timing: self.timing,
        };
        drop(st);

        debug!(
            popup_id = %self.id,
            duration_ms = self.timing.duration.as_millis() as u64,
            "shrink started"
        );
        self.schedule_completion(LifecycleState::Hidden);
    }

    fn schedule_completion(self: &Rc<Self>, target: LifecycleState) {
        let registry = self.registry.clone();
        let id = self.id.clone();
        let weak = Rc::downgrade(self);
        self.scheduler.schedule_after(self.timing.duration, move || {
            if let Some(inner) = weak.upgrade() {
                inner.finish_transition();
            }
            let outcome = registry.set_state(&id, target);
            if !outcome.is_applied() {
                debug!(popup_id = %id, ?outcome, "transition completion not applied");
            }
        });
    }

    fn finish_transition(&self) {
        let mut st = self.state.borrow_mut();
        st.in_flight = false;
        st.motion = Motion::Rest(st.motion.target());
    }
}
