#![forbid(unsafe_code)]

//! The popup runtime: owner of the registry, scheduler and host.
//!
//! One [`PopupRuntime`] lives on the UI context. Anchors attach to it, the
//! host is driven by it, and the caller moves time forward with
//! [`PopupRuntime::advance`] (tests, headless) or [`PopupRuntime::tick`]
//! (real clock).
//!
//! Work posted from other threads through [`FrameReporter`] and
//! [`PopupTrigger`] is applied when the runtime is pumped; `advance`, `tick`
//! and `run_until_idle` pump first.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::mpsc;
use std::time::Duration;

use anchored_popup_core::{LifecycleState, PopupConfig, PopupId, ScreenBounds};
use tracing::{debug, warn};
use web_time::Instant;

use crate::anchor::{AnchorBinding, AnchorHandle};
use crate::host::{DismissHandle, OverlayHost};
use crate::orchestrator::OverlayContext;
use crate::registry::{Registry, StateWrite};
use crate::scheduler::Scheduler;
use crate::settings::RuntimeSettings;
use crate::tracking::{FrameReport, FrameReporter, PopupTrigger, RuntimeMessage};

/// Upper bound on jobs fired by one [`PopupRuntime::run_until_idle`] call.
pub const MAX_IDLE_JOBS: usize = 10_000;

/// Single-context popup runtime.
pub struct PopupRuntime<H: OverlayHost + 'static> {
    registry: Registry,
    scheduler: Scheduler,
    host: Rc<RefCell<H>>,
    screen: Rc<Cell<ScreenBounds>>,
    settings: RuntimeSettings,
    anchors: RefCell<Vec<Weak<AnchorBinding<H>>>>,
    inbox: mpsc::Receiver<RuntimeMessage>,
    outbox: mpsc::Sender<RuntimeMessage>,
    last_tick: Cell<Option<Instant>>,
}

impl<H: OverlayHost + 'static> fmt::Debug for PopupRuntime<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PopupRuntime")
            .field("registry", &self.registry)
            .field("scheduler", &self.scheduler)
            .field("screen", &self.screen.get())
            .field("anchors", &self.anchors.borrow().len())
            .finish_non_exhaustive()
    }
}

impl<H: OverlayHost + 'static> PopupRuntime<H> {
    pub fn new(host: H, settings: RuntimeSettings) -> Self {
        let (outbox, inbox) = mpsc::channel();
        Self {
            registry: Registry::new(),
            scheduler: Scheduler::new(),
            host: Rc::new(RefCell::new(host)),
            screen: Rc::new(Cell::new(settings.screen)),
            settings,
            anchors: RefCell::new(Vec::new()),
            inbox,
            outbox,
            last_tick: Cell::new(None),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn host(&self) -> Ref<'_, H> {
        self.host.borrow()
    }

    pub fn host_mut(&self) -> RefMut<'_, H> {
        self.host.borrow_mut()
    }

    pub fn screen(&self) -> ScreenBounds {
        self.screen.get()
    }

    /// Update the bounds used by screen-relative placement. Applies to
    /// transitions that start afterwards.
    pub fn set_screen(&self, screen: ScreenBounds) {
        self.screen.set(screen);
    }

    /// Declare an anchor for `id`.
    ///
    /// `builder` produces the overlay content each time a surface opens and
    /// receives the handle the content uses to close itself. Ids must be
    /// unique per popup definition; two anchors sharing an id drive the
    /// same popup.
    pub fn attach_anchor(
        &self,
        id: impl Into<PopupId>,
        config: PopupConfig,
        builder: impl Fn(&DismissHandle) -> H::Content + 'static,
    ) -> AnchorHandle<H> {
        let binding = AnchorBinding::attach(
            id.into(),
            config,
            self.overlay_context(),
            Rc::clone(&self.host),
            Box::new(builder),
        );
        let handle = AnchorHandle::new(binding);
        let mut anchors = self.anchors.borrow_mut();
        anchors.retain(|weak| weak.strong_count() > 0);
        anchors.push(handle.downgrade());
        handle
    }

    /// Start growing `id`. Dropped if the popup is not hidden.
    pub fn open(&self, id: impl Into<PopupId>) -> StateWrite {
        let id = id.into();
        self.registry.ensure(id.clone());
        let outcome = self.registry.set_state(&id, LifecycleState::Growing);
        if !outcome.is_applied() {
            debug!(popup_id = %id, ?outcome, "open request dropped");
        }
        outcome
    }

    /// Start shrinking `id`. Dropped if the popup is not displayed.
    pub fn close(&self, id: impl Into<PopupId>) -> StateWrite {
        let id = id.into();
        let outcome = self.registry.set_state(&id, LifecycleState::Shrinking);
        if !outcome.is_applied() {
            debug!(popup_id = %id, ?outcome, "close request dropped");
        }
        outcome
    }

    /// `Send` handle for `open`/`close` from any thread.
    pub fn trigger(&self) -> PopupTrigger {
        PopupTrigger::new(self.outbox.clone())
    }

    /// `Send` handle for frame reports from any thread.
    pub fn frame_reporter(&self) -> FrameReporter {
        FrameReporter::new(self.outbox.clone())
    }

    /// Apply every message queued by other threads. Returns how many were
    /// applied.
    pub fn pump(&self) -> usize {
        let mut applied = 0;
        while let Ok(message) = self.inbox.try_recv() {
            match message {
                RuntimeMessage::Frame(report) => self.dispatch_frame(&report),
                RuntimeMessage::Open(id) => {
                    self.open(id);
                }
                RuntimeMessage::Close(id) => {
                    self.close(id);
                }
            }
            applied += 1;
        }
        applied
    }

    /// Pump, then move virtual time forward by `delta`. Returns the number
    /// of scheduled jobs fired.
    pub fn advance(&self, delta: Duration) -> usize {
        self.pump();
        self.scheduler.advance(delta)
    }

    /// Advance by the wall-clock time since the previous tick.
    pub fn tick(&self) -> usize {
        let now = Instant::now();
        let elapsed = self
            .last_tick
            .replace(Some(now))
            .map_or(Duration::ZERO, |last| now.duration_since(last));
        self.advance(elapsed)
    }

    /// Pump and fire scheduled jobs until nothing is pending, jumping
    /// virtual time from deadline to deadline.
    pub fn run_until_idle(&self) -> usize {
        self.pump();
        self.scheduler.run_until_idle(MAX_IDLE_JOBS)
    }

    /// Number of anchors still attached.
    pub fn anchor_count(&self) -> usize {
        self.anchors
            .borrow()
            .iter()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    fn overlay_context(&self) -> OverlayContext {
        OverlayContext {
            registry: self.registry.clone(),
            scheduler: self.scheduler.clone(),
            screen: Rc::clone(&self.screen),
            backdrop_timing: self.settings.backdrop_timing,
        }
    }

    /// Multicast a report to every attached anchor.
    fn dispatch_frame(&self, report: &FrameReport) {
        let live: Vec<_> = {
            let mut anchors = self.anchors.borrow_mut();
            anchors.retain(|weak| weak.strong_count() > 0);
            anchors.iter().filter_map(Weak::upgrade).collect()
        };
        let accepted = live
            .iter()
            .fold(false, |accepted, binding| binding.accept(report) || accepted);
        if !accepted {
            warn!(popup_id = %report.id, "frame report for detached anchor dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::headless::{HeadlessHost, HostCall};
    use anchored_popup_core::{Frame, IntRect, IntSize};

    type Host = HeadlessHost<String>;

    fn runtime() -> PopupRuntime<Host> {
        PopupRuntime::new(HeadlessHost::new(), RuntimeSettings::default())
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn open_creates_record_and_surface() {
        let rt = runtime();
        let anchor = rt.attach_anchor("menu", PopupConfig::default(), |_| "menu".to_string());
        anchor.report_frame(IntRect::new(50, 50, 100, 40));

        assert!(rt.open("menu").is_applied());
        assert!(anchor.is_surface_open());
        assert!(rt.host().is_open("menu"));
        assert_eq!(rt.host().content("menu").map(String::as_str), Some("menu"));
    }

    #[test]
    fn full_cycle_closes_surface() {
        let rt = runtime();
        let anchor = rt.attach_anchor("menu", PopupConfig::default(), |_| String::new());
        anchor.report_frame(IntRect::new(50, 50, 100, 40));
        rt.open("menu");
        anchor.visuals().unwrap().content_measured(IntSize::new(120, 60));

        rt.advance(ms(300));
        assert_eq!(rt.registry().get("menu").unwrap().state, LifecycleState::Displayed);

        assert!(rt.close("menu").is_applied());
        rt.advance(ms(300));
        assert_eq!(rt.registry().get("menu").unwrap().state, LifecycleState::Hidden);
        assert!(!rt.host().is_open("menu"));
        assert_eq!(
            rt.host().calls(),
            &[
                HostCall::Open(PopupId::from("menu")),
                HostCall::Close(PopupId::from("menu"))
            ]
        );
    }

    #[test]
    fn second_open_is_dropped() {
        let rt = runtime();
        let _anchor = rt.attach_anchor("menu", PopupConfig::default(), |_| String::new());
        assert!(rt.open("menu").is_applied());
        assert_eq!(rt.open("menu"), StateWrite::Unchanged);
        assert_eq!(rt.host().open_count(), 1);
    }

    #[test]
    fn close_on_unknown_id_is_noop() {
        let rt = runtime();
        assert_eq!(rt.close("nobody"), StateWrite::UnknownId);
    }

    #[test]
    fn pump_applies_cross_thread_messages() {
        let rt = runtime();
        let anchor = rt.attach_anchor("a", PopupConfig::default(), |_| String::new());
        let reporter = rt.frame_reporter();
        let trigger = rt.trigger();

        std::thread::spawn(move || {
            reporter.report("a", Frame::new(0.0, 0.0, 40.0, 20.0));
            trigger.open("a");
        })
        .join()
        .unwrap();

        assert_eq!(rt.pump(), 2);
        let record = rt.registry().get("a").unwrap();
        assert_eq!(record.anchor_frame, IntRect::new(20, 10, 40, 20));
        assert_eq!(record.state, LifecycleState::Growing);
        assert!(anchor.is_surface_open());
    }

    #[test]
    fn detached_anchor_ignores_reports() {
        let rt = runtime();
        let anchor = rt.attach_anchor("a", PopupConfig::default(), |_| String::new());
        anchor.detach();
        assert_eq!(rt.anchor_count(), 0);

        rt.frame_reporter().report("a", Frame::new(0.0, 0.0, 10.0, 10.0));
        rt.pump();
        assert!(rt.registry().get("a").is_none());
    }

    #[test]
    fn tap_notifies_host_before_open() {
        let rt = runtime();
        let anchor = rt.attach_anchor("a", PopupConfig::default(), |_| String::new());
        assert!(anchor.tap().is_applied());
        assert_eq!(
            rt.host().calls(),
            &[
                HostCall::AnchorTapped(PopupId::from("a")),
                HostCall::Open(PopupId::from("a"))
            ]
        );
    }

    #[test]
    fn tick_uses_wall_clock() {
        let rt = runtime();
        rt.tick();
        std::thread::sleep(ms(5));
        rt.tick();
        assert!(rt.now() >= ms(5));
    }

    #[test]
    fn set_screen_is_shared_with_overlays() {
        let rt = runtime();
        rt.set_screen(ScreenBounds::new(100.0, 200.0));
        assert_eq!(rt.screen(), ScreenBounds::new(100.0, 200.0));
        assert_eq!(rt.overlay_context().screen.get(), ScreenBounds::new(100.0, 200.0));
    }

    #[test]
    fn screen_relative_grow_uses_updated_bounds() {
        use anchored_popup_core::{Placement, UnitPoint, Vec2};

        let rt = runtime();
        let cfg = PopupConfig::new().placement(Placement::ScreenRelative(UnitPoint::CENTER));
        let anchor = rt.attach_anchor("sheet", cfg, |_| String::new());
        anchor.report_frame(IntRect::new(50, 50, 100, 40));
        rt.set_screen(ScreenBounds::new(400.0, 800.0));

        rt.open("sheet");
        let visuals = anchor.visuals().unwrap();
        visuals.content_measured(IntSize::new(120, 60));
        rt.run_until_idle();

        // anchor centre (50, 50) moved to the centre of a 400x800 screen
        assert_eq!(rt.registry().get("sheet").unwrap().state, LifecycleState::Displayed);
        assert_eq!(visuals.transform().offset, Vec2::new(150.0, 350.0));
    }
}
