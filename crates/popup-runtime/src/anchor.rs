#![forbid(unsafe_code)]

//! Anchor mount point: ties one anchor to its overlay surface.
//!
//! The binding watches its id's state stream and keeps the host in sync:
//! a surface is open exactly while the state is `Growing`, `Displayed` or
//! `Shrinking`. It also feeds frame reports for its own id into the
//! registry.
//!
//! If the host cannot open a surface, the record stays `Growing` and the
//! binding retries on the next frame report for its anchor. Closing never
//! gives up: while the host is borrowed the close is retried every
//! [`CLOSE_RETRY_DELAY`].
//!
//! Closing a surface detaches its [`OverlayVisuals`], so a request the host
//! kept around cannot animate the next open of the same id.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use anchored_popup_core::{IntRect, LifecycleState, PopupConfig, PopupId};
use tracing::{debug, info, warn};

use crate::host::{DismissHandle, HostError, OverlayHost, SurfaceRequest};
use crate::orchestrator::{OverlayContext, OverlayVisuals};
use crate::reactive::Subscription;
use crate::registry::StateWrite;
use crate::scheduler::{Scheduler, TimerId};
use crate::tracking::{AnchorTracker, FrameReport};

/// Delay between attempts to close a surface while the host is borrowed.
pub const CLOSE_RETRY_DELAY: Duration = Duration::from_millis(16);

type ContentBuilder<C> = Box<dyn Fn(&DismissHandle) -> C>;

pub(crate) struct AnchorBinding<H: OverlayHost + 'static> {
    id: PopupId,
    config: PopupConfig,
    tracker: AnchorTracker,
    ctx: OverlayContext,
    host: Rc<RefCell<H>>,
    builder: ContentBuilder<H::Content>,
    surface: RefCell<Option<OverlayVisuals>>,
    pending_close: Rc<Cell<Option<TimerId>>>,
    states: RefCell<Option<Subscription>>,
}

impl<H: OverlayHost + 'static> AnchorBinding<H> {
    pub(crate) fn attach(
        id: PopupId,
        config: PopupConfig,
        ctx: OverlayContext,
        host: Rc<RefCell<H>>,
        builder: ContentBuilder<H::Content>,
    ) -> Rc<Self> {
        let binding = Rc::new(Self {
            tracker: AnchorTracker::new(id.clone(), ctx.registry.clone()),
            id: id.clone(),
            config,
            ctx,
            host,
            builder,
            surface: RefCell::new(None),
            pending_close: Rc::new(Cell::new(None)),
            states: RefCell::new(None),
        });

        let weak = Rc::downgrade(&binding);
        let sub = binding.ctx.registry.state_changes(id).subscribe(move |record| {
            if let Some(binding) = weak.upgrade() {
                binding.sync_surface(record.state.has_surface());
            }
        });
        *binding.states.borrow_mut() = Some(sub);
        debug!(popup_id = %binding.id, "anchor attached");
        binding
    }

    pub(crate) fn id(&self) -> &PopupId {
        &self.id
    }

    /// Multicast frame report entry point. Returns `true` if it was ours.
    pub(crate) fn accept(self: &Rc<Self>, report: &FrameReport) -> bool {
        if !self.tracker.accept(report) {
            return false;
        }
        self.retry_open();
        true
    }

    pub(crate) fn report(self: &Rc<Self>, frame: IntRect) {
        self.tracker.report(frame);
        self.retry_open();
    }

    fn wants_surface(&self) -> bool {
        self.ctx
            .registry
            .get(&self.id)
            .is_some_and(|record| record.state.has_surface())
    }

    fn retry_open(self: &Rc<Self>) {
        if self.wants_surface() && self.surface.borrow().is_none() {
            self.open_or_warn();
        }
    }

    fn sync_surface(self: &Rc<Self>, wants_surface: bool) {
        if wants_surface {
            self.open_or_warn();
        } else {
            self.close_surface();
        }
    }

    fn open_or_warn(self: &Rc<Self>) {
        if let Err(err) = self.open_surface() {
            warn!(
                popup_id = %self.id,
                error = %err,
                "overlay surface not opened, retrying on next frame report"
            );
        }
    }

    /// Open now if the state wants a surface and none is open.
    fn try_open(self: &Rc<Self>) -> Result<bool, HostError> {
        if !self.wants_surface() {
            return Ok(false);
        }
        self.open_surface()
    }

    /// `Ok(true)` once a surface is open, `Ok(false)` if the host was busy
    /// and the open was re-dispatched.
    fn open_surface(self: &Rc<Self>) -> Result<bool, HostError> {
        if self.surface.borrow().is_some() {
            return Ok(true);
        }
        let Ok(mut host) = self.host.try_borrow_mut() else {
            debug!(popup_id = %self.id, "host busy, surface open re-dispatched");
            let weak = Rc::downgrade(self);
            self.ctx.scheduler.dispatch(move || {
                if let Some(binding) = weak.upgrade() {
                    binding.retry_open();
                }
            });
            return Ok(false);
        };

        // a close still waiting for the host must not land on the new surface
        if let Some(timer) = self.pending_close.take() {
            self.ctx.scheduler.cancel(timer);
            host.close_surface(&self.id);
            info!(popup_id = %self.id, "overlay surface closed");
        }

        let dismiss = DismissHandle::new(self.id.clone(), self.ctx.registry.downgrade());
        let content = (self.builder)(&dismiss);
        let visuals = OverlayVisuals::attach(self.id.clone(), &self.config, &self.ctx);
        let request = SurfaceRequest::new(&self.config, visuals.clone(), dismiss);

        match host.open_surface(request, content) {
            Ok(()) => {
                info!(popup_id = %self.id, "overlay surface opened");
                *self.surface.borrow_mut() = Some(visuals);
                Ok(true)
            }
            Err(err) => {
                visuals.detach();
                Err(err)
            }
        }
    }

    fn close_surface(&self) {
        let Some(visuals) = self.surface.borrow_mut().take() else {
            return;
        };
        visuals.detach();
        close_on_host(&self.host, &self.id, &self.ctx.scheduler, &self.pending_close);
    }

    fn tap(&self) -> StateWrite {
        if let Ok(mut host) = self.host.try_borrow_mut() {
            host.anchor_tapped(&self.id);
        }
        self.ctx.registry.ensure(self.id.clone());
        self.ctx.registry.set_state(&self.id, LifecycleState::Growing)
    }

    fn visuals(&self) -> Option<OverlayVisuals> {
        self.surface.borrow().clone()
    }
}

/// Close `id` on the host, retrying every [`CLOSE_RETRY_DELAY`] while the
/// host is borrowed elsewhere. The pending retry is tracked in `pending`.
fn close_on_host<H: OverlayHost + 'static>(
    host: &Rc<RefCell<H>>,
    id: &PopupId,
    scheduler: &Scheduler,
    pending: &Rc<Cell<Option<TimerId>>>,
) {
    let closed = if let Ok(mut host) = host.try_borrow_mut() {
        host.close_surface(id);
        true
    } else {
        false
    };
    if closed {
        info!(popup_id = %id, "overlay surface closed");
        return;
    }

    debug!(popup_id = %id, "host busy, surface close retried");
    let retry_host = Rc::clone(host);
    let retry_id = id.clone();
    let retry_scheduler = scheduler.clone();
    let slot = Rc::clone(pending);
    let timer = scheduler.schedule_after(CLOSE_RETRY_DELAY, move || {
        slot.set(None);
        close_on_host(&retry_host, &retry_id, &retry_scheduler, &slot);
    });
    pending.set(Some(timer));
}

impl<H: OverlayHost + 'static> Drop for AnchorBinding<H> {
    fn drop(&mut self) {
        if let Some(visuals) = self.surface.get_mut().take() {
            visuals.detach();
            close_on_host(&self.host, &self.id, &self.ctx.scheduler, &self.pending_close);
        }
        debug!(popup_id = %self.id, "anchor detached");
    }
}

/// Owner handle for an attached anchor.
///
/// Dropping it detaches the anchor: frame reports for its id are no longer
/// applied and any open surface is closed.
pub struct AnchorHandle<H: OverlayHost + 'static> {
    binding: Rc<AnchorBinding<H>>,
}

impl<H: OverlayHost + 'static> fmt::Debug for AnchorHandle<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnchorHandle")
            .field("id", &self.binding.id)
            .field("surface_open", &self.binding.surface.borrow().is_some())
            .finish()
    }
}

impl<H: OverlayHost + 'static> AnchorHandle<H> {
    pub(crate) fn new(binding: Rc<AnchorBinding<H>>) -> Self {
        Self { binding }
    }

    pub(crate) fn downgrade(&self) -> Weak<AnchorBinding<H>> {
        Rc::downgrade(&self.binding)
    }

    pub fn id(&self) -> &PopupId {
        self.binding.id()
    }

    pub fn config(&self) -> &PopupConfig {
        &self.binding.config
    }

    /// Report the anchor's current global frame from a layout pass on the
    /// owning context.
    pub fn report_frame(&self, frame: impl Into<IntRect>) {
        self.binding.report(frame.into());
    }

    /// The anchor was tapped: notify the host, then open the popup.
    pub fn tap(&self) -> StateWrite {
        self.binding.tap()
    }

    /// Open the surface now instead of waiting for the next frame report.
    ///
    /// Returns `Ok(true)` if a surface is open afterwards and `Ok(false)` if
    /// the popup's state wants none or the host was busy and the open was
    /// re-dispatched. A host failure is returned instead of logged.
    pub fn try_open_surface(&self) -> Result<bool, HostError> {
        self.binding.try_open()
    }

    /// Visuals of the open overlay, if a surface is open.
    pub fn visuals(&self) -> Option<OverlayVisuals> {
        self.binding.visuals()
    }

    pub fn is_surface_open(&self) -> bool {
        self.binding.surface.borrow().is_some()
    }

    /// Stop tracking this anchor.
    pub fn detach(self) {
        drop(self);
    }
}
