#![forbid(unsafe_code)]

//! Overlay host contract.
//!
//! The host owns the top-level surfaces that actually render overlays and
//! route touches. The runtime asks it to open exactly one surface per id
//! when `Growing` is first observed and to close it on `Hidden`.
//!
//! Hit testing stays on the host side. The [`SurfaceRequest`] handed to
//! [`OverlayHost::open_surface`] carries the tap policy and the dismiss
//! handle the host needs to implement it.

use std::fmt;

use anchored_popup_core::{Background, LifecycleState, PopupConfig, PopupId};
use tracing::debug;

use crate::orchestrator::OverlayVisuals;
use crate::registry::{StateWrite, WeakRegistry};

/// Failure reported by a host when a surface cannot be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// No window or hosting context is available.
    NoHostingContext,
    /// The host refused to open a surface for this id.
    SurfaceRejected { id: PopupId, reason: String },
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoHostingContext => write!(f, "no hosting context available for overlay"),
            Self::SurfaceRejected { id, reason } => {
                write!(f, "overlay surface for '{id}' rejected: {reason}")
            }
        }
    }
}

impl std::error::Error for HostError {}

/// Platform side of overlay presentation.
pub trait OverlayHost {
    /// Content produced by an anchor's builder.
    type Content;

    /// Open the overlay surface for `request.id()`.
    ///
    /// Must not create a second surface if one is already open for the id.
    fn open_surface(
        &mut self,
        request: SurfaceRequest,
        content: Self::Content,
    ) -> Result<(), HostError>;

    /// Tear down the surface for `id`, if any.
    fn close_surface(&mut self, id: &PopupId);

    /// An anchor was tapped and is about to open its popup.
    ///
    /// Hosts resign text focus here so the keyboard does not cover the
    /// overlay.
    fn anchor_tapped(&mut self, _id: &PopupId) {}
}

/// Lets overlay content (or the host) request its own close.
#[derive(Clone)]
pub struct DismissHandle {
    id: PopupId,
    registry: WeakRegistry,
}

impl fmt::Debug for DismissHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DismissHandle").field("id", &self.id).finish()
    }
}

impl DismissHandle {
    pub fn new(id: PopupId, registry: WeakRegistry) -> Self {
        Self { id, registry }
    }

    pub fn id(&self) -> &PopupId {
        &self.id
    }

    /// Start shrinking. Ignored unless the popup is currently displayed.
    pub fn dismiss(&self) -> StateWrite {
        match self.registry.upgrade() {
            Some(registry) => registry.set_state(&self.id, LifecycleState::Shrinking),
            None => StateWrite::UnknownId,
        }
    }
}

/// Everything a host needs to present one overlay.
#[derive(Clone)]
pub struct SurfaceRequest {
    id: PopupId,
    close_on_tap: bool,
    close_on_tap_outside: bool,
    passthrough: bool,
    background: Background,
    visuals: OverlayVisuals,
    dismiss: DismissHandle,
}

impl fmt::Debug for SurfaceRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceRequest")
            .field("id", &self.id)
            .field("close_on_tap", &self.close_on_tap)
            .field("close_on_tap_outside", &self.close_on_tap_outside)
            .field("passthrough", &self.passthrough)
            .field("background", &self.background)
            .finish_non_exhaustive()
    }
}

impl SurfaceRequest {
    pub fn new(
        config: &PopupConfig,
        visuals: OverlayVisuals,
        dismiss: DismissHandle,
    ) -> Self {
        Self {
            id: dismiss.id().clone(),
            close_on_tap: config.closes_on_tap(),
            close_on_tap_outside: config.closes_on_tap_outside(),
            passthrough: config.is_passthrough(),
            background: config.backdrop().clone(),
            visuals,
            dismiss,
        }
    }

    pub fn id(&self) -> &PopupId {
        &self.id
    }

    /// Whether backdrop taps fall through to the UI underneath.
    pub fn passthrough(&self) -> bool {
        self.passthrough
    }

    pub fn background(&self) -> &Background {
        &self.background
    }

    /// Live transform and backdrop opacity for rendering.
    pub fn visuals(&self) -> &OverlayVisuals {
        &self.visuals
    }

    pub fn dismiss_handle(&self) -> &DismissHandle {
        &self.dismiss
    }

    /// Route a tap that landed on the overlay content.
    ///
    /// Returns `true` if the popup started closing.
    pub fn handle_content_tap(&self) -> bool {
        if !self.close_on_tap {
            return false;
        }
        let outcome = self.dismiss.dismiss();
        debug!(popup_id = %self.id, ?outcome, "content tap");
        outcome.is_applied()
    }

    /// Route a tap that landed on the backdrop.
    ///
    /// Returns `true` if the popup started closing. Whether the tap also
    /// reaches the UI underneath is governed by [`Self::passthrough`].
    pub fn handle_outside_tap(&self) -> bool {
        if !self.close_on_tap_outside {
            return false;
        }
        let outcome = self.dismiss.dismiss();
        debug!(popup_id = %self.id, ?outcome, "outside tap");
        outcome.is_applied()
    }
}

/// In-memory host that records every call, for tests and headless runs.
pub mod headless {
    use ahash::AHashMap;

    use super::{HostError, OverlayHost, SurfaceRequest};
    use anchored_popup_core::PopupId;

    /// One call observed by [`HeadlessHost`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum HostCall {
        Open(PopupId),
        Close(PopupId),
        AnchorTapped(PopupId),
    }

    /// Host double: keeps open surfaces in a map and logs calls in order.
    #[derive(Debug)]
    pub struct HeadlessHost<C> {
        surfaces: AHashMap<PopupId, (SurfaceRequest, C)>,
        calls: Vec<HostCall>,
        available: bool,
    }

    impl<C> Default for HeadlessHost<C> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<C> HeadlessHost<C> {
        pub fn new() -> Self {
            Self {
                surfaces: AHashMap::new(),
                calls: Vec::new(),
                available: true,
            }
        }

        /// A host with no hosting context: every open fails.
        pub fn unavailable() -> Self {
            Self {
                available: false,
                ..Self::new()
            }
        }

        pub fn set_available(&mut self, available: bool) {
            self.available = available;
        }

        pub fn calls(&self) -> &[HostCall] {
            &self.calls
        }

        pub fn open_count(&self) -> usize {
            self.surfaces.len()
        }

        pub fn is_open(&self, id: &str) -> bool {
            self.surfaces.contains_key(id)
        }

        pub fn request(&self, id: &str) -> Option<&SurfaceRequest> {
            self.surfaces.get(id).map(|(request, _)| request)
        }

        pub fn content(&self, id: &str) -> Option<&C> {
            self.surfaces.get(id).map(|(_, content)| content)
        }
    }

    impl<C> OverlayHost for HeadlessHost<C> {
        type Content = C;

        fn open_surface(
            &mut self,
            request: SurfaceRequest,
            content: C,
        ) -> Result<(), HostError> {
            if !self.available {
                return Err(HostError::NoHostingContext);
            }
            let id = request.id().clone();
            if self.surfaces.contains_key(&id) {
                return Ok(());
            }
            self.calls.push(HostCall::Open(id.clone()));
            self.surfaces.insert(id, (request, content));
            Ok(())
        }

        fn close_surface(&mut self, id: &PopupId) {
            if self.surfaces.remove(id).is_some() {
                self.calls.push(HostCall::Close(id.clone()));
            }
        }

        fn anchor_tapped(&mut self, id: &PopupId) {
            self.calls.push(HostCall::AnchorTapped(id.clone()));
        }
    }
}
