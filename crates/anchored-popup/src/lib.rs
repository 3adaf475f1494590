#![forbid(unsafe_code)]

//! Anchored popup public facade crate.
//!
//! Popups that grow out of the view that triggered them and shrink back into
//! it. This crate re-exports the stable surface of the core and runtime
//! crates and adds the unified error model and a validating runtime builder.
//!
//! ```rust,ignore
//! use anchored_popup::prelude::*;
//!
//! let rt = RuntimeBuilder::new().build(my_host)?;
//! let anchor = rt.attach_anchor(
//!     "profile",
//!     PopupConfig::new().placement(Placement::AnchorRelative(UnitPoint::BOTTOM_TRAILING)),
//!     |dismiss| ProfileMenu::new(dismiss.clone()),
//! );
//! anchor.report_frame(frame_from_layout);
//! anchor.tap();
//! rt.tick();
//! ```

pub mod builder;
pub mod error;

// --- Core re-exports -------------------------------------------------------

pub use anchored_popup_core::{
    AnimationRecord, Background, Curve, CustomBackground, Frame, IntRect, IntSize,
    LifecycleState, Placement, Point, PopupConfig, PopupGeometry, PopupId, Rgba, ScreenBounds,
    Size, Timing, UnitPoint, Vec2, VisualTransform, displayed_offset,
};

// --- Runtime re-exports ----------------------------------------------------

pub use anchored_popup_runtime::{
    AnchorHandle, ChangeStream, DismissHandle, FrameReporter, HeadlessHost, HostCall, HostError,
    OverlayHost, OverlayVisuals, PopupRuntime, PopupTrigger, Projection, Registry,
    RuntimeSettings, SettingsError, StateWrite, Subscription, SurfaceRequest,
};

pub use builder::RuntimeBuilder;
pub use error::{DegradationAction, Error, Result};

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        AnchorHandle, Background, DismissHandle, Error, Frame, IntRect, LifecycleState,
        OverlayHost, Placement, PopupConfig, PopupRuntime, Result, RuntimeBuilder, ScreenBounds,
        Size, StateWrite, SurfaceRequest, Timing, UnitPoint,
    };

    pub use crate::{core, runtime};
}

pub use anchored_popup_core as core;
pub use anchored_popup_runtime as runtime;
