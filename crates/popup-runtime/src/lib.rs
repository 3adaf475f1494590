#![forbid(unsafe_code)]

//! Runtime: registry, change streams and transition orchestration.
//!
//! # Role in anchored-popup
//! `anchored-popup-runtime` is the single-context engine. It owns the only
//! mutable state in the system, the animation registry, and everything
//! that reacts to it.
//!
//! # Primary responsibilities
//! - **Registry**: one record per popup id, legal-edge-only state writes.
//! - **Streams**: cached, deduplicating, replaying per-id projections.
//! - **Orchestration**: grow/shrink transitions on a virtual clock.
//! - **Host binding**: exactly one overlay surface per open popup.
//! - **Inbox**: `Send` handles that queue work for the owning context.
//!
//! # How it fits in the system
//! Anchors report frames into the registry, the registry broadcasts to the
//! streams, the orchestrator animates and writes completion states back, and
//! the anchor's mount point opens and closes the host surface.

pub mod anchor;
pub mod host;
pub mod orchestrator;
pub mod reactive;
pub mod registry;
pub mod runtime;
pub mod scheduler;
pub mod settings;
pub mod stream;
pub mod tracking;

pub use anchor::AnchorHandle;
pub use host::headless::{HeadlessHost, HostCall};
pub use host::{DismissHandle, HostError, OverlayHost, SurfaceRequest};
pub use orchestrator::{OverlayContext, OverlayVisuals};
pub use reactive::{Broadcast, Subscription};
pub use registry::{Registry, StateWrite, WeakRegistry};
pub use runtime::PopupRuntime;
pub use scheduler::{Scheduler, TimerId};
pub use settings::{RuntimeSettings, SettingsError};
pub use stream::{ChangeStream, Projection};
pub use tracking::{AnchorTracker, FrameReport, FrameReporter, PopupTrigger, RuntimeMessage};
