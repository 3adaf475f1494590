#![forbid(unsafe_code)]

//! Core: geometry, lifecycle states, transforms, and popup configuration.
//!
//! # Role in anchored-popup
//! `anchored-popup-core` holds every pure value type and formula the
//! runtime needs. Nothing in here owns mutable state or talks to a host,
//! so all of it can be tested without a runtime.
//!
//! # Primary responsibilities
//! - **Geometry**: integer-quantized rects and sizes, unit points, screen
//!   bounds.
//! - **Lifecycle**: the four-state popup cycle and the per-id record.
//! - **Transforms**: hidden/displayed scale, offset and opacity.
//! - **Easing**: curves and timing for transitions.
//! - **Config**: the per-anchor copy-on-customize builder.

pub mod config;
pub mod easing;
pub mod geometry;
pub mod lifecycle;
pub mod transform;

pub use config::{Background, CustomBackground, PopupConfig, Rgba};
pub use easing::{Curve, Timing};
pub use geometry::{Frame, IntRect, IntSize, Point, ScreenBounds, Size, UnitPoint, Vec2};
pub use lifecycle::{AnimationRecord, LifecycleState, PopupId};
pub use transform::{Placement, PopupGeometry, VisualTransform, displayed_offset};
