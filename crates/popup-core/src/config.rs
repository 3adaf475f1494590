#![forbid(unsafe_code)]

//! Per-anchor popup configuration.
//!
//! [`PopupConfig`] is built once when an anchor is declared. Every setter
//! consumes the config and returns a modified copy, so a shared default can
//! be customized per anchor without anyone observing the change.
//!
//! ```ignore
//! let config = PopupConfig::new()
//!     .placement(Placement::AnchorRelative(UnitPoint::TOP_LEADING))
//!     .timing(Timing::ease_in_out(Duration::from_millis(250)))
//!     .close_on_tap_outside(true)
//!     .background(Background::Color(Rgba::new(0, 0, 0, 77)));
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::easing::Timing;
use crate::transform::Placement;

/// Straight-alpha RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }
}

/// Host-provided background view, opaque to this crate.
#[derive(Clone)]
pub struct CustomBackground(Arc<dyn Any + Send + Sync>);

impl CustomBackground {
    pub fn new(view: impl Any + Send + Sync) -> Self {
        Self(Arc::new(view))
    }

    /// Recover the host's concrete view type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for CustomBackground {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomBackground").finish_non_exhaustive()
    }
}

impl PartialEq for CustomBackground {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// What the overlay draws behind the content.
#[derive(Debug, Clone, PartialEq)]
pub enum Background {
    /// Nothing; the backdrop is fully transparent.
    None,
    /// A solid colour fill.
    Color(Rgba),
    /// Blur of whatever is underneath.
    Blur { radius: f64 },
    /// A custom view supplied by the host.
    Custom(CustomBackground),
}

impl Default for Background {
    fn default() -> Self {
        Self::Blur { radius: 6.0 }
    }
}

impl Background {
    /// Whether the backdrop has anything to fade in.
    pub fn is_visible(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Immutable configuration attached to one anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct PopupConfig {
    placement: Placement,
    timing: Timing,
    close_on_tap: bool,
    close_on_tap_outside: bool,
    passthrough: bool,
    background: Background,
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            placement: Placement::default(),
            timing: Timing::default(),
            close_on_tap: true,
            close_on_tap_outside: false,
            passthrough: false,
            background: Background::default(),
        }
    }
}

impl PopupConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Where the displayed content is aligned. Default: screen centre.
    #[must_use]
    pub fn placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    /// Grow/shrink timing. Default: ease-out, 300 ms.
    #[must_use]
    pub fn timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Close when the content itself is tapped. Default: `true`.
    #[must_use]
    pub fn close_on_tap(mut self, close: bool) -> Self {
        self.close_on_tap = close;
        self
    }

    /// Close when the backdrop outside the content is tapped. Default: `false`.
    #[must_use]
    pub fn close_on_tap_outside(mut self, close: bool) -> Self {
        self.close_on_tap_outside = close;
        self
    }

    /// Let taps on the backdrop reach the UI underneath. Default: `false`.
    #[must_use]
    pub fn passthrough(mut self, passthrough: bool) -> Self {
        self.passthrough = passthrough;
        self
    }

    /// Backdrop style. Default: blur with radius 6.
    #[must_use]
    pub fn background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }

    pub fn placement_policy(&self) -> Placement {
        self.placement
    }

    pub fn transition_timing(&self) -> Timing {
        self.timing
    }

    pub fn closes_on_tap(&self) -> bool {
        self.close_on_tap
    }

    pub fn closes_on_tap_outside(&self) -> bool {
        self.close_on_tap_outside
    }

    pub fn is_passthrough(&self) -> bool {
        self.passthrough
    }

    pub fn backdrop(&self) -> &Background {
        &self.background
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::UnitPoint;
    use std::time::Duration;

    #[test]
    fn defaults() {
        let config = PopupConfig::default();
        assert_eq!(
            config.placement_policy(),
            Placement::ScreenRelative(UnitPoint::CENTER)
        );
        assert_eq!(config.transition_timing(), Timing::default());
        assert!(config.closes_on_tap());
        assert!(!config.closes_on_tap_outside());
        assert!(!config.is_passthrough());
        assert_eq!(config.backdrop(), &Background::Blur { radius: 6.0 });
    }

    #[test]
    fn setters_leave_the_original_untouched() {
        let base = PopupConfig::new();
        let custom = base
            .clone()
            .close_on_tap(false)
            .close_on_tap_outside(true)
            .passthrough(true)
            .timing(Timing::linear(Duration::from_millis(120)))
            .placement(Placement::AnchorRelative(UnitPoint::BOTTOM))
            .background(Background::None);

        assert_eq!(base, PopupConfig::default());
        assert!(!custom.closes_on_tap());
        assert!(custom.closes_on_tap_outside());
        assert!(custom.is_passthrough());
        assert_eq!(custom.backdrop(), &Background::None);
        assert_eq!(
            custom.placement_policy(),
            Placement::AnchorRelative(UnitPoint::BOTTOM)
        );
    }

    #[test]
    fn custom_background_roundtrips_host_type() {
        #[derive(Debug, PartialEq)]
        struct Gradient(u32);

        let bg = CustomBackground::new(Gradient(7));
        assert_eq!(bg.downcast_ref::<Gradient>(), Some(&Gradient(7)));
        assert!(bg.downcast_ref::<String>().is_none());
        assert_eq!(bg.clone(), bg);
        assert!(Background::Custom(bg).is_visible());
        assert!(!Background::None.is_visible());
    }
}
