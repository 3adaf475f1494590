#![forbid(unsafe_code)]

//! Transform calculator: where the overlay sits when hidden and displayed.
//!
//! The overlay content is laid out with its centre on the anchor's centre.
//! Everything else is expressed as a transform on top of that position:
//!
//! - **Hidden**: scaled so the content covers exactly the anchor's size,
//!   no offset, fully transparent. Growing starts here and shrinking ends
//!   here, which is what makes the popup appear to come out of the anchor.
//! - **Displayed**: unit scale, fully opaque, offset by the placement
//!   policy so the requested unit point of the content lands on the
//!   requested unit point of the anchor (or of the screen).
//!
//! # Invariants
//!
//! 1. Both transforms are pure functions of their inputs.
//! 2. The hidden transform is only defined for non-degenerate content; the
//!    calculator returns `None` instead of dividing by zero.
//! 3. Under `AnchorRelative(center)` the displayed offset is always zero.

use crate::geometry::{IntRect, IntSize, ScreenBounds, UnitPoint, Vec2};

/// How the displayed overlay is aligned.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Placement {
    /// Align the content's unit point to the same unit point of the anchor.
    AnchorRelative(UnitPoint),
    /// Align the content's unit point to the same unit point of the screen.
    ScreenRelative(UnitPoint),
}

impl Default for Placement {
    fn default() -> Self {
        Self::ScreenRelative(UnitPoint::CENTER)
    }
}

impl Placement {
    #[inline]
    pub fn unit_point(&self) -> UnitPoint {
        match *self {
            Self::AnchorRelative(p) | Self::ScreenRelative(p) => p,
        }
    }
}

/// Scale, offset and opacity applied to the overlay content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualTransform {
    pub scale: Vec2,
    pub offset: Vec2,
    pub opacity: f64,
}

impl Default for VisualTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl VisualTransform {
    /// Unit scale, no offset, opaque.
    pub const IDENTITY: Self = Self {
        scale: Vec2::ONE,
        offset: Vec2::ZERO,
        opacity: 1.0,
    };

    /// Invisible placeholder used before the first measurement arrives.
    pub const TRANSPARENT: Self = Self {
        scale: Vec2::ONE,
        offset: Vec2::ZERO,
        opacity: 0.0,
    };

    /// Interpolate every component towards `to` at eased progress `t`.
    ///
    /// Opacity is clamped to `[0, 1]` even when an overshooting curve pushes
    /// `t` past 1; scale and offset are allowed to overshoot.
    pub fn lerp(&self, to: &Self, t: f64) -> Self {
        Self {
            scale: self.scale.lerp(to.scale, t),
            offset: self.offset.lerp(to.offset, t),
            opacity: (self.opacity + (to.opacity - self.opacity) * t).clamp(0.0, 1.0),
        }
    }
}

/// Measured inputs for one popup's transforms.
///
/// Only constructible once both the anchor frame and the content size are
/// known, so every transform derived from it is well defined.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PopupGeometry {
    anchor: IntRect,
    content: IntSize,
}

impl PopupGeometry {
    /// Returns `None` while either measurement is still missing or the
    /// content has a zero dimension.
    pub fn measured(anchor: IntRect, content: IntSize) -> Option<Self> {
        if anchor.is_zero() || content.is_degenerate() {
            #[cfg(feature = "tracing")]
            tracing::trace!(?anchor, ?content, "popup geometry not measured yet");
            return None;
        }
        Some(Self { anchor, content })
    }

    #[inline]
    pub fn anchor(&self) -> IntRect {
        self.anchor
    }

    #[inline]
    pub fn content(&self) -> IntSize {
        self.content
    }

    /// Transform that makes the content cover the anchor, invisible.
    pub fn hidden(&self) -> VisualTransform {
        VisualTransform {
            scale: Vec2::new(
                f64::from(self.anchor.width) / f64::from(self.content.width),
                f64::from(self.anchor.height) / f64::from(self.content.height),
            ),
            offset: Vec2::ZERO,
            opacity: 0.0,
        }
    }

    /// Transform for the resting, fully displayed content.
    pub fn displayed(&self, placement: Placement, screen: ScreenBounds) -> VisualTransform {
        VisualTransform {
            scale: Vec2::ONE,
            offset: displayed_offset(self.anchor, self.content, placement, screen),
            opacity: 1.0,
        }
    }
}

/// Offset of the displayed content relative to the anchor-centred layout.
pub fn displayed_offset(
    anchor: IntRect,
    content: IntSize,
    placement: Placement,
    screen: ScreenBounds,
) -> Vec2 {
    let cw = f64::from(content.width);
    let ch = f64::from(content.height);

    match placement {
        Placement::AnchorRelative(p) => {
            let tw = f64::from(anchor.width);
            let th = f64::from(anchor.height);

            // difference between centres
            let w = cw / 2.0 - tw / 2.0;
            let h = ch / 2.0 - th / 2.0;

            let n = p.normalized();
            Vec2::new(w * n.x, h * n.y)
        }
        Placement::ScreenRelative(p) => {
            let tx = f64::from(anchor.mid_x);
            let ty = f64::from(anchor.mid_y);
            let n = p.normalized();

            // -tx moves the centre to the screen origin, screen * p moves it
            // to the requested screen point, content/2 * n aligns the
            // content's own unit point with it.
            Vec2::new(
                -tx + screen.width * p.x + cw / 2.0 * n.x,
                -ty + screen.height * p.y + ch / 2.0 * n.y,
            )
        }
    }
}
