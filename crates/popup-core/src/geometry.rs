#![forbid(unsafe_code)]

//! Integer-quantized geometric primitives.
//!
//! Layout passes report frames as floating point rectangles. Sub-pixel
//! jitter between passes would otherwise produce a stream of "changed"
//! frames that differ only in the fourth decimal, so every measurement is
//! quantized to whole points before it reaches the registry.
//!
//! # Invariants
//!
//! 1. Quantization truncates toward zero (`3.9 -> 3`, `-3.9 -> -3`).
//! 2. `ZERO` is the "not yet measured" sentinel for both [`IntRect`] and
//!    [`IntSize`]; a value is considered measured once it differs from it.
//! 3. Equality is structural over the quantized fields only.

/// Truncate a float coordinate the way the quantizer does.
#[inline]
fn quantize(value: f64) -> i32 {
    // `as` saturates on overflow and maps NaN to 0.
    value as i32
}

/// A rectangle quantized to integer points, stored by its midpoint.
///
/// The midpoint representation is what the overlay needs: content is
/// positioned with its centre on the anchor's centre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IntRect {
    /// Horizontal midpoint in global coordinates.
    pub mid_x: i32,
    /// Vertical midpoint in global coordinates.
    pub mid_y: i32,
    /// Width in points.
    pub width: i32,
    /// Height in points.
    pub height: i32,
}

impl IntRect {
    /// The "not yet measured" sentinel.
    pub const ZERO: Self = Self::new(0, 0, 0, 0);

    /// Create a rectangle from its midpoint and size.
    #[inline]
    pub const fn new(mid_x: i32, mid_y: i32, width: i32, height: i32) -> Self {
        Self {
            mid_x,
            mid_y,
            width,
            height,
        }
    }

    /// Whether this is still the unmeasured sentinel.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.mid_x == 0 && self.mid_y == 0 && self.width == 0 && self.height == 0
    }

    /// Size component of the rectangle.
    #[inline]
    pub const fn size(&self) -> IntSize {
        IntSize::new(self.width, self.height)
    }

    /// Midpoint as floating point coordinates.
    #[inline]
    pub fn center(&self) -> Point {
        Point::new(f64::from(self.mid_x), f64::from(self.mid_y))
    }
}

/// A size quantized to integer points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IntSize {
    pub width: i32,
    pub height: i32,
}

impl IntSize {
    /// The "not yet measured" sentinel.
    pub const ZERO: Self = Self::new(0, 0);

    #[inline]
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.width == 0 && self.height == 0
    }

    /// Whether either dimension is zero, which makes it unusable as a
    /// scale denominator.
    #[inline]
    pub const fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A floating point point in global coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A raw frame as reported by a layout pass (origin + size, floating point).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Frame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Frame {
    #[inline]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    pub fn mid_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    #[inline]
    pub fn mid_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Quantize into the registry's integer representation.
    pub fn quantize(&self) -> IntRect {
        IntRect::new(
            quantize(self.mid_x()),
            quantize(self.mid_y()),
            quantize(self.width),
            quantize(self.height),
        )
    }
}

impl From<Frame> for IntRect {
    fn from(frame: Frame) -> Self {
        frame.quantize()
    }
}

/// A floating point size as measured by the host's layout.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    #[inline]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn quantize(&self) -> IntSize {
        IntSize::new(quantize(self.width), quantize(self.height))
    }
}

impl From<Size> for IntSize {
    fn from(size: Size) -> Self {
        size.quantize()
    }
}

/// A two-component vector used for scale factors and offsets.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Self = Self::new(0.0, 0.0);
    pub const ONE: Self = Self::new(1.0, 1.0);

    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Linear interpolation towards `to` at `t` (not clamped, so overshooting
    /// curves can carry values past the target).
    #[inline]
    pub fn lerp(self, to: Self, t: f64) -> Self {
        Self::new(self.x + (to.x - self.x) * t, self.y + (to.y - self.y) * t)
    }
}

/// Normalized location inside a rectangle: `(0, 0)` is top-leading,
/// `(1, 1)` is bottom-trailing.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnitPoint {
    pub x: f64,
    pub y: f64,
}

impl Default for UnitPoint {
    fn default() -> Self {
        Self::CENTER
    }
}

impl UnitPoint {
    pub const TOP_LEADING: Self = Self::new(0.0, 0.0);
    pub const TOP: Self = Self::new(0.5, 0.0);
    pub const TOP_TRAILING: Self = Self::new(1.0, 0.0);
    pub const LEADING: Self = Self::new(0.0, 0.5);
    pub const CENTER: Self = Self::new(0.5, 0.5);
    pub const TRAILING: Self = Self::new(1.0, 0.5);
    pub const BOTTOM_LEADING: Self = Self::new(0.0, 1.0);
    pub const BOTTOM: Self = Self::new(0.5, 1.0);
    pub const BOTTOM_TRAILING: Self = Self::new(1.0, 1.0);

    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Map `[0, 1]` onto `[1, -1]` per axis: `(1 - 2x, 1 - 2y)`.
    ///
    /// Top-leading becomes `(1, 1)`, centre `(0, 0)`, bottom-trailing
    /// `(-1, -1)`.
    #[inline]
    pub fn normalized(&self) -> Vec2 {
        Vec2::new(1.0 - 2.0 * self.x, 1.0 - 2.0 * self.y)
    }
}

/// Full-screen bounds used by screen-relative placement.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScreenBounds {
    pub width: f64,
    pub height: f64,
}

impl ScreenBounds {
    #[inline]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

impl Default for ScreenBounds {
    /// A common phone portrait size in points.
    fn default() -> Self {
        Self::new(390.0, 844.0)
    }
}
