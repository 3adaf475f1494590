#![forbid(unsafe_code)]

//! Easing curves and transition timing.
//!
//! A [`Timing`] pairs a duration with a [`Curve`]. The curve maps linear
//! progress `t ∈ [0, 1]` onto eased progress; only [`Curve::Back`] may leave
//! `[0, 1]` (it overshoots before settling).

use std::time::Duration;

/// Easing curve for popup transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Curve {
    /// Linear interpolation.
    Linear,
    /// Accelerating cubic.
    EaseIn,
    /// Decelerating cubic.
    #[default]
    EaseOut,
    /// Cubic S-curve.
    EaseInOut,
    /// Ease-out with a slight overshoot.
    Back,
    /// Jump straight to the target.
    None,
}

impl Curve {
    /// Apply the curve to linear progress. Input is clamped to `[0, 1]`.
    pub fn apply(self, t: f64) -> f64 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        match self {
            Self::Linear => t,
            Self::EaseIn => t * t * t,
            Self::EaseOut => {
                let inv = 1.0 - t;
                1.0 - inv * inv * inv
            }
            Self::EaseInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let inv = -2.0 * t + 2.0;
                    1.0 - inv * inv * inv / 2.0
                }
            }
            Self::Back => {
                let c1 = 1.70158;
                let c3 = c1 + 1.0;
                let u = t - 1.0;
                1.0 + c3 * u * u * u + c1 * u * u
            }
            Self::None => 1.0,
        }
    }

    /// Whether eased values can leave `[0, 1]`.
    pub fn can_overshoot(self) -> bool {
        matches!(self, Self::Back)
    }
}

/// Duration and curve of one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timing {
    #[cfg_attr(feature = "serde", serde(with = "millis"))]
    pub duration: Duration,
    pub curve: Curve,
}

impl Default for Timing {
    fn default() -> Self {
        Self::ease_out(Duration::from_millis(300))
    }
}

impl Timing {
    pub const fn new(duration: Duration, curve: Curve) -> Self {
        Self { duration, curve }
    }

    pub const fn linear(duration: Duration) -> Self {
        Self::new(duration, Curve::Linear)
    }

    pub const fn ease_in(duration: Duration) -> Self {
        Self::new(duration, Curve::EaseIn)
    }

    pub const fn ease_out(duration: Duration) -> Self {
        Self::new(duration, Curve::EaseOut)
    }

    pub const fn ease_in_out(duration: Duration) -> Self {
        Self::new(duration, Curve::EaseInOut)
    }

    /// Zero-length transition: the target is reached immediately.
    pub const fn instant() -> Self {
        Self::new(Duration::ZERO, Curve::None)
    }

    /// Whether this timing completes without any intermediate frames.
    pub fn is_instant(&self) -> bool {
        self.duration.is_zero() || matches!(self.curve, Curve::None)
    }

    /// Eased progress after `elapsed` has passed since the start.
    pub fn progress(&self, elapsed: Duration) -> f64 {
        if self.is_instant() {
            return 1.0;
        }
        let linear = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        self.curve.apply(linear)
    }
}

#[cfg(feature = "serde")]
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
