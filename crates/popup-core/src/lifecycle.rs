#![forbid(unsafe_code)]

//! Popup lifecycle states and the per-id animation record.
//!
//! State machine: `Hidden → Growing → Displayed → Shrinking → Hidden`
//!
//! Unlike a modal that may reverse mid-animation, an anchored popup never
//! skips or reverses a phase. Every state has exactly one successor, and a
//! write that does not follow that edge is refused by the registry.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use crate::geometry::IntRect;

/// Identifier shared by an anchor and its overlay.
///
/// Cheap to clone and `Send`, so frame reports can carry it across threads.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PopupId(Arc<str>);

impl PopupId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PopupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PopupId({:?})", &*self.0)
    }
}

impl fmt::Display for PopupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PopupId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PopupId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PopupId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PopupId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl From<&PopupId> for PopupId {
    fn from(id: &PopupId) -> Self {
        id.clone()
    }
}

/// Current phase of a popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    /// No overlay surface exists.
    #[default]
    Hidden,
    /// The overlay is animating out of the anchor.
    Growing,
    /// The overlay is at rest in its displayed position.
    Displayed,
    /// The overlay is animating back into the anchor.
    Shrinking,
}

impl LifecycleState {
    /// The only legal successor of this state.
    #[inline]
    pub const fn next(self) -> Self {
        match self {
            Self::Hidden => Self::Growing,
            Self::Growing => Self::Displayed,
            Self::Displayed => Self::Shrinking,
            Self::Shrinking => Self::Hidden,
        }
    }

    /// Whether `self → to` is one of the four legal edges.
    #[inline]
    pub fn can_transition_to(self, to: Self) -> bool {
        self.next() == to
    }

    /// Whether an overlay surface must be open in this state.
    #[inline]
    pub const fn has_surface(self) -> bool {
        !matches!(self, Self::Hidden)
    }

    /// Whether a visual transition runs in this state.
    #[inline]
    pub const fn is_transitioning(self) -> bool {
        matches!(self, Self::Growing | Self::Shrinking)
    }

    /// The rest state a transition in this phase settles into.
    #[inline]
    pub const fn settles_to(self) -> Option<Self> {
        match self {
            Self::Growing => Some(Self::Displayed),
            Self::Shrinking => Some(Self::Hidden),
            Self::Hidden | Self::Displayed => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hidden => "hidden",
            Self::Growing => "growing",
            Self::Displayed => "displayed",
            Self::Shrinking => "shrinking",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geometry plus lifecycle state for one popup id.
///
/// Equality is structural over all three fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationRecord {
    pub id: PopupId,
    pub anchor_frame: IntRect,
    pub state: LifecycleState,
}

impl AnimationRecord {
    /// A fresh record: `Hidden`, unmeasured frame.
    pub fn hidden(id: PopupId) -> Self {
        Self {
            id,
            anchor_frame: IntRect::ZERO,
            state: LifecycleState::Hidden,
        }
    }

    pub fn with_frame(mut self, frame: IntRect) -> Self {
        self.anchor_frame = frame;
        self
    }

    pub fn with_state(mut self, state: LifecycleState) -> Self {
        self.state = state;
        self
    }
}
