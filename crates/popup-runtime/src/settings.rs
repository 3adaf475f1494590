#![forbid(unsafe_code)]

//! Process-wide runtime settings.
//!
//! # Loading
//!
//! ```toml
//! # popup.toml
//! [screen]
//! width = 430.0
//! height = 932.0
//!
//! [backdrop_timing]
//! duration = 250
//! curve = "ease-in-out"
//! ```
//!
//! ```rust,ignore
//! let settings = RuntimeSettings::from_toml_file("popup.toml")?;
//! let settings = RuntimeSettings::from_json_str(json)?;
//! ```
//!
//! Every field is optional in a file; missing ones keep their defaults.

#[cfg(feature = "settings-file")]
use std::path::Path;
use std::time::Duration;

#[cfg(feature = "settings-file")]
use serde::{Deserialize, Serialize};

use anchored_popup_core::{ScreenBounds, Timing};

/// Longest backdrop fade accepted by [`RuntimeSettings::validate`].
pub const MAX_BACKDROP_FADE: Duration = Duration::from_secs(10);

/// Settings shared by every popup of one runtime.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "settings-file", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "settings-file", serde(default))]
pub struct RuntimeSettings {
    /// Bounds used by screen-relative placement.
    pub screen: ScreenBounds,
    /// Fade of the overlay backdrop, separate from the content transition.
    pub backdrop_timing: Timing,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            screen: ScreenBounds::default(),
            backdrop_timing: Timing::ease_in_out(Duration::from_millis(200)),
        }
    }
}

impl RuntimeSettings {
    #[must_use]
    pub fn with_screen(mut self, screen: ScreenBounds) -> Self {
        self.screen = screen;
        self
    }

    #[must_use]
    pub fn with_backdrop_timing(mut self, timing: Timing) -> Self {
        self.backdrop_timing = timing;
        self
    }

    /// Load from a TOML string.
    #[cfg(feature = "settings-file")]
    pub fn from_toml_str(s: &str) -> Result<Self, SettingsError> {
        toml::from_str(s).map_err(SettingsError::Toml)
    }

    /// Load from a TOML file on disk.
    #[cfg(feature = "settings-file")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(SettingsError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Load from a JSON string.
    #[cfg(feature = "settings-file")]
    pub fn from_json_str(s: &str) -> Result<Self, SettingsError> {
        serde_json::from_str(s).map_err(SettingsError::Json)
    }

    /// Load from a JSON file on disk.
    #[cfg(feature = "settings-file")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(SettingsError::Io)?;
        Self::from_json_str(&content)
    }

    /// Check every field. An empty list means the settings are usable.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (name, value) in [
            ("screen.width", self.screen.width),
            ("screen.height", self.screen.height),
        ] {
            if !value.is_finite() || value <= 0.0 {
                errors.push(format!("{name} must be finite and > 0, got {value}"));
            }
        }

        if self.backdrop_timing.duration > MAX_BACKDROP_FADE {
            errors.push(format!(
                "backdrop_timing.duration must be <= {} ms, got {} ms",
                MAX_BACKDROP_FADE.as_millis(),
                self.backdrop_timing.duration.as_millis()
            ));
        }

        errors
    }

    /// Validate, turning problems into an error.
    pub fn validated(self) -> Result<Self, SettingsError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(SettingsError::Invalid(errors))
        }
    }
}

/// Failure while loading or validating [`RuntimeSettings`].
#[derive(Debug)]
pub enum SettingsError {
    /// I/O error reading a file.
    Io(std::io::Error),
    /// TOML parse error.
    #[cfg(feature = "settings-file")]
    Toml(toml::de::Error),
    /// JSON parse error.
    #[cfg(feature = "settings-file")]
    Json(serde_json::Error),
    /// Validation errors.
    Invalid(Vec<String>),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            #[cfg(feature = "settings-file")]
            Self::Toml(e) => write!(f, "TOML parse error: {e}"),
            #[cfg(feature = "settings-file")]
            Self::Json(e) => write!(f, "JSON parse error: {e}"),
            Self::Invalid(errors) => write!(f, "invalid settings: {}", errors.join("; ")),
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            #[cfg(feature = "settings-file")]
            Self::Toml(e) => Some(e),
            #[cfg(feature = "settings-file")]
            Self::Json(e) => Some(e),
            Self::Invalid(_) => None,
        }
    }
}
