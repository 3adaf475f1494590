#![forbid(unsafe_code)]

//! Runtime construction with validated settings.

#[cfg(feature = "settings-file")]
use std::path::Path;

use anchored_popup_core::{ScreenBounds, Timing};
use anchored_popup_runtime::{OverlayHost, PopupRuntime, RuntimeSettings, SettingsError};
use tracing::warn;

use crate::error::{Error, Result};

/// Fluent builder for [`PopupRuntime`].
#[derive(Debug, Clone, Default)]
pub struct RuntimeBuilder {
    settings: RuntimeSettings,
}

impl RuntimeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from already loaded settings.
    #[must_use]
    pub fn settings(mut self, settings: RuntimeSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn screen(mut self, screen: ScreenBounds) -> Self {
        self.settings.screen = screen;
        self
    }

    #[must_use]
    pub fn backdrop_timing(mut self, timing: Timing) -> Self {
        self.settings.backdrop_timing = timing;
        self
    }

    /// Load settings from a TOML file.
    #[cfg(feature = "settings-file")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new().settings(RuntimeSettings::from_toml_file(path)?))
    }

    /// Load settings from a JSON file.
    #[cfg(feature = "settings-file")]
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new().settings(RuntimeSettings::from_json_file(path)?))
    }

    pub fn current_settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    /// Validate the settings and create the runtime.
    pub fn build<H: OverlayHost + 'static>(self, host: H) -> Result<PopupRuntime<H>> {
        let errors = self.settings.validate();
        if !errors.is_empty() {
            return Err(Error::Settings(SettingsError::Invalid(errors)));
        }
        Ok(PopupRuntime::new(host, self.settings))
    }

    /// Create the runtime, falling back to default settings if validation
    /// fails.
    pub fn build_or_default<H: OverlayHost + 'static>(self, host: H) -> PopupRuntime<H> {
        let errors = self.settings.validate();
        if errors.is_empty() {
            return PopupRuntime::new(host, self.settings);
        }
        let err = Error::Settings(SettingsError::Invalid(errors));
        warn!(
            error_type = err.error_type(),
            action = ?err.degradation(),
            error = %err,
            "runtime settings rejected, using defaults"
        );
        PopupRuntime::new(host, RuntimeSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DegradationAction;
    use anchored_popup_runtime::HeadlessHost;

    #[test]
    fn build_validates_screen() {
        let err = RuntimeBuilder::new()
            .screen(ScreenBounds::new(0.0, 100.0))
            .build(HeadlessHost::<()>::new())
            .unwrap_err();
        assert_eq!(err.degradation(), DegradationAction::UseDefaults);
    }

    #[test]
    fn build_or_default_recovers() {
        let rt = RuntimeBuilder::new()
            .screen(ScreenBounds::new(-5.0, 100.0))
            .build_or_default(HeadlessHost::<()>::new());
        assert_eq!(rt.screen(), ScreenBounds::default());
    }

    #[test]
    fn build_keeps_valid_settings() {
        let rt = RuntimeBuilder::new()
            .screen(ScreenBounds::new(430.0, 932.0))
            .build(HeadlessHost::<()>::new())
            .unwrap();
        assert_eq!(rt.screen(), ScreenBounds::new(430.0, 932.0));
    }
}
