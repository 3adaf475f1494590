#![forbid(unsafe_code)]

//! Error model and graceful degradation.
//!
//! Each subsystem keeps its own typed error; [`Error`] unifies them and maps
//! every variant to a [`DegradationAction`], so a host can keep the UI
//! alive instead of unwinding.
//!
//! Refused state writes are not errors. They are reported as
//! [`StateWrite`](anchored_popup_runtime::StateWrite) outcomes.

use std::fmt;

use anchored_popup_runtime::{HostError, SettingsError};

/// Top-level error type for anchored-popup.
#[derive(Debug)]
pub enum Error {
    /// The overlay host could not present a surface, as returned by
    /// [`AnchorHandle::try_open_surface`](anchored_popup_runtime::AnchorHandle::try_open_surface).
    Host(HostError),
    /// Runtime settings could not be loaded or are invalid.
    Settings(SettingsError),
    /// Raw I/O error (convenience variant for `?` on io::Result).
    Io(std::io::Error),
}

/// Standard result type for anchored-popup APIs.
pub type Result<T> = std::result::Result<T, Error>;

/// What the caller should do when an error occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradationAction {
    /// Drop the open request; the popup does not appear.
    DropOpenRequest,
    /// Ignore the loaded settings and run with defaults.
    UseDefaults,
    /// The error is unrecoverable.
    Shutdown,
}

impl Error {
    /// Determine the graceful degradation action for this error.
    pub fn degradation(&self) -> DegradationAction {
        match self {
            Self::Host(HostError::NoHostingContext) => DegradationAction::DropOpenRequest,
            Self::Host(HostError::SurfaceRejected { .. }) => DegradationAction::DropOpenRequest,
            Self::Settings(_) => DegradationAction::UseDefaults,
            Self::Io(_) => DegradationAction::Shutdown,
        }
    }

    /// Error type label for tracing fields.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Host(_) => "host",
            Self::Settings(_) => "settings",
            Self::Io(_) => "io",
        }
    }

    /// Whether the error is recoverable (does not require shutdown).
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.degradation(), DegradationAction::Shutdown)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(e) => write!(f, "host: {e}"),
            Self::Settings(e) => write!(f, "settings: {e}"),
            Self::Io(e) => write!(f, "I/O: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Host(e) => Some(e),
            Self::Settings(e) => Some(e),
            Self::Io(e) => Some(e),
        }
    }
}

impl From<HostError> for Error {
    fn from(err: HostError) -> Self {
        Self::Host(err)
    }
}

impl From<SettingsError> for Error {
    fn from(err: SettingsError) -> Self {
        Self::Settings(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchored_popup_core::PopupId;
    use std::error::Error as _;

    #[test]
    fn missing_host_drops_open() {
        let err = Error::from(HostError::NoHostingContext);
        assert_eq!(err.degradation(), DegradationAction::DropOpenRequest);
        assert_eq!(err.error_type(), "host");
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("no hosting context"));
    }

    #[test]
    fn rejected_surface_drops_open() {
        let err = Error::from(HostError::SurfaceRejected {
            id: PopupId::from("menu"),
            reason: "window limit".into(),
        });
        assert_eq!(err.degradation(), DegradationAction::DropOpenRequest);
        assert!(err.source().is_some());
    }

    #[test]
    fn invalid_settings_use_defaults() {
        let err = Error::from(SettingsError::Invalid(vec!["screen.width".into()]));
        assert_eq!(err.degradation(), DegradationAction::UseDefaults);
        assert_eq!(err.error_type(), "settings");
        assert_eq!(err.to_string(), "settings: invalid settings: screen.width");
    }

    #[test]
    fn io_is_unrecoverable() {
        let err = Error::from(std::io::Error::other("disk gone"));
        assert_eq!(err.degradation(), DegradationAction::Shutdown);
        assert!(!err.is_recoverable());
    }
}
