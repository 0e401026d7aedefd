use error_location::ErrorLocation;
use thiserror::Error;

/// Automation engine errors with source location tracking.
///
/// Mirrors the failure taxonomy of the engine: hook installation,
/// actuator dispatch, serial transport, safety refusals, and data
/// validation. Channel failures cover internal plumbing between the
/// engine's tasks.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The OS refused to install the global input hook.
    #[error("Hook installation failed: {reason} {location}")]
    HookInstallation {
        /// Human-readable reason, including the OS error where known.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// An actuator call failed (injection error, hardware nack or timeout).
    #[error("Actuator dispatch failed: {reason} {location}")]
    ActuatorDispatch {
        /// Description of the dispatch failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Serial transport failure: disconnect, I/O error, or framing violation.
    #[error("Transport error: {reason} {location}")]
    Transport {
        /// Description of the transport failure.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// The safety interlock refused the operation.
    #[error("Safety denied: {reason} {location}")]
    SafetyDenied {
        /// Which interlock refused: kill switch, limit, or authorization.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// Malformed command, hotkey, or script data.
    #[error("Validation error: {reason} {location}")]
    Validation {
        /// Description of the invalid data.
        reason: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// An execution session is already active on this engine.
    #[error("An execution session is already active {location}")]
    SessionActive {
        /// Source location where error occurred.
        location: ErrorLocation,
    },

    /// An internal channel closed unexpectedly.
    #[error("Channel closed: {context} {location}")]
    ChannelClosed {
        /// Which channel closed and during what operation.
        context: String,
        /// Source location where error occurred.
        location: ErrorLocation,
    },
}

impl From<std::io::Error> for CoreError {
    #[track_caller]
    fn from(source: std::io::Error) -> Self {
        CoreError::Transport {
            reason: source.to_string(),
            location: ErrorLocation::from(std::panic::Location::caller()),
        }
    }
}

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;
