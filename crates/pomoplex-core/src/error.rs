//! Core error types for pomoplex-core.
//!
//! Control-surface failures are reported through [`TimerError`]; configuration
//! and validation problems through [`ConfigError`] and [`ValidationError`].
//! [`CoreError`] ties them together for callers that do not care which layer
//! failed.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for pomoplex-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Timer control errors
    #[error(transparent)]
    Timer(#[from] TimerError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Broad classification of a [`TimerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    DuplicateName,
    NotFound,
    IllegalStateTransition,
    Cancelled,
}

/// Why a suspend/resume request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionReason {
    AlreadySuspended,
    NotSuspended,
    Stopped,
    Ended,
}

impl fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            TransitionReason::AlreadySuspended => "already suspended",
            TransitionReason::NotSuspended => "not suspended",
            TransitionReason::Stopped => "timer stopped",
            TransitionReason::Ended => "timer ended",
        };
        f.write_str(msg)
    }
}

/// Errors returned by the timer manager's control operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// Bad argument (blank name, negative duration, ...)
    #[error("Invalid value for '{field}': {message}")]
    InvalidArgument { field: String, message: String },

    /// A live timer already carries this name
    #[error("Timer '{0}' already exists.")]
    DuplicateName(String),

    /// No live timer carries this name
    #[error("Timer '{0}' not found.")]
    NotFound(String),

    /// Suspend/resume requested from a state that does not allow it
    #[error("Failed to {action} timer '{name}': {reason}.")]
    IllegalTransition {
        name: String,
        action: &'static str,
        reason: TransitionReason,
    },

    /// The manager has been shut down
    #[error("Timer manager has been shut down.")]
    ShutDown,
}

impl TimerError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        TimerError::InvalidArgument {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TimerError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            TimerError::DuplicateName(_) => ErrorKind::DuplicateName,
            TimerError::NotFound(_) => ErrorKind::NotFound,
            TimerError::IllegalTransition { .. } => ErrorKind::IllegalStateTransition,
            TimerError::ShutDown => ErrorKind::Cancelled,
        }
    }
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// The async runtime backing the manager could not be started
    #[error("Failed to start timer runtime: {0}")]
    Runtime(String),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<ValidationError> for TimerError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidValue { field, message } => {
                TimerError::InvalidArgument { field, message }
            }
        }
    }
}

impl From<ValidationError> for ConfigError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidValue { field, message } => ConfigError::InvalidValue {
                key: field,
                message,
            },
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_distinguish_kinds() {
        let dup = TimerError::DuplicateName("sam".into());
        let missing = TimerError::NotFound("sam".into());
        let illegal = TimerError::IllegalTransition {
            name: "sam".into(),
            action: "suspend",
            reason: TransitionReason::AlreadySuspended,
        };
        assert_eq!(dup.to_string(), "Timer 'sam' already exists.");
        assert_eq!(missing.to_string(), "Timer 'sam' not found.");
        assert_eq!(
            illegal.to_string(),
            "Failed to suspend timer 'sam': already suspended."
        );
        assert_eq!(illegal.kind(), ErrorKind::IllegalStateTransition);
        assert_eq!(TimerError::ShutDown.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn validation_converts_to_invalid_argument() {
        let err: TimerError = ValidationError::InvalidValue {
            field: "schedule".into(),
            message: "No negative values allowed.".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn core_error_keeps_control_messages_verbatim() {
        let err: CoreError = TimerError::NotFound("ghost".into()).into();
        assert_eq!(err.to_string(), "Timer 'ghost' not found.");

        let err: CoreError = ConfigError::UnknownKey("manager.nope".into()).into();
        assert!(err.to_string().starts_with("Configuration error: "));
    }
}
