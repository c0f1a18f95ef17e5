//! Unified application error types for JobHost.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator.

use std::fmt;
use thiserror::Error;

/// Coarse failure category, shared by every JobHost crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// A plugin file or other named input does not exist.
    NotFound,
    /// A trigger or argument is malformed.
    Validation,
    Internal,
    /// Settings could not be loaded or are inconsistent.
    Configuration,
    /// A plugin could not be discovered, instantiated, or executed.
    Plugin,
    /// The isolated execution context itself failed (host-level fault).
    Sandbox,
    Serialization,
    /// Filesystem or pipe I/O.
    Io,
    /// The trigger-firing engine reported an error.
    Scheduler,
}

impl ErrorKind {
    /// Stable upper-case code, used in log lines and CLI output.
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::Validation => "VALIDATION",
            Self::Internal => "INTERNAL",
            Self::Configuration => "CONFIGURATION",
            Self::Plugin => "PLUGIN",
            Self::Sandbox => "SANDBOX",
            Self::Serialization => "SERIALIZATION",
            Self::Io => "IO",
            Self::Scheduler => "SCHEDULER",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error crossing crate boundaries.
///
/// `SandboxError` and `JobExecutionError` convert into it; everything else
/// goes through `map_err` with one of the kind constructors below.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    /// Underlying cause, if any. Not preserved by `clone`.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// Result alias used by fallible JobHost operations.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Error of `kind` without a cause.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Error of `kind` wrapping `source`.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Plugin-side failure: load, discovery, or a reported fault.
    pub fn plugin(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Plugin, message)
    }

    /// Failure of the isolation machinery rather than the plugin.
    pub fn sandbox(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Sandbox, message)
    }

    pub fn scheduler(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Scheduler, message)
    }

    /// Whether the isolated context itself broke.
    pub fn is_sandbox_fault(&self) -> bool {
        self.kind == ErrorKind::Sandbox
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Io, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}
