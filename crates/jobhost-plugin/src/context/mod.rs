//! Isolated execution contexts.
//!
//! A context is created per plugin invocation and destroyed exactly once,
//! whatever happens in between. [`ContextHandle`] enforces that: dropping
//! it destroys the context if nobody did so explicitly.

pub mod process;

use std::fmt;
use std::path::Path;

use thiserror::Error;
use tracing::warn;

use jobhost_core::error::{AppError, ErrorKind};

use crate::sandbox::protocol::{ExportedType, FrameError, RemoteFailure};

pub use process::{ProcessContext, ProcessContextManager};

/// Errors raised by the isolation machinery.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The context could not be provisioned.
    #[error("failed to provision context '{context}': {reason}")]
    Provision {
        /// Context name.
        context: String,
        /// Cause.
        reason: String,
    },
    /// The sandbox exited before answering.
    #[error("context '{context}' terminated unexpectedly ({status})")]
    Terminated {
        /// Context name.
        context: String,
        /// Exit status as reported by the OS.
        status: String,
    },
    /// The sandbox answered something out of protocol.
    #[error("context '{context}' broke protocol: {message}")]
    Protocol {
        /// Context name.
        context: String,
        /// What was received.
        message: String,
    },
    /// The sandbox reported a request failure.
    #[error(transparent)]
    Remote(#[from] RemoteFailure),
    /// Pipe or filesystem I/O failed.
    #[error("context I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A frame could not be read or written.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl SandboxError {
    /// The remote failure, if this error carries one.
    pub fn remote(&self) -> Option<&RemoteFailure> {
        match self {
            Self::Remote(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<SandboxError> for AppError {
    fn from(err: SandboxError) -> Self {
        let kind = match &err {
            SandboxError::Remote(_) => ErrorKind::Plugin,
            _ => ErrorKind::Sandbox,
        };
        AppError::with_source(kind, err.to_string(), err)
    }
}

/// Result of asking a context to create an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instantiation {
    /// An instance now lives in the context.
    Created,
    /// The type produced no usable instance.
    Missing,
}

/// Result of invoking the instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// The execution operation returned normally.
    Completed,
    /// The execution operation failed; carries the cause.
    Faulted(String),
}

/// One live isolated context.
///
/// Every method blocks the calling thread.
pub trait IsolatedContext: Send + fmt::Debug {
    /// Unique name of the context.
    fn name(&self) -> &str;

    /// Loads `module_path` inside the context and resolves its entry type.
    fn discover_entry_type(&mut self, module_path: &Path) -> Result<String, SandboxError>;

    /// Loads `module_path` inside the context and lists its exported types.
    fn inspect(&mut self, module_path: &Path) -> Result<Vec<ExportedType>, SandboxError>;

    /// Creates an instance of `type_name` inside the context.
    fn instantiate(&mut self, type_name: &str) -> Result<Instantiation, SandboxError>;

    /// Runs the instance's execution operation.
    fn invoke(&mut self) -> Result<Invocation, SandboxError>;

    /// Unloads everything and reclaims the context. Called at most once.
    fn teardown(&mut self) -> Result<(), SandboxError>;
}

/// Creates isolated contexts.
pub trait IsolatedContextManager: Send + Sync + fmt::Debug {
    /// Provisions a fresh context whose search path covers `plugin_dir`.
    fn create(&self, plugin_dir: &Path, module_name: &str) -> Result<ContextHandle, SandboxError>;
}

/// Scoped ownership of a context.
pub struct ContextHandle {
    context: Box<dyn IsolatedContext>,
    destroyed: bool,
}

impl fmt::Debug for ContextHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextHandle")
            .field("name", &self.context.name())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}

impl ContextHandle {
    /// Takes ownership of a live context.
    pub fn new(context: Box<dyn IsolatedContext>) -> Self {
        Self {
            context,
            destroyed: false,
        }
    }

    /// Context name.
    pub fn name(&self) -> &str {
        self.context.name()
    }

    /// Whether the context has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// The live context; `None` once destroyed.
    pub fn context(&mut self) -> Option<&mut (dyn IsolatedContext + 'static)> {
        if self.destroyed {
            return None;
        }
        Some(self.context.as_mut())
    }

    /// Destroys the context. Later calls do nothing.
    pub fn destroy(&mut self) -> Result<(), SandboxError> {
        if self.destroyed {
            return Ok(());
        }
        self.destroyed = true;
        self.context.teardown()
    }
}

impl Drop for ContextHandle {
    fn drop(&mut self) {
        if let Err(e) = self.destroy() {
            warn!(context = %self.context.name(), error = %e, "Context teardown failed");
        }
    }
}
