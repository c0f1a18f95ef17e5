//! Wire protocol between the host and a sandbox process.
//!
//! Frames are single JSON lines starting with [`FRAME_PREFIX`], written to
//! the sandbox's stdin (requests) and read from its stdout (responses).
//! The sandbox moves plugin output off its stdout before loading anything
//! (see [`super::channel`]); any stray line that does not start with the
//! prefix is handed to a passthrough callback and never parsed.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Marker that starts every protocol frame.
pub const FRAME_PREFIX: &str = "#jobhost# ";

/// Host → sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SandboxRequest {
    /// Load a module and resolve its single entry type.
    Discover {
        /// Absolute path of the module the host checked.
        module_path: PathBuf,
    },
    /// Load a module and list every exported type.
    Inspect {
        /// Module path as given by the operator.
        module_path: PathBuf,
    },
    /// Create an instance of a type from the loaded module.
    Instantiate {
        /// Fully qualified type name.
        type_name: String,
    },
    /// Run the instance's execution operation.
    Execute,
    /// Release everything and exit.
    Shutdown,
}

/// Sandbox → host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SandboxResponse {
    /// Sent once when the sandbox is ready for requests.
    Ready {
        /// Context name the sandbox was started with.
        context: String,
        /// OS process id of the sandbox.
        pid: u32,
    },
    /// Entry type resolved.
    Discovered {
        /// Fully qualified type name.
        type_name: String,
    },
    /// Exported types listed.
    Inspected {
        /// Every exported type.
        types: Vec<ExportedType>,
    },
    /// Instance created.
    Instantiated {
        /// Type of the instance.
        type_name: String,
    },
    /// The constructor produced nothing usable.
    InstanceMissing {
        /// Type that was requested.
        type_name: String,
    },
    /// Execution completed without a fault.
    Executed,
    /// Execution raised an error or panicked.
    Faulted {
        /// Cause reported by the plugin.
        message: String,
    },
    /// The request could not be served.
    Failed {
        /// What went wrong.
        failure: RemoteFailure,
    },
    /// Acknowledges `shutdown`.
    Closed,
}

/// A type exported by a plugin module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedType {
    /// Fully qualified type name.
    pub name: String,
    /// Whether the type satisfies the execution contract.
    pub conforming: bool,
}

/// Failure reported by a sandbox for one request.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteFailure {
    /// The module could not be found, copied, or loaded.
    #[error("failed to load module '{module}': {reason}")]
    ModuleLoad {
        /// Module path.
        module: String,
        /// Loader message.
        reason: String,
    },
    /// The module exports no conforming type.
    #[error("module '{module}' exports no entry type")]
    NoEntryType {
        /// Module path.
        module: String,
    },
    /// The module exports more than one conforming type.
    #[error("module '{module}' exports {} entry types: {}", .candidates.len(), .candidates.join(", "))]
    AmbiguousEntryType {
        /// Module path.
        module: String,
        /// Every conforming type name.
        candidates: Vec<String>,
    },
    /// A request needed a module but none is loaded.
    #[error("no module loaded in this context")]
    NotLoaded,
    /// `execute` arrived before a successful `instantiate`.
    #[error("no instance created in this context")]
    NotInstantiated,
    /// The request was malformed or out of order.
    #[error("bad request: {message}")]
    BadRequest {
        /// Parser or state message.
        message: String,
    },
}

impl RemoteFailure {
    /// Whether this failure means the entry type could not be resolved.
    pub fn is_discovery_failure(&self) -> bool {
        matches!(
            self,
            Self::ModuleLoad { .. } | Self::NoEntryType { .. } | Self::AmbiguousEntryType { .. }
        )
    }
}

/// Errors while reading or writing frames.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Pipe I/O failed.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A prefixed line did not decode.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Writes one frame and flushes.
pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, message: &T) -> Result<(), FrameError> {
    let json = serde_json::to_string(message)?;
    writer.write_all(FRAME_PREFIX.as_bytes())?;
    writer.write_all(json.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Reads the next frame, passing every other line to `passthrough`.
///
/// Only a line that starts with the prefix is a frame.
///
/// Returns `Ok(None)` at end of stream.
pub fn read_frame<R, T, F>(reader: &mut R, mut passthrough: F) -> Result<Option<T>, FrameError>
where
    R: BufRead,
    T: DeserializeOwned,
    F: FnMut(&str),
{
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        match trimmed.strip_prefix(FRAME_PREFIX) {
            Some(json) => return Ok(Some(serde_json::from_str(json)?)),
            None => passthrough(trimmed),
        }
    }
}
