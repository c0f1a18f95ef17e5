//! The sandbox side of an isolated context.
//!
//! A sandbox is a short-lived child process that loads one plugin module
//! and answers requests from the host over its stdin and a private copy
//! of its stdout.

pub mod channel;
pub mod protocol;
pub mod runtime;
pub mod search_path;
pub mod shadow;

pub use protocol::{ExportedType, FRAME_PREFIX, RemoteFailure, SandboxRequest, SandboxResponse};
pub use runtime::{SandboxRuntime, SandboxSettings};
pub use search_path::SearchPath;
pub use shadow::ShadowCopy;
