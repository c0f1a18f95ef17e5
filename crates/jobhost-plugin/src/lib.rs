//! # jobhost-plugin
//!
//! Isolated plugin execution host for JobHost. Provides:
//!
//! - Process-per-invocation isolated contexts with guaranteed teardown
//! - The `jobhost-sandbox` runtime that loads plugin modules
//! - Entry type discovery inside the sandbox
//! - Result reporting onto the completion event bus
//!
//! The host process never maps plugin code. Everything that touches a
//! plugin module runs in a sandbox child spoken to over stdio.

pub mod context;
pub mod discovery;
pub mod ffi;
pub mod reporter;
pub mod runner;
pub mod sandbox;

pub use context::{
    ContextHandle, IsolatedContext, IsolatedContextManager, ProcessContextManager, SandboxError,
};
pub use reporter::{ExecutionOutcome, ResultReporter};
pub use runner::PluginRunner;
