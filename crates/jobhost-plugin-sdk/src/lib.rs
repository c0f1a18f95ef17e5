//! # jobhost-plugin-sdk
//!
//! SDK for writing job plugins that the JobHost scheduler runs in an
//! isolated context.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use jobhost_plugin_sdk::prelude::*;
//!
//! #[derive(Debug, Default)]
//! pub struct NightlyReport;
//!
//! impl JobPlugin for NightlyReport {
//!     fn execute(&mut self) -> JobResult {
//!         println!("building report");
//!         Ok(())
//!     }
//! }
//!
//! export_job_plugins!(NightlyReport);
//! ```
//!
//! Build the crate as a `cdylib` and point a trigger's `pluginPath` at
//! the resulting library. The module should export exactly one job type.

pub mod exports;
pub mod macros;
pub mod traits;

pub use jobhost_plugin::ffi::abi;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::export_job_plugins;
    pub use crate::traits::{JobPlugin, JobResult};
}
