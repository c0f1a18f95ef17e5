//! # jobhost-core
//!
//! Core crate for JobHost. Contains configuration schemas, the job
//! descriptor and trigger model, the completion event and event bus
//! capability, and the unified error system.
//!
//! This crate has **no** internal dependencies on other JobHost crates.

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use error::AppError;
pub use error::AppResult;
