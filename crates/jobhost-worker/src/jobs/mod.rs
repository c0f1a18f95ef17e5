//! Built-in job handler implementations.

pub mod plugin;
