//! C ABI shared by the sandbox and plugin modules.

pub mod abi;
pub mod module;
pub mod safety;

pub use abi::{PluginManifest, PluginTypeDescriptor};
pub use module::{PluginInstance, PluginModule};
