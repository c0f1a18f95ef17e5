//! Type discovery, run inside an isolated context.
//!
//! The helper loads a plugin module, reads its exported type table, and
//! reports back the name of the single entry type. Only that name ever
//! leaves the sandbox.

use std::path::Path;

use tracing::{debug, warn};

use crate::ffi::module::PluginModule;
use crate::sandbox::protocol::{ExportedType, RemoteFailure};

/// Resolves the entry type of a plugin module.
#[derive(Debug)]
pub struct TypeDiscoveryHelper {
    plugin_type_name: String,
    module: PluginModule,
}

impl TypeDiscoveryHelper {
    /// Loads the module at `module_path` and resolves its entry type.
    ///
    /// `display_name` is the module path as the caller knows it; it is
    /// used in failures so they name what the operator configured rather
    /// than a staged copy.
    ///
    /// # Safety
    /// Loads native code into the current process; call only inside a sandbox.
    pub unsafe fn new(module_path: &Path, display_name: &str) -> Result<Self, RemoteFailure> {
        // SAFETY: forwarded to the caller.
        let module = unsafe { load_module(module_path, display_name) }?;
        let plugin_type_name = select_entry_type(display_name, &module.exported_types())?;
        debug!(module = display_name, plugin_type_name, "Entry type discovered");
        Ok(Self {
            plugin_type_name,
            module,
        })
    }

    /// Fully qualified name of the entry type.
    pub fn plugin_type_name(&self) -> &str {
        &self.plugin_type_name
    }

    /// Hands the loaded module over for instantiation.
    pub fn into_module(self) -> PluginModule {
        self.module
    }
}

/// Loads a module, mapping loader errors to a protocol failure.
///
/// # Safety
/// Loads native code into the current process.
pub unsafe fn load_module(module_path: &Path, display_name: &str) -> Result<PluginModule, RemoteFailure> {
    // SAFETY: forwarded to the caller.
    unsafe { PluginModule::load(module_path) }.map_err(|reason| {
        warn!(module = display_name, %reason, "Plugin module failed to load");
        RemoteFailure::ModuleLoad {
            module: display_name.to_string(),
            reason,
        }
    })
}

/// Picks the single conforming type.
///
/// Zero or several candidates is an error: the module must be explicit
/// about what runs.
pub fn select_entry_type(module: &str, types: &[ExportedType]) -> Result<String, RemoteFailure> {
    let mut candidates: Vec<String> = types
        .iter()
        .filter(|t| t.conforming)
        .map(|t| t.name.clone())
        .collect();

    match candidates.len() {
        0 => Err(RemoteFailure::NoEntryType {
            module: module.to_string(),
        }),
        1 => Ok(candidates.remove(0)),
        _ => {
            candidates.sort();
            Err(RemoteFailure::AmbiguousEntryType {
                module: module.to_string(),
                candidates,
            })
        }
    }
}
