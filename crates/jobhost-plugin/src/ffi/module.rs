//! Loaded plugin module, sandbox side only.
//!
//! The host process never constructs this type: it would map plugin code
//! into the host's address space.

use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

use tracing::{debug, info};

use super::abi::{
    ABI_VERSION, DestroyFn, EXECUTE_OK, ExecuteFn, MANIFEST_SYMBOL, PluginManifest,
    PluginTypeDescriptor,
};
use super::safety::{c_str_to_string, message_from_buffer};
use crate::sandbox::protocol::ExportedType;

/// Size of the buffer handed to plugins for fault messages.
const ERROR_BUFFER_LEN: usize = 4096;

/// A shared library that exports a plugin manifest.
pub struct PluginModule {
    manifest: NonNull<PluginManifest>,
    path: PathBuf,
    // Declared last: dropped after anything derived from the manifest.
    _library: libloading::Library,
}

impl std::fmt::Debug for PluginModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginModule")
            .field("path", &self.path)
            .finish()
    }
}

impl PluginModule {
    /// Maps the library and locates its manifest.
    ///
    /// No exported function is called. The platform loader still runs the
    /// library's static initializers, which is why this only ever happens
    /// inside a sandbox process.
    ///
    /// # Safety
    /// Loads arbitrary native code into the current process.
    pub unsafe fn load(path: &Path) -> Result<Self, String> {
        // SAFETY: the caller accepts running the module's initializers.
        let library = unsafe { libloading::Library::new(path) }.map_err(|e| e.to_string())?;

        // SAFETY: the symbol is a data symbol; we only take its address.
        let manifest: *const PluginManifest = unsafe {
            let symbol = library
                .get::<*const PluginManifest>(MANIFEST_SYMBOL)
                .map_err(|e| format!("missing plugin manifest: {e}"))?;
            *symbol
        };
        let manifest = NonNull::new(manifest.cast_mut())
            .ok_or_else(|| "plugin manifest symbol is null".to_string())?;

        // SAFETY: the manifest lives in the library, which we keep alive.
        let abi_version = unsafe { manifest.as_ref() }.abi_version;
        if abi_version != ABI_VERSION {
            return Err(format!(
                "plugin ABI version {abi_version} is not supported (expected {ABI_VERSION})"
            ));
        }

        info!(path = %path.display(), "Plugin module loaded");

        Ok(Self {
            manifest,
            path: path.to_path_buf(),
            _library: library,
        })
    }

    /// Path the module was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn descriptors(&self) -> &[PluginTypeDescriptor] {
        // SAFETY: the manifest and its table are static data of the library,
        // which lives as long as `self`.
        unsafe { self.manifest.as_ref().descriptors() }
    }

    /// Every exported type, by name.
    pub fn exported_types(&self) -> Vec<ExportedType> {
        self.descriptors()
            .iter()
            .filter_map(|d| {
                // SAFETY: names are NUL-terminated static strings.
                let name = unsafe { c_str_to_string(d.name) }?;
                Some(ExportedType {
                    name,
                    conforming: d.is_conforming(),
                })
            })
            .collect()
    }

    /// Creates an instance of a conforming type.
    ///
    /// Returns `None` when the type is unknown or its constructor yields null.
    pub fn instantiate(&self, type_name: &str) -> Option<PluginInstance> {
        let descriptor = self.descriptors().iter().find(|d| {
            // SAFETY: names are NUL-terminated static strings.
            d.is_conforming() && unsafe { c_str_to_string(d.name) }.as_deref() == Some(type_name)
        })?;
        let (create, execute) = (descriptor.create?, descriptor.execute?);

        // SAFETY: `create` comes from a conforming descriptor of a loaded module.
        let handle = NonNull::new(unsafe { create() })?;
        debug!(type_name, "Plugin instance created");

        Some(PluginInstance {
            handle,
            execute,
            destroy: descriptor.destroy,
            type_name: type_name.to_string(),
        })
    }
}

/// A live instance inside the sandbox.
///
/// Must be dropped before the [`PluginModule`] that created it.
pub struct PluginInstance {
    handle: NonNull<c_void>,
    execute: ExecuteFn,
    destroy: Option<DestroyFn>,
    type_name: String,
}

impl std::fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginInstance")
            .field("type_name", &self.type_name)
            .finish()
    }
}

impl PluginInstance {
    /// Type this instance was created from.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Runs the job. `Err` carries the plugin's fault message.
    pub fn execute(&mut self) -> Result<(), String> {
        let mut buf = vec![0u8; ERROR_BUFFER_LEN];
        // SAFETY: `handle` came from this type's constructor; the buffer is
        // writable for its full length.
        let code = unsafe { (self.execute)(self.handle.as_ptr(), buf.as_mut_ptr().cast(), buf.len()) };
        if code == EXECUTE_OK {
            return Ok(());
        }
        let message = message_from_buffer(&buf);
        Err(if message.is_empty() {
            format!("plugin returned status {code}")
        } else {
            message
        })
    }
}

impl Drop for PluginInstance {
    fn drop(&mut self) {
        if let Some(destroy) = self.destroy {
            // SAFETY: the handle is released exactly once, here.
            unsafe { destroy(self.handle.as_ptr()) };
        }
    }
}
