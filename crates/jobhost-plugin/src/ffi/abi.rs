//! FFI ABI definitions for plugin modules.
//!
//! Defines the C-compatible data a plugin module must export. The host
//! side reads it only inside a sandbox process.

use std::ffi::{c_char, c_void};

/// Version of the layout below. Bumped on any incompatible change.
pub const ABI_VERSION: u32 = 1;

/// Name of the exported manifest symbol (NUL-terminated).
pub const MANIFEST_SYMBOL: &[u8] = b"JOBHOST_PLUGIN_MANIFEST\0";

/// Return code of [`ExecuteFn`] on success.
pub const EXECUTE_OK: i32 = 0;

/// Return code of [`ExecuteFn`] when the job returned an error.
pub const EXECUTE_FAILED: i32 = 1;

/// Return code of [`ExecuteFn`] when the job panicked.
pub const EXECUTE_PANICKED: i32 = 2;

/// Creates a new instance of an entry type. Returns null on failure.
pub type CreateFn = unsafe extern "C" fn() -> *mut c_void;

/// Runs the job on an instance.
///
/// On a non-zero return the plugin writes a NUL-terminated message of at
/// most `error_buf_len` bytes (terminator included) into `error_buf`.
pub type ExecuteFn =
    unsafe extern "C" fn(instance: *mut c_void, error_buf: *mut c_char, error_buf_len: usize) -> i32;

/// Releases an instance returned by [`CreateFn`].
pub type DestroyFn = unsafe extern "C" fn(instance: *mut c_void);

/// One exported type.
///
/// A type is an entry type candidate when `name`, `create`, and `execute`
/// are all present.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct PluginTypeDescriptor {
    /// Fully qualified type name (NUL-terminated, static).
    pub name: *const c_char,
    /// No-argument constructor.
    pub create: Option<CreateFn>,
    /// The single execution operation.
    pub execute: Option<ExecuteFn>,
    /// Destructor for instances made by `create`.
    pub destroy: Option<DestroyFn>,
}

// SAFETY: descriptors point at immutable static data inside the module.
unsafe impl Sync for PluginTypeDescriptor {}
unsafe impl Send for PluginTypeDescriptor {}

impl PluginTypeDescriptor {
    /// Whether this type satisfies the execution contract.
    pub fn is_conforming(&self) -> bool {
        !self.name.is_null() && self.create.is_some() && self.execute.is_some()
    }
}

/// Table of exported types, exported as [`MANIFEST_SYMBOL`].
#[repr(C)]
#[derive(Debug)]
pub struct PluginManifest {
    /// Must equal [`ABI_VERSION`].
    pub abi_version: u32,
    /// Pointer to `type_count` descriptors.
    pub types: *const PluginTypeDescriptor,
    /// Number of descriptors.
    pub type_count: usize,
}

// SAFETY: the manifest is immutable static data.
unsafe impl Sync for PluginManifest {}
unsafe impl Send for PluginManifest {}

impl PluginManifest {
    /// Views the descriptor table.
    ///
    /// # Safety
    /// `types` must point to `type_count` valid descriptors that outlive `'a`.
    pub unsafe fn descriptors<'a>(&'a self) -> &'a [PluginTypeDescriptor] {
        if self.types.is_null() || self.type_count == 0 {
            return &[];
        }
        // SAFETY: guaranteed by the caller.
        unsafe { std::slice::from_raw_parts(self.types, self.type_count) }
    }
}
