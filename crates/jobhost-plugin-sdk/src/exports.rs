//! C ABI shims generated for each exported job type.
//!
//! These are what [`export_job_plugins!`](crate::export_job_plugins)
//! places in the manifest. No panic ever unwinds out of them.

use std::any::Any;
use std::ffi::{CStr, c_char, c_void};
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

use jobhost_plugin::ffi::abi::{
    CreateFn, DestroyFn, EXECUTE_FAILED, EXECUTE_OK, EXECUTE_PANICKED, ExecuteFn,
    PluginTypeDescriptor,
};
use jobhost_plugin::ffi::safety::write_c_message;

use crate::traits::JobPlugin;

/// Constructs a `T` on the heap. Returns null if `T::default` panics.
///
/// # Safety
/// The result must be released with `destroy_instance::<T>`.
pub unsafe extern "C" fn create_instance<T: JobPlugin>() -> *mut c_void {
    match panic::catch_unwind(|| Box::new(T::default())) {
        Ok(job) => Box::into_raw(job).cast(),
        Err(_) => ptr::null_mut(),
    }
}

/// Runs [`JobPlugin::execute`] on an instance made by [`create_instance`].
///
/// # Safety
/// `instance` must come from `create_instance::<T>` and not be destroyed;
/// `error_buf` must be writable for `error_buf_len` bytes.
pub unsafe extern "C" fn execute_instance<T: JobPlugin>(
    instance: *mut c_void,
    error_buf: *mut c_char,
    error_buf_len: usize,
) -> i32 {
    if instance.is_null() {
        // SAFETY: guaranteed by the caller.
        unsafe { write_c_message(error_buf, error_buf_len, "null plugin instance") };
        return EXECUTE_FAILED;
    }
    // SAFETY: guaranteed by the caller.
    let job = unsafe { &mut *instance.cast::<T>() };

    match panic::catch_unwind(AssertUnwindSafe(|| job.execute())) {
        Ok(Ok(())) => EXECUTE_OK,
        Ok(Err(e)) => {
            // SAFETY: guaranteed by the caller.
            unsafe { write_c_message(error_buf, error_buf_len, &e.to_string()) };
            EXECUTE_FAILED
        }
        Err(payload) => {
            let message = format!("panicked: {}", panic_message(payload.as_ref()));
            // SAFETY: guaranteed by the caller.
            unsafe { write_c_message(error_buf, error_buf_len, &message) };
            EXECUTE_PANICKED
        }
    }
}

/// Drops an instance made by [`create_instance`].
///
/// # Safety
/// `instance` must come from `create_instance::<T>` and is invalid afterwards.
pub unsafe extern "C" fn destroy_instance<T: JobPlugin>(instance: *mut c_void) {
    if instance.is_null() {
        return;
    }
    // SAFETY: guaranteed by the caller.
    let job = unsafe { Box::from_raw(instance.cast::<T>()) };
    let _ = panic::catch_unwind(AssertUnwindSafe(move || drop(job)));
}

/// Descriptor for `T` under the given type name.
pub const fn descriptor<T: JobPlugin>(name: &'static CStr) -> PluginTypeDescriptor {
    PluginTypeDescriptor {
        name: name.as_ptr(),
        create: Some(create_instance::<T> as CreateFn),
        execute: Some(execute_instance::<T> as ExecuteFn),
        destroy: Some(destroy_instance::<T> as DestroyFn),
    }
}

/// Checks a NUL-terminated type name at compile time.
pub const fn type_name(name_with_nul: &'static str) -> &'static CStr {
    match CStr::from_bytes_with_nul(name_with_nul.as_bytes()) {
        Ok(name) => name,
        Err(_) => panic!("plugin type name must end with exactly one NUL"),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic payload"
    }
}
