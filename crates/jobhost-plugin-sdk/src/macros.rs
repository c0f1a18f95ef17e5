//! Export macro for plugin modules.

/// Exports job types from a `cdylib` as the plugin manifest.
///
/// Each type is registered under `<module path>::<type name>`. Export a
/// single type per module: the host refuses modules with several.
///
/// # Example
/// ```rust,ignore
/// export_job_plugins!(NightlyReport);
/// ```
#[macro_export]
macro_rules! export_job_plugins {
    ($($job:ty),+ $(,)?) => {
        #[unsafe(no_mangle)]
        pub static JOBHOST_PLUGIN_MANIFEST: $crate::abi::PluginManifest = {
            const TYPES: &[$crate::abi::PluginTypeDescriptor] = &[
                $(
                    $crate::exports::descriptor::<$job>($crate::exports::type_name(
                        concat!(module_path!(), "::", stringify!($job), "\0"),
                    )),
                )+
            ];
            $crate::abi::PluginManifest {
                abi_version: $crate::abi::ABI_VERSION,
                types: TYPES.as_ptr(),
                type_count: TYPES.len(),
            }
        };
    };
}
