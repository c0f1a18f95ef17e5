//! Copy-on-load staging of plugin modules.

use std::io;
use std::path::{Path, PathBuf};

/// Stages modules before they are loaded.
///
/// With shadow copying enabled the module is copied into the context's
/// private directory and the copy is loaded, so the original file is never
/// held open and can be replaced while the copy runs.
#[derive(Debug, Clone)]
pub struct ShadowCopy {
    dir: Option<PathBuf>,
}

impl ShadowCopy {
    /// Stage into `dir`.
    pub fn into_dir(dir: PathBuf) -> Self {
        Self { dir: Some(dir) }
    }

    /// Load modules from where they are.
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    /// Returns the path that should be loaded for `original`.
    pub fn stage(&self, original: &Path) -> io::Result<PathBuf> {
        let Some(dir) = &self.dir else {
            return Ok(original.to_path_buf());
        };
        let file_name = original.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("module path '{}' has no file name", original.display()),
            )
        })?;
        std::fs::create_dir_all(dir)?;
        let staged = dir.join(file_name);
        std::fs::copy(original, &staged)?;
        tracing::debug!(
            original = %original.display(),
            staged = %staged.display(),
            "Module shadow-copied"
        );
        Ok(staged)
    }
}
