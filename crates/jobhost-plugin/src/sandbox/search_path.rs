//! Code-search path of an isolated context.

use std::path::{Component, Path, PathBuf};

/// Directories a sandbox searches when resolving a relative module path.
///
/// The first entry is always the host base path. The second is the
/// plugin's private directory: relative to the base when the plugin lives
/// under it, absolute otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPath {
    base: PathBuf,
    private: PathBuf,
}

impl SearchPath {
    /// Builds the search path for a plugin living in `plugin_dir`.
    pub fn for_plugin(base: &Path, plugin_dir: &Path) -> Self {
        let private = match plugin_dir.strip_prefix(base) {
            Ok(relative) => relative
                .components()
                .filter(|c| !matches!(c, Component::RootDir | Component::CurDir))
                .collect(),
            Err(_) => plugin_dir.to_path_buf(),
        };
        Self {
            base: base.to_path_buf(),
            private,
        }
    }

    /// Rebuilds a search path from its parts (sandbox side).
    pub fn from_parts(base: PathBuf, private: PathBuf) -> Self {
        Self { base, private }
    }

    /// Host base path.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Private directory as configured (possibly relative to the base).
    pub fn private(&self) -> &Path {
        &self.private
    }

    /// Directories searched, in order.
    pub fn directories(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.base.clone()];
        let private = self.base.join(&self.private);
        if private != self.base {
            dirs.push(private);
        }
        dirs
    }

    /// Resolves a module path to an existing file.
    ///
    /// Absolute paths are taken as-is. Relative paths are tried against
    /// each search directory, then against the working directory.
    pub fn resolve(&self, module: &Path) -> Option<PathBuf> {
        if module.is_absolute() {
            return module.is_file().then(|| module.to_path_buf());
        }
        self.directories()
            .into_iter()
            .map(|dir| dir.join(module))
            .chain(std::iter::once(module.to_path_buf()))
            .find(|candidate| candidate.is_file())
    }
}
