use std::path::{Path, PathBuf};

/// One place to look for a file whose nominal path does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchRoot {
    /// `<base>/<user>/<task>` of the task being processed
    TaskDirectory,
    /// The registry's base directory
    BaseDirectory,
    Fixed(PathBuf),
}

/// Ordered list of roots tried when a nominal artifact path is missing.
///
/// Each root is tried first with the nominal path joined onto it, then with
/// only its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPathPolicy {
    roots: Vec<SearchRoot>,
}

impl Default for SearchPathPolicy {
    fn default() -> Self {
        Self {
            roots: vec![SearchRoot::TaskDirectory, SearchRoot::BaseDirectory],
        }
    }
}

impl SearchPathPolicy {
    pub fn new(roots: Vec<SearchRoot>) -> Self {
        Self { roots }
    }

    /// A policy that never looks beyond the nominal path.
    pub fn none() -> Self {
        Self { roots: Vec::new() }
    }

    pub fn with_root(mut self, root: SearchRoot) -> Self {
        self.roots.push(root);
        self
    }

    pub fn roots(&self) -> &[SearchRoot] {
        &self.roots
    }

    /// Finds an existing file for `nominal`, returning its canonical path.
    pub fn resolve(&self, nominal: &Path, task_dir: &Path, base_dir: &Path) -> Option<PathBuf> {
        if nominal.exists() {
            return nominal.canonicalize().ok();
        }

        let file_name = nominal.file_name();
        for root in &self.roots {
            let dir = match root {
                SearchRoot::TaskDirectory => task_dir,
                SearchRoot::BaseDirectory => base_dir,
                SearchRoot::Fixed(dir) => dir.as_path(),
            };

            let mut candidates = Vec::with_capacity(2);
            if nominal.is_relative() {
                candidates.push(dir.join(nominal));
            }
            if let Some(name) = file_name {
                candidates.push(dir.join(name));
            }

            if let Some(found) = candidates.into_iter().find(|c| c.is_file()) {
                log::debug!("Resolved {} to {}", nominal.display(), found.display());
                return found.canonicalize().ok();
            }
        }
        None
    }
}
