use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use ignore::overrides::{Override, OverrideBuilder};
use tracing::{debug, warn};

use crate::error::DiscoveryError;

pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Expands CLI inputs into the ordered list of documents to validate
///
/// Directories are walked with `ignore` and filtered by a file-name glob. Any other input is
/// taken literally, even if it does not exist, so the batch reports it as unreadable.
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    /// File-name glob, e.g. `*.xml`
    pattern: String,
    /// Descend below the top level of each directory
    recursive: bool,
}

impl FileDiscovery {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            recursive: false,
        }
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Discover documents for every input, preserving input order
    ///
    /// Files found inside one directory are sorted by path so repeated runs see the same order.
    pub fn discover(&self, inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for input in inputs {
            if input.is_dir() {
                files.extend(self.walk_directory(input)?);
            } else {
                files.push(input.clone());
            }
        }

        debug!(count = files.len(), "input discovery finished");
        Ok(files)
    }

    fn build_override(&self, root: &Path) -> Result<Override> {
        let invalid = |e: ignore::Error| DiscoveryError::InvalidPattern {
            pattern: self.pattern.clone(),
            details: e.to_string(),
        };

        let mut builder = OverrideBuilder::new(root);
        builder.add(&self.pattern).map_err(invalid)?;
        builder.build().map_err(invalid)
    }

    fn walk_directory(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        // An unlistable root is fatal; problems further down are only warned about
        std::fs::read_dir(dir).map_err(|e| DiscoveryError::FileSystemTraversal {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;

        let walker = WalkBuilder::new(dir)
            .standard_filters(false)
            .hidden(true)
            .follow_links(false)
            .max_depth(if self.recursive { None } else { Some(1) })
            .overrides(self.build_override(dir)?)
            .build();

        let mut files = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_some_and(|ft| ft.is_file()) {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => warn!(dir = %dir.display(), "skipping unreadable entry: {}", e),
            }
        }

        files.sort();
        Ok(files)
    }
}

impl Default for FileDiscovery {
    fn default() -> Self {
        Self::new("*.xml")
    }
}
