//! File discovery for finding images in an input directory.
//!
//! The input corpus is flat: only direct children of the root are
//! considered. Symlinks are resolved once (a link to a file is returned, a
//! link to a directory is not descended into), which is the only loop
//! protection this scan provides.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::ProcessingConfig;
use crate::error::{PixbatchError, Result};

/// Discovers image files in a directory.
pub struct FileDiscovery {
    extensions: Vec<String>,
}

/// Information about a discovered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Full path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

impl FileDiscovery {
    /// Create a new file discovery instance.
    pub fn new(config: &ProcessingConfig) -> Self {
        Self::with_extensions(config.supported_formats.iter().map(String::as_str))
    }

    /// Create a discovery instance for an explicit extension set.
    pub fn with_extensions<'a>(extensions: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    /// Scan `root` once and return every recognized image, sorted by path.
    ///
    /// An empty directory yields an empty list. A root that cannot be read
    /// fails with [`PixbatchError::Access`].
    pub fn discover(&self, root: &Path) -> Result<Vec<DiscoveredFile>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(root).max_depth(1).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory loop at root"));
                    return Err(PixbatchError::access(root, source));
                }
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry in {:?}: {}", root, e);
                    continue;
                }
            };

            if entry.depth() == 0 {
                if !entry.file_type().is_dir() {
                    return Err(PixbatchError::access(
                        root,
                        std::io::Error::new(
                            std::io::ErrorKind::InvalidInput,
                            "input path is not a directory",
                        ),
                    ));
                }
                continue;
            }

            if entry.file_type().is_file() && self.is_supported(entry.path()) {
                match entry.metadata() {
                    Ok(meta) => files.push(DiscoveredFile {
                        path: entry.path().to_path_buf(),
                        size: meta.len(),
                    }),
                    Err(e) => tracing::warn!("Cannot stat {:?}: {}", entry.path(), e),
                }
            }
        }

        // Sort by path for deterministic ordering
        files.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::debug!("Discovered {} image(s) in {:?}", files.len(), root);
        Ok(files)
    }

    /// Check if a file has a recognized extension.
    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext_lower = ext.to_lowercase();
                self.extensions.iter().any(|known| *known == ext_lower)
            })
            .unwrap_or(false)
    }

    /// Get total size of all discovered files.
    pub fn total_size(files: &[DiscoveredFile]) -> u64 {
        files.iter().map(|f| f.size).sum()
    }
}
