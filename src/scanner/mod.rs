//! Dataset scanner for discovering input CSV files.
//!
//! Only the top level of the input directory is considered. Hidden files
//! are skipped and the result is sorted so downstream hashing and
//! aggregation never depend on directory iteration order.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Configuration for dataset scanning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// File extensions to include (without dot, case-insensitive).
    pub extensions: Vec<String>,
    /// File names to exclude.
    pub excludes: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["csv".to_string()],
            excludes: Vec::new(),
        }
    }
}

/// Scanned dataset file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Full path.
    pub path: PathBuf,
    /// File name, used to match configured dataset names.
    pub name: String,
    /// File size in bytes.
    pub size: u64,
}

/// Discovers dataset files in one directory.
pub struct DatasetScanner {
    config: ScanConfig,
    root: PathBuf,
}

impl DatasetScanner {
    pub fn new(root: PathBuf, config: ScanConfig) -> Self {
        Self { config, root }
    }

    /// All matching files, sorted by name.
    pub fn scan(&self) -> Vec<ScannedFile> {
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Cannot read entry in {}: {}", self.root.display(), e);
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().is_file() || !self.matches(path) {
                continue;
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            let name = entry.file_name().to_string_lossy().to_string();
            debug!("Found dataset file {} ({} bytes)", name, size);
            files.push(ScannedFile {
                path: path.to_path_buf(),
                name,
                size,
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        files
    }

    /// Check if a file matches scan criteria.
    pub fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if self.is_excluded(name) {
            return false;
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        self.config.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext))
    }

    fn is_excluded(&self, name: &str) -> bool {
        // Hidden files
        if name.starts_with('.') {
            return true;
        }

        self.config.excludes.iter().any(|pattern| name == pattern)
    }
}
