//! Audio file scanner
//!
//! Recursive discovery of audio files (by extension) under the configured search
//! directories. Read-only; never follows symlinks into a loop.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Audio file scanner errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Extensions treated as audio
pub const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "oga", "m4a", "aac", "mp4", "wav", "aif", "aiff", "opus", "wma", "alac",
];

/// Audio file scanner
#[derive(Debug, Clone)]
pub struct AudioFileScanner {
    ignore_patterns: Vec<String>,
    max_depth: Option<usize>,
}

impl AudioFileScanner {
    /// Create new scanner with default ignore patterns
    ///
    /// Ignores system files like .DS_Store, Thumbs.db, .git, etc.
    pub fn new() -> Self {
        Self {
            ignore_patterns: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                ".git".to_string(),
                ".svn".to_string(),
                ".Trashes".to_string(),
                ".Spotlight-V100".to_string(),
            ],
            max_depth: None,
        }
    }

    /// Limit recursion depth (root = 0)
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Scan one directory for audio files, sorted by path
    pub fn scan(&self, root_path: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !root_path.exists() {
            return Err(ScanError::PathNotFound(root_path.to_path_buf()));
        }

        if !root_path.is_dir() {
            return Err(ScanError::NotADirectory(root_path.to_path_buf()));
        }

        let mut files = Vec::new();
        let mut symlink_visited = HashSet::new();

        let walker = WalkDir::new(root_path)
            .follow_links(false)
            .max_depth(self.max_depth.unwrap_or(usize::MAX))
            .into_iter()
            .filter_entry(|e| self.should_process_entry(e, &mut symlink_visited));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    if entry.file_type().is_file() && is_audio_path(entry.path()) {
                        files.push(entry.path().to_path_buf());
                    }
                }
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                    // Continue scanning, don't abort
                }
            }
        }

        files.sort();

        tracing::debug!(
            root = %root_path.display(),
            audio_files = files.len(),
            "Directory scan complete"
        );

        Ok(files)
    }

    /// Scan every directory; unreadable or missing ones are skipped with a warning
    pub fn scan_all(&self, roots: &[PathBuf]) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();

        for root in roots {
            match self.scan(root) {
                Ok(found) => {
                    for path in found {
                        if seen.insert(path.clone()) {
                            files.push(path);
                        }
                    }
                }
                Err(e) => tracing::warn!(root = %root.display(), "Skipping search directory: {}", e),
            }
        }

        files
    }

    fn should_process_entry(
        &self,
        entry: &DirEntry,
        symlink_visited: &mut HashSet<PathBuf>,
    ) -> bool {
        if entry.depth() == 0 {
            return true;
        }

        let path = entry.path();
        let file_name = entry.file_name().to_string_lossy();

        for pattern in &self.ignore_patterns {
            if file_name.contains(pattern.as_str()) {
                return false;
            }
        }

        // Detect symlink loops
        if entry.file_type().is_symlink() {
            if let Ok(canonical) = path.canonicalize() {
                if !symlink_visited.insert(canonical) {
                    tracing::warn!("Symlink loop detected: {}", path.display());
                    return false;
                }
            }
        }

        true
    }
}

impl Default for AudioFileScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Audio files under the search directories, enumerated on first use
///
/// Shared by the search strategies of one resolution pass so a pass walks the
/// directory trees at most once.
#[derive(Debug)]
pub struct CandidateIndex {
    scanner: AudioFileScanner,
    roots: Vec<PathBuf>,
    files: OnceLock<Vec<PathBuf>>,
}

impl CandidateIndex {
    pub fn new(scanner: AudioFileScanner, roots: Vec<PathBuf>) -> Self {
        Self {
            scanner,
            roots,
            files: OnceLock::new(),
        }
    }

    /// Index over a fixed file list (no directory walk)
    pub fn from_files(files: Vec<PathBuf>) -> Self {
        let index = Self::new(AudioFileScanner::new(), Vec::new());
        let _ = index.files.set(files);
        index
    }

    pub fn files(&self) -> &[PathBuf] {
        self.files.get_or_init(|| self.scanner.scan_all(&self.roots))
    }

    /// Whether the directory walk has happened yet
    pub fn is_loaded(&self) -> bool {
        self.files.get().is_some()
    }
}

/// Whether the path has an audio extension (case-insensitive)
pub fn is_audio_path(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}
