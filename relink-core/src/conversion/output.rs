//! Output path planning and free-space checks

use super::settings::OutputFormat;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use sysinfo::Disks;

/// Output paths for `inputs`, one per input, in the same order
///
/// Each output is `output_dir/<stem>.<ext>`. Names that collide with an earlier
/// output of the same batch or with any input (case-insensitively) get ` (2)`,
/// ` (3)`, ... appended to the stem, so an output never overwrites a source.
/// Other files already on disk are not considered; the transcoder overwrites
/// them.
pub fn plan_output_paths(inputs: &[PathBuf], output_dir: &Path, format: OutputFormat) -> Vec<PathBuf> {
    let mut taken: HashSet<String> = inputs.iter().map(|input| path_key(input)).collect();

    inputs
        .iter()
        .map(|input| {
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "track".to_string());

            let mut n = 1;
            loop {
                let name = if n == 1 {
                    format!("{}.{}", stem, format.extension())
                } else {
                    format!("{} ({}).{}", stem, n, format.extension())
                };
                let candidate = output_dir.join(name);
                if taken.insert(path_key(&candidate)) {
                    break candidate;
                }
                n += 1;
            }
        })
        .collect()
}

/// Whether `a` and `b` name the same file, following symlinks and `.`/`..`
pub fn is_same_path(a: &Path, b: &Path) -> bool {
    resolve_path(a) == resolve_path(b)
}

/// Case-folded [`resolve_path`], for collision checks
fn path_key(path: &Path) -> String {
    resolve_path(path).to_string_lossy().to_lowercase()
}

/// Canonical form of `path`, which need not exist yet
///
/// Falls back to canonicalizing the parent, then to `path` as given.
fn resolve_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => match parent.canonicalize() {
            Ok(parent) => parent.join(name),
            Err(_) => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}

/// Free bytes on the volume holding `path`
///
/// Uses the disk with the longest mount point that is a prefix of `path`.
/// Returns `None` when no mounted disk matches.
pub fn available_space(path: &Path) -> Option<u64> {
    let path = nearest_existing(path);
    let disks = Disks::new_with_refreshed_list();

    disks
        .list()
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
}

/// `path` itself if it exists, otherwise its closest existing ancestor (canonicalized)
fn nearest_existing(path: &Path) -> PathBuf {
    let mut current = Some(path);
    while let Some(candidate) = current {
        if let Ok(canonical) = candidate.canonicalize() {
            return canonical;
        }
        current = candidate.parent();
    }
    path.to_path_buf()
}

/// Whether the volume holding `path` has at least `min_free_bytes` free
///
/// Unknown volumes pass; the transcoder reports a real shortage itself.
pub fn has_free_space(path: &Path, min_free_bytes: u64) -> bool {
    if min_free_bytes == 0 {
        return true;
    }
    match available_space(path) {
        Some(free) => free >= min_free_bytes,
        None => {
            tracing::debug!(path = %path.display(), "Free space unknown, skipping check");
            true
        }
    }
}
