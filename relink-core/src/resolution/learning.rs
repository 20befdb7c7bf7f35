//! Learned path-prefix mappings
//!
//! Every user correction teaches one mapping from a prefix of the stale path to
//! the prefix that replaced it, so later tracks under the same moved folder
//! resolve by translation. Mappings live in memory for the store's lifetime.
//!
//! Lookup is longest-prefix match on path-component boundaries, so the result
//! does not depend on insertion order even when learned prefixes nest.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// One prefix substitution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMapping {
    pub old_prefix: String,
    pub new_prefix: String,
}

impl PathMapping {
    pub fn new(old_prefix: impl Into<String>, new_prefix: impl Into<String>) -> Self {
        Self {
            old_prefix: old_prefix.into(),
            new_prefix: new_prefix.into(),
        }
    }

    /// Whether `old_prefix` is a component-wise prefix of `path`
    pub fn matches(&self, path: &str) -> bool {
        has_path_prefix(path, &self.old_prefix)
    }

    /// Rewrite `path`; `None` if the mapping does not apply
    pub fn apply(&self, path: &str) -> Option<String> {
        if !self.matches(path) {
            return None;
        }
        Some(format!("{}{}", self.new_prefix, &path[self.old_prefix.len()..]))
    }
}

/// `prefix` is a prefix of `path` ending on a `/` boundary (or equal to it)
fn has_path_prefix(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() || !path.starts_with(prefix) {
        return false;
    }
    path.len() == prefix.len() || prefix.ends_with('/') || path[prefix.len()..].starts_with('/')
}

/// Mapping table built from user corrections
#[derive(Debug, Default)]
pub struct LearningStore {
    mappings: RwLock<BTreeMap<String, String>>,
}

impl LearningStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn from a manual correction of `original` to `corrected`
    ///
    /// Components are compared in lockstep from the start; the first divergence
    /// marks where the paths part. If the paths share trailing components
    /// (typically `Artist/Album/file`), those are excluded so the mapping covers
    /// only the part that moved. At most one mapping is learned per call;
    /// re-learning an existing prefix overwrites it.
    ///
    /// Returns the learned mapping, or `None` for identical paths or when the
    /// divergence leaves no usable prefix.
    pub fn record_correction(&self, original: &str, corrected: &str) -> Option<PathMapping> {
        let mapping = derive_mapping(original, corrected)?;

        let previous = self
            .write()
            .insert(mapping.old_prefix.clone(), mapping.new_prefix.clone());

        info!(
            old_prefix = %mapping.old_prefix,
            new_prefix = %mapping.new_prefix,
            replaced = previous.is_some(),
            "Learned path mapping from correction"
        );

        Some(mapping)
    }

    /// Add a mapping directly (e.g. seeded from configuration)
    pub fn insert(&self, mapping: PathMapping) {
        debug!(old_prefix = %mapping.old_prefix, new_prefix = %mapping.new_prefix, "Seeding path mapping");
        self.write().insert(mapping.old_prefix, mapping.new_prefix);
    }

    /// Mapping with the longest `old_prefix` that is a prefix of `path`
    pub fn lookup(&self, path: &str) -> Option<PathMapping> {
        self.read()
            .iter()
            .filter(|(old, _)| has_path_prefix(path, old))
            .max_by_key(|(old, _)| old.len())
            .map(|(old, new)| PathMapping::new(old.clone(), new.clone()))
    }

    /// Apply the best matching mapping to `path`
    pub fn translate(&self, path: &str) -> Option<String> {
        self.lookup(path).and_then(|mapping| mapping.apply(path))
    }

    /// Snapshot of all mappings, ordered by old prefix
    pub fn mappings(&self) -> Vec<PathMapping> {
        self.read()
            .iter()
            .map(|(old, new)| PathMapping::new(old.clone(), new.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, String>> {
        self.mappings.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, String>> {
        self.mappings.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn derive_mapping(original: &str, corrected: &str) -> Option<PathMapping> {
    let old: Vec<&str> = original.split('/').collect();
    let new: Vec<&str> = corrected.split('/').collect();

    let divergence = old.iter().zip(new.iter()).position(|(a, b)| a != b).or_else(|| {
        // One path is a strict prefix of the other
        (old.len() != new.len()).then(|| old.len().min(new.len()))
    })?;

    let max_suffix = old.len().min(new.len()) - divergence;
    let shared_suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take_while(|(a, b)| a == b)
        .count()
        .min(max_suffix);

    let (old_end, new_end) = if shared_suffix == 0 {
        (
            (divergence + 1).min(old.len()),
            (divergence + 1).min(new.len()),
        )
    } else {
        (old.len() - shared_suffix, new.len() - shared_suffix)
    };

    let old_prefix = old[..old_end].join("/");
    let new_prefix = new[..new_end].join("/");

    if old_prefix.is_empty() || old_prefix == new_prefix {
        return None;
    }

    Some(PathMapping::new(old_prefix, new_prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_component_divergence() {
        let store = LearningStore::new();
        let mapping = store.record_correction("/A/B/x.mp3", "/A/C/x.mp3").unwrap();
        assert_eq!(mapping, PathMapping::new("/A/B", "/A/C"));
        assert_eq!(store.translate("/A/B/y.mp3").as_deref(), Some("/A/C/y.mp3"));
    }

    #[test]
    fn test_moved_volume_with_different_depth() {
        let store = LearningStore::new();
        let mapping = store
            .record_correction(
                "/Volumes/Ext/Music/Artist/Album/01.mp3",
                "/home/me/Music/Artist/Album/01.mp3",
            )
            .unwrap();
        assert_eq!(mapping, PathMapping::new("/Volumes/Ext", "/home/me"));
        assert_eq!(
            store.translate("/Volumes/Ext/Music/Other/02.mp3").as_deref(),
            Some("/home/me/Music/Other/02.mp3")
        );
    }

    #[test]
    fn test_collapsed_directories_keep_shared_tail_out_of_mapping() {
        let store = LearningStore::new();
        let mapping = store.record_correction("/A/B/C/x.mp3", "/A/D/x.mp3").unwrap();
        assert_eq!(mapping, PathMapping::new("/A/B/C", "/A/D"));
        assert_eq!(store.translate("/A/B/C/y.mp3").as_deref(), Some("/A/D/y.mp3"));
        // Siblings of the collapsed directory are not rewritten
        assert!(store.translate("/A/B/E/y.mp3").is_none());
    }

    #[test]
    fn test_renamed_file_maps_up_to_divergence() {
        let store = LearningStore::new();
        let mapping = store.record_correction("/A/B/x.mp3", "/A/C/y.mp3").unwrap();
        assert_eq!(mapping, PathMapping::new("/A/B", "/A/C"));
    }

    #[test]
    fn test_identical_paths_learn_nothing() {
        let store = LearningStore::new();
        assert!(store.record_correction("/A/x.mp3", "/A/x.mp3").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_prefix_respects_component_boundary() {
        let store = LearningStore::new();
        store.insert(PathMapping::new("/A/B", "/Z"));
        assert!(store.lookup("/A/BC/x.mp3").is_none());
        assert_eq!(store.translate("/A/B/x.mp3").as_deref(), Some("/Z/x.mp3"));
    }

    #[test]
    fn test_longest_prefix_wins_regardless_of_order() {
        let store = LearningStore::new();
        store.insert(PathMapping::new("/A/B/C", "/deep"));
        store.insert(PathMapping::new("/A", "/shallow"));

        assert_eq!(store.translate("/A/B/C/x.mp3").as_deref(), Some("/deep/x.mp3"));
        assert_eq!(store.translate("/A/D/x.mp3").as_deref(), Some("/shallow/D/x.mp3"));
    }

    #[test]
    fn test_relearning_overwrites_by_key() {
        let store = LearningStore::new();
        store.record_correction("/A/B/x.mp3", "/A/C/x.mp3");
        store.record_correction("/A/B/x.mp3", "/A/D/x.mp3");

        assert_eq!(store.len(), 1);
        assert_eq!(store.mappings(), vec![PathMapping::new("/A/B", "/A/D")]);
    }
}
