//! Integration tests for the file resolution engine
//!
//! Each test builds a small music library in a temp directory and resolves
//! playlist entries against it.

use relink_common::events::{EventBus, RelinkEvent};
use relink_core::resolution::FileResolutionEngine;
use relink_core::{ResolutionMethod, TrackRef};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn touch(path: &Path) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"audio").unwrap();
    path.to_path_buf()
}

fn library() -> (TempDir, FileResolutionEngine) {
    let dir = TempDir::new().unwrap();
    let engine = FileResolutionEngine::new(vec![dir.path().to_path_buf()]);
    (dir, engine)
}

fn track(id: &str, name: &str, artist: &str, path: impl Into<String>) -> TrackRef {
    TrackRef::new(id, name, artist, "", path)
}

// ============================================================================
// Strategy cascade
// ============================================================================

#[test]
fn test_verbatim_existing_path_is_exact() {
    let (dir, engine) = library();
    let song = touch(&dir.path().join("Artist/song.mp3"));

    let result = engine.resolve(&track("1", "song", "Artist", song.to_string_lossy()));

    assert_eq!(result.method(), ResolutionMethod::ExactPath);
    assert_eq!(result.confidence(), 1.0);
    assert_eq!(result.resolved_path(), Some(&song));
}

#[test]
fn test_volumes_prefix_is_translated() {
    let (dir, engine) = library();
    let song = touch(&dir.path().join("Music/song.mp3"));
    let stale = format!("/Volumes{}", song.display());

    let result = engine.resolve(&track("1", "song", "", stale));

    assert_eq!(result.method(), ResolutionMethod::PathTranslation);
    assert_eq!(result.confidence(), 0.9);
    assert_eq!(result.resolved_path(), Some(&song));
}

#[test]
fn test_percent_encoded_file_url_is_translated() {
    let (dir, engine) = library();
    let song = touch(&dir.path().join("My Song.mp3"));
    let url = format!("file://{}/My%20Song.mp3", dir.path().display());

    let result = engine.resolve(&track("1", "My Song", "", url));

    assert_eq!(result.method(), ResolutionMethod::PathTranslation);
    assert_eq!(result.resolved_path(), Some(&song));
}

#[test]
fn test_moved_file_found_by_filename() {
    let (dir, engine) = library();
    let song = touch(&dir.path().join("Moved/Deeper/Song.mp3"));
    touch(&dir.path().join("Other/Song (live).mp3"));

    let result = engine.resolve(&track("1", "Song", "Artist", "/old/place/Song.mp3"));

    assert!(result.is_found());
    assert_eq!(result.method(), ResolutionMethod::FilenameSearch);
    assert_eq!(result.confidence(), 1.0);
    assert_eq!(result.resolved_path(), Some(&song));
    assert_eq!(
        result.alternatives(),
        &[dir.path().join("Other/Song (live).mp3")]
    );
}

#[test]
fn test_renamed_file_found_by_metadata() {
    let (dir, engine) = library();
    let song = touch(&dir.path().join("New Order - Blue Monday.flac"));
    touch(&dir.path().join("notes.txt"));

    let result = engine.resolve(&track("1", "Blue Monday", "New Order", "/old/track07.mp3"));

    assert!(result.is_found());
    assert_eq!(result.method(), ResolutionMethod::MetadataMatch);
    assert_eq!(result.resolved_path(), Some(&song));
}

#[test]
fn test_unmatched_track_is_not_found() {
    let (dir, engine) = library();
    touch(&dir.path().join("Completely Different.mp3"));

    let result = engine.resolve(&track("1", "Yellow", "Coldplay", "/old/yellow.mp3"));

    assert!(!result.is_found());
    assert_eq!(result.method(), ResolutionMethod::NotFound);
    assert_eq!(result.confidence(), 0.0);
    assert!(result.resolved_path().is_none());
}

#[test]
fn test_missing_search_directory_is_skipped() {
    let dir = TempDir::new().unwrap();
    let song = touch(&dir.path().join("Song.mp3"));
    let engine = FileResolutionEngine::new(vec![
        PathBuf::from("/nonexistent/music"),
        dir.path().to_path_buf(),
    ]);

    let result = engine.resolve(&track("1", "Song", "", "/gone/Song.mp3"));
    assert_eq!(result.resolved_path(), Some(&song));
}

// ============================================================================
// Learning from corrections
// ============================================================================

#[test]
fn test_correction_teaches_translation_for_siblings() {
    let (dir, engine) = library();
    let root = dir.path().display().to_string();
    let sibling = touch(&dir.path().join("A/C/y.mp3"));

    engine.record_correction(&format!("{}/A/B/x.mp3", root), &format!("{}/A/C/x.mp3", root));

    let result = engine.resolve(&track("2", "y", "", format!("{}/A/B/y.mp3", root)));
    assert_eq!(result.method(), ResolutionMethod::PathTranslation);
    assert_eq!(result.confidence(), 0.9);
    assert_eq!(result.resolved_path(), Some(&sibling));
}

#[test]
fn test_apply_correction_then_batch_uses_mapping() {
    // No search directories: only the learned mapping can find these
    let dir = TempDir::new().unwrap();
    let engine = FileResolutionEngine::new(Vec::new());
    let new_root = dir.path().join("new");
    let first = touch(&new_root.join("Album/01.mp3"));
    let second = touch(&new_root.join("Album/02.mp3"));

    let missing = engine.resolve(&track("1", "zz", "", "/mnt/old/Album/01.mp3"));
    assert!(!missing.is_found());

    let corrected = engine.apply_correction(&missing, first.clone());
    assert_eq!(corrected.method(), ResolutionMethod::UserProvided);
    assert_eq!(corrected.resolved_path(), Some(&first));

    let results = engine.resolve_all(
        &[track("2", "zz", "", "/mnt/old/Album/02.mp3")],
        |_, _| {},
    );
    assert_eq!(results[0].method(), ResolutionMethod::PathTranslation);
    assert_eq!(results[0].resolved_path(), Some(&second));
}

// ============================================================================
// Batch resolution
// ============================================================================

#[test]
fn test_resolve_all_reports_progress_once_per_track() {
    let (dir, engine) = library();
    let song = touch(&dir.path().join("a.mp3"));
    let tracks: Vec<TrackRef> = (0..5)
        .map(|i| track(&i.to_string(), "a", "", song.to_string_lossy()))
        .collect();

    let mut calls = Vec::new();
    let results = engine.resolve_all(&tracks, |completed, total| calls.push((completed, total)));

    assert_eq!(results.len(), 5);
    assert_eq!(calls, (1..=5).map(|i| (i, 5)).collect::<Vec<_>>());
}

#[test]
fn test_resolve_all_preserves_track_order() {
    let (dir, engine) = library();
    let a = touch(&dir.path().join("a.mp3"));
    let b = touch(&dir.path().join("b.mp3"));

    let results = engine.resolve_all(
        &[
            track("b", "b", "", b.to_string_lossy()),
            track("none", "x", "", ""),
            track("a", "a", "", a.to_string_lossy()),
        ],
        |_, _| {},
    );

    assert_eq!(results[0].resolved_path(), Some(&b));
    assert_eq!(results[1].method(), ResolutionMethod::NotFound);
    assert_eq!(results[2].resolved_path(), Some(&a));
}

#[test]
fn test_resolution_events_published() {
    let dir = TempDir::new().unwrap();
    let song = touch(&dir.path().join("a.mp3"));
    let bus = EventBus::new(16);
    let mut rx = bus.subscribe();
    let engine = FileResolutionEngine::new(vec![dir.path().to_path_buf()]).with_event_bus(bus);

    engine.resolve_all(&[track("t1", "a", "", song.to_string_lossy())], |_, _| {});

    match rx.try_recv().unwrap() {
        RelinkEvent::TrackResolved {
            track_id, method, ..
        } => {
            assert_eq!(track_id, "t1");
            assert_eq!(method, "ExactPath");
        }
        other => panic!("Expected TrackResolved, got {:?}", other),
    }
    match rx.try_recv().unwrap() {
        RelinkEvent::ResolutionProgress {
            completed, total, ..
        } => assert_eq!((completed, total), (1, 1)),
        other => panic!("Expected ResolutionProgress, got {:?}", other),
    }
}
