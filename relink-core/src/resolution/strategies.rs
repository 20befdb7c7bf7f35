//! Resolution strategies
//!
//! A closed set of matchers tried in a fixed order by the engine. Each one
//! answers "where is this track?" with an optional [`LocationResult`]:
//! - `None`: nothing to offer
//! - a found result: a usable match (stops the cascade)
//! - a NotFound result: no usable match, but candidates worth showing the user

use super::learning::LearningStore;
use super::scanner::CandidateIndex;
use super::tokens::{file_stem, score_filename, score_metadata, tokenize_all};
use crate::types::{LocationResult, ResolutionMethod, TrackRef, FOUND_THRESHOLD};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Confidence of a verbatim path hit
pub const EXACT_PATH_CONFIDENCE: f32 = 1.0;
/// Confidence of a translated path hit
pub const TRANSLATION_CONFIDENCE: f32 = 0.9;
/// Metadata candidates must exceed this to be chosen
pub const METADATA_ACCEPT_THRESHOLD: f32 = 0.7;

/// Shared inputs of one resolution attempt
pub struct ResolutionContext<'a> {
    pub learning: &'a LearningStore,
    pub candidates: &'a CandidateIndex,
}

/// File-location heuristics in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    ExactPath,
    PathTranslation,
    FilenameSearch,
    MetadataMatch,
}

impl Strategy {
    /// Order in which the engine tries strategies
    pub const CASCADE: [Strategy; 4] = [
        Strategy::ExactPath,
        Strategy::PathTranslation,
        Strategy::FilenameSearch,
        Strategy::MetadataMatch,
    ];

    pub fn method(&self) -> ResolutionMethod {
        match self {
            Strategy::ExactPath => ResolutionMethod::ExactPath,
            Strategy::PathTranslation => ResolutionMethod::PathTranslation,
            Strategy::FilenameSearch => ResolutionMethod::FilenameSearch,
            Strategy::MetadataMatch => ResolutionMethod::MetadataMatch,
        }
    }

    pub fn attempt(&self, track: &TrackRef, ctx: &ResolutionContext<'_>) -> Option<LocationResult> {
        match self {
            Strategy::ExactPath => exact_path(track),
            Strategy::PathTranslation => path_translation(track, ctx.learning),
            Strategy::FilenameSearch => filename_search(track, ctx.candidates),
            Strategy::MetadataMatch => metadata_match(track, ctx.candidates),
        }
    }
}

fn exact_path(track: &TrackRef) -> Option<LocationResult> {
    let path = Path::new(&track.original_path);
    path.is_file().then(|| {
        LocationResult::found(
            track.original_path.clone(),
            path.to_path_buf(),
            EXACT_PATH_CONFIDENCE,
            ResolutionMethod::ExactPath,
            Vec::new(),
        )
    })
}

/// Generic rewrites for paths exported by other machines or players:
/// strip `file://localhost` or `file://`, map `/Volumes/` to `/`, turn `\` into `/`
pub fn generic_substitutions(path: &str) -> String {
    let stripped = path
        .strip_prefix("file://localhost")
        .or_else(|| path.strip_prefix("file://"))
        .unwrap_or(path);

    stripped.replacen("/Volumes/", "/", 1).replace('\\', "/")
}

/// Decode `%XX` escapes; undecodable input is returned unchanged
pub fn percent_decode(path: &str) -> String {
    urlencoding::decode(path)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Candidate rewrite of `original`, or `None` if it would be unchanged
///
/// A learned mapping takes precedence; the generic substitutions are used only
/// when no mapping applies. Percent-decoding runs last in both cases.
pub fn translate_path(original: &str, learning: &LearningStore) -> Option<String> {
    let rewritten = match learning.translate(original) {
        Some(mapped) => mapped,
        None => generic_substitutions(original),
    };
    let decoded = percent_decode(&rewritten);

    (decoded != original).then_some(decoded)
}

fn path_translation(track: &TrackRef, learning: &LearningStore) -> Option<LocationResult> {
    let translated = translate_path(&track.original_path, learning)?;
    let path = PathBuf::from(&translated);

    if !path.is_file() {
        debug!(track_id = %track.id, translated = %translated, "Translated path does not exist");
        return None;
    }

    Some(LocationResult::found(
        track.original_path.clone(),
        path,
        TRANSLATION_CONFIDENCE,
        ResolutionMethod::PathTranslation,
        Vec::new(),
    ))
}

/// File name the playlist expects, after normalizing the stored path
pub fn target_file_name(original: &str) -> Option<String> {
    let normalized = percent_decode(&generic_substitutions(original));
    normalized
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Sort by descending score; ties keep path order for determinism
fn rank(mut scored: Vec<(PathBuf, f32)>) -> Vec<(PathBuf, f32)> {
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.dedup_by(|a, b| a.0 == b.0);
    scored
}

fn filename_search(track: &TrackRef, candidates: &CandidateIndex) -> Option<LocationResult> {
    let target = target_file_name(&track.original_path)?;
    let target_lower = target.to_lowercase();
    let stem_lower = file_stem(&target).to_lowercase();

    let scored: Vec<(PathBuf, f32)> = candidates
        .files()
        .iter()
        .filter_map(|path| {
            let name = file_name_of(path);
            let name_lower = name.to_lowercase();
            let contains_target = name_lower.contains(&target_lower)
                || (!stem_lower.is_empty() && name_lower.contains(&stem_lower));
            contains_target.then(|| (path.clone(), score_filename(&name, &target, track)))
        })
        .collect();

    let ranked = rank(scored);
    let (best_path, best_score) = ranked.first().cloned()?;

    debug!(
        track_id = %track.id,
        target = %target,
        candidates = ranked.len(),
        best_score,
        "Filename search scored candidates"
    );

    let paths: Vec<PathBuf> = ranked.into_iter().map(|(path, _)| path).collect();
    if best_score > FOUND_THRESHOLD {
        Some(LocationResult::found(
            track.original_path.clone(),
            best_path,
            best_score,
            ResolutionMethod::FilenameSearch,
            paths,
        ))
    } else {
        Some(LocationResult::not_found(track.original_path.clone(), paths))
    }
}

fn metadata_match(track: &TrackRef, candidates: &CandidateIndex) -> Option<LocationResult> {
    if tokenize_all(&[&track.name, &track.artist, &track.album]).is_empty() {
        return None;
    }

    let scored: Vec<(PathBuf, f32)> = candidates
        .files()
        .iter()
        .map(|path| (path.clone(), score_metadata(&file_name_of(path), track)))
        .filter(|(_, score)| *score > FOUND_THRESHOLD)
        .collect();

    let ranked = rank(scored);
    let (best_path, best_score) = ranked.first().cloned()?;

    debug!(
        track_id = %track.id,
        candidates = ranked.len(),
        best_score,
        "Metadata match scored candidates"
    );

    let paths: Vec<PathBuf> = ranked.into_iter().map(|(path, _)| path).collect();
    if best_score > METADATA_ACCEPT_THRESHOLD {
        Some(LocationResult::found(
            track.original_path.clone(),
            best_path,
            best_score,
            ResolutionMethod::MetadataMatch,
            paths,
        ))
    } else {
        Some(LocationResult::not_found(track.original_path.clone(), paths))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolution::learning::PathMapping;

    fn track_at(path: &str) -> TrackRef {
        TrackRef::new("t1", "Song", "Artist", "Album", path)
    }

    #[test]
    fn test_generic_substitutions() {
        assert_eq!(
            generic_substitutions("file://localhost/Volumes/Music/a.mp3"),
            "/Music/a.mp3"
        );
        assert_eq!(generic_substitutions("file:///home/u/a.mp3"), "/home/u/a.mp3");
        assert_eq!(generic_substitutions(r"C:\Music\a.mp3"), "C:/Music/a.mp3");
        assert_eq!(generic_substitutions("/home/u/a.mp3"), "/home/u/a.mp3");
    }

    #[test]
    fn test_translate_path_decodes_and_reports_change() {
        let store = LearningStore::new();
        assert_eq!(
            translate_path("file:///home/u/My%20Song.mp3", &store).as_deref(),
            Some("/home/u/My Song.mp3")
        );
        assert!(translate_path("/home/u/a.mp3", &store).is_none());
    }

    #[test]
    fn test_learned_mapping_takes_precedence() {
        let store = LearningStore::new();
        store.insert(PathMapping::new("/Volumes/Ext", "/mnt/ext"));
        // Generic rule would give /Ext/a.mp3
        assert_eq!(
            translate_path("/Volumes/Ext/a.mp3", &store).as_deref(),
            Some("/mnt/ext/a.mp3")
        );
    }

    #[test]
    fn test_target_file_name() {
        assert_eq!(
            target_file_name("file:///x/My%20Song.mp3").as_deref(),
            Some("My Song.mp3")
        );
        assert_eq!(target_file_name(r"C:\x\a.flac").as_deref(), Some("a.flac"));
        assert!(target_file_name("/x/").is_none());
    }

    #[test]
    fn test_filename_search_prefers_exact_name() {
        let index = CandidateIndex::from_files(vec![
            PathBuf::from("/lib/b/Song (live).mp3"),
            PathBuf::from("/lib/a/song.mp3"),
            PathBuf::from("/lib/c/other.mp3"),
        ]);
        let result = filename_search(&track_at("/gone/Song.mp3"), &index).unwrap();

        assert!(result.is_found());
        assert_eq!(result.method(), ResolutionMethod::FilenameSearch);
        assert_eq!(result.resolved_path(), Some(&PathBuf::from("/lib/a/song.mp3")));
        assert_eq!(result.confidence(), 1.0);
        assert_eq!(result.alternatives(), &[PathBuf::from("/lib/b/Song (live).mp3")]);
    }

    #[test]
    fn test_filename_search_matches_reencoded_copy() {
        let index = CandidateIndex::from_files(vec![PathBuf::from("/lib/Song.flac")]);
        let result = filename_search(&track_at("/gone/Song.mp3"), &index).unwrap();
        assert!(result.is_found());
        assert_eq!(result.confidence(), 0.8);
    }

    #[test]
    fn test_metadata_match_threshold() {
        let track = TrackRef::new("t", "Blue Monday", "New Order", "", "/gone/track07.mp3");
        let index = CandidateIndex::from_files(vec![
            PathBuf::from("/lib/new order - blue monday.mp3"),
            PathBuf::from("/lib/blue monday order.mp3"),
        ]);
        let result = metadata_match(&track, &index).unwrap();
        assert!(result.is_found());
        assert_eq!(
            result.resolved_path(),
            Some(&PathBuf::from("/lib/new order - blue monday.mp3"))
        );
        // 3 of 4 words: above 0.5, kept as an alternative
        assert_eq!(result.alternatives(), &[PathBuf::from("/lib/blue monday order.mp3")]);
    }

    #[test]
    fn test_metadata_match_below_accept_threshold_yields_alternatives() {
        let track = TrackRef::new("t", "Blue Monday", "Order", "", "/gone/track07.mp3");
        // 2 of 3 words: a candidate, but not accepted
        let index = CandidateIndex::from_files(vec![PathBuf::from("/lib/blue monday.mp3")]);
        let result = metadata_match(&track, &index).unwrap();

        assert!(!result.is_found());
        assert_eq!(result.alternatives(), &[PathBuf::from("/lib/blue monday.mp3")]);

        // 1 of 3 words is not even a candidate
        let weak = CandidateIndex::from_files(vec![PathBuf::from("/lib/monday.mp3")]);
        assert!(metadata_match(&track, &weak).is_none());
    }
}
