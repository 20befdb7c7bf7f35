//! Word tokenization and filename scoring
//!
//! Words are lower-cased, split on runs of non-alphanumeric characters, empty
//! tokens dropped, duplicates collapsed.

use crate::types::TrackRef;
use std::collections::HashSet;
use std::path::Path;

/// Score for an exact (case-insensitive) filename match
pub const EXACT_NAME_SCORE: f32 = 1.0;
/// Score for case/space-insensitive containment in either direction
pub const CONTAINMENT_SCORE: f32 = 0.8;
/// Scale applied to the word-overlap fallback in filename search
pub const OVERLAP_SCALE: f32 = 0.7;

/// Tokenize text into a set of lower-case alphanumeric words
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| word.to_lowercase())
        .collect()
}

/// Union of the words of several fields
pub fn tokenize_all(fields: &[&str]) -> HashSet<String> {
    fields.iter().flat_map(|field| tokenize(field)).collect()
}

/// |candidate ∩ reference| / |reference|; 0.0 when `reference` is empty
pub fn overlap_ratio(candidate: &HashSet<String>, reference: &HashSet<String>) -> f32 {
    if reference.is_empty() {
        return 0.0;
    }
    let shared = candidate.intersection(reference).count();
    shared as f32 / reference.len() as f32
}

/// File name without its extension
pub fn file_stem(name: &str) -> &str {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
}

fn squash(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Filename-search score of `candidate_name` against the target file name
///
/// - identical names, ignoring case → 1.0
/// - one stem contains the other, ignoring case and spaces → 0.8
/// - otherwise word overlap of the candidate stem with the track's name and
///   artist words, scaled by 0.7
pub fn score_filename(candidate_name: &str, target_name: &str, track: &TrackRef) -> f32 {
    if candidate_name.to_lowercase() == target_name.to_lowercase() {
        return EXACT_NAME_SCORE;
    }

    let candidate = squash(file_stem(candidate_name));
    let target = squash(file_stem(target_name));
    if !candidate.is_empty()
        && !target.is_empty()
        && (candidate.contains(&target) || target.contains(&candidate))
    {
        return CONTAINMENT_SCORE;
    }

    let reference = tokenize_all(&[&track.name, &track.artist]);
    overlap_ratio(&tokenize(file_stem(candidate_name)), &reference) * OVERLAP_SCALE
}

/// Metadata-match score: overlap of the candidate stem's words with the track's
/// name, artist and album words (unscaled)
pub fn score_metadata(candidate_name: &str, track: &TrackRef) -> f32 {
    let reference = tokenize_all(&[&track.name, &track.artist, &track.album]);
    overlap_ratio(&tokenize(file_stem(candidate_name)), &reference)
}
