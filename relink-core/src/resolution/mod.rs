//! Track-to-file resolution
//!
//! Cascade of strategies (exact path, path translation, filename search,
//! metadata match) backed by a learned prefix-mapping table.

pub mod engine;
pub mod learning;
pub mod scanner;
pub mod strategies;
pub mod tokens;

pub use engine::FileResolutionEngine;
pub use learning::{LearningStore, PathMapping};
pub use scanner::{AudioFileScanner, CandidateIndex, ScanError};
pub use strategies::{ResolutionContext, Strategy};
