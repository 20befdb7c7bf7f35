//! Batch re-encoding of resolved tracks

pub mod coordinator;
pub mod output;
pub mod report;
pub mod settings;
pub mod transcoder;

pub use coordinator::ConversionCoordinator;
pub use report::ConversionReport;
pub use settings::{ConversionSettings, OutputFormat};
pub use transcoder::{FfmpegTranscoder, Transcoder};
