//! Batch outcome summary

use crate::types::ConversionResult;
use serde::Serialize;
use std::time::Duration;

/// All results of one conversion batch, in submission order
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub results: Vec<ConversionResult>,
    pub elapsed: Duration,
}

impl ConversionReport {
    pub fn new(results: Vec<ConversionResult>, elapsed: Duration) -> Self {
        Self { results, elapsed }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    /// Jobs that ran and failed (cancelled jobs are counted separately)
    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| !r.success && !r.is_cancelled())
            .count()
    }

    pub fn cancelled(&self) -> usize {
        self.results.iter().filter(|r| r.is_cancelled()).count()
    }

    /// Results ordered by input path, for display
    pub fn sorted_by_input(&self) -> Vec<&ConversionResult> {
        let mut sorted: Vec<&ConversionResult> = self.results.iter().collect();
        sorted.sort_by(|a, b| a.input_path.cmp(&b.input_path));
        sorted
    }

    /// Total bytes written by successful jobs
    pub fn output_bytes(&self) -> u64 {
        self.results.iter().filter_map(|r| r.output_size).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConversionError;
    use crate::types::ConversionJob;

    #[test]
    fn test_counts_and_display_order() {
        let b = ConversionJob::new("/in/b.flac", "/out/b.mp3");
        let a = ConversionJob::new("/in/a.flac", "/out/a.mp3");
        let c = ConversionJob::new("/in/c.flac", "/out/c.mp3");

        let report = ConversionReport::new(
            vec![
                ConversionResult::succeeded(&b, Duration::from_millis(5), Some(10)),
                ConversionResult::failed(
                    &a,
                    ConversionError::TransformFailed("bad".to_string()),
                    Duration::ZERO,
                ),
                ConversionResult::failed(&c, ConversionError::Cancelled, Duration::ZERO),
            ],
            Duration::from_millis(20),
        );

        assert_eq!(report.total(), 3);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.cancelled(), 1);
        assert_eq!(report.output_bytes(), 10);

        let inputs: Vec<_> = report
            .sorted_by_input()
            .iter()
            .map(|r| r.input_path.clone())
            .collect();
        assert_eq!(
            inputs,
            vec![
                std::path::PathBuf::from("/in/a.flac"),
                std::path::PathBuf::from("/in/b.flac"),
                std::path::PathBuf::from("/in/c.flac"),
            ]
        );
        // Submission order is untouched
        assert_eq!(report.results[0].input_path, std::path::PathBuf::from("/in/b.flac"));
    }
}
