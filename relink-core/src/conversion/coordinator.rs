//! Conversion coordinator
//!
//! Turns found [`LocationResult`]s into [`ConversionJob`]s and drives them
//! through the [`BatchProcessor`]. Each job creates its output directory,
//! checks free space, then delegates to the [`Transcoder`].

use super::output::{has_free_space, is_same_path, plan_output_paths};
use super::report::ConversionReport;
use super::settings::ConversionSettings;
use super::transcoder::Transcoder;
use crate::batch::{BatchJob, BatchProcessor, BatchProgress};
use crate::error::ConversionError;
use crate::types::{ConversionJob, ConversionResult, LocationResult};
use chrono::Utc;
use relink_common::events::{EventBus, RelinkEvent};
use relink_common::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

impl BatchJob for ConversionJob {
    type Output = ConversionResult;

    fn key(&self) -> String {
        self.input_path.to_string_lossy().into_owned()
    }

    fn cancelled_output(&self) -> ConversionResult {
        ConversionResult::failed(self, ConversionError::Cancelled, Duration::ZERO)
    }

    fn failed_output(&self, reason: String) -> ConversionResult {
        ConversionResult::failed(self, ConversionError::TransformFailed(reason), Duration::ZERO)
    }
}

/// Plans and runs conversion batches
pub struct ConversionCoordinator {
    transcoder: Arc<dyn Transcoder>,
    settings: ConversionSettings,
    output_dir: PathBuf,
    min_free_space_bytes: u64,
    event_bus: Option<EventBus>,
    processor: BatchProcessor,
}

impl ConversionCoordinator {
    pub fn new(
        transcoder: Arc<dyn Transcoder>,
        settings: ConversionSettings,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transcoder,
            settings,
            output_dir: output_dir.into(),
            min_free_space_bytes: 0,
            event_bus: None,
            processor: BatchProcessor::new(),
        }
    }

    /// Fail jobs with `InsufficientSpace` when the output volume has less free
    pub fn with_min_free_space(mut self, bytes: u64) -> Self {
        self.min_free_space_bytes = bytes;
        self
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn settings(&self) -> &ConversionSettings {
        &self.settings
    }

    /// One job per found result, in input order; unresolved entries are skipped
    pub fn plan_jobs(&self, results: &[LocationResult]) -> Vec<ConversionJob> {
        let inputs: Vec<PathBuf> = results
            .iter()
            .filter(|r| r.is_found())
            .filter_map(|r| r.resolved_path().cloned())
            .collect();

        let outputs = plan_output_paths(&inputs, &self.output_dir, self.settings.format);

        inputs
            .into_iter()
            .zip(outputs)
            .map(|(input, output)| ConversionJob::new(input, output))
            .collect()
    }

    /// Convert every found track
    pub async fn run<P>(
        &self,
        results: &[LocationResult],
        concurrency: usize,
        on_progress: P,
    ) -> Result<ConversionReport>
    where
        P: Fn(usize, usize) + Send + Sync + 'static,
    {
        let jobs = self.plan_jobs(results);
        let skipped = results.len() - jobs.len();
        if skipped > 0 {
            info!(skipped, "Skipping tracks that were not resolved");
        }
        self.run_jobs(jobs, concurrency, on_progress).await
    }

    /// Run pre-planned jobs; `on_progress(completed, total)` fires once per job
    pub async fn run_jobs<P>(
        &self,
        jobs: Vec<ConversionJob>,
        concurrency: usize,
        on_progress: P,
    ) -> Result<ConversionReport>
    where
        P: Fn(usize, usize) + Send + Sync + 'static,
    {
        let started = Instant::now();
        let total = jobs.len();

        self.emit(RelinkEvent::BatchStarted {
            total,
            concurrency,
            timestamp: Utc::now(),
        });

        let transcoder = Arc::clone(&self.transcoder);
        let settings = self.settings.clone();
        let min_free = self.min_free_space_bytes;
        let unit_of_work = move |job: ConversionJob| {
            let transcoder = Arc::clone(&transcoder);
            let settings = settings.clone();
            async move { convert_one(transcoder.as_ref(), &settings, min_free, job).await }
        };

        let event_bus = self.event_bus.clone();
        let report_progress = move |progress: BatchProgress<'_, ConversionResult>| {
            if let Some(bus) = &event_bus {
                bus.emit_lossy(RelinkEvent::JobCompleted {
                    index: progress.index,
                    input_path: progress.key.to_string(),
                    success: progress.output.success,
                    error_kind: progress
                        .output
                        .error_kind
                        .as_ref()
                        .map(|e| e.kind_name().to_string()),
                    completed: progress.completed,
                    total: progress.total,
                    timestamp: Utc::now(),
                });
            }
            on_progress(progress.completed, progress.total);
        };

        let results = self
            .processor
            .run(jobs, concurrency, unit_of_work, report_progress)
            .await?;
        let report = ConversionReport::new(results, started.elapsed());

        info!(
            total = report.total(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            cancelled = report.cancelled(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Conversion batch complete"
        );

        self.emit(RelinkEvent::BatchCompleted {
            succeeded: report.succeeded(),
            failed: report.failed(),
            cancelled: report.cancelled(),
            timestamp: Utc::now(),
        });

        Ok(report)
    }

    /// Stop scheduling new jobs; running conversions finish
    pub fn cancel(&self) {
        if !self.processor.is_cancelled() {
            self.emit(RelinkEvent::BatchCancelled {
                timestamp: Utc::now(),
            });
        }
        self.processor.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.processor.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.processor.cancellation_token()
    }

    fn emit(&self, event: RelinkEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit_lossy(event);
        }
    }
}

async fn convert_one(
    transcoder: &dyn Transcoder,
    settings: &ConversionSettings,
    min_free_bytes: u64,
    job: ConversionJob,
) -> ConversionResult {
    let started = Instant::now();

    // A missing source is a transform failure, not an output path problem
    if !tokio::fs::try_exists(&job.input_path).await.unwrap_or(false) {
        let error = ConversionError::TransformFailed(format!(
            "input missing: {}",
            job.input_path.display()
        ));
        warn!(input = %job.input_path.display(), "{}", error);
        return ConversionResult::failed(&job, error, started.elapsed());
    }
    if is_same_path(&job.input_path, &job.output_path) {
        let error = ConversionError::OutputPathError(format!(
            "{} would overwrite its input",
            job.output_path.display()
        ));
        warn!(input = %job.input_path.display(), "{}", error);
        return ConversionResult::failed(&job, error, started.elapsed());
    }

    let output_dir = job
        .output_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    if let Err(e) = tokio::fs::create_dir_all(&output_dir).await {
        let error = ConversionError::OutputPathError(format!("{}: {}", output_dir.display(), e));
        warn!(input = %job.input_path.display(), "{}", error);
        return ConversionResult::failed(&job, error, started.elapsed());
    }

    if min_free_bytes > 0 {
        let dir = output_dir.clone();
        let enough = tokio::task::spawn_blocking(move || has_free_space(&dir, min_free_bytes))
            .await
            .unwrap_or(true);
        if !enough {
            warn!(output_dir = %output_dir.display(), "Insufficient free space");
            return ConversionResult::failed(
                &job,
                ConversionError::InsufficientSpace,
                started.elapsed(),
            );
        }
    }

    match transcoder
        .transcode(&job.input_path, &job.output_path, settings)
        .await
    {
        Ok(()) => {
            let output_size = tokio::fs::metadata(&job.output_path)
                .await
                .ok()
                .map(|m| m.len());
            info!(
                input = %job.input_path.display(),
                output = %job.output_path.display(),
                "Converted"
            );
            ConversionResult::succeeded(&job, started.elapsed(), output_size)
        }
        Err(e) => {
            let error = ConversionError::classify(&e);
            warn!(input = %job.input_path.display(), kind = error.kind_name(), "Conversion failed: {:#}", e);
            ConversionResult::failed(&job, error, started.elapsed())
        }
    }
}
