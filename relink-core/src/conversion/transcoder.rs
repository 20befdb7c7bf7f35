//! Transcoding backend
//!
//! The batch only needs `(input, output, settings) -> Result`; the actual
//! decode/encode is delegated to an external tool. Errors are opaque
//! (`anyhow`) and classified by the coordinator.

use super::output::is_same_path;
use super::settings::ConversionSettings;
use crate::error::ConversionError;
use anyhow::bail;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Default encoder binary
pub const FFMPEG_COMMAND: &str = "ffmpeg";

/// Async transcoding service
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Convert `input` into `output`; `output`'s parent directory exists
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        settings: &ConversionSettings,
    ) -> anyhow::Result<()>;
}

/// Shells out to `ffmpeg`
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new() -> Self {
        Self::with_binary(FFMPEG_COMMAND)
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Check if the encoder can be executed
    pub async fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn args(input: &Path, output: &Path, settings: &ConversionSettings) -> Vec<std::ffi::OsString> {
        let mut args: Vec<std::ffi::OsString> = vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-nostdin".into(),
            "-y".into(),
            "-i".into(),
            input.as_os_str().to_owned(),
            "-vn".into(),
        ];
        args.extend(settings.codec_args().into_iter().map(Into::into));
        args.push(output.as_os_str().to_owned());
        args
    }
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        settings: &ConversionSettings,
    ) -> anyhow::Result<()> {
        tracing::debug!(
            input = %input.display(),
            output = %output.display(),
            format = %settings.format,
            "Running ffmpeg"
        );

        if is_same_path(input, output) {
            return Err(ConversionError::OutputPathError(format!(
                "{} would overwrite its input",
                output.display()
            ))
            .into());
        }
        let existed = tokio::fs::try_exists(output).await.unwrap_or(true);

        let result = Command::new(&self.binary)
            .args(Self::args(input, output, settings))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                // A missing encoder is a transform failure, not an output path problem
                ConversionError::TransformFailed(format!(
                    "failed to run {}: {}",
                    self.binary.display(),
                    e
                ))
            })?;

        if !result.status.success() {
            // Remove partial output, but only a file this run created
            if !existed {
                let _ = tokio::fs::remove_file(output).await;
            }
            let stderr = String::from_utf8_lossy(&result.stderr);
            bail!(
                "ffmpeg exited with {:?}: {}",
                result.status.code(),
                stderr.trim()
            );
        }

        Ok(())
    }
}
