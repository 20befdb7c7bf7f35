//! Target format and encoder settings

use relink_common::config::ConversionConfig;
use relink_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output container/codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Mp3,
    Aac,
    Flac,
    Opus,
    Ogg,
    Wav,
}

impl OutputFormat {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Aac => "m4a",
            OutputFormat::Flac => "flac",
            OutputFormat::Opus => "opus",
            OutputFormat::Ogg => "ogg",
            OutputFormat::Wav => "wav",
        }
    }

    /// ffmpeg audio codec name
    pub fn codec(&self) -> &'static str {
        match self {
            OutputFormat::Mp3 => "libmp3lame",
            OutputFormat::Aac => "aac",
            OutputFormat::Flac => "flac",
            OutputFormat::Opus => "libopus",
            OutputFormat::Ogg => "libvorbis",
            OutputFormat::Wav => "pcm_s16le",
        }
    }

    /// Lossless formats ignore the bitrate
    pub fn is_lossless(&self) -> bool {
        matches!(self, OutputFormat::Flac | OutputFormat::Wav)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Mp3 => "mp3",
            OutputFormat::Aac => "aac",
            OutputFormat::Flac => "flac",
            OutputFormat::Opus => "opus",
            OutputFormat::Ogg => "ogg",
            OutputFormat::Wav => "wav",
        };
        f.write_str(name)
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mp3" => Ok(OutputFormat::Mp3),
            "aac" | "m4a" => Ok(OutputFormat::Aac),
            "flac" => Ok(OutputFormat::Flac),
            "opus" => Ok(OutputFormat::Opus),
            "ogg" | "vorbis" => Ok(OutputFormat::Ogg),
            "wav" => Ok(OutputFormat::Wav),
            other => Err(Error::InvalidInput(format!(
                "Unsupported output format: {}",
                other
            ))),
        }
    }
}

/// Settings handed to the transcoder for every job of a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionSettings {
    pub format: OutputFormat,
    pub bitrate_kbps: u32,
}

impl ConversionSettings {
    pub fn new(format: OutputFormat, bitrate_kbps: u32) -> Self {
        Self {
            format,
            bitrate_kbps,
        }
    }

    pub fn from_config(config: &ConversionConfig) -> Result<Self> {
        if config.bitrate_kbps == 0 {
            return Err(Error::Config("bitrate_kbps must be positive".to_string()));
        }
        Ok(Self::new(config.format.parse()?, config.bitrate_kbps))
    }

    /// Replace the bitrate, rejecting zero
    pub fn with_bitrate(mut self, bitrate_kbps: u32) -> Result<Self> {
        if bitrate_kbps == 0 {
            return Err(Error::InvalidInput("bitrate must be positive".to_string()));
        }
        self.bitrate_kbps = bitrate_kbps;
        Ok(self)
    }

    /// Encoder arguments (`-c:a ... [-b:a ...]`)
    pub fn codec_args(&self) -> Vec<String> {
        let mut args = vec!["-c:a".to_string(), self.format.codec().to_string()];
        if !self.format.is_lossless() {
            args.push("-b:a".to_string());
            args.push(format!("{}k", self.bitrate_kbps));
        }
        args
    }
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self::new(OutputFormat::Mp3, 256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!("MP3".parse::<OutputFormat>().unwrap(), OutputFormat::Mp3);
        assert_eq!("m4a".parse::<OutputFormat>().unwrap(), OutputFormat::Aac);
        assert!("xyz".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_codec_args() {
        assert_eq!(
            ConversionSettings::new(OutputFormat::Opus, 128).codec_args(),
            vec!["-c:a", "libopus", "-b:a", "128k"]
        );
        assert_eq!(
            ConversionSettings::new(OutputFormat::Flac, 128).codec_args(),
            vec!["-c:a", "flac"]
        );
    }

    #[test]
    fn test_from_config() {
        let config = ConversionConfig {
            format: "ogg".to_string(),
            bitrate_kbps: 192,
        };
        let settings = ConversionSettings::from_config(&config).unwrap();
        assert_eq!(settings.format, OutputFormat::Ogg);
        assert_eq!(settings.format.extension(), "ogg");
        assert_eq!(settings.bitrate_kbps, 192);

        let zero = ConversionConfig {
            format: "mp3".to_string(),
            bitrate_kbps: 0,
        };
        assert!(ConversionSettings::from_config(&zero).is_err());
    }

    #[test]
    fn test_bitrate_override_must_be_positive() {
        let settings = ConversionSettings::default().with_bitrate(320).unwrap();
        assert_eq!(settings.bitrate_kbps, 320);
        assert_eq!(settings.codec_args(), vec!["-c:a", "libmp3lame", "-b:a", "320k"]);

        assert!(matches!(
            ConversionSettings::default().with_bitrate(0),
            Err(Error::InvalidInput(_))
        ));
    }
}
