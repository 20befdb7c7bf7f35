//! relink - locate the files behind a playlist and batch-convert them
//!
//! `resolve` prints one JSON `LocationResult` per track; `convert` resolves,
//! then re-encodes every found track into the output directory and prints the
//! batch report. Ctrl+C stops scheduling new conversions.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use relink_common::config::{
    default_config_path, write_toml_config, LoggingConfig, Settings, SettingsResolver, TomlConfig,
};
use relink_common::events::EventBus;
use relink_core::conversion::{
    ConversionCoordinator, ConversionSettings, FfmpegTranscoder, OutputFormat,
};
use relink_core::resolution::{FileResolutionEngine, PathMapping};
use relink_core::{LocationResult, TrackRef};

/// Command-line arguments for relink
#[derive(Parser, Debug)]
#[command(name = "relink")]
#[command(about = "Relink playlist tracks to files on disk and batch-convert them")]
#[command(version)]
struct Cli {
    /// TOML config file
    #[arg(short, long, global = true, env = "RELINK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve playlist tracks and print the results as JSON
    Resolve(ResolveArgs),

    /// Resolve playlist tracks, then convert every found file
    Convert {
        #[command(flatten)]
        resolve: ResolveArgs,

        /// Directory receiving converted files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Maximum concurrent conversions
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Output format (mp3, aac, flac, opus, ogg, wav)
        #[arg(short, long)]
        format: Option<OutputFormat>,

        /// Bitrate for lossy formats, in kbit/s
        #[arg(short, long)]
        bitrate: Option<u32>,
    },

    /// Write a default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct ResolveArgs {
    /// JSON array of tracks (`-` reads stdin)
    #[arg(short, long)]
    tracks: PathBuf,

    /// Directory to search for moved files (repeatable)
    #[arg(short, long = "search-dir")]
    search_dirs: Vec<PathBuf>,

    /// Known prefix move, OLD=NEW (repeatable)
    #[arg(short, long = "map", value_parser = parse_mapping)]
    mappings: Vec<PathMapping>,
}

fn parse_mapping(value: &str) -> std::result::Result<PathMapping, String> {
    match value.split_once('=') {
        Some((old, new)) if !old.is_empty() && !new.is_empty() => Ok(PathMapping::new(old, new)),
        _ => Err(format!("expected OLD=NEW, got '{}'", value)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (search_dirs, output_dir, concurrency) = match &cli.command {
        Command::Resolve(args) => (args.search_dirs.clone(), None, None),
        Command::Convert {
            resolve,
            output_dir,
            concurrency,
            ..
        } => (resolve.search_dirs.clone(), output_dir.clone(), *concurrency),
        Command::InitConfig { .. } => (Vec::new(), None, None),
    };

    let settings = SettingsResolver::new()
        .with_config_path(cli.config.clone())
        .with_search_directories(search_dirs)
        .with_output_directory(output_dir)
        .with_concurrency(concurrency)
        .resolve()
        .context("Failed to resolve settings")?;

    init_tracing(&settings.logging)?;

    info!("relink {}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Resolve(args) => {
            let results = resolve(&settings, &args).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Command::Convert {
            resolve: args,
            format,
            bitrate,
            ..
        } => {
            convert(&settings, &args, format, bitrate).await?;
        }
        Command::InitConfig { force } => {
            let path = cli
                .config
                .or_else(default_config_path)
                .context("No config directory on this platform; pass --config")?;
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            write_toml_config(&TomlConfig::default(), &path)?;
            println!("{}", path.display());
        }
    }

    Ok(())
}

/// Install the tracing subscriber
///
/// `RUST_LOG` wins over the configured level. With `logging.file` set, logs are
/// also appended to that file.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("relink={0},relink_core={0},relink_common={0}", logging.level).into()
    });

    let file_layer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

fn read_tracks(path: &Path) -> Result<Vec<TrackRef>> {
    let content = if path == Path::new("-") {
        std::io::read_to_string(std::io::stdin()).context("Failed to read tracks from stdin")?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };

    serde_json::from_str(&content).context("Tracks must be a JSON array of track objects")
}

async fn resolve(settings: &Settings, args: &ResolveArgs) -> Result<Vec<LocationResult>> {
    let tracks = read_tracks(&args.tracks)?;

    let engine = FileResolutionEngine::new(settings.search_directories.clone());
    for mapping in &args.mappings {
        engine.learning().insert(mapping.clone());
    }

    let results = Arc::new(engine)
        .resolve_all_async(tracks, |completed, total| {
            tracing::debug!(completed, total, "Resolution progress");
        })
        .await?;

    let missing = results.iter().filter(|r| !r.is_found()).count();
    if missing > 0 {
        warn!(missing, "Some tracks could not be located");
    }

    Ok(results)
}

async fn convert(
    settings: &Settings,
    args: &ResolveArgs,
    format: Option<OutputFormat>,
    bitrate: Option<u32>,
) -> Result<()> {
    let results = resolve(settings, args).await?;

    let mut conversion = ConversionSettings::from_config(&settings.conversion)?;
    if let Some(format) = format {
        conversion.format = format;
    }
    if let Some(bitrate) = bitrate {
        conversion = conversion.with_bitrate(bitrate)?;
    }

    let transcoder = FfmpegTranscoder::new();
    if !transcoder.is_available().await {
        warn!("ffmpeg not found in PATH; every conversion will fail");
    }

    let event_bus = EventBus::new(256);
    let coordinator = Arc::new(
        ConversionCoordinator::new(
            Arc::new(transcoder),
            conversion,
            settings.output_directory.clone(),
        )
        .with_min_free_space(settings.min_free_space_bytes)
        .with_event_bus(event_bus),
    );

    let cancel_on_ctrl_c = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, cancelling remaining conversions");
                coordinator.cancel();
            }
        })
    };

    let report = coordinator
        .run(&results, settings.concurrency, |completed, total| {
            info!("Converted {}/{}", completed, total);
        })
        .await;
    cancel_on_ctrl_c.abort();
    let report = report?;

    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.failed() > 0 {
        warn!(failed = report.failed(), "Some conversions failed");
    }

    Ok(())
}
