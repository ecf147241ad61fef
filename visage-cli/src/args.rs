//! Command-line argument definitions for the `visage` binary.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

/// Face-attribute analysis over images, folders and cameras.
#[derive(Debug, Parser)]
#[command(name = "visage", author, version, about)]
pub struct Cli {
    /// Optional settings JSON. Defaults to `config/visage_settings.json` when present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// External analysis program (overrides `analyzer.program`).
    #[arg(long, global = true, value_name = "PROGRAM")]
    pub analyzer: Option<String>,

    /// Extra argument passed to the analysis program; repeatable.
    #[arg(
        long = "analyzer-arg",
        global = true,
        value_name = "ARG",
        allow_hyphen_values = true
    )]
    pub analyzer_args: Vec<String>,

    /// Enable telemetry timing logs (defaults to settings file).
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    pub telemetry: bool,

    /// Override telemetry logging level (error, warn, info, debug, trace).
    #[arg(long, global = true, value_name = "LEVEL")]
    pub telemetry_level: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Analyze a single image and print the first face found.
    Analyze(AnalyzeArgs),
    /// Analyze every image in a folder and export the results.
    Batch(BatchArgs),
    /// Filter and re-export a previous JSON export.
    Reexport(ReexportArgs),
    /// List camera devices that can be opened.
    Cameras(CamerasArgs),
    /// Grab one frame from a camera, optionally saving and analyzing it.
    Snapshot(SnapshotArgs),
    /// Write the effective settings to a JSON file.
    InitConfig(InitConfigArgs),
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Image to analyze.
    pub image: PathBuf,

    /// Comma-separated actions (age, gender, emotion, race).
    #[arg(long, value_name = "LIST")]
    pub actions: Option<String>,

    /// Print the record as JSON instead of a table.
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct BatchArgs {
    /// Folder containing images.
    pub folder: PathBuf,

    /// Include images in sub-folders.
    #[arg(short, long, action = ArgAction::SetTrue)]
    pub recursive: bool,

    /// Number of concurrent analysis workers.
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Comma-separated actions (age, gender, emotion, race).
    #[arg(long, value_name = "LIST")]
    pub actions: Option<String>,

    #[command(flatten)]
    pub export: ExportArgs,

    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Debug, Args)]
pub struct ReexportArgs {
    /// JSON export written by an earlier run.
    pub input: PathBuf,

    #[command(flatten)]
    pub export: ExportArgs,

    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    /// Export format (csv or json).
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Directory receiving the export file.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Export file name (defaults to a timestamped name).
    #[arg(long, value_name = "NAME")]
    pub file_name: Option<String>,

    /// Leave the list of failed files out of the export.
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_failed: bool,
}

#[derive(Debug, Args)]
pub struct FilterArgs {
    /// Keep records with age at or above this value.
    #[arg(long)]
    pub min_age: Option<f64>,

    /// Keep records with age at or below this value.
    #[arg(long)]
    pub max_age: Option<f64>,

    /// Keep records whose dominant gender matches (e.g. Man, Woman).
    #[arg(long)]
    pub gender: Option<String>,

    /// Keep records whose dominant emotion matches (e.g. happy).
    #[arg(long)]
    pub emotion: Option<String>,
}

#[derive(Debug, Args)]
pub struct CamerasArgs {
    /// Highest device index to probe (exclusive).
    #[arg(long)]
    pub max: Option<u32>,
}

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    /// Camera device index.
    #[arg(long)]
    pub device: Option<u32>,

    /// Requested capture width.
    #[arg(long)]
    pub width: Option<u32>,

    /// Requested capture height.
    #[arg(long)]
    pub height: Option<u32>,

    /// Time to let the camera settle before grabbing the frame.
    #[arg(long, default_value_t = 500, value_name = "MS")]
    pub warmup_ms: u64,

    /// Save the captured frame to this path.
    #[arg(long, value_name = "PATH")]
    pub save: Option<PathBuf>,

    /// Run the analyzer on the captured frame.
    #[arg(long, action = ArgAction::SetTrue)]
    pub analyze: bool,

    /// Comma-separated actions used with `--analyze`.
    #[arg(long, value_name = "LIST", requires = "analyze")]
    pub actions: Option<String>,
}

#[derive(Debug, Args)]
pub struct InitConfigArgs {
    /// Destination (defaults to `config/visage_settings.json`).
    pub path: Option<PathBuf>,

    /// Overwrite an existing file.
    #[arg(long, action = ArgAction::SetTrue)]
    pub force: bool,
}
