mod args;
mod batch;
mod config;
mod report;
mod webcam;

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{debug, info};
use visage_core::BatchProcessor;
use visage_utils::{
    AppSettings, configure_telemetry, default_settings_path, init_logging, is_supported_image,
    load_image,
};

use crate::{
    args::{AnalyzeArgs, Cli, Command, InitConfigArgs},
    config::{
        analyzer_factory, apply_global_overrides, load_settings, resolve_actions,
        verbosity_filter,
    },
    report::format_record,
};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(verbosity_filter(cli.verbose))?;

    let mut settings = load_settings(cli.config.as_ref())?;
    apply_global_overrides(&mut settings, &cli);
    configure_telemetry(
        settings.telemetry.enabled,
        settings.telemetry.level_filter(),
    );
    debug!("visage-core {}", visage_core::version());

    match &cli.command {
        Command::Analyze(args) => run_analyze(args, &settings),
        Command::Batch(args) => batch::run_batch(args, settings),
        Command::Reexport(args) => batch::run_reexport(args, settings),
        Command::Cameras(args) => webcam::run_cameras(args, &settings),
        Command::Snapshot(args) => webcam::run_snapshot(args, &settings),
        Command::InitConfig(args) => run_init_config(args, &settings),
    }
}

fn run_analyze(args: &AnalyzeArgs, settings: &AppSettings) -> Result<()> {
    if !is_supported_image(&args.image) {
        bail!(
            "{} is not a supported image (jpg, jpeg, png, bmp)",
            args.image.display()
        );
    }
    let image = load_image(&args.image)?;
    info!(
        "Analyzing {} ({}x{})",
        args.image.display(),
        image.width(),
        image.height()
    );

    let actions = resolve_actions(settings, args.actions.as_ref())?;
    let processor = BatchProcessor::new(analyzer_factory(settings)?);
    let Some(record) = processor.analyze_file(&args.image, &actions) else {
        bail!("no face detected in {}", args.image.display());
    };

    if args.json {
        let json = serde_json::to_string_pretty(&record).context("failed to serialize record")?;
        println!("{json}");
    } else {
        print!("{}", format_record(&record));
    }
    Ok(())
}

fn run_init_config(args: &InitConfigArgs, settings: &AppSettings) -> Result<()> {
    let path = args.path.clone().unwrap_or_else(default_settings_path);
    if path.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }
    settings.save_to_path(&path)?;
    println!("Wrote settings to {}", path.display());
    Ok(())
}
