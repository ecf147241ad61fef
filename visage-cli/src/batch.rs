//! `batch` and `reexport` subcommands.

use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{info, warn};
use visage_core::{
    BatchOptions, BatchProcessor, BatchStatus, BatchSummary, CancellationToken, Exporter,
    ProgressSnapshot, read_json_export, sort_by_file_name,
};
use visage_utils::{AppSettings, timing_guard};

use crate::{
    args::{BatchArgs, ReexportArgs},
    config::{
        analyzer_factory, apply_batch_overrides, apply_export_overrides, export_options,
        result_filter,
    },
    report::format_summary,
};

pub fn run_batch(args: &BatchArgs, mut settings: AppSettings) -> Result<()> {
    apply_batch_overrides(&mut settings, args);
    let export = export_options(&settings, &args.export)?;
    let options = BatchOptions::try_from(&settings.batch)?;
    let processor = BatchProcessor::new(analyzer_factory(&settings)?);

    let token = CancellationToken::new();
    let handler_token = token.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        eprintln!("Cancelling after the images in progress...");
        handler_token.cancel();
    }) {
        warn!("Could not install Ctrl+C handler: {err}");
    }

    let bar = progress_bar();
    let report = |snapshot: &ProgressSnapshot| {
        bar.set_length(snapshot.total as u64);
        bar.set_position(snapshot.processed as u64);
        bar.set_message(format!(
            "{} ok, {} failed",
            snapshot.succeeded, snapshot.failed
        ));
    };

    let result = processor
        .process_folder(&args.folder, &options, &token, Some(&report))
        .with_context(|| format!("failed to analyze {}", args.folder.display()))?;
    bar.finish_and_clear();

    if result.status == BatchStatus::NoImagesFound {
        println!(
            "No supported images found in {} (jpg, jpeg, png, bmp)",
            args.folder.display()
        );
        return Ok(());
    }
    if result.is_cancelled() {
        warn!(
            "Batch cancelled; exporting {} of {} image(s)",
            result.processed(),
            result.total
        );
    }

    let filter = result_filter(&args.filter);
    let mut records = filter.apply(&result.records);
    if !filter.is_empty() {
        info!(
            "Filter kept {} of {} record(s)",
            records.len(),
            result.records.len()
        );
    }
    sort_by_file_name(&mut records);

    let mut failed = result.failed.clone();
    failed.sort();
    print!(
        "{}",
        format_summary(&BatchSummary::from_result(&records, &failed), result.status)
    );

    let exporter = Exporter::new(settings.export.directory.clone());
    let path = exporter
        .export(&records, &failed, &export)
        .context("failed to export results")?;
    println!("Exported results to {}", path.display());
    Ok(())
}

pub fn run_reexport(args: &ReexportArgs, mut settings: AppSettings) -> Result<()> {
    apply_export_overrides(&mut settings, &args.export);
    let export = export_options(&settings, &args.export)?;
    let _guard = timing_guard("visage_cli::reexport", log::Level::Debug);

    let previous = read_json_export(&args.input)
        .with_context(|| format!("failed to read export {}", args.input.display()))?;
    let filter = result_filter(&args.filter);
    let mut records = filter.apply(previous.records());
    sort_by_file_name(&mut records);
    let failed = previous.failed_paths();

    print!(
        "{}",
        format_summary(
            &BatchSummary::from_result(&records, &failed),
            BatchStatus::Completed
        )
    );
    let path = Exporter::new(settings.export.directory.clone())
        .export(&records, &failed, &export)
        .context("failed to export results")?;
    println!("Exported results to {}", path.display());
    Ok(())
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    bar.set_draw_target(ProgressDrawTarget::stderr());
    let style = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} {msg} ({elapsed})")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style.progress_chars("=> "));
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}
