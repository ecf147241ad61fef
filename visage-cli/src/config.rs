//! Configuration loading and CLI override logic.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, anyhow};
use log::{LevelFilter, info};
use visage_core::{
    ActionSet, AnalyzerFactory, CommandAnalyzerFactory, ExportOptions, ResultFilter,
};
use visage_utils::{AppSettings, default_settings_path, normalize_path};

use crate::args::{BatchArgs, Cli, ExportArgs, FilterArgs};

/// Load application settings from a file or use defaults.
pub fn load_settings(config_path: Option<&PathBuf>) -> Result<AppSettings> {
    if let Some(path) = config_path {
        let resolved = normalize_path(path)?;
        let settings = AppSettings::load_from_path(&resolved)?;
        info!("Loaded settings from {}", resolved.display());
        Ok(settings)
    } else {
        let default_path = default_settings_path();
        if default_path.exists() {
            let settings = AppSettings::load_from_path(&default_path).with_context(|| {
                format!(
                    "failed to load default settings from {}",
                    default_path.display()
                )
            })?;
            info!("Loaded settings from {}", default_path.display());
            Ok(settings)
        } else {
            Ok(AppSettings::default())
        }
    }
}

/// Map `-v` occurrences to the default log filter.
pub fn verbosity_filter(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Apply flags shared by every subcommand.
pub fn apply_global_overrides(settings: &mut AppSettings, cli: &Cli) {
    if let Some(program) = cli.analyzer.as_ref() {
        settings.analyzer.program = Some(program.clone());
    }
    if !cli.analyzer_args.is_empty() {
        settings.analyzer.args = cli.analyzer_args.clone();
    }

    if cli.telemetry {
        settings.telemetry.enabled = true;
    }
    if let Some(level) = cli.telemetry_level.as_ref() {
        let normalized = level.trim();
        if !normalized.is_empty() {
            let lower = normalized.to_ascii_lowercase();
            settings.telemetry.level = lower.clone();
            if lower == "off" {
                settings.telemetry.enabled = false;
            }
        }
    }
}

pub fn apply_batch_overrides(settings: &mut AppSettings, args: &BatchArgs) {
    if args.recursive {
        settings.batch.recursive = true;
    }
    if let Some(workers) = args.workers {
        settings.batch.workers = workers;
    }
    if let Some(actions) = args.actions.as_ref() {
        settings.batch.actions = split_actions(actions);
    }
    apply_export_overrides(settings, &args.export);
    settings.sanitize();
}

pub fn apply_export_overrides(settings: &mut AppSettings, args: &ExportArgs) {
    if let Some(format) = args.format.as_ref() {
        settings.export.format = format.clone();
    }
    if let Some(dir) = args.output_dir.as_ref() {
        settings.export.directory = dir.clone();
    }
    if args.no_failed {
        settings.export.include_failed = false;
    }
}

/// Validated export options; an unknown format fails here, before any work starts.
pub fn export_options(settings: &AppSettings, args: &ExportArgs) -> Result<ExportOptions> {
    let mut options = ExportOptions::from_settings(&settings.export)?;
    options.file_name = args.file_name.clone();
    Ok(options)
}

pub fn result_filter(args: &FilterArgs) -> ResultFilter {
    ResultFilter {
        min_age: args.min_age,
        max_age: args.max_age,
        gender: args.gender.clone(),
        emotion: args.emotion.clone(),
    }
}

/// Actions from an explicit `--actions` list, falling back to the batch defaults.
pub fn resolve_actions(settings: &AppSettings, list: Option<&String>) -> Result<ActionSet> {
    let actions = match list {
        Some(list) => list.parse::<ActionSet>()?,
        None => ActionSet::parse(&settings.batch.actions)?,
    };
    if actions.is_empty() {
        return Err(anyhow!("at least one action is required"));
    }
    Ok(actions)
}

fn split_actions(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Build the analyzer factory from settings.
pub fn analyzer_factory(settings: &AppSettings) -> Result<Arc<dyn AnalyzerFactory>> {
    let factory = CommandAnalyzerFactory::from_settings(&settings.analyzer).ok_or_else(|| {
        anyhow!("no analyzer configured; pass --analyzer or set analyzer.program in the settings")
    })?;
    info!("Using analyzer program {}", factory.program().display());
    Ok(Arc::new(factory))
}
