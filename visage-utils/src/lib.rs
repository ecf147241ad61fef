//! Common helpers shared across Visage crates.

/// Application configuration and settings management.
pub mod config;
/// Image file detection and loading helpers.
pub mod image_utils;
/// Instrumentation helpers for optional performance tracing.
pub mod telemetry;
/// Webcam access through `nokhwa`.
#[cfg(feature = "webcam")]
pub mod webcam;

use std::path::Path;

use anyhow::Result;
use log::LevelFilter;

pub use config::{
    AnalyzerSettings, AppSettings, BatchSettings, CameraSettings, ExportSettings,
    TelemetrySettings, default_settings_path,
};
pub use image_utils::{SUPPORTED_EXTENSIONS, is_supported_image, load_image};
pub use telemetry::{
    TimingGuard, configure as configure_telemetry, telemetry_allows, telemetry_enabled,
    telemetry_level, timing_guard, timing_guard_if,
};
#[cfg(feature = "webcam")]
pub use webcam::{WebcamCapture, list_webcam_devices};

/// Initialize logging once for CLI and embedding front ends.
///
/// This function respects the `RUST_LOG` environment variable if it is set.
/// Otherwise, it falls back to the provided default filter level.
///
/// # Arguments
///
/// * `default_filter` - The `LevelFilter` to use if `RUST_LOG` is not set.
pub fn init_logging(default_filter: LevelFilter) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    builder.filter_module("visage::telemetry", LevelFilter::Trace);

    if builder.try_init().is_err() {
        // Logger already initialized; nothing to do.
    }
    Ok(())
}

/// Validate that a path exists and resolve it to an absolute path.
///
/// # Arguments
///
/// * `path` - The path to validate and normalize.
pub fn normalize_path<P: AsRef<Path>>(path: P) -> Result<std::path::PathBuf> {
    let path = path.as_ref();
    anyhow::ensure!(path.exists(), "path does not exist: {}", path.display());
    Ok(path.canonicalize()?)
}
