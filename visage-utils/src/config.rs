//! Shared configuration types consumed across the Visage workspace.
//!
//! Settings are persisted as JSON and every section uses `#[serde(default)]`, so partial
//! files written by older versions (or by hand) still load.

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// How to reach the external face-analysis program.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct AnalyzerSettings {
    /// Executable invoked once per analyzed image.
    pub program: Option<String>,
    /// Extra arguments placed before `--actions`/`--image`.
    pub args: Vec<String>,
}

/// Defaults for folder analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BatchSettings {
    /// Number of concurrent analysis workers. Inference is memory-heavy, keep this small.
    pub workers: usize,
    /// Descend into sub-folders when collecting images.
    pub recursive: bool,
    /// Attribute actions requested from the analyzer.
    pub actions: Vec<String>,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            workers: 2,
            recursive: false,
            actions: ["age", "gender", "emotion", "race"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Camera capture parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CameraSettings {
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
    /// Pause between frame reads in milliseconds (~30 fps by default).
    pub frame_interval_ms: u64,
    /// How long `stop` waits for the capture thread before detaching it.
    pub stop_timeout_ms: u64,
    /// Upper bound for device index probing.
    pub max_probe: u32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: 640,
            height: 480,
            frame_interval_ms: 33,
            stop_timeout_ms: 1_000,
            max_probe: 10,
        }
    }
}

/// Export destination and format defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExportSettings {
    pub directory: PathBuf,
    /// `csv` or `json`.
    pub format: String,
    /// Append the list of files that produced no result.
    pub include_failed: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("exports"),
            format: "csv".to_string(),
            include_failed: true,
        }
    }
}

/// Settings controlling optional runtime telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Whether telemetry timing logs are enabled.
    pub enabled: bool,
    /// Logging level for telemetry output (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".to_string(),
        }
    }
}

impl TelemetrySettings {
    /// Resolve the configured level string into a `LevelFilter`.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Debug,
        }
    }
}

/// Persistent application settings consumed by the CLI and embedding front ends.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppSettings {
    pub analyzer: AnalyzerSettings,
    pub batch: BatchSettings,
    pub camera: CameraSettings,
    pub export: ExportSettings,
    pub telemetry: TelemetrySettings,
}

impl AppSettings {
    /// Load settings from a JSON file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let mut settings: AppSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;
        settings.sanitize();
        Ok(settings)
    }

    /// Serialize settings to disk in pretty-printed JSON, overwriting any existing file.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }

    /// Clamp values that would make the workers or capture loop misbehave.
    pub fn sanitize(&mut self) {
        self.batch.workers = self.batch.workers.max(1);
        self.camera.frame_interval_ms = self.camera.frame_interval_ms.max(1);
        if self.camera.max_probe == 0 {
            self.camera.max_probe = CameraSettings::default().max_probe;
        }
    }
}

/// Returns the default path for persisted settings (`config/visage_settings.json`).
pub fn default_settings_path() -> PathBuf {
    env::current_dir()
        .map(|dir| dir.join("config/visage_settings.json"))
        .unwrap_or_else(|_| PathBuf::from("config/visage_settings.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, tempdir};

    #[test]
    fn default_settings_round_trip() {
        let file = NamedTempFile::new().expect("tempfile");
        let settings = AppSettings::default();
        settings.save_to_path(file.path()).expect("save");

        let loaded = AppSettings::load_from_path(file.path()).expect("load");
        assert_eq!(loaded.analyzer, settings.analyzer);
        assert_eq!(loaded.batch, settings.batch);
        assert_eq!(loaded.camera, settings.camera);
        assert_eq!(loaded.export, settings.export);
        assert_eq!(loaded.telemetry.level, settings.telemetry.level);
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let file = NamedTempFile::new().expect("tempfile");
        let json = r#"{
            "analyzer": { "program": "/opt/bin/face-attrs" },
            "batch": { "workers": 0, "recursive": true }
        }"#;
        fs::write(file.path(), json).expect("write custom settings");

        let loaded = AppSettings::load_from_path(file.path()).expect("load");
        assert_eq!(loaded.analyzer.program.as_deref(), Some("/opt/bin/face-attrs"));
        assert!(loaded.analyzer.args.is_empty());
        assert_eq!(loaded.batch.workers, 1, "zero workers is clamped");
        assert!(loaded.batch.recursive);
        assert_eq!(loaded.batch.actions.len(), 4);
        assert_eq!(loaded.camera.frame_interval_ms, 33);
        assert_eq!(loaded.export.format, "csv");
        assert!(!loaded.telemetry.enabled);
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested/config/settings.json");
        AppSettings::default().save_to_path(&path).expect("save");
        assert!(path.exists());
    }

    #[test]
    fn telemetry_level_parses_variants() {
        let telemetry = TelemetrySettings {
            level: "TRACE".into(),
            ..TelemetrySettings::default()
        };
        assert_eq!(telemetry.level_filter(), LevelFilter::Trace);

        let telemetry = TelemetrySettings {
            level: "warning".into(),
            ..TelemetrySettings::default()
        };
        assert_eq!(telemetry.level_filter(), LevelFilter::Warn);

        let telemetry = TelemetrySettings {
            level: "bogus".into(),
            ..TelemetrySettings::default()
        };
        assert_eq!(telemetry.level_filter(), LevelFilter::Debug);
    }
}
