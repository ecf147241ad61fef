//! CSV and JSON export of analysis results.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::Local;
use csv::{Terminator, WriterBuilder};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use visage_utils::ExportSettings;

use crate::{
    error::{Result, VisageError},
    record::AnalysisRecord,
};

const FILE_PREFIX: &str = "face_analysis";
const NO_RESULTS: &str = "No results found";
const FAILED_HEADER: &str = "Failed Files";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = VisageError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(VisageError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Per-export choices. `directory` falls back to the exporter's default.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub directory: Option<PathBuf>,
    pub file_name: Option<String>,
    pub include_failed: bool,
}

impl ExportOptions {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            directory: None,
            file_name: None,
            include_failed: true,
        }
    }

    pub fn from_settings(settings: &ExportSettings) -> Result<Self> {
        Ok(Self {
            format: settings.format.parse()?,
            directory: Some(settings.directory.clone()),
            file_name: None,
            include_failed: settings.include_failed,
        })
    }
}

/// Writes result collections to disk.
#[derive(Debug, Clone)]
pub struct Exporter {
    default_dir: PathBuf,
}

impl Exporter {
    pub fn new(default_dir: impl Into<PathBuf>) -> Self {
        Self {
            default_dir: default_dir.into(),
        }
    }

    /// Parse `format` and export with default options. Unknown formats fail before any
    /// directory or file is created.
    pub fn export_as(
        &self,
        records: &[AnalysisRecord],
        failed: &[PathBuf],
        format: &str,
    ) -> Result<PathBuf> {
        let options = ExportOptions::new(format.parse()?);
        self.export(records, failed, &options)
    }

    /// Write `records` (and `failed` when requested) and return the written path.
    pub fn export(
        &self,
        records: &[AnalysisRecord],
        failed: &[PathBuf],
        options: &ExportOptions,
    ) -> Result<PathBuf> {
        let directory = options.directory.as_deref().unwrap_or(&self.default_dir);
        fs::create_dir_all(directory).map_err(|err| VisageError::io(directory, err))?;

        let file_name = options
            .file_name
            .clone()
            .unwrap_or_else(|| default_file_name(options.format));
        let path = directory.join(file_name);

        let failed: Vec<String> = if options.include_failed {
            failed.iter().map(|p| p.display().to_string()).collect()
        } else {
            Vec::new()
        };

        match options.format {
            ExportFormat::Csv => {
                let bytes = render_csv(records, &failed)?;
                fs::write(&path, bytes).map_err(|err| VisageError::io(&path, err))?;
            }
            ExportFormat::Json => write_json(&path, records, &failed)?,
        }
        info!(
            "Exported {} record(s) and {} failure(s) to {}",
            records.len(),
            failed.len(),
            path.display()
        );
        Ok(path)
    }
}

/// `face_analysis_<YYYYMMDD-HHMMSS>.<ext>` in local time. Exports within the same second
/// share a name.
pub fn default_file_name(format: ExportFormat) -> String {
    format!(
        "{FILE_PREFIX}_{}.{}",
        Local::now().format("%Y%m%d-%H%M%S"),
        format.extension()
    )
}

/// Column identity. `rank` fixes the group order, `name` sorts classes within a group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Column {
    rank: u8,
    name: String,
}

impl Column {
    fn new(rank: u8, name: impl Into<String>) -> Self {
        Self {
            rank,
            name: name.into(),
        }
    }
}

fn flatten(record: &AnalysisRecord) -> BTreeMap<Column, String> {
    let mut cells = BTreeMap::new();
    let mut put = |rank: u8, name: String, value: String| {
        cells.insert(Column::new(rank, name), value);
    };

    if let Some(name) = &record.file_name {
        put(0, "file_name".into(), name.clone());
    }
    if let Some(path) = &record.file_path {
        put(1, "file_path".into(), path.clone());
    }
    if let Some(age) = record.age {
        put(2, "age".into(), age.to_string());
    }

    let groups = [
        (3, "gender", &record.dominant_gender, &record.gender),
        (5, "emotion", &record.dominant_emotion, &record.emotion),
        (7, "race", &record.dominant_race, &record.race),
    ];
    for (rank, group, dominant, classes) in groups {
        if let Some(label) = dominant {
            put(rank, format!("dominant_{group}"), label.clone());
        }
        for (class, confidence) in classes {
            put(rank + 1, format!("{group}_{class}"), confidence.to_string());
        }
    }

    if let Some(region) = &record.region {
        put(9, "region_x".into(), region.x.to_string());
        put(10, "region_y".into(), region.y.to_string());
        put(11, "region_w".into(), region.w.to_string());
        put(12, "region_h".into(), region.h.to_string());
        if let Some((x, y)) = region.left_eye {
            put(13, "left_eye_x".into(), x.to_string());
            put(14, "left_eye_y".into(), y.to_string());
        }
        if let Some((x, y)) = region.right_eye {
            put(15, "right_eye_x".into(), x.to_string());
            put(16, "right_eye_y".into(), y.to_string());
        }
    }
    if let Some(confidence) = record.face_confidence {
        put(17, "face_confidence".into(), confidence.to_string());
    }
    for (key, value) in &record.extra {
        let cell = match value {
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        put(18, extra_column_name(key, record), cell);
    }
    cells
}

const DERIVED_COLUMNS: [&str; 15] = [
    "file_name",
    "file_path",
    "age",
    "dominant_gender",
    "dominant_emotion",
    "dominant_race",
    "region_x",
    "region_y",
    "region_w",
    "region_h",
    "left_eye_x",
    "left_eye_y",
    "right_eye_x",
    "right_eye_y",
    "face_confidence",
];

fn is_derived_column(name: &str) -> bool {
    DERIVED_COLUMNS.contains(&name)
        || ["gender_", "emotion_", "race_"]
            .iter()
            .any(|prefix| name.starts_with(prefix))
}

/// Extra keys shaped like a derived column get an `extra_` prefix so a header never repeats.
fn extra_column_name(key: &str, record: &AnalysisRecord) -> String {
    if !is_derived_column(key) {
        return key.to_string();
    }
    let mut name = format!("extra_{key}");
    while record.extra.contains_key(&name) {
        name.insert_str(0, "extra_");
    }
    name
}

fn csv_error(err: impl fmt::Display) -> VisageError {
    VisageError::Serialization {
        format: "csv",
        message: err.to_string(),
    }
}

fn render_csv(records: &[AnalysisRecord], failed: &[String]) -> Result<Vec<u8>> {
    let builder = {
        let mut builder = WriterBuilder::new();
        builder.flexible(true).terminator(Terminator::Any(b'\n'));
        builder
    };
    let mut out = Vec::new();

    if !records.is_empty() {
        let rows: Vec<_> = records.iter().map(flatten).collect();
        let columns: BTreeSet<&Column> = rows.iter().flat_map(|row| row.keys()).collect();

        let mut writer = builder.from_writer(&mut out);
        writer
            .write_record(columns.iter().map(|c| c.name.as_str()))
            .map_err(csv_error)?;
        for row in &rows {
            writer
                .write_record(
                    columns
                        .iter()
                        .map(|c| row.get(*c).map(String::as_str).unwrap_or("")),
                )
                .map_err(csv_error)?;
        }
        writer.flush().map_err(csv_error)?;
        drop(writer);

        if !failed.is_empty() {
            out.push(b'\n');
        }
    }

    if !failed.is_empty() {
        let mut writer = builder.from_writer(&mut out);
        writer.write_record([FAILED_HEADER]).map_err(csv_error)?;
        for path in failed {
            writer.write_record([path.as_str()]).map_err(csv_error)?;
        }
        writer.flush().map_err(csv_error)?;
    } else if records.is_empty() {
        let mut writer = builder.from_writer(&mut out);
        writer.write_record([NO_RESULTS]).map_err(csv_error)?;
        writer.flush().map_err(csv_error)?;
    }
    Ok(out)
}

/// Contents of a JSON export file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonExport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<AnalysisRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl JsonExport {
    fn build(records: &[AnalysisRecord], failed: &[String]) -> Self {
        let mut export = Self {
            results: (!records.is_empty()).then(|| records.to_vec()),
            failed_files: (!failed.is_empty()).then(|| failed.to_vec()),
            message: None,
        };
        if export.results.is_none() && export.failed_files.is_none() {
            export.message = Some(NO_RESULTS.to_string());
        }
        export
    }

    pub fn records(&self) -> &[AnalysisRecord] {
        self.results.as_deref().unwrap_or_default()
    }

    pub fn failed_paths(&self) -> Vec<PathBuf> {
        self.failed_files
            .iter()
            .flatten()
            .map(PathBuf::from)
            .collect()
    }
}

fn write_json(path: &Path, records: &[AnalysisRecord], failed: &[String]) -> Result<()> {
    let export = JsonExport::build(records, failed);
    let file = File::create(path).map_err(|err| VisageError::io(path, err))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &export).map_err(|err| {
        VisageError::Serialization {
            format: "json",
            message: err.to_string(),
        }
    })?;
    writer
        .write_all(b"\n")
        .and_then(|()| writer.flush())
        .map_err(|err| VisageError::io(path, err))
}

/// Read a JSON export produced by [`Exporter`].
pub fn read_json_export(path: &Path) -> Result<JsonExport> {
    let file = File::open(path).map_err(|err| VisageError::io(path, err))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|err| VisageError::Serialization {
        format: "json",
        message: err.to_string(),
    })
}
