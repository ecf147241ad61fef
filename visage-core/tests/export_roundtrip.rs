mod common;

use std::{fs, path::PathBuf, time::Duration};

use common::{FakeFactory, write_images};
use serde_json::Value;
use tempfile::tempdir;
use visage_core::{
    BatchOptions, BatchProcessor, CancellationToken, ExportFormat, ExportOptions, Exporter,
    FaceRegion, VisageError, read_json_export,
};

#[test]
fn json_export_reads_back_paths_and_ages() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in");
    write_images(&input, &["ann.png", "bartholomew.png", "noface.png"]);

    let processor = BatchProcessor::new(FakeFactory::new(Duration::ZERO));
    let result = processor
        .process_folder(
            &input,
            &BatchOptions::default(),
            &CancellationToken::new(),
            None,
        )
        .unwrap();

    let exporter = Exporter::new(dir.path().join("out"));
    let path = exporter
        .export_as(&result.records, &result.failed, "JSON")
        .unwrap();
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("json"));
    assert!(
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("face_analysis_"))
    );

    let export = read_json_export(&path).unwrap();
    assert!(export.message.is_none());
    let mut written: Vec<(Option<String>, Option<f64>)> = result
        .records
        .iter()
        .map(|r| (r.file_path.clone(), r.age))
        .collect();
    let mut read: Vec<(Option<String>, Option<f64>)> = export
        .records()
        .iter()
        .map(|r| (r.file_path.clone(), r.age))
        .collect();
    written.sort_by(|a, b| a.0.cmp(&b.0));
    read.sort_by(|a, b| a.0.cmp(&b.0));
    assert_eq!(written, read);
    assert_eq!(export.failed_paths(), vec![input.join("noface.png")]);
}

#[test]
fn region_and_extra_attributes_survive_json() {
    let dir = tempdir().unwrap();
    let mut record = visage_core::AnalysisRecord {
        age: Some(52.0),
        region: Some(FaceRegion {
            x: 4.0,
            y: 8.0,
            w: 64.5,
            h: 72.0,
            left_eye: Some((20.0, 30.0)),
            right_eye: Some((44.0, 30.5)),
        }),
        face_confidence: Some(0.75),
        ..Default::default()
    };
    record.extra.insert("detector".into(), Value::from("retinaface"));

    let exporter = Exporter::new(dir.path());
    let mut options = ExportOptions::new(ExportFormat::Json);
    options.file_name = Some("single.json".into());
    let path = exporter.export(&[record.clone()], &[], &options).unwrap();

    let export = read_json_export(&path).unwrap();
    assert_eq!(export.records(), &[record]);
    assert!(export.failed_files.is_none());
}

#[test]
fn empty_exports_write_the_no_results_message() {
    let dir = tempdir().unwrap();
    let exporter = Exporter::new(dir.path());

    let mut csv = ExportOptions::new(ExportFormat::Csv);
    csv.file_name = Some("empty.csv".into());
    let path = exporter.export(&[], &[], &csv).unwrap();
    assert_eq!(fs::read_to_string(path).unwrap(), "No results found\n");

    let mut json = ExportOptions::new(ExportFormat::Json);
    json.file_name = Some("empty.json".into());
    let path = exporter.export(&[], &[], &json).unwrap();
    let value: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(value, serde_json::json!({ "message": "No results found" }));
}

#[test]
fn failures_only_export_lists_paths() {
    let dir = tempdir().unwrap();
    let exporter = Exporter::new(dir.path());
    let failed = vec![PathBuf::from("a/missing.jpg"), PathBuf::from("b/blurry.png")];

    let mut csv = ExportOptions::new(ExportFormat::Csv);
    csv.file_name = Some("failed.csv".into());
    let path = exporter.export(&[], &failed, &csv).unwrap();
    assert_eq!(
        fs::read_to_string(path).unwrap(),
        "Failed Files\na/missing.jpg\nb/blurry.png\n"
    );

    let mut json = ExportOptions::new(ExportFormat::Json);
    json.file_name = Some("failed.json".into());
    let path = exporter.export(&[], &failed, &json).unwrap();
    let export = read_json_export(&path).unwrap();
    assert!(export.results.is_none());
    assert_eq!(export.failed_paths(), failed);
}

#[test]
fn unsupported_format_is_rejected_before_writing() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("never");
    let exporter = Exporter::new(&target);
    let err = exporter.export_as(&[], &[], "parquet").unwrap_err();
    assert!(matches!(err, VisageError::UnsupportedFormat(ref f) if f == "parquet"));
    assert!(!target.exists());
}
