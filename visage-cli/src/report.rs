//! Plain-text rendering of records and batch summaries.

use std::fmt::Write as _;

use visage_core::{Action, AnalysisRecord, BatchStatus, BatchSummary};

/// Multi-line description of one record, listing only populated attributes.
pub fn format_record(record: &AnalysisRecord) -> String {
    let mut out = String::new();
    if let Some(name) = record.file_name.as_deref() {
        let _ = writeln!(out, "File:     {name}");
    }
    if let Some(age) = record.age {
        let _ = writeln!(out, "Age:      {age:.0}");
    }
    for action in [Action::Gender, Action::Emotion, Action::Race] {
        if let Some(label) = record.dominant(action) {
            let label_name = capitalize(action.as_str());
            match record.dominant_confidence(action) {
                Some(confidence) => {
                    let _ = writeln!(out, "{label_name:<9} {label} ({confidence:.1}%)");
                }
                None => {
                    let _ = writeln!(out, "{label_name:<9} {label}");
                }
            }
        }
    }
    if let Some(region) = record.region {
        let _ = writeln!(
            out,
            "Region:   {}x{} at ({}, {})",
            region.w, region.h, region.x, region.y
        );
    }
    if let Some(confidence) = record.face_confidence {
        let _ = writeln!(out, "Face:     {:.1}%", confidence * 100.0);
    }
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => format!("{}{}:", first.to_ascii_uppercase(), chars.as_str()),
        None => String::new(),
    }
}

/// Summary block printed after a batch.
pub fn format_summary(summary: &BatchSummary, status: BatchStatus) -> String {
    let mut out = String::new();
    let state = match status {
        BatchStatus::Completed => "completed",
        BatchStatus::Cancelled => "cancelled",
        BatchStatus::NoImagesFound => "no images found",
    };
    let _ = writeln!(out, "Batch {state}");
    let _ = writeln!(
        out,
        "  Processed: {} ({} succeeded, {} failed)",
        summary.total, summary.succeeded, summary.failed
    );
    match summary.age {
        Some(age) => {
            let _ = writeln!(
                out,
                "  Age:       mean {:.1}, min {:.0}, max {:.0}",
                age.mean, age.min, age.max
            );
        }
        None => {
            let _ = writeln!(out, "  Age:       -");
        }
    }
    let _ = writeln!(
        out,
        "  Men:       {} ({:.0}%)",
        summary.men,
        summary.men_percent()
    );
    let _ = writeln!(
        out,
        "  Women:     {} ({:.0}%)",
        summary.women,
        summary.women_percent()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    #[test]
    fn record_lists_dominant_labels_with_confidence() {
        let mut record = AnalysisRecord {
            age: Some(34.4),
            dominant_emotion: Some("happy".into()),
            ..Default::default()
        }
        .with_source(Path::new("dir/eve.jpg"));
        record.emotion.insert("happy".into(), 91.25);

        let text = format_record(&record);
        assert!(text.contains("File:     eve.jpg"));
        assert!(text.contains("Age:      34"));
        assert!(text.contains("Emotion:  happy (91.2%)") || text.contains("Emotion:  happy (91.3%)"));
        assert!(!text.contains("Gender"));
    }

    #[test]
    fn summary_mentions_status_and_counts() {
        let records = vec![AnalysisRecord {
            age: Some(40.0),
            dominant_gender: Some("Man".into()),
            ..Default::default()
        }];
        let summary = BatchSummary::from_result(&records, &[PathBuf::from("x.png")]);
        let text = format_summary(&summary, BatchStatus::Cancelled);
        assert!(text.starts_with("Batch cancelled"));
        assert!(text.contains("Processed: 2 (1 succeeded, 1 failed)"));
        assert!(text.contains("Men:       1 (100%)"));
    }
}
