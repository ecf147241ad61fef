//! Core face-attribute analysis primitives.
//!
//! This crate drives an external face-analysis capability over single images, folders and a
//! live camera feed, and turns the results into filtered summaries and CSV/JSON exports.

/// Folder discovery and the bounded batch worker pool.
pub mod batch;
/// Background camera capture loop.
pub mod capture;
/// Analyzer backend that shells out to an external program.
pub mod command;
pub mod error;
/// CSV and JSON exporters.
pub mod export;
/// Inference boundary: analyzer traits and the failure-absorbing gateway.
pub mod gateway;
/// Actions and per-face records.
pub mod record;
/// Result filtering and summary statistics.
pub mod review;

pub use batch::{
    BatchOptions, BatchProcessor, BatchResult, BatchStatus, CancellationToken, ProgressSnapshot,
    discover_images,
};
#[cfg(feature = "webcam")]
pub use capture::NokhwaBackend;
pub use capture::{
    CameraBackend, CameraInfo, CaptureConfig, CaptureLoop, CapturedFrame, FrameGrabber,
    LatestValue, available_cameras,
};
pub use command::{CommandAnalyzer, CommandAnalyzerFactory, parse_faces};
pub use error::{Result, VisageError};
pub use export::{
    ExportFormat, ExportOptions, Exporter, JsonExport, default_file_name, read_json_export,
};
pub use gateway::{AnalyzerFactory, FaceAnalyzer, ImageInput, InferenceGateway};
pub use record::{Action, ActionSet, AnalysisRecord, FaceRegion};
pub use review::{AgeStats, BatchSummary, ResultFilter, sort_by_file_name};

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
