//! Folder analysis on a bounded worker pool.
//!
//! Every discovered image becomes one task on a dedicated rayon pool. Tasks build their own
//! inference context, so no analyzer state is shared between workers. Completions flow back
//! over a channel to the calling thread, which aggregates them, publishes progress and
//! watches the cancellation token between completions.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc,
    },
};

use image::DynamicImage;
use log::{debug, info, warn};
use visage_utils::{BatchSettings, is_supported_image, timing_guard};
use walkdir::WalkDir;

use crate::{
    error::{Result, VisageError},
    gateway::{AnalyzerFactory, ImageInput, InferenceGateway},
    record::{ActionSet, AnalysisRecord},
};

/// Set-once flag shared between the requester and a running batch.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. There is no way to reset a token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Point-in-time progress of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub processed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl ProgressSnapshot {
    /// Completed fraction in `0.0..=1.0`.
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f32 / self.total as f32
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Every discovered image was processed.
    Completed,
    /// The token was set; results cover only what finished before that.
    Cancelled,
    /// The folder holds no supported images.
    NoImagesFound,
}

/// Outcome of a folder run. Records are in completion order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub records: Vec<AnalysisRecord>,
    pub failed: Vec<PathBuf>,
    /// Number of images discovered.
    pub total: usize,
    pub status: BatchStatus,
}

impl BatchResult {
    fn empty(status: BatchStatus) -> Self {
        Self {
            records: Vec::new(),
            failed: Vec::new(),
            total: 0,
            status,
        }
    }

    pub fn succeeded(&self) -> usize {
        self.records.len()
    }

    pub fn processed(&self) -> usize {
        self.records.len() + self.failed.len()
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == BatchStatus::Cancelled
    }

    pub fn progress(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            processed: self.processed(),
            total: self.total,
            succeeded: self.records.len(),
            failed: self.failed.len(),
        }
    }
}

/// Parameters for [`BatchProcessor::process_folder`].
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub actions: ActionSet,
    pub recursive: bool,
    /// Worker bound. Chosen to cap peak memory, values below one are treated as one.
    pub workers: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            actions: ActionSet::all(),
            recursive: false,
            workers: 2,
        }
    }
}

impl TryFrom<&BatchSettings> for BatchOptions {
    type Error = VisageError;

    fn try_from(settings: &BatchSettings) -> Result<Self> {
        Ok(Self {
            actions: ActionSet::parse(&settings.actions)?,
            recursive: settings.recursive,
            workers: settings.workers,
        })
    }
}

enum TaskOutcome {
    Analyzed(AnalysisRecord),
    Failed(PathBuf),
    Skipped,
}

/// Runs analysis over single images and whole folders.
#[derive(Clone)]
pub struct BatchProcessor {
    factory: Arc<dyn AnalyzerFactory>,
}

impl BatchProcessor {
    pub fn new(factory: Arc<dyn AnalyzerFactory>) -> Self {
        Self { factory }
    }

    /// Analyze one image file on the calling thread.
    pub fn analyze_file(&self, path: &Path, actions: &ActionSet) -> Option<AnalysisRecord> {
        let mut gateway = self.gateway()?;
        gateway
            .analyze(&ImageInput::Path(path), actions)
            .map(|record| record.with_source(path))
    }

    /// Analyze an in-memory image (e.g. a frozen camera frame) on the calling thread.
    pub fn analyze_image(&self, image: &DynamicImage, actions: &ActionSet) -> Option<AnalysisRecord> {
        self.gateway()?.analyze(&ImageInput::Frame(image), actions)
    }

    fn gateway(&self) -> Option<InferenceGateway> {
        InferenceGateway::from_factory(self.factory.as_ref())
            .inspect_err(|err| warn!("Could not create analyzer: {err}"))
            .ok()
    }

    /// Analyze every supported image under `folder`.
    ///
    /// Fails with [`VisageError::InvalidInput`] before doing any work when the folder is
    /// missing or the action set is empty. Per-image failures only land in
    /// [`BatchResult::failed`]. `progress` runs on the calling thread.
    pub fn process_folder(
        &self,
        folder: &Path,
        options: &BatchOptions,
        cancel: &CancellationToken,
        progress: Option<&dyn Fn(&ProgressSnapshot)>,
    ) -> Result<BatchResult> {
        if !folder.is_dir() {
            return Err(VisageError::InvalidInput(format!(
                "not an existing folder: {}",
                folder.display()
            )));
        }
        if options.actions.is_empty() {
            return Err(VisageError::InvalidInput(
                "at least one action must be requested".to_string(),
            ));
        }

        let files = discover_images(folder, options.recursive);
        let total = files.len();
        if total == 0 {
            info!("No supported images found in {}", folder.display());
            return Ok(BatchResult::empty(BatchStatus::NoImagesFound));
        }

        let workers = options.workers.clamp(1, total);
        info!(
            "Analyzing {} image(s) from {} with {} worker(s) [{}]",
            total,
            folder.display(),
            workers,
            options.actions
        );
        let mut timing = timing_guard("visage_core::process_folder", log::Level::Info);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|idx| format!("visage-batch-{idx}"))
            .build()
            .map_err(|err| VisageError::WorkerPool(err.to_string()))?;

        let (tx, rx) = mpsc::channel::<TaskOutcome>();
        for path in files {
            let tx = tx.clone();
            let factory = Arc::clone(&self.factory);
            let actions = options.actions.clone();
            let cancel = cancel.clone();
            pool.spawn(move || {
                let outcome = if cancel.is_cancelled() {
                    TaskOutcome::Skipped
                } else {
                    run_task(factory.as_ref(), path, &actions)
                };
                // The receiver is gone once the batch was cancelled.
                let _ = tx.send(outcome);
            });
        }
        drop(tx);

        let mut result = BatchResult {
            records: Vec::with_capacity(total),
            failed: Vec::new(),
            total,
            status: BatchStatus::Completed,
        };
        if let Some(report) = progress {
            report(&result.progress());
        }

        for outcome in rx.iter() {
            if cancel.is_cancelled() {
                result.status = BatchStatus::Cancelled;
                break;
            }
            match outcome {
                TaskOutcome::Analyzed(record) => result.records.push(record),
                TaskOutcome::Failed(path) => result.failed.push(path),
                TaskOutcome::Skipped => {
                    result.status = BatchStatus::Cancelled;
                    break;
                }
            }
            if let Some(report) = progress {
                report(&result.progress());
            }
        }

        if result.is_cancelled() {
            info!(
                "Batch cancelled after {} of {} image(s)",
                result.processed(),
                total
            );
        } else {
            info!(
                "Batch finished: {} succeeded, {} failed",
                result.succeeded(),
                result.failed.len()
            );
        }
        timing.set_items(result.processed());
        Ok(result)
    }
}

fn run_task(factory: &dyn AnalyzerFactory, path: PathBuf, actions: &ActionSet) -> TaskOutcome {
    let attempt = catch_unwind(AssertUnwindSafe(|| {
        let mut gateway = match InferenceGateway::from_factory(factory) {
            Ok(gateway) => gateway,
            Err(err) => {
                warn!("Could not create analyzer for {}: {err}", path.display());
                return None;
            }
        };
        gateway.analyze(&ImageInput::Path(&path), actions)
    }));

    match attempt {
        Ok(Some(record)) => TaskOutcome::Analyzed(record.with_source(&path)),
        Ok(None) => TaskOutcome::Failed(path),
        Err(_) => {
            warn!("Analyzer panicked on {}", path.display());
            TaskOutcome::Failed(path)
        }
    }
}

/// Collect supported images directly under `folder`, or anywhere below it when `recursive`.
///
/// Symlinked files count when their target is a file; symlinked directories are not
/// descended into. Unreadable entries are skipped.
pub fn discover_images(folder: &Path, recursive: bool) -> Vec<PathBuf> {
    let mut walker = WalkDir::new(folder).min_depth(1).follow_links(false);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut images = Vec::new();
    for entry in walker
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file())
        })
    {
        if is_supported_image(entry.path()) {
            images.push(entry.into_path());
        } else {
            debug!("Skipping non-image file {}", entry.path().display());
        }
    }
    images.sort();
    images
}
