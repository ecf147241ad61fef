/// Shared fixtures for the visage-core integration suites.
use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use anyhow::{Result, bail};
use image::{ImageBuffer, Rgb};
use visage_core::{ActionSet, AnalysisRecord, AnalyzerFactory, FaceAnalyzer, ImageInput};

/// Counters shared between a [`FakeFactory`] and every analyzer it builds.
#[derive(Debug, Default)]
pub struct Stats {
    pub created: AtomicUsize,
    pub calls: AtomicUsize,
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
}

/// Decides the outcome from the file stem: `noface*` finds nothing, `broken*` errors,
/// `panic*` panics, anything else yields one face aged by the stem length.
pub struct FakeAnalyzer {
    stats: Arc<Stats>,
    delay: Duration,
}

impl FaceAnalyzer for FakeAnalyzer {
    fn name(&self) -> &str {
        "fake"
    }

    fn analyze(&mut self, input: &ImageInput<'_>, actions: &ActionSet) -> Result<Vec<AnalysisRecord>> {
        self.stats.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.stats.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.stats.active.fetch_sub(1, Ordering::SeqCst);

        let ImageInput::Path(path) = input else {
            return Ok(vec![face(30.0, actions)]);
        };
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if stem.starts_with("noface") {
            Ok(Vec::new())
        } else if stem.starts_with("broken") {
            bail!("unreadable image {}", path.display())
        } else if stem.starts_with("panic") {
            panic!("analyzer crashed on {}", path.display())
        } else {
            Ok(vec![face(20.0 + stem.len() as f64, actions)])
        }
    }
}

fn face(age: f64, actions: &ActionSet) -> AnalysisRecord {
    let mut record = AnalysisRecord::default();
    if actions.contains(visage_core::Action::Age) {
        record.age = Some(age);
    }
    if actions.contains(visage_core::Action::Gender) {
        record.dominant_gender = Some("Woman".into());
        record.gender.insert("Man".into(), 12.5);
        record.gender.insert("Woman".into(), 87.5);
    }
    if actions.contains(visage_core::Action::Emotion) {
        record.dominant_emotion = Some("happy".into());
    }
    record
}

pub struct FakeFactory {
    pub stats: Arc<Stats>,
    pub delay: Duration,
}

impl FakeFactory {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            stats: Arc::new(Stats::default()),
            delay,
        })
    }

    pub fn created(&self) -> usize {
        self.stats.created.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.stats.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.stats.peak.load(Ordering::SeqCst)
    }
}

impl AnalyzerFactory for FakeFactory {
    fn create(&self) -> Result<Box<dyn FaceAnalyzer>> {
        self.stats.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeAnalyzer {
            stats: Arc::clone(&self.stats),
            delay: self.delay,
        }))
    }
}

/// Writes a small PNG for each name into `dir`.
pub fn write_images(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    fs::create_dir_all(dir).unwrap();
    names
        .iter()
        .map(|name| {
            let path = dir.join(name);
            let img = ImageBuffer::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 90u8]));
            img.save(&path).unwrap();
            path
        })
        .collect()
}
