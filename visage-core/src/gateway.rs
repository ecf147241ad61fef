//! Call boundary to the external face-analysis capability.
//!
//! A [`FaceAnalyzer`] is one inference context. Contexts are built by an
//! [`AnalyzerFactory`], which is the explicit owner of whatever model state the backend
//! keeps, and are never shared between threads.

use std::path::Path;

use anyhow::Result;
use image::DynamicImage;
use log::{debug, warn};
use visage_utils::timing_guard;

use crate::{
    error::VisageError,
    record::{ActionSet, AnalysisRecord},
};

/// Image handed to an analyzer.
#[derive(Debug, Clone, Copy)]
pub enum ImageInput<'a> {
    Path(&'a Path),
    Frame(&'a DynamicImage),
}

impl ImageInput<'_> {
    /// Short description for log lines.
    pub fn describe(&self) -> String {
        match self {
            ImageInput::Path(path) => path.display().to_string(),
            ImageInput::Frame(image) => format!("{}x{} frame", image.width(), image.height()),
        }
    }
}

/// One inference context.
pub trait FaceAnalyzer {
    /// Backend identifier used in logs.
    fn name(&self) -> &str;

    /// Returns one record per detected face; an empty vector means no face was found.
    fn analyze(
        &mut self,
        input: &ImageInput<'_>,
        actions: &ActionSet,
    ) -> Result<Vec<AnalysisRecord>>;
}

/// Builds fresh inference contexts.
pub trait AnalyzerFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn FaceAnalyzer>>;
}

impl<F> AnalyzerFactory for F
where
    F: Fn() -> Result<Box<dyn FaceAnalyzer>> + Send + Sync,
{
    fn create(&self) -> Result<Box<dyn FaceAnalyzer>> {
        self()
    }
}

/// Wraps a context and turns every analysis failure into "no result".
pub struct InferenceGateway {
    analyzer: Box<dyn FaceAnalyzer>,
}

impl InferenceGateway {
    pub fn new(analyzer: Box<dyn FaceAnalyzer>) -> Self {
        Self { analyzer }
    }

    /// Builds a gateway around a fresh context from `factory`.
    pub fn from_factory(factory: &dyn AnalyzerFactory) -> Result<Self, VisageError> {
        factory
            .create()
            .map(Self::new)
            .map_err(|err| VisageError::Inference(format!("{err:#}")))
    }

    /// First detected face, or a [`VisageError::NoFaceDetected`] /
    /// [`VisageError::Inference`] describing why there is none.
    pub fn try_analyze(
        &mut self,
        input: &ImageInput<'_>,
        actions: &ActionSet,
    ) -> Result<AnalysisRecord, VisageError> {
        let _guard = timing_guard(
            format!("{}::analyze", self.analyzer.name()),
            log::Level::Debug,
        );
        let faces = self
            .analyzer
            .analyze(input, actions)
            .map_err(|err| VisageError::Inference(format!("{err:#}")))?;
        faces.into_iter().next().ok_or(VisageError::NoFaceDetected)
    }

    /// First detected face or `None`; failures are logged, never propagated.
    pub fn analyze(&mut self, input: &ImageInput<'_>, actions: &ActionSet) -> Option<AnalysisRecord> {
        match self.try_analyze(input, actions) {
            Ok(record) => Some(record),
            Err(VisageError::NoFaceDetected) => {
                debug!("No face detected in {}", input.describe());
                None
            }
            Err(err) => {
                warn!(
                    "{} failed on {}: {}",
                    self.analyzer.name(),
                    input.describe(),
                    err
                );
                None
            }
        }
    }
}
