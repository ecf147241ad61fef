//! Analyzer backend that shells out to an external analysis program.
//!
//! The program is invoked as `<program> <args...> --actions <list> --image <path>` and must
//! print a JSON array of face objects (or a single object) on stdout. In-memory frames are
//! written to a temporary PNG first.

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{Context, Result, bail};
use image::ImageFormat;
use log::{debug, trace};
use serde_json::Value;
use visage_utils::AnalyzerSettings;

use crate::{
    gateway::{AnalyzerFactory, FaceAnalyzer, ImageInput},
    record::{ActionSet, AnalysisRecord},
};

/// Inference context backed by one external program invocation per image.
#[derive(Debug, Clone)]
pub struct CommandAnalyzer {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandAnalyzer {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn run(&self, image_path: &Path, actions: &ActionSet) -> Result<Vec<AnalysisRecord>> {
        debug!(
            "Running {} on {} ({})",
            self.program.display(),
            image_path.display(),
            actions
        );
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("--actions")
            .arg(actions.to_arg_string())
            .arg("--image")
            .arg(image_path)
            .output()
            .with_context(|| format!("failed to launch {}", self.program.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                stderr.trim()
            );
        }
        trace!("analyzer stdout: {}", String::from_utf8_lossy(&output.stdout));
        parse_faces(&output.stdout)
    }
}

impl FaceAnalyzer for CommandAnalyzer {
    fn name(&self) -> &str {
        "command"
    }

    fn analyze(
        &mut self,
        input: &ImageInput<'_>,
        actions: &ActionSet,
    ) -> Result<Vec<AnalysisRecord>> {
        match input {
            ImageInput::Path(path) => self.run(path, actions),
            ImageInput::Frame(image) => {
                let scratch = tempfile::Builder::new()
                    .prefix("visage-frame-")
                    .suffix(".png")
                    .tempfile()
                    .context("failed to create temporary frame file")?;
                image
                    .save_with_format(scratch.path(), ImageFormat::Png)
                    .context("failed to write temporary frame")?;
                self.run(scratch.path(), actions)
            }
        }
    }
}

/// Builds [`CommandAnalyzer`] contexts from settings.
#[derive(Debug, Clone)]
pub struct CommandAnalyzerFactory {
    template: CommandAnalyzer,
}

impl CommandAnalyzerFactory {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            template: CommandAnalyzer::new(program, args),
        }
    }

    /// Returns `None` when no program is configured.
    pub fn from_settings(settings: &AnalyzerSettings) -> Option<Self> {
        let program = settings.program.as_deref()?.trim();
        if program.is_empty() {
            return None;
        }
        Some(Self::new(program, settings.args.clone()))
    }

    pub fn program(&self) -> &Path {
        &self.template.program
    }
}

impl AnalyzerFactory for CommandAnalyzerFactory {
    fn create(&self) -> Result<Box<dyn FaceAnalyzer>> {
        Ok(Box::new(self.template.clone()))
    }
}

/// Parse analyzer stdout into records.
///
/// Accepts an array of faces, a single face object, or `null`/empty output (no face).
pub fn parse_faces(stdout: &[u8]) -> Result<Vec<AnalysisRecord>> {
    let text = std::str::from_utf8(stdout).context("analyzer output is not UTF-8")?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: Value = serde_json::from_str(text).context("analyzer output is not valid JSON")?;
    let faces = match value {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        object @ Value::Object(_) => vec![object],
        other => bail!("unexpected analyzer output: {other}"),
    };
    faces
        .into_iter()
        .map(|face| {
            serde_json::from_value(normalize_face(face)).context("malformed face object")
        })
        .collect()
}

/// Older analyzers report the dominant gender label under `gender`; move it aside so the
/// confidence map field stays a map.
fn normalize_face(mut face: Value) -> Value {
    if let Value::Object(map) = &mut face
        && let Some(Value::String(label)) = map.get("gender").cloned()
    {
        map.remove("gender");
        map.entry("dominant_gender")
            .or_insert(Value::String(label));
    }
    face
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Action;

    #[test]
    fn parses_arrays_objects_and_empty_output() {
        let faces = parse_faces(br#"[{"age": 40}, {"age": 22}]"#).unwrap();
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[1].age, Some(22.0));

        let single = parse_faces(br#"{"dominant_emotion": "neutral"}"#).unwrap();
        assert_eq!(single[0].dominant(Action::Emotion), Some("neutral"));

        assert!(parse_faces(b"").unwrap().is_empty());
        assert!(parse_faces(b"null").unwrap().is_empty());
        assert!(parse_faces(b"[]").unwrap().is_empty());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_faces(b"not json").is_err());
        assert!(parse_faces(b"42").is_err());
    }

    #[test]
    fn accepts_float_coordinates_in_region() {
        let faces = parse_faces(
            br#"[{"age": 30, "region": {"x": 10.0, "y": 5, "w": 20.5, "h": 20.0, "left_eye": [12.5, 9]}}]"#,
        )
        .unwrap();
        let region = faces[0].region.unwrap();
        assert_eq!((region.x, region.y), (10.0, 5.0));
        assert_eq!((region.w, region.h), (20.5, 20.0));
        assert_eq!(region.left_eye, Some((12.5, 9.0)));
        assert_eq!(faces[0].age, Some(30.0));
    }

    #[test]
    fn legacy_gender_label_becomes_dominant_gender() {
        let faces = parse_faces(br#"[{"age": 33, "gender": "Man"}]"#).unwrap();
        assert_eq!(faces[0].dominant_gender.as_deref(), Some("Man"));
        assert!(faces[0].gender.is_empty());
    }

    #[test]
    fn factory_requires_a_program() {
        assert!(CommandAnalyzerFactory::from_settings(&AnalyzerSettings::default()).is_none());
        let settings = AnalyzerSettings {
            program: Some("  ".into()),
            args: Vec::new(),
        };
        assert!(CommandAnalyzerFactory::from_settings(&settings).is_none());
        let settings = AnalyzerSettings {
            program: Some("face-attrs".into()),
            args: vec!["--backend".into(), "opencv".into()],
        };
        let factory = CommandAnalyzerFactory::from_settings(&settings).unwrap();
        assert_eq!(factory.program(), Path::new("face-attrs"));
    }

    #[cfg(unix)]
    #[test]
    fn frames_are_handed_over_as_temporary_png() {
        let script = r#"img=""
while [ $# -gt 0 ]; do
  case "$1" in
    --image) img="$2"; shift 2 ;;
    *) shift ;;
  esac
done
case "$img" in *.png) ;; *) exit 3 ;; esac
[ -s "$img" ] || exit 4
printf '[{"age": 5, "scratch": "%s"}]' "$img"
"#;
        let mut analyzer = CommandAnalyzer::new(
            "sh",
            vec!["-c".into(), script.into(), "analyzer".into()],
        );
        let frame = image::DynamicImage::new_rgb8(8, 8);
        let faces = analyzer
            .analyze(&ImageInput::Frame(&frame), &ActionSet::all())
            .unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].age, Some(5.0));
        let scratch = faces[0].extra["scratch"].as_str().unwrap();
        assert!(!Path::new(scratch).exists());
    }

    #[cfg(unix)]
    #[test]
    fn missing_program_is_an_error() {
        let mut analyzer = CommandAnalyzer::new("/nonexistent/visage-analyzer", Vec::new());
        let path = PathBuf::from("face.jpg");
        let result = analyzer.analyze(&ImageInput::Path(&path), &ActionSet::all());
        assert!(result.is_err());
    }
}
