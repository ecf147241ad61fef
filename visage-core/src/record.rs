//! Attribute actions and per-face analysis records.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    path::Path,
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::VisageError;

/// An attribute the analyzer can estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Age,
    Gender,
    Emotion,
    Race,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::Age, Action::Gender, Action::Emotion, Action::Race];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Age => "age",
            Action::Gender => "gender",
            Action::Emotion => "emotion",
            Action::Race => "race",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = VisageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "age" => Ok(Action::Age),
            "gender" => Ok(Action::Gender),
            "emotion" => Ok(Action::Emotion),
            "race" => Ok(Action::Race),
            other => Err(VisageError::InvalidInput(format!(
                "unknown action '{other}' (expected age, gender, emotion or race)"
            ))),
        }
    }
}

/// De-duplicated set of requested actions, iterated in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ActionSet(BTreeSet<Action>);

impl ActionSet {
    /// All four attribute actions.
    pub fn all() -> Self {
        Self(Action::ALL.into_iter().collect())
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a list of action names, rejecting unknown ones.
    pub fn parse<I, S>(names: I) -> Result<Self, VisageError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .map(|name| name.as_ref().parse::<Action>())
            .collect()
    }

    pub fn insert(&mut self, action: Action) -> bool {
        self.0.insert(action)
    }

    pub fn contains(&self, action: Action) -> bool {
        self.0.contains(&action)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Action> + '_ {
        self.0.iter().copied()
    }

    /// Comma-separated form used on analyzer command lines (`age,gender`).
    pub fn to_arg_string(&self) -> String {
        self.iter()
            .map(Action::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromIterator<Action> for ActionSet {
    fn from_iter<T: IntoIterator<Item = Action>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl FromStr for ActionSet {
    type Err = VisageError;

    /// Parses `"age,gender"`; an empty string yields an empty set.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s.split(',').map(str::trim).filter(|part| !part.is_empty()))
    }
}

impl fmt::Display for ActionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_arg_string())
    }
}

/// Face bounding box in source-image pixels with optional eye landmarks.
///
/// Analyzers report pixels as integers or floats, so every coordinate is kept as `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceRegion {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_eye: Option<(f64, f64)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_eye: Option<(f64, f64)>,
}

/// Attributes estimated for one face.
///
/// Only the requested actions are populated. Confidence maps hold percentages keyed by
/// class label and are taken from the analyzer as-is. Keys the analyzer returns that have
/// no dedicated field are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominant_gender: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub gender: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominant_emotion: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub emotion: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominant_race: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub race: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<FaceRegion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl AnalysisRecord {
    /// Returns a copy tagged with the image it was produced from.
    pub fn with_source(mut self, path: &Path) -> Self {
        self.file_path = Some(path.display().to_string());
        self.file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        self
    }

    /// Dominant label for a classification action. `Action::Age` has no label.
    pub fn dominant(&self, action: Action) -> Option<&str> {
        match action {
            Action::Age => None,
            Action::Gender => self.dominant_gender.as_deref(),
            Action::Emotion => self.dominant_emotion.as_deref(),
            Action::Race => self.dominant_race.as_deref(),
        }
    }

    /// Confidence map for a classification action.
    pub fn confidences(&self, action: Action) -> Option<&BTreeMap<String, f64>> {
        match action {
            Action::Age => None,
            Action::Gender => Some(&self.gender),
            Action::Emotion => Some(&self.emotion),
            Action::Race => Some(&self.race),
        }
    }

    /// Confidence (percent) of the dominant label for `action`.
    pub fn dominant_confidence(&self, action: Action) -> Option<f64> {
        let label = self.dominant(action)?;
        self.confidences(action)?.get(label).copied()
    }
}
