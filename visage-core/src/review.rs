//! Filtering, ordering and summary statistics over a result set.

use std::path::PathBuf;

use crate::record::AnalysisRecord;

/// Record filter. Unset criteria match everything; a record lacking an attribute that a
/// criterion constrains is excluded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultFilter {
    pub min_age: Option<f64>,
    pub max_age: Option<f64>,
    /// Dominant gender label, compared case-insensitively.
    pub gender: Option<String>,
    /// Dominant emotion label, compared case-insensitively.
    pub emotion: Option<String>,
}

impl ResultFilter {
    pub fn is_empty(&self) -> bool {
        self.min_age.is_none()
            && self.max_age.is_none()
            && self.gender.is_none()
            && self.emotion.is_none()
    }

    pub fn matches(&self, record: &AnalysisRecord) -> bool {
        if self.min_age.is_some() || self.max_age.is_some() {
            let Some(age) = record.age else {
                return false;
            };
            if self.min_age.is_some_and(|min| age < min) || self.max_age.is_some_and(|max| age > max)
            {
                return false;
            }
        }
        label_matches(self.gender.as_deref(), record.dominant_gender.as_deref())
            && label_matches(self.emotion.as_deref(), record.dominant_emotion.as_deref())
    }

    /// Clones the records that pass the filter, keeping their order.
    pub fn apply(&self, records: &[AnalysisRecord]) -> Vec<AnalysisRecord> {
        records
            .iter()
            .filter(|record| self.matches(record))
            .cloned()
            .collect()
    }
}

fn label_matches(wanted: Option<&str>, actual: Option<&str>) -> bool {
    match (wanted, actual) {
        (None, _) => true,
        (Some(wanted), Some(actual)) => wanted.trim().eq_ignore_ascii_case(actual.trim()),
        (Some(_), None) => false,
    }
}

/// Sort records by file name, then by full path. Stable for equal keys.
pub fn sort_by_file_name(records: &mut [AnalysisRecord]) {
    records.sort_by(|a, b| {
        a.file_name
            .cmp(&b.file_name)
            .then_with(|| a.file_path.cmp(&b.file_path))
    });
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgeStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Totals shown after a batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub age: Option<AgeStats>,
    pub men: usize,
    pub women: usize,
}

impl BatchSummary {
    pub fn from_result(records: &[AnalysisRecord], failed: &[PathBuf]) -> Self {
        let ages: Vec<f64> = records.iter().filter_map(|r| r.age).collect();
        let age = (!ages.is_empty()).then(|| AgeStats {
            mean: ages.iter().sum::<f64>() / ages.len() as f64,
            min: ages.iter().copied().fold(f64::INFINITY, f64::min),
            max: ages.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        });
        let count_gender = |label: &str| {
            records
                .iter()
                .filter(|r| {
                    r.dominant_gender
                        .as_deref()
                        .is_some_and(|g| g.eq_ignore_ascii_case(label))
                })
                .count()
        };

        Self {
            total: records.len() + failed.len(),
            succeeded: records.len(),
            failed: failed.len(),
            age,
            men: count_gender("Man"),
            women: count_gender("Woman"),
        }
    }

    /// Share of successful records labelled `Man`, in percent.
    pub fn men_percent(&self) -> f64 {
        percent(self.men, self.succeeded)
    }

    pub fn women_percent(&self) -> f64 {
        percent(self.women, self.succeeded)
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}
