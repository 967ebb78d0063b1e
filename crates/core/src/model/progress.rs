use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::model::answers::AnswerMap;
use crate::model::ids::{QuestionId, TopicId};

/// Current version of the export format.
pub const FORMAT_VERSION: u64 = 1;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RecordShapeError {
    #[error("persisted progress is not valid JSON: {0}")]
    Json(String),

    #[error("persisted progress is not an object")]
    NotAnObject,

    #[error("persisted progress has a malformed field: {0}")]
    Field(String),
}

/// The two steps of a study day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayStep {
    Concept,
    Practice,
}

impl DayStep {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DayStep::Concept => "concept",
            DayStep::Practice => "practice",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "concept" => Some(Self::Concept),
            "practice" => Some(Self::Practice),
            _ => None,
        }
    }
}

/// Completion flags for a single study day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DayProgress {
    pub concept_done: bool,
    pub practice_done: bool,
}

impl DayProgress {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.concept_done && self.practice_done
    }

    #[must_use]
    pub fn step(&self, step: DayStep) -> bool {
        match step {
            DayStep::Concept => self.concept_done,
            DayStep::Practice => self.practice_done,
        }
    }

    pub fn set_step(&mut self, step: DayStep, done: bool) {
        match step {
            DayStep::Concept => self.concept_done = done,
            DayStep::Practice => self.practice_done = done,
        }
    }
}

/// Persisted progress: the unit of storage, export and import.
///
/// Serialized with the camelCase field names of the storage format. Missing
/// fields fall back to defaults; present fields of the wrong type are a shape
/// error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ProgressRecord {
    pub plan: Vec<TopicId>,
    pub day_index: usize,
    pub answers: AnswerMap,
    pub day_progress: BTreeMap<usize, DayProgress>,
    pub revealed: BTreeMap<QuestionId, bool>,
    pub auto_next: bool,
    pub shuffle_practice: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_exported_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    /// Parse a persisted record, rejecting anything that is not an object with
    /// correctly typed fields.
    ///
    /// # Errors
    ///
    /// Returns `RecordShapeError` when the input fails structural validation.
    pub fn from_persisted_json(raw: &str) -> Result<Self, RecordShapeError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|err| RecordShapeError::Json(err.to_string()))?;
        if !value.is_object() {
            return Err(RecordShapeError::NotAnObject);
        }
        let mut record: Self = serde_json::from_value(value)
            .map_err(|err| RecordShapeError::Field(err.to_string()))?;
        record.clamp_day_index();
        Ok(record)
    }

    /// Serialize into the persisted JSON shape.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails.
    pub fn to_persisted_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Keep the day cursor inside `[0, plan.len() - 1]` (or 0 for an empty plan).
    pub fn clamp_day_index(&mut self) {
        let last = self.plan.len().saturating_sub(1);
        self.day_index = self.day_index.min(last);
    }

    #[must_use]
    pub fn day(&self, day: usize) -> DayProgress {
        self.day_progress.get(&day).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn is_day_complete(&self, day: usize) -> bool {
        self.day(day).is_complete()
    }

    #[must_use]
    pub fn is_revealed(&self, question: &str) -> bool {
        self.revealed.get(question).copied().unwrap_or(false)
    }

    /// Number of plan days with both steps done.
    #[must_use]
    pub fn completed_days(&self) -> usize {
        (0..self.plan.len())
            .filter(|day| self.is_day_complete(*day))
            .count()
    }

    /// Clears the diagnostic outcome and everything derived from it, keeping settings.
    pub fn clear_study_state(&mut self) {
        self.plan.clear();
        self.day_index = 0;
        self.answers.clear();
        self.day_progress.clear();
        self.revealed.clear();
    }
}
