//! Shared error types for the services crate.

use thiserror::Error;

use storage::sqlite::SqliteInitError;
use study_core::model::{CatalogError, QuestionId};

/// Errors emitted by `ProgressStore` operations.
///
/// Every variant leaves the progress record untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("diagnostic incomplete: question {} ({question_id}) is unanswered", position + 1)]
    IncompleteDiagnostic {
        position: usize,
        question_id: QuestionId,
    },
    #[error("no topics with diagnostic questions are available to build a plan")]
    NoTopics,
    #[error("reveal all {unrevealed} remaining practice answers for day {} first", day + 1)]
    UnmetPrecondition { day: usize, unrevealed: usize },
    #[error("day {day} is outside the {plan_len}-day plan")]
    DayOutOfRange { day: usize, plan_len: usize },
    #[error("no study plan has been generated yet")]
    NoActivePlan,
    #[error("unknown question: {0}")]
    UnknownQuestion(QuestionId),
    #[error("choice {choice} is out of range for question {question_id} ({choices} choices)")]
    ChoiceOutOfRange {
        question_id: QuestionId,
        choice: usize,
        choices: usize,
    },
    #[error("diagnostic position {position} is out of range ({total} questions)")]
    PositionOutOfRange { position: usize, total: usize },
}

/// Errors emitted while reading an import payload.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ImportError {
    #[error("could not find progress data in the pasted text")]
    Unparseable,
    #[error("pasted text exceeds the {limit}-byte scan limit")]
    ScanLimitExceeded { limit: usize },
    #[error("progress data has an invalid shape: {0}")]
    InvalidShape(String),
}

/// Errors emitted while validating `StoreSettings`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("storage key cannot be empty")]
    EmptyKey,
    #[error("plan must cover at least one day")]
    ZeroPlanDays,
    #[error("flush delay must be > 0")]
    ZeroFlushDelay,
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
