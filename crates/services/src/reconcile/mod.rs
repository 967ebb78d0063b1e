//! Reconciling progress that originates outside this store: pasted or loaded
//! import payloads, and records written by other contexts.

mod extract;
mod sanitize;
mod signal;

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;

use study_core::model::{Catalog, ProgressRecord};

use crate::error::ImportError;

pub use extract::{MAX_SCAN_BYTES, extract_json};
pub use sanitize::{DropCounts, SanitizedPayload, retain_known, sanitize_payload};
pub use signal::{StorageSignal, interpret_change};

/// Something the learner must acknowledge before an import is committed.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportWarning {
    VersionMismatch { found: Value },
    DroppedEntries { plan: usize, answers: usize },
}

impl fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportWarning::VersionMismatch { found } => {
                write!(f, "backup was made with format version {found}, expected 1")
            }
            ImportWarning::DroppedEntries { plan, answers } => write!(
                f,
                "{plan} plan day(s) and {answers} answer(s) refer to content that no longer exists and will be skipped"
            ),
        }
    }
}

/// A validated import that has not been applied yet.
///
/// All warnings are presented together so a caller asks for a single
/// confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportPreview {
    record: ProgressRecord,
    dropped: DropCounts,
    warnings: Vec<ImportWarning>,
}

impl ImportPreview {
    #[must_use]
    pub fn record(&self) -> &ProgressRecord {
        &self.record
    }

    #[must_use]
    pub fn dropped(&self) -> DropCounts {
        self.dropped
    }

    #[must_use]
    pub fn warnings(&self) -> &[ImportWarning] {
        &self.warnings
    }

    #[must_use]
    pub fn requires_confirmation(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Accept without prompting. Fails (handing the preview back) when there
    /// are warnings the learner has not seen.
    ///
    /// # Errors
    ///
    /// Returns the preview itself if confirmation is required.
    pub fn accept(self) -> Result<ConfirmedImport, Self> {
        if self.requires_confirmation() {
            Err(self)
        } else {
            Ok(ConfirmedImport {
                record: self.record,
            })
        }
    }

    /// The learner has seen every warning and chose to continue.
    #[must_use]
    pub fn confirm(self) -> ConfirmedImport {
        ConfirmedImport {
            record: self.record,
        }
    }
}

/// An import cleared for atomic adoption by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedImport {
    record: ProgressRecord,
}

impl ConfirmedImport {
    #[must_use]
    pub fn record(&self) -> &ProgressRecord {
        &self.record
    }

    pub(crate) fn into_record(self) -> ProgressRecord {
        self.record
    }
}

/// Extract, validate and sanitize a raw import payload.
///
/// # Errors
///
/// Returns `ImportError` if no JSON can be recovered or the JSON is not a
/// progress record.
pub fn prepare_import(
    catalog: &Catalog,
    raw: &str,
    now: DateTime<Utc>,
) -> Result<ImportPreview, ImportError> {
    let value = extract_json(raw)?;
    let sanitized = sanitize_payload(catalog, &value, now)?;

    let mut warnings = Vec::new();
    if let Some(found) = sanitized.foreign_version {
        warnings.push(ImportWarning::VersionMismatch { found });
    }
    if sanitized.dropped.significant() > 0 {
        warnings.push(ImportWarning::DroppedEntries {
            plan: sanitized.dropped.plan,
            answers: sanitized.dropped.answers,
        });
    }

    Ok(ImportPreview {
        record: sanitized.record,
        dropped: sanitized.dropped,
        warnings,
    })
}
