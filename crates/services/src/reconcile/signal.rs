//! Interpreting storage changes written by another context.

use storage::StorageChange;
use study_core::model::{Catalog, ProgressRecord};
use tracing::warn;

use super::sanitize::retain_known;

/// What a foreign storage change means for the local store.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageSignal {
    /// Another context deleted the progress key.
    Deleted,
    /// Another context wrote a valid record.
    Replaced(ProgressRecord),
    /// The change is for another key or could not be parsed.
    Ignored,
}

/// Classify a change to `key`. Unparseable values are ignored rather than
/// clearing local state.
#[must_use]
pub fn interpret_change(catalog: &Catalog, key: &str, change: &StorageChange) -> StorageSignal {
    if change.key != key {
        return StorageSignal::Ignored;
    }
    let Some(raw) = change.new_value.as_deref() else {
        return StorageSignal::Deleted;
    };
    match ProgressRecord::from_persisted_json(raw) {
        Ok(mut record) => {
            retain_known(catalog, &mut record);
            StorageSignal::Replaced(record)
        }
        Err(err) => {
            warn!(error = %err, "ignoring malformed progress written by another context");
            StorageSignal::Ignored
        }
    }
}
