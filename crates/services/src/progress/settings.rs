use std::time::Duration;

use study_core::plan::DEFAULT_PLAN_DAYS;

use crate::error::SettingsError;

pub const DEFAULT_STORAGE_KEY: &str = "chem-study-progress";
pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_millis(250);
pub const DEFAULT_AUTO_ADVANCE_DELAY: Duration = Duration::from_millis(350);

/// Tunables for a `ProgressStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSettings {
    storage_key: String,
    plan_days: usize,
    flush_delay: Duration,
    auto_advance_delay: Duration,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_owned(),
            plan_days: DEFAULT_PLAN_DAYS,
            flush_delay: DEFAULT_FLUSH_DELAY,
            auto_advance_delay: DEFAULT_AUTO_ADVANCE_DELAY,
        }
    }
}

impl StoreSettings {
    /// Build validated settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` for an empty key, a zero-day plan or a zero
    /// flush delay.
    pub fn new(
        storage_key: impl Into<String>,
        plan_days: usize,
        flush_delay: Duration,
        auto_advance_delay: Duration,
    ) -> Result<Self, SettingsError> {
        let storage_key = storage_key.into().trim().to_owned();
        if storage_key.is_empty() {
            return Err(SettingsError::EmptyKey);
        }
        if plan_days == 0 {
            return Err(SettingsError::ZeroPlanDays);
        }
        if flush_delay.is_zero() {
            return Err(SettingsError::ZeroFlushDelay);
        }
        Ok(Self {
            storage_key,
            plan_days,
            flush_delay,
            auto_advance_delay,
        })
    }

    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    #[must_use]
    pub fn plan_days(&self) -> usize {
        self.plan_days
    }

    #[must_use]
    pub fn flush_delay(&self) -> Duration {
        self.flush_delay
    }

    #[must_use]
    pub fn auto_advance_delay(&self) -> Duration {
        self.auto_advance_delay
    }
}
