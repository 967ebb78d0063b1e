use chrono::{DateTime, Utc};

/// Where the learner is in the diagnostic flow.
///
/// `Complete` is only left through a full reset or a diagnostic reset;
/// regenerating the plan stays in `Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticPhase {
    NotStarted,
    InProgress { answered: usize, total: usize },
    Complete,
}

/// Deferred step scheduled by answering with auto-advance on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoAction {
    Advance { to: usize },
    Submit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingAutoAction {
    pub due_at: DateTime<Utc>,
    pub action: AutoAction,
}

/// What a `tick` did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub advanced_to: Option<usize>,
    pub submitted: Option<Result<(), crate::error::ProgressError>>,
    /// `Some(accepted)` when a flush was attempted.
    pub flushed: Option<bool>,
}

/// Effect of a storage change made by another context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalOutcome {
    Ignored,
    Reset,
    Adopted,
}
