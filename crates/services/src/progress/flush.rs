//! Debounced flush scheduling.
//!
//! A burst of mutations produces a single write once the burst has been quiet
//! for the configured delay. Operations that have already synchronized storage
//! themselves (reset, import, adopting another context's write) suppress the
//! flush their own state change would otherwise schedule.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushState {
    Idle,
    Pending { due_at: DateTime<Utc> },
    /// The next mutation must not schedule a flush. Consumed exactly once.
    Suppressed,
}

/// What `note_mutation` did with a state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Scheduled { due_at: DateTime<Utc> },
    Suppressed,
}

#[derive(Debug, Clone)]
pub struct FlushScheduler {
    delay: chrono::Duration,
    state: FlushState,
}

impl FlushScheduler {
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay: to_chrono(delay),
            state: FlushState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> FlushState {
        self.state
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self.state, FlushState::Pending { .. })
    }

    /// Record a state change at `now`.
    ///
    /// Restarts the debounce window, unless a suppression is armed, in which
    /// case the suppression is consumed and nothing is scheduled.
    pub fn note_mutation(&mut self, now: DateTime<Utc>) -> MutationOutcome {
        if self.state == FlushState::Suppressed {
            self.state = FlushState::Idle;
            return MutationOutcome::Suppressed;
        }
        let due_at = now.checked_add_signed(self.delay).unwrap_or(now);
        self.state = FlushState::Pending { due_at };
        MutationOutcome::Scheduled { due_at }
    }

    /// Cancel any pending flush and skip the one the next mutation would schedule.
    pub fn suppress_next(&mut self) {
        self.state = FlushState::Suppressed;
    }

    /// Returns true (and goes idle) if a pending flush is due at `now`.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> bool {
        match self.state {
            FlushState::Pending { due_at } if now >= due_at => {
                self.state = FlushState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Returns true (and goes idle) if anything is waiting to be written,
    /// regardless of the debounce window.
    pub fn take_forced(&mut self) -> bool {
        if self.is_pending() {
            self.state = FlushState::Idle;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        match self.state {
            FlushState::Pending { due_at } => Some(due_at),
            _ => None,
        }
    }
}

pub(crate) fn to_chrono(delay: Duration) -> chrono::Duration {
    chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use study_core::time::fixed_now;

    fn ms(n: i64) -> chrono::Duration {
        chrono::Duration::milliseconds(n)
    }

    #[test]
    fn burst_collapses_into_one_flush() {
        let mut flush = FlushScheduler::new(Duration::from_millis(250));
        let t0 = fixed_now();

        flush.note_mutation(t0);
        flush.note_mutation(t0 + ms(100));
        flush.note_mutation(t0 + ms(200));

        assert!(!flush.take_due(t0 + ms(300)));
        assert!(flush.take_due(t0 + ms(450)));
        assert!(!flush.take_due(t0 + ms(900)));
        assert_eq!(flush.state(), FlushState::Idle);
    }

    #[test]
    fn suppression_cancels_pending_and_is_consumed_once() {
        let mut flush = FlushScheduler::new(Duration::from_millis(250));
        let t0 = fixed_now();

        flush.note_mutation(t0);
        flush.suppress_next();
        assert_eq!(flush.note_mutation(t0 + ms(10)), MutationOutcome::Suppressed);
        assert!(!flush.take_due(t0 + ms(1_000)));

        let outcome = flush.note_mutation(t0 + ms(20));
        assert_eq!(
            outcome,
            MutationOutcome::Scheduled {
                due_at: t0 + ms(270)
            }
        );
        assert!(flush.take_due(t0 + ms(270)));
    }

    #[test]
    fn forced_flush_only_when_pending() {
        let mut flush = FlushScheduler::new(Duration::from_millis(250));
        assert!(!flush.take_forced());

        flush.note_mutation(fixed_now());
        assert_eq!(flush.next_deadline(), Some(fixed_now() + ms(250)));
        assert!(flush.take_forced());
        assert!(!flush.take_forced());
        assert_eq!(flush.next_deadline(), None);

        flush.suppress_next();
        assert!(!flush.take_forced());
    }
}
