use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use storage::{KeyValueStore, PersistenceAdapter, StorageChange, StorageStatus};
use study_core::Clock;
use study_core::mastery::{MasterySummary, compute_mastery};
use study_core::model::{
    AnswerMap, Catalog, DayProgress, DayStep, ProgressRecord, Question, QuestionId, Topic, TopicId,
};
use study_core::plan::generate_plan;

use super::flush::{FlushScheduler, MutationOutcome, to_chrono};
use super::settings::StoreSettings;
use super::state::{
    AutoAction, DiagnosticPhase, ExternalOutcome, PendingAutoAction, TickReport,
};
use crate::error::{ImportError, ProgressError};
use crate::export::{ExportMeta, ExportPayload};
use crate::reconcile::{
    ConfirmedImport, ImportPreview, StorageSignal, interpret_change, prepare_import, retain_known,
};

/// Single source of truth for the learner's progress.
///
/// Every mutation is applied in memory immediately and schedules a debounced
/// flush; nothing is written until [`tick`](Self::tick) finds the flush due or
/// [`flush_now`](Self::flush_now) forces it. Failed operations never touch the
/// record.
pub struct ProgressStore {
    catalog: Arc<Catalog>,
    settings: StoreSettings,
    clock: Clock,
    persistence: PersistenceAdapter,
    record: ProgressRecord,
    flush: FlushScheduler,
    cursor: usize,
    auto_action: Option<PendingAutoAction>,
    revision: watch::Sender<u64>,
}

impl ProgressStore {
    /// Load persisted progress, falling back to defaults when it is missing or
    /// malformed, and probe whether storage accepts writes. Never fails.
    pub async fn initialize(
        catalog: Arc<Catalog>,
        store: Arc<dyn KeyValueStore>,
        settings: StoreSettings,
        clock: Clock,
    ) -> Self {
        let mut persistence = PersistenceAdapter::new(store, settings.storage_key());
        let record = match persistence.read().await {
            None => ProgressRecord::default(),
            Some(raw) => match ProgressRecord::from_persisted_json(&raw) {
                Ok(mut record) => {
                    let dropped = retain_known(&catalog, &mut record);
                    if dropped.total() > 0 {
                        debug!(?dropped, "pruned persisted entries unknown to the catalog");
                    }
                    record
                }
                Err(err) => {
                    warn!(error = %err, "persisted progress is malformed; starting fresh");
                    ProgressRecord::default()
                }
            },
        };
        let status = persistence.probe().await;
        debug!(?status, "progress store initialized");

        let (revision, _) = watch::channel(0);
        let mut store = Self {
            flush: FlushScheduler::new(settings.flush_delay()),
            catalog,
            settings,
            clock,
            persistence,
            record,
            cursor: 0,
            auto_action: None,
            revision,
        };
        store.cursor = store.first_unanswered().map_or(0, |(position, _)| position);
        store
    }

    //
    // ─── READ ACCESS ───────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    #[must_use]
    pub fn record(&self) -> &ProgressRecord {
        &self.record
    }

    #[must_use]
    pub fn plan(&self) -> &[TopicId] {
        &self.record.plan
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerMap {
        &self.record.answers
    }

    #[must_use]
    pub fn day_progress(&self) -> &BTreeMap<usize, DayProgress> {
        &self.record.day_progress
    }

    #[must_use]
    pub fn revealed(&self) -> &BTreeMap<QuestionId, bool> {
        &self.record.revealed
    }

    #[must_use]
    pub fn day_index(&self) -> usize {
        self.record.day_index
    }

    /// Mastery derived from the current answers.
    #[must_use]
    pub fn mastery(&self) -> MasterySummary {
        compute_mastery(self.catalog.topics(), &self.record.answers)
    }

    #[must_use]
    pub fn diagnostic_phase(&self) -> DiagnosticPhase {
        if !self.record.plan.is_empty() {
            return DiagnosticPhase::Complete;
        }
        let answered = self.record.answers.len();
        if answered == 0 {
            DiagnosticPhase::NotStarted
        } else {
            DiagnosticPhase::InProgress {
                answered,
                total: self.catalog.diagnostic_len(),
            }
        }
    }

    /// Position of the active diagnostic question.
    #[must_use]
    pub fn active_question(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn active_diagnostic_question(&self) -> Option<&Question> {
        self.catalog.diagnostic_at(self.cursor)
    }

    /// Topic assigned to the current study day.
    #[must_use]
    pub fn current_topic(&self) -> Option<&Topic> {
        self.record
            .plan
            .get(self.record.day_index)
            .and_then(|id| self.catalog.topic(id.as_str()))
    }

    #[must_use]
    pub fn completed_days(&self) -> usize {
        self.record.completed_days()
    }

    #[must_use]
    pub fn storage_status(&self) -> StorageStatus {
        self.persistence.status()
    }

    /// Receiver whose value changes on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Earliest time at which [`tick`](Self::tick) has work to do.
    #[must_use]
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        let auto = self.auto_action.map(|pending| pending.due_at);
        match (auto, self.flush.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    #[must_use]
    pub fn has_pending_flush(&self) -> bool {
        self.flush.is_pending()
    }

    /// The auto-advance or auto-submit waiting for the next due `tick`.
    #[must_use]
    pub fn pending_auto_action(&self) -> Option<AutoAction> {
        self.auto_action.map(|pending| pending.action)
    }

    //
    // ─── DIAGNOSTIC ────────────────────────────────────────────────────────────
    //

    /// Record (or overwrite) the answer to a diagnostic question.
    ///
    /// With auto-advance on, schedules moving to the next question, or
    /// submitting when this was the last one.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::UnknownQuestion` or `ProgressError::ChoiceOutOfRange`.
    pub fn record_answer(&mut self, question_id: &str, choice: usize) -> Result<(), ProgressError> {
        let unknown = || ProgressError::UnknownQuestion(QuestionId::new(question_id));
        let position = self
            .catalog
            .diagnostic_position(question_id)
            .ok_or_else(unknown)?;
        let question = self.catalog.diagnostic_at(position).ok_or_else(unknown)?;
        let choices = question.choices().len();
        if choice >= choices {
            return Err(ProgressError::ChoiceOutOfRange {
                question_id: question.id().clone(),
                choice,
                choices,
            });
        }
        let id = question.id().clone();

        self.record.answers.insert(id, choice);
        self.cursor = position;
        // An existing plan only changes through an explicit regenerate or reset.
        let action = if !self.record.auto_next {
            None
        } else if position + 1 < self.catalog.diagnostic_len() {
            Some(AutoAction::Advance { to: position + 1 })
        } else if self.record.plan.is_empty() {
            Some(AutoAction::Submit)
        } else {
            None
        };
        self.auto_action = action.map(|action| {
            let now = self.clock.now();
            PendingAutoAction {
                due_at: now
                    .checked_add_signed(to_chrono(self.settings.auto_advance_delay()))
                    .unwrap_or(now),
                action,
            }
        });
        self.changed();
        Ok(())
    }

    /// Remove an answer. Returns whether there was one.
    pub fn clear_answer(&mut self, question_id: &str) -> bool {
        if self.record.answers.remove(question_id).is_none() {
            return false;
        }
        self.changed();
        true
    }

    /// Jump to a diagnostic question, cancelling any pending auto-advance.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::PositionOutOfRange` past the last question.
    pub fn go_to_question(&mut self, position: usize) -> Result<(), ProgressError> {
        let total = self.catalog.diagnostic_len();
        if position >= total {
            return Err(ProgressError::PositionOutOfRange { position, total });
        }
        self.auto_action = None;
        self.cursor = position;
        self.notify();
        Ok(())
    }

    /// Move to the next question, stopping at the last. Returns the new position.
    pub fn next_question(&mut self) -> usize {
        let last = self.catalog.diagnostic_len().saturating_sub(1);
        self.auto_action = None;
        self.cursor = (self.cursor + 1).min(last);
        self.notify();
        self.cursor
    }

    /// Move to the previous question, stopping at the first. Returns the new position.
    pub fn previous_question(&mut self) -> usize {
        self.auto_action = None;
        self.cursor = self.cursor.saturating_sub(1);
        self.notify();
        self.cursor
    }

    /// Generate the plan from a fully answered diagnostic.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::IncompleteDiagnostic` naming the first
    /// unanswered question, or `ProgressError::NoTopics`.
    pub fn submit_diagnostic(&mut self) -> Result<(), ProgressError> {
        if let Some((position, question_id)) = self.first_unanswered() {
            return Err(ProgressError::IncompleteDiagnostic {
                position,
                question_id,
            });
        }
        self.regenerate_plan()
    }

    /// Rebuild the plan from current mastery without requiring a complete
    /// diagnostic. Resets day progress and reveals.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NoTopics` when no topic is eligible.
    pub fn regenerate_plan(&mut self) -> Result<(), ProgressError> {
        let plan = generate_plan(&self.mastery(), self.settings.plan_days());
        if plan.is_empty() {
            return Err(ProgressError::NoTopics);
        }
        self.record.plan = plan.into_days();
        self.record.day_index = 0;
        self.record.day_progress.clear();
        self.record.revealed.clear();
        self.auto_action = None;
        info!(days = self.record.plan.len(), "generated study plan");
        self.changed();
        Ok(())
    }

    /// Clear answers and everything derived from them, keeping settings.
    pub fn reset_diagnostic(&mut self) {
        self.record.clear_study_state();
        self.cursor = 0;
        self.auto_action = None;
        self.changed();
    }

    //
    // ─── STUDY DAYS ────────────────────────────────────────────────────────────
    //

    /// Move the day cursor.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NoActivePlan` or `ProgressError::DayOutOfRange`.
    pub fn set_day(&mut self, day: usize) -> Result<(), ProgressError> {
        self.check_day(day)?;
        if self.record.day_index != day {
            self.record.day_index = day;
            self.changed();
        }
        Ok(())
    }

    /// Flip a step of a study day and return its new value.
    ///
    /// Marking practice done requires every practice answer of the day's topic
    /// to be revealed first.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::UnmetPrecondition`, `ProgressError::NoActivePlan`
    /// or `ProgressError::DayOutOfRange`.
    pub fn toggle_day_step(&mut self, day: usize, step: DayStep) -> Result<bool, ProgressError> {
        self.check_day(day)?;
        let done = !self.record.day(day).step(step);
        if step == DayStep::Practice && done {
            let unrevealed = self.unrevealed_practice(day);
            if unrevealed > 0 {
                return Err(ProgressError::UnmetPrecondition { day, unrevealed });
            }
        }
        self.record
            .day_progress
            .entry(day)
            .or_default()
            .set_step(step, done);
        self.changed();
        Ok(done)
    }

    /// Number of practice questions for `day` whose answers are still hidden.
    #[must_use]
    pub fn unrevealed_practice(&self, day: usize) -> usize {
        self.day_topic(day).map_or(0, |topic| {
            topic
                .practice()
                .iter()
                .filter(|q| !self.record.is_revealed(q.id().as_str()))
                .count()
        })
    }

    /// Practice questions for `day`, shuffled when the learner asked for it.
    ///
    /// The shuffled order is stable for a given day and topic.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NoActivePlan` or `ProgressError::DayOutOfRange`.
    pub fn practice_questions(&self, day: usize) -> Result<Vec<&Question>, ProgressError> {
        self.check_day(day)?;
        let Some(topic) = self.day_topic(day) else {
            return Ok(Vec::new());
        };
        let mut questions: Vec<&Question> = topic.practice().iter().collect();
        if self.record.shuffle_practice {
            let mut rng = StdRng::seed_from_u64(order_seed(topic.id().as_str(), day));
            questions.shuffle(&mut rng);
        }
        Ok(questions)
    }

    /// Show or hide a practice answer.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::UnknownQuestion` for ids that are not practice questions.
    pub fn set_revealed(&mut self, question_id: &str, revealed: bool) -> Result<(), ProgressError> {
        if !self.catalog.is_practice_question(question_id) {
            return Err(ProgressError::UnknownQuestion(QuestionId::new(question_id)));
        }
        let changed = if revealed {
            self.record
                .revealed
                .insert(QuestionId::new(question_id), true)
                != Some(true)
        } else {
            self.record.revealed.remove(question_id).is_some()
        };
        if changed {
            self.changed();
        }
        Ok(())
    }

    /// Show or hide every practice answer of the current day. Returns how many
    /// questions the day has.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NoActivePlan` when there is no plan.
    pub fn set_all_revealed_for_current_day(
        &mut self,
        revealed: bool,
    ) -> Result<usize, ProgressError> {
        let day = self.record.day_index;
        self.check_day(day)?;
        let ids: Vec<QuestionId> = self
            .day_topic(day)
            .map(|topic| topic.practice().iter().map(|q| q.id().clone()).collect())
            .unwrap_or_default();
        let mut changed = false;
        for id in &ids {
            changed |= if revealed {
                self.record.revealed.insert(id.clone(), true) != Some(true)
            } else {
                self.record.revealed.remove(id).is_some()
            };
        }
        if changed {
            self.changed();
        }
        Ok(ids.len())
    }

    //
    // ─── SETTINGS ──────────────────────────────────────────────────────────────
    //

    pub fn set_auto_next(&mut self, enabled: bool) {
        if self.record.auto_next == enabled {
            return;
        }
        self.record.auto_next = enabled;
        if !enabled {
            self.auto_action = None;
        }
        self.changed();
    }

    pub fn set_shuffle_practice(&mut self, enabled: bool) {
        if self.record.shuffle_practice == enabled {
            return;
        }
        self.record.shuffle_practice = enabled;
        self.changed();
    }

    //
    // ─── RESET / EXPORT / IMPORT ───────────────────────────────────────────────
    //

    /// Clear everything and delete the persisted copy. Any pending flush is
    /// cancelled so it cannot write the old record back. Returns whether the
    /// delete was accepted.
    pub async fn reset_all(&mut self) -> bool {
        self.record = ProgressRecord::default();
        self.cursor = 0;
        self.auto_action = None;
        let deleted = self.persistence.delete().await;
        self.flush.suppress_next();
        self.changed();
        info!(deleted, "progress reset");
        deleted
    }

    /// Snapshot for export. Stamps `lastExportedAt`; works without storage.
    pub fn export_snapshot(&mut self, meta: &ExportMeta) -> ExportPayload {
        let now = self.clock.now();
        self.record.last_exported_at = Some(now);
        self.changed();
        ExportPayload::new(self.record.clone(), now, meta)
    }

    /// Parse and validate an import without applying it.
    ///
    /// # Errors
    ///
    /// Returns `ImportError` when the payload cannot be recovered or validated.
    pub fn preview_import(&self, raw: &str) -> Result<ImportPreview, ImportError> {
        prepare_import(&self.catalog, raw, self.clock.now())
    }

    /// Adopt a confirmed import wholesale and persist it as-is. Returns whether
    /// storage accepted the write; the in-memory adoption happens either way.
    pub async fn commit_import(&mut self, import: ConfirmedImport) -> bool {
        let mut record = import.into_record();
        record.clamp_day_index();
        self.record = record;
        self.auto_action = None;
        self.cursor = self.first_unanswered().map_or(0, |(position, _)| position);

        let persisted = self.persist(false).await;
        self.flush.suppress_next();
        self.changed();
        info!(
            persisted,
            plan_days = self.record.plan.len(),
            answers = self.record.answers.len(),
            "imported progress"
        );
        persisted
    }

    /// Apply a change another context made to the shared store.
    ///
    /// Adoption does not schedule a flush: writing the adopted record back
    /// would be redundant and would re-stamp `savedAt`.
    pub fn apply_external_change(&mut self, change: &StorageChange) -> ExternalOutcome {
        match interpret_change(&self.catalog, self.persistence.key(), change) {
            StorageSignal::Ignored => ExternalOutcome::Ignored,
            StorageSignal::Deleted => {
                self.record = ProgressRecord::default();
                self.cursor = 0;
                self.auto_action = None;
                self.flush.suppress_next();
                self.changed();
                info!("progress was reset in another context");
                ExternalOutcome::Reset
            }
            StorageSignal::Replaced(record) => {
                self.record = record;
                self.auto_action = None;
                let last = self.catalog.diagnostic_len().saturating_sub(1);
                self.cursor = self.cursor.min(last);
                self.flush.suppress_next();
                self.changed();
                debug!("adopted progress written by another context");
                ExternalOutcome::Adopted
            }
        }
    }

    //
    // ─── TIMERS / FLUSHING ─────────────────────────────────────────────────────
    //

    /// Run whatever timers are due: auto-advance or auto-submit, then the
    /// debounced flush.
    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        let now = self.clock.now();

        if let Some(pending) = self.auto_action.filter(|pending| now >= pending.due_at) {
            self.auto_action = None;
            match pending.action {
                AutoAction::Advance { to } => {
                    self.cursor = to;
                    self.notify();
                    report.advanced_to = Some(to);
                }
                AutoAction::Submit if !self.record.plan.is_empty() => {
                    debug!("plan already exists, skipping auto-submit");
                }
                AutoAction::Submit => {
                    let result = self.submit_diagnostic();
                    if let Err(ProgressError::IncompleteDiagnostic { position, .. }) = &result {
                        self.cursor = *position;
                        self.notify();
                    }
                    report.submitted = Some(result);
                }
            }
        }

        if self.flush.take_due(self.clock.now()) {
            report.flushed = Some(self.persist(true).await);
        }
        report
    }

    /// Write immediately if a flush is pending, bypassing the debounce delay.
    /// Used when the host is about to be hidden or torn down.
    pub async fn flush_now(&mut self) -> Option<bool> {
        if self.flush.take_forced() {
            Some(self.persist(true).await)
        } else {
            None
        }
    }

    //
    // ─── INTERNALS ─────────────────────────────────────────────────────────────
    //

    fn changed(&mut self) {
        if self.flush.note_mutation(self.clock.now()) == MutationOutcome::Suppressed {
            debug!("skipping flush for already synchronized state");
        }
        self.notify();
    }

    fn notify(&self) {
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    async fn persist(&mut self, restamp: bool) -> bool {
        if restamp {
            self.record.saved_at = Some(self.clock.now());
        }
        match self.record.to_persisted_json() {
            Ok(json) => self.persistence.write(&json).await,
            Err(err) => {
                warn!(error = %err, "failed to serialize progress");
                false
            }
        }
    }

    fn first_unanswered(&self) -> Option<(usize, QuestionId)> {
        self.catalog
            .diagnostic_questions()
            .enumerate()
            .find(|(_, (_, question))| !self.record.answers.contains(question.id().as_str()))
            .map(|(position, (_, question))| (position, question.id().clone()))
    }

    fn check_day(&self, day: usize) -> Result<(), ProgressError> {
        let plan_len = self.record.plan.len();
        if plan_len == 0 {
            return Err(ProgressError::NoActivePlan);
        }
        if day >= plan_len {
            return Err(ProgressError::DayOutOfRange { day, plan_len });
        }
        Ok(())
    }

    fn day_topic(&self, day: usize) -> Option<&Topic> {
        self.record
            .plan
            .get(day)
            .and_then(|id| self.catalog.topic(id.as_str()))
    }
}

/// FNV-1a over the topic id, mixed with the day.
fn order_seed(topic: &str, day: usize) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in topic.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash ^ (day as u64)
}
