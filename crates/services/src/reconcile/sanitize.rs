//! Field-by-field validation of external progress against the current catalog.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use study_core::model::{
    AnswerMap, Catalog, DayProgress, FORMAT_VERSION, ProgressRecord, QuestionId, TopicId,
};

use crate::error::ImportError;

/// How many entries of each kind were discarded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropCounts {
    pub plan: usize,
    pub answers: usize,
    pub revealed: usize,
    pub day_progress: usize,
}

impl DropCounts {
    /// Drops the learner must be warned about before committing.
    #[must_use]
    pub fn significant(&self) -> usize {
        self.plan + self.answers
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.plan + self.answers + self.revealed + self.day_progress
    }
}

/// Result of sanitizing a raw payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizedPayload {
    pub record: ProgressRecord,
    pub dropped: DropCounts,
    /// The payload's `version` when present and different from the current one.
    pub foreign_version: Option<Value>,
}

/// Validate an import payload (export shape or bare persisted shape).
///
/// Unknown topics, questions and out-of-range values are dropped, never
/// replaced. A missing `savedAt` is stamped with `now`.
///
/// # Errors
///
/// Returns `ImportError::InvalidShape` when the payload is not an object or a
/// container field has the wrong type.
pub fn sanitize_payload(
    catalog: &Catalog,
    payload: &Value,
    now: DateTime<Utc>,
) -> Result<SanitizedPayload, ImportError> {
    let object = payload
        .as_object()
        .ok_or_else(|| ImportError::InvalidShape("expected an object".into()))?;
    let mut dropped = DropCounts::default();

    let plan = sanitize_plan(catalog, object, &mut dropped)?;
    let answers = sanitize_answers(catalog, object, &mut dropped)?;
    let revealed = sanitize_revealed(catalog, object, &mut dropped)?;
    let day_progress = sanitize_day_progress(object, plan.len(), &mut dropped)?;

    let day_index = object
        .get("dayIndex")
        .and_then(as_index)
        .unwrap_or(0);

    let mut record = ProgressRecord {
        plan,
        day_index,
        answers,
        day_progress,
        revealed,
        auto_next: object.get("autoNext").is_some_and(truthy),
        shuffle_practice: object.get("shufflePractice").is_some_and(truthy),
        saved_at: Some(object.get("savedAt").and_then(as_timestamp).unwrap_or(now)),
        last_exported_at: object.get("lastExportedAt").and_then(as_timestamp),
    };
    record.clamp_day_index();

    let foreign_version = object
        .get("version")
        .filter(|v| v.as_u64() != Some(FORMAT_VERSION))
        .cloned();

    Ok(SanitizedPayload {
        record,
        dropped,
        foreign_version,
    })
}

/// Drop entries of an already well-typed record that the catalog no longer knows.
pub fn retain_known(catalog: &Catalog, record: &mut ProgressRecord) -> DropCounts {
    let mut dropped = DropCounts::default();

    let before = record.plan.len();
    record.plan.retain(|topic| catalog.contains_topic(topic.as_str()));
    dropped.plan = before - record.plan.len();

    let before = record.answers.len();
    record.answers = record
        .answers
        .iter()
        .filter(|(id, choice)| {
            catalog
                .diagnostic_choice_count(id.as_str())
                .is_some_and(|choices| *choice < choices)
        })
        .map(|(id, choice)| (id.clone(), choice))
        .collect();
    dropped.answers = before - record.answers.len();

    let before = record.revealed.len();
    record
        .revealed
        .retain(|id, _| catalog.is_practice_question(id.as_str()));
    dropped.revealed = before - record.revealed.len();

    let plan_len = record.plan.len();
    let before = record.day_progress.len();
    record.day_progress.retain(|day, _| *day < plan_len);
    dropped.day_progress = before - record.day_progress.len();

    record.clamp_day_index();
    dropped
}

fn sanitize_plan(
    catalog: &Catalog,
    object: &Map<String, Value>,
    dropped: &mut DropCounts,
) -> Result<Vec<TopicId>, ImportError> {
    let Some(raw) = object.get("plan") else {
        return Ok(Vec::new());
    };
    let entries = raw
        .as_array()
        .ok_or_else(|| ImportError::InvalidShape("plan must be an array".into()))?;
    let plan: Vec<TopicId> = entries
        .iter()
        .filter_map(Value::as_str)
        .filter(|id| catalog.contains_topic(id))
        .map(TopicId::new)
        .collect();
    dropped.plan = entries.len() - plan.len();
    Ok(plan)
}

fn sanitize_answers(
    catalog: &Catalog,
    object: &Map<String, Value>,
    dropped: &mut DropCounts,
) -> Result<AnswerMap, ImportError> {
    let Some(entries) = optional_object(object, "answers")? else {
        return Ok(AnswerMap::new());
    };
    let answers: AnswerMap = entries
        .iter()
        .filter_map(|(id, value)| {
            let choices = catalog.diagnostic_choice_count(id)?;
            let choice = as_index(value).filter(|choice| *choice < choices)?;
            Some((QuestionId::new(id.as_str()), choice))
        })
        .collect();
    dropped.answers = entries.len() - answers.len();
    Ok(answers)
}

fn sanitize_revealed(
    catalog: &Catalog,
    object: &Map<String, Value>,
    dropped: &mut DropCounts,
) -> Result<BTreeMap<QuestionId, bool>, ImportError> {
    let Some(entries) = optional_object(object, "revealed")? else {
        return Ok(BTreeMap::new());
    };
    let revealed: BTreeMap<QuestionId, bool> = entries
        .iter()
        .filter(|(id, _)| catalog.is_practice_question(id))
        .map(|(id, value)| (QuestionId::new(id.as_str()), truthy(value)))
        .collect();
    dropped.revealed = entries.len() - revealed.len();
    Ok(revealed)
}

fn sanitize_day_progress(
    object: &Map<String, Value>,
    plan_len: usize,
    dropped: &mut DropCounts,
) -> Result<BTreeMap<usize, DayProgress>, ImportError> {
    let Some(entries) = optional_object(object, "dayProgress")? else {
        return Ok(BTreeMap::new());
    };
    let days: BTreeMap<usize, DayProgress> = entries
        .iter()
        .filter_map(|(key, value)| {
            let day = key.trim().parse::<usize>().ok().filter(|day| *day < plan_len)?;
            let flags = DayProgress {
                concept_done: value.get("conceptDone").is_some_and(truthy),
                practice_done: value.get("practiceDone").is_some_and(truthy),
            };
            Some((day, flags))
        })
        .collect();
    dropped.day_progress = entries.len() - days.len();
    Ok(days)
}

fn optional_object<'a>(
    object: &'a Map<String, Value>,
    field: &str,
) -> Result<Option<&'a Map<String, Value>>, ImportError> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(ImportError::InvalidShape(format!("{field} must be an object"))),
    }
}

/// A finite, non-negative, integral JSON number.
fn as_index(value: &Value) -> Option<usize> {
    if let Some(n) = value.as_u64() {
        return usize::try_from(n).ok();
    }
    let n = value.as_f64()?;
    if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        return Some(n as usize);
    }
    None
}

fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// Loose truthiness for flags written by other tools.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use study_core::model::{QuestionDraft, TopicDraft};
    use study_core::time::fixed_now;

    fn question(id: &str) -> QuestionDraft {
        QuestionDraft {
            id: id.into(),
            prompt: "?".into(),
            choices: vec!["a".into(), "b".into(), "c".into()],
            correct: 0,
            ..QuestionDraft::default()
        }
    }

    fn catalog() -> Catalog {
        let mole = TopicDraft {
            id: "mole".into(),
            name: "Mole".into(),
            diagnostic: vec![question("m1"), question("m2")],
            practice: vec![question("mp1")],
        };
        let molar = TopicDraft {
            id: "molar-mass".into(),
            name: "Molar mass".into(),
            diagnostic: vec![question("mm1")],
            practice: vec![question("mmp1")],
        };
        Catalog::new(vec![mole.validate().unwrap(), molar.validate().unwrap()]).unwrap()
    }

    #[test]
    fn drops_unknown_topic_and_question() {
        let payload = json!({
            "version": 1,
            "plan": ["mole", "retired-topic", "molar-mass"],
            "answers": { "m1": 1, "ghost": 0, "mm1": 2 },
        });
        let sanitized = sanitize_payload(&catalog(), &payload, fixed_now()).unwrap();

        assert_eq!(sanitized.dropped.plan, 1);
        assert_eq!(sanitized.dropped.answers, 1);
        assert_eq!(sanitized.dropped.significant(), 2);
        assert_eq!(
            sanitized.record.plan,
            vec![TopicId::new("mole"), TopicId::new("molar-mass")]
        );
        assert_eq!(sanitized.record.answers.get("m1"), Some(1));
        assert_eq!(sanitized.record.answers.get("ghost"), None);
        assert_eq!(sanitized.foreign_version, None);
    }

    #[test]
    fn drops_out_of_range_and_non_integer_answers() {
        let payload = json!({
            "answers": { "m1": 3, "m2": 1.5, "mm1": -1 },
        });
        let sanitized = sanitize_payload(&catalog(), &payload, fixed_now()).unwrap();
        assert!(sanitized.record.answers.is_empty());
        assert_eq!(sanitized.dropped.answers, 3);

        let payload = json!({ "answers": { "m1": 2.0 } });
        let sanitized = sanitize_payload(&catalog(), &payload, fixed_now()).unwrap();
        assert_eq!(sanitized.record.answers.get("m1"), Some(2));
    }

    #[test]
    fn filters_revealed_and_day_progress() {
        let payload = json!({
            "plan": ["mole", "molar-mass"],
            "revealed": { "mp1": true, "m1": true, "mmp1": 1 },
            "dayProgress": {
                "0": { "conceptDone": true, "practiceDone": "yes" },
                "1": { "conceptDone": 0 },
                "2": { "conceptDone": true },
                "first": { "conceptDone": true }
            },
        });
        let sanitized = sanitize_payload(&catalog(), &payload, fixed_now()).unwrap();
        let record = &sanitized.record;

        assert!(record.is_revealed("mp1"));
        assert!(record.is_revealed("mmp1"));
        assert!(!record.revealed.contains_key("m1"));
        assert_eq!(sanitized.dropped.revealed, 1);

        assert!(record.is_day_complete(0));
        assert_eq!(record.day(1), DayProgress::default());
        assert_eq!(record.day_progress.len(), 2);
        assert_eq!(sanitized.dropped.day_progress, 2);
    }

    #[test]
    fn day_index_is_clamped_to_sanitized_plan() {
        let payload = json!({ "plan": ["mole", "gone"], "dayIndex": 1 });
        let sanitized = sanitize_payload(&catalog(), &payload, fixed_now()).unwrap();
        assert_eq!(sanitized.record.day_index, 0);
    }

    #[test]
    fn stamps_missing_saved_at_and_keeps_existing() {
        let sanitized = sanitize_payload(&catalog(), &json!({}), fixed_now()).unwrap();
        assert_eq!(sanitized.record.saved_at, Some(fixed_now()));

        let payload = json!({ "savedAt": "2024-02-01T10:00:00.000Z" });
        let sanitized = sanitize_payload(&catalog(), &payload, fixed_now()).unwrap();
        assert_eq!(
            sanitized.record.saved_at.map(|at| at.to_rfc3339()),
            Some("2024-02-01T10:00:00+00:00".to_owned())
        );
    }

    #[test]
    fn reports_foreign_version() {
        let sanitized = sanitize_payload(&catalog(), &json!({ "version": 2 }), fixed_now()).unwrap();
        assert_eq!(sanitized.foreign_version, Some(json!(2)));

        let sanitized =
            sanitize_payload(&catalog(), &json!({ "version": "1" }), fixed_now()).unwrap();
        assert_eq!(sanitized.foreign_version, Some(json!("1")));
    }

    #[test]
    fn rejects_invalid_shapes() {
        let catalog = catalog();
        assert!(matches!(
            sanitize_payload(&catalog, &json!([1, 2]), fixed_now()),
            Err(ImportError::InvalidShape(_))
        ));
        assert!(matches!(
            sanitize_payload(&catalog, &json!({ "plan": "mole" }), fixed_now()),
            Err(ImportError::InvalidShape(_))
        ));
        assert!(matches!(
            sanitize_payload(&catalog, &json!({ "answers": [1] }), fixed_now()),
            Err(ImportError::InvalidShape(_))
        ));
    }

    #[test]
    fn retain_known_prunes_typed_record() {
        let mut record = ProgressRecord {
            plan: vec![TopicId::new("mole"), TopicId::new("gone")],
            day_index: 1,
            ..ProgressRecord::default()
        };
        record.answers.insert(QuestionId::new("m1"), 9);
        record.answers.insert(QuestionId::new("m2"), 1);
        record.revealed.insert(QuestionId::new("old"), true);
        record.day_progress.insert(1, DayProgress::default());

        let dropped = retain_known(&catalog(), &mut record);
        assert_eq!(
            dropped,
            DropCounts {
                plan: 1,
                answers: 1,
                revealed: 1,
                day_progress: 1,
            }
        );
        assert_eq!(record.day_index, 0);
        assert_eq!(record.answers.get("m2"), Some(1));
    }
}
