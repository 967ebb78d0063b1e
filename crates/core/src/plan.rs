//! Remediation plan generation: weakest topics first, one topic per day.

use crate::mastery::{MasterySummary, TopicMastery};
use crate::model::TopicId;

/// Default number of study days in a generated plan.
pub const DEFAULT_PLAN_DAYS: usize = 7;

/// Ordered topic assignments, one per study day.
///
/// An empty plan means no topic was eligible; callers must refuse to proceed
/// rather than store it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan(Vec<TopicId>);

impl Plan {
    #[must_use]
    pub fn days(&self) -> &[TopicId] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_days(self) -> Vec<TopicId> {
        self.0
    }
}

/// Rank topics by ascending mastery and cycle through them to fill `days`.
///
/// Ties keep input order. Topics without diagnostic questions are only used
/// when no topic has any, so "no data" topics (which report 0%) do not crowd
/// out genuinely weak ones.
#[must_use]
pub fn generate_plan(summary: &MasterySummary, days: usize) -> Plan {
    let mut ranked: Vec<&TopicMastery> = summary.topics().iter().collect();
    ranked.sort_by_key(|t| t.mastery);

    let with_questions: Vec<&TopicMastery> =
        ranked.iter().copied().filter(|t| t.has_questions()).collect();
    let pool = if with_questions.is_empty() {
        ranked
    } else {
        with_questions
    };

    if pool.is_empty() {
        return Plan::default();
    }

    Plan(
        (0..days)
            .map(|day| pool[day % pool.len()].topic_id.clone())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mastery(id: &str, mastery: u8, total: usize) -> TopicMastery {
        TopicMastery {
            topic_id: TopicId::new(id),
            correct: 0,
            answered: total,
            total,
            mastery,
        }
    }

    fn ids(plan: &Plan) -> Vec<&str> {
        plan.days().iter().map(TopicId::as_str).collect()
    }

    #[test]
    fn cycles_weakest_first() {
        let summary: MasterySummary =
            vec![mastery("mole", 100, 3), mastery("molar-mass", 0, 2)].into_iter().collect();
        let plan = generate_plan(&summary, 3);
        assert_eq!(ids(&plan), ["molar-mass", "mole", "molar-mass"]);
    }

    #[test]
    fn fills_requested_days() {
        let summary: MasterySummary = vec![
            mastery("a", 50, 2),
            mastery("b", 20, 2),
            mastery("c", 80, 2),
        ]
        .into_iter()
        .collect();
        let plan = generate_plan(&summary, DEFAULT_PLAN_DAYS);
        assert_eq!(plan.len(), 7);
        assert_eq!(ids(&plan), ["b", "a", "c", "b", "a", "c", "b"]);
    }

    #[test]
    fn ties_keep_input_order() {
        let summary: MasterySummary = vec![
            mastery("first", 40, 1),
            mastery("second", 40, 1),
            mastery("weak", 10, 1),
        ]
        .into_iter()
        .collect();
        let plan = generate_plan(&summary, 3);
        assert_eq!(ids(&plan), ["weak", "first", "second"]);
    }

    #[test]
    fn topics_without_questions_do_not_dominate() {
        let summary: MasterySummary =
            vec![mastery("empty", 0, 0), mastery("weak", 30, 2)].into_iter().collect();
        let plan = generate_plan(&summary, 2);
        assert_eq!(ids(&plan), ["weak", "weak"]);
    }

    #[test]
    fn falls_back_to_unfiltered_ranking() {
        let summary: MasterySummary =
            vec![mastery("x", 0, 0), mastery("y", 0, 0)].into_iter().collect();
        let plan = generate_plan(&summary, 3);
        assert_eq!(ids(&plan), ["x", "y", "x"]);
    }

    #[test]
    fn no_topics_yields_empty_plan() {
        let plan = generate_plan(&MasterySummary::default(), DEFAULT_PLAN_DAYS);
        assert!(plan.is_empty());
    }
}
