//! Per-topic mastery derived from diagnostic answers.

use crate::model::{AnswerMap, Topic, TopicId};

/// Correctness summary for one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMastery {
    pub topic_id: TopicId,
    pub correct: usize,
    pub answered: usize,
    pub total: usize,
    /// Rounded percentage of *answered* questions that were correct, in `0..=100`.
    pub mastery: u8,
}

impl TopicMastery {
    #[must_use]
    pub fn has_questions(&self) -> bool {
        self.total > 0
    }
}

/// Mastery for every topic, in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MasterySummary {
    topics: Vec<TopicMastery>,
}

impl MasterySummary {
    #[must_use]
    pub fn topics(&self) -> &[TopicMastery] {
        &self.topics
    }

    #[must_use]
    pub fn get(&self, topic: &str) -> Option<&TopicMastery> {
        self.topics.iter().find(|t| t.topic_id.as_str() == topic)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

impl FromIterator<TopicMastery> for MasterySummary {
    fn from_iter<I: IntoIterator<Item = TopicMastery>>(iter: I) -> Self {
        Self {
            topics: iter.into_iter().collect(),
        }
    }
}

/// Compute the mastery summary for `topics` given the current answers.
///
/// The denominator is the number of answered questions, so a partially
/// completed diagnostic does not drag a topic down. Topics with nothing
/// answered report 0.
#[must_use]
pub fn compute_mastery(topics: &[Topic], answers: &AnswerMap) -> MasterySummary {
    topics
        .iter()
        .map(|topic| {
            let mut correct = 0;
            let mut answered = 0;
            for question in topic.diagnostic() {
                if let Some(choice) = answers.get(question.id().as_str()) {
                    answered += 1;
                    if question.is_correct(choice) {
                        correct += 1;
                    }
                }
            }
            TopicMastery {
                topic_id: topic.id().clone(),
                correct,
                answered,
                total: topic.diagnostic().len(),
                mastery: percentage(correct, answered),
            }
        })
        .collect()
}

fn percentage(correct: usize, answered: usize) -> u8 {
    if answered == 0 {
        return 0;
    }
    // round-half-up of correct / answered * 100
    let rounded = (correct * 200 + answered) / (answered * 2);
    u8::try_from(rounded.min(100)).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{QuestionDraft, QuestionId, TopicDraft};

    fn topic(id: &str, questions: usize) -> Topic {
        TopicDraft {
            id: id.into(),
            name: id.into(),
            diagnostic: (0..questions)
                .map(|n| QuestionDraft {
                    id: format!("{id}-{n}"),
                    prompt: String::new(),
                    choices: vec!["right".into(), "wrong".into()],
                    correct: 0,
                    ..QuestionDraft::default()
                })
                .collect(),
            practice: Vec::new(),
        }
        .validate()
        .unwrap()
    }

    fn answer(answers: &mut AnswerMap, id: &str, choice: usize) {
        answers.insert(QuestionId::new(id), choice);
    }

    #[test]
    fn uses_answered_count_as_denominator() {
        let topics = vec![topic("mole", 3), topic("molar-mass", 2)];
        let mut answers = AnswerMap::new();
        for n in 0..3 {
            answer(&mut answers, &format!("mole-{n}"), 0);
        }

        let summary = compute_mastery(&topics, &answers);
        let mole = summary.get("mole").unwrap();
        assert_eq!((mole.correct, mole.answered, mole.total, mole.mastery), (3, 3, 3, 100));
        let molar = summary.get("molar-mass").unwrap();
        assert_eq!((molar.correct, molar.answered, molar.total, molar.mastery), (0, 0, 2, 0));
    }

    #[test]
    fn partial_answers_are_not_penalized() {
        let topics = vec![topic("mole", 4)];
        let mut answers = AnswerMap::new();
        answer(&mut answers, "mole-0", 0);
        let summary = compute_mastery(&topics, &answers);
        assert_eq!(summary.topics()[0].mastery, 100);
    }

    #[test]
    fn topic_without_questions_reports_zero() {
        let topics = vec![topic("empty", 0)];
        let summary = compute_mastery(&topics, &AnswerMap::new());
        let empty = &summary.topics()[0];
        assert_eq!((empty.answered, empty.total, empty.mastery), (0, 0, 0));
        assert!(!empty.has_questions());
    }

    #[test]
    fn rounds_half_up_and_stays_in_range() {
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13);
        assert_eq!(percentage(0, 5), 0);
        assert_eq!(percentage(5, 5), 100);
        for answered in 1..40 {
            for correct in 0..=answered {
                assert!(percentage(correct, answered) <= 100);
            }
        }
    }

    #[test]
    fn ignores_answers_for_other_topics() {
        let topics = vec![topic("mole", 2)];
        let mut answers = AnswerMap::new();
        answer(&mut answers, "unknown", 0);
        answer(&mut answers, "mole-1", 1);
        let summary = compute_mastery(&topics, &answers);
        let mole = &summary.topics()[0];
        assert_eq!((mole.correct, mole.answered, mole.mastery), (0, 1, 0));
    }
}
