use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::model::ids::{QuestionId, TopicId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("topic id cannot be empty")]
    EmptyTopicId,

    #[error("question id cannot be empty")]
    EmptyQuestionId,

    #[error("duplicate topic id: {0}")]
    DuplicateTopic(TopicId),

    #[error("duplicate question id: {0}")]
    DuplicateQuestion(QuestionId),

    #[error("question {0} has no choices")]
    NoChoices(QuestionId),

    #[error("question {id} marks choice {correct} correct but has {choices} choices")]
    CorrectOutOfBounds {
        id: QuestionId,
        correct: usize,
        choices: usize,
    },

    #[error("question bank is not valid JSON: {0}")]
    Parse(String),
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Unvalidated question as it appears in a question bank file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub id: String,
    pub prompt: String,
    pub choices: Vec<String>,
    pub correct: usize,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl QuestionDraft {
    /// Validate the draft into a `Question`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the id is blank, there are no choices, or the
    /// correct index does not point at a choice.
    pub fn validate(self) -> Result<Question, CatalogError> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(CatalogError::EmptyQuestionId);
        }
        let id = QuestionId::new(id);
        if self.choices.is_empty() {
            return Err(CatalogError::NoChoices(id));
        }
        if self.correct >= self.choices.len() {
            return Err(CatalogError::CorrectOutOfBounds {
                id,
                correct: self.correct,
                choices: self.choices.len(),
            });
        }

        Ok(Question {
            id,
            prompt: self.prompt,
            choices: self.choices,
            correct: self.correct,
            explanation: self
                .explanation
                .map(|text| text.trim().to_owned())
                .filter(|text| !text.is_empty()),
            tags: self.tags,
        })
    }
}

/// A multiple-choice question whose correct index is always within its choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    choices: Vec<String>,
    correct: usize,
    explanation: Option<String>,
    tags: Vec<String>,
}

impl Question {
    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    #[must_use]
    pub fn correct(&self) -> usize {
        self.correct
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    #[must_use]
    pub fn is_correct(&self, choice: usize) -> bool {
        choice == self.correct
    }
}

//
// ─── TOPIC ─────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicDraft {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub diagnostic: Vec<QuestionDraft>,
    #[serde(default)]
    pub practice: Vec<QuestionDraft>,
}

impl TopicDraft {
    /// Validate the topic and every question it carries.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for a blank id or any invalid question.
    pub fn validate(self) -> Result<Topic, CatalogError> {
        let id = self.id.trim();
        if id.is_empty() {
            return Err(CatalogError::EmptyTopicId);
        }
        let diagnostic = self
            .diagnostic
            .into_iter()
            .map(QuestionDraft::validate)
            .collect::<Result<Vec<_>, _>>()?;
        let practice = self
            .practice
            .into_iter()
            .map(QuestionDraft::validate)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Topic {
            id: TopicId::new(id),
            name: self.name.trim().to_owned(),
            diagnostic,
            practice,
        })
    }
}

/// A unit of study content with its own diagnostic and practice questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    id: TopicId,
    name: String,
    diagnostic: Vec<Question>,
    practice: Vec<Question>,
}

impl Topic {
    #[must_use]
    pub fn id(&self) -> &TopicId {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn diagnostic(&self) -> &[Question] {
        &self.diagnostic
    }

    #[must_use]
    pub fn practice(&self) -> &[Question] {
        &self.practice
    }
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Deserialize)]
struct CatalogFile {
    topics: Vec<TopicDraft>,
}

/// Read-only question bank with lookup indexes used for validation.
///
/// Topic ids and question ids are unique across the whole catalog. Diagnostic
/// questions are addressed by their position in the flattened, topic-ordered
/// diagnostic sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    topics: Vec<Topic>,
    diagnostic_index: HashMap<QuestionId, (usize, usize)>,
    practice_ids: HashSet<QuestionId>,
    diagnostic_order: Vec<(usize, usize)>,
}

impl Catalog {
    /// Build a catalog from validated topics.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateTopic` or `CatalogError::DuplicateQuestion`
    /// when identifiers collide.
    pub fn new(topics: Vec<Topic>) -> Result<Self, CatalogError> {
        let mut topic_ids = HashSet::new();
        let mut seen_questions = HashSet::new();
        let mut diagnostic_index = HashMap::new();
        let mut practice_ids = HashSet::new();
        let mut diagnostic_order = Vec::new();

        for (topic_pos, topic) in topics.iter().enumerate() {
            if !topic_ids.insert(topic.id.clone()) {
                return Err(CatalogError::DuplicateTopic(topic.id.clone()));
            }
            for (question_pos, question) in topic.diagnostic.iter().enumerate() {
                if !seen_questions.insert(question.id.clone()) {
                    return Err(CatalogError::DuplicateQuestion(question.id.clone()));
                }
                diagnostic_index.insert(question.id.clone(), (topic_pos, question_pos));
                diagnostic_order.push((topic_pos, question_pos));
            }
            for question in &topic.practice {
                if !seen_questions.insert(question.id.clone()) {
                    return Err(CatalogError::DuplicateQuestion(question.id.clone()));
                }
                practice_ids.insert(question.id.clone());
            }
        }

        Ok(Self {
            topics,
            diagnostic_index,
            practice_ids,
            diagnostic_order,
        })
    }

    /// Parse and validate a JSON question bank of the form `{ "topics": [...] }`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Parse` for malformed JSON, or any validation error.
    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            serde_json::from_str(raw).map_err(|err| CatalogError::Parse(err.to_string()))?;
        let topics = file
            .topics
            .into_iter()
            .map(TopicDraft::validate)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(topics)
    }

    #[must_use]
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    #[must_use]
    pub fn topic(&self, id: &str) -> Option<&Topic> {
        self.topics.iter().find(|topic| topic.id.as_str() == id)
    }

    #[must_use]
    pub fn contains_topic(&self, id: &str) -> bool {
        self.topic(id).is_some()
    }

    /// Number of choices for a diagnostic question, if the id is a known diagnostic question.
    #[must_use]
    pub fn diagnostic_choice_count(&self, id: &str) -> Option<usize> {
        self.diagnostic_question(id).map(|q| q.choices.len())
    }

    #[must_use]
    pub fn diagnostic_question(&self, id: &str) -> Option<&Question> {
        self.diagnostic_index
            .get(id)
            .map(|&(topic, question)| &self.topics[topic].diagnostic[question])
    }

    #[must_use]
    pub fn is_practice_question(&self, id: &str) -> bool {
        self.practice_ids.contains(id)
    }

    /// Total number of diagnostic questions across all topics.
    #[must_use]
    pub fn diagnostic_len(&self) -> usize {
        self.diagnostic_order.len()
    }

    /// Diagnostic question at a position in the flattened sequence.
    #[must_use]
    pub fn diagnostic_at(&self, position: usize) -> Option<&Question> {
        self.diagnostic_order
            .get(position)
            .map(|&(topic, question)| &self.topics[topic].diagnostic[question])
    }

    /// Position of a diagnostic question in the flattened sequence.
    #[must_use]
    pub fn diagnostic_position(&self, id: &str) -> Option<usize> {
        let &(topic, question) = self.diagnostic_index.get(id)?;
        let before: usize = self.topics[..topic]
            .iter()
            .map(|t| t.diagnostic.len())
            .sum();
        Some(before + question)
    }

    /// Diagnostic questions in flattened order, paired with their topic.
    pub fn diagnostic_questions(&self) -> impl Iterator<Item = (&Topic, &Question)> {
        self.topics
            .iter()
            .flat_map(|topic| topic.diagnostic.iter().map(move |q| (topic, q)))
    }
}
