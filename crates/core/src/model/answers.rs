use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::ids::QuestionId;

/// Sparse mapping from diagnostic question to the chosen choice index.
///
/// A missing key means "not answered yet"; `Some(0)` is a real answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerMap(BTreeMap<QuestionId, usize>);

impl AnswerMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, question: &str) -> Option<usize> {
        self.0.get(question).copied()
    }

    #[must_use]
    pub fn contains(&self, question: &str) -> bool {
        self.0.contains_key(question)
    }

    /// Insert or overwrite an answer, returning the previous choice if any.
    pub fn insert(&mut self, question: QuestionId, choice: usize) -> Option<usize> {
        self.0.insert(question, choice)
    }

    pub fn remove(&mut self, question: &str) -> Option<usize> {
        self.0.remove(question)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QuestionId, usize)> {
        self.0.iter().map(|(id, choice)| (id, *choice))
    }
}

impl FromIterator<(QuestionId, usize)> for AnswerMap {
    fn from_iter<I: IntoIterator<Item = (QuestionId, usize)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
