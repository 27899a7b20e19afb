//! Question and answer types

use serde::{Deserialize, Serialize};

/// Text returned in place of an answer whose confidence is too low
pub const DATA_NOT_AVAILABLE: &str = "Data Not Available";

/// A question asked about the uploaded document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Identifier, unique within one request
    pub id: u32,
    /// Free-text question
    pub text: String,
}

impl Question {
    /// Create a question with an explicit id
    pub fn new(id: u32, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }

    /// Number questions by position, starting at 1
    pub fn numbered<I, S>(texts: I) -> Vec<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        texts
            .into_iter()
            .zip(1u32..)
            .map(|(text, id)| Self::new(id, text))
            .collect()
    }
}

/// The agent's answer to one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Id of the question this answers
    pub question_id: u32,
    /// Question text as asked
    pub question: String,
    /// Answer text produced by the agent
    pub answer: String,
    /// Confidence reported by the agent (not clamped)
    pub confidence: f64,
}

impl Answer {
    /// Whether the answer is trusted under the given threshold
    pub fn is_confident(&self, threshold: f64) -> bool {
        self.confidence > threshold
    }

    /// Answer text, or [`DATA_NOT_AVAILABLE`] when confidence is at or below `threshold`
    pub fn resolved_text(&self, threshold: f64) -> &str {
        if self.is_confident(threshold) {
            &self.answer
        } else {
            DATA_NOT_AVAILABLE
        }
    }
}
