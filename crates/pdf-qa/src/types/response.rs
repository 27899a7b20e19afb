//! HTTP response types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::question::Answer;

/// Body of a successful `POST /process-and-query/`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResponse {
    /// Question text -> answer text (or the sentinel), in question order
    pub responses: Map<String, Value>,
}

impl ProcessResponse {
    /// Build the response map from answers with distinct question texts
    pub fn from_answers(answers: &[Answer], threshold: f64) -> Self {
        let responses = answers
            .iter()
            .map(|a| {
                (
                    a.question.clone(),
                    Value::String(a.resolved_text(threshold).to_string()),
                )
            })
            .collect();
        Self { responses }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DATA_NOT_AVAILABLE;

    #[test]
    fn test_from_answers_preserves_order_and_filters() {
        let answers = vec![
            Answer {
                question_id: 1,
                question: "What color is the sky?".into(),
                answer: "blue".into(),
                confidence: 0.92,
            },
            Answer {
                question_id: 2,
                question: "Who won the 1998 World Cup?".into(),
                answer: "France".into(),
                confidence: 0.05,
            },
        ];

        let response = ProcessResponse::from_answers(&answers, 0.30);
        let keys: Vec<&String> = response.responses.keys().collect();
        assert_eq!(keys, vec!["What color is the sky?", "Who won the 1998 World Cup?"]);
        assert_eq!(response.responses["What color is the sky?"], "blue");
        assert_eq!(response.responses["Who won the 1998 World Cup?"], DATA_NOT_AVAILABLE);
    }

    #[test]
    fn test_no_answers_serialize_to_empty_object() {
        let json = serde_json::to_value(ProcessResponse::from_answers(&[], 0.30)).unwrap();
        assert_eq!(json, serde_json::json!({ "responses": {} }));
    }
}
