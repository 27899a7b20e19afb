//! Decoding of the agent's final answer

use serde::Deserialize;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::{Answer, Question};

#[derive(Debug, Deserialize)]
struct AnswerEntry {
    #[serde(default)]
    question: Option<String>,
    answer: String,
    confidence: Confidence,
}

/// Models report confidence as a number or a numeric string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Confidence {
    Number(f64),
    Text(String),
}

impl Confidence {
    fn value(&self) -> std::result::Result<f64, String> {
        let value = match self {
            Confidence::Number(n) => *n,
            Confidence::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("confidence {:?} is not a number", s))?,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(format!("confidence {} is not finite", value))
        }
    }
}

/// Remove a surrounding Markdown code fence, if any
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Decode one invocation's final answer into an [`Answer`] for `question`.
///
/// The output must be a JSON object keyed by the question id. The answer
/// keeps the question text as asked, not the model's copy of it.
pub fn parse_agent_output(question: &Question, raw: &str) -> Result<Answer> {
    let json = strip_code_fence(raw);

    let mut entries: HashMap<String, AnswerEntry> = serde_json::from_str(json)
        .map_err(|e| Error::response_parse(question.id, format!("{} in {:?}", e, json)))?;

    let key = question.id.to_string();
    let entry = entries.remove(&key).ok_or_else(|| {
        let mut keys: Vec<&String> = entries.keys().collect();
        keys.sort();
        Error::response_parse(
            question.id,
            format!("no entry for question id {} (found keys {:?})", key, keys),
        )
    })?;

    let confidence = entry
        .confidence
        .value()
        .map_err(|msg| Error::response_parse(question.id, msg))?;

    if let Some(echoed) = entry.question.as_deref() {
        if echoed.trim() != question.text.trim() {
            tracing::debug!(
                "Agent restated question {} as {:?}",
                question.id,
                echoed
            );
        }
    }

    Ok(Answer {
        question_id: question.id,
        question: question.text.clone(),
        answer: entry.answer,
        confidence,
    })
}
