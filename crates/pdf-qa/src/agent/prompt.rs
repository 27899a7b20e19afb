//! Prompt template for the question-answering agent

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::error::{Error, Result};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([a-z_]+)\}").unwrap());

/// Format instruction for the agent's final answer
pub const RESPONSE_JSON: &str = r#"{
    "<question_id>": {
        "question": "<question text>",
        "answer": "<answer text>",
        "confidence": <number between 0 and 1>
    }
}"#;

/// The ReAct prompt used for every question
pub const REACT_TEMPLATE: &str = r#"Answer the following question about the uploaded PDF document as best you can. You have access to the following tools:

{tools}

Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question

Always search the PDF document before answering. Rate your confidence between 0 and 1 by how closely the retrieved excerpts match the question, and use a confidence of 0 when the document does not contain the answer. Keep descriptive answers to about 90 characters with all significant details.

The Final Answer must be only a JSON object shaped like:
{response_json}
with "{question_id}" as the key and the question text exactly as asked.

Begin!

Question: {question}
Thought:{agent_scratchpad}"#;

/// A template with `{name}` placeholders
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
    variables: Vec<String>,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let mut variables: Vec<String> = Vec::new();
        for cap in PLACEHOLDER.captures_iter(&template) {
            let name = cap[1].to_string();
            if !variables.contains(&name) {
                variables.push(name);
            }
        }
        Self {
            template,
            variables,
        }
    }

    /// The ReAct template
    pub fn react() -> Self {
        Self::new(REACT_TEMPLATE)
    }

    /// Placeholder names in order of first appearance
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Substitute every placeholder; a missing value is a configuration error
    pub fn render(&self, values: &HashMap<&str, String>) -> Result<String> {
        let missing: Vec<&str> = self
            .variables
            .iter()
            .map(String::as_str)
            .filter(|v| !values.contains_key(v))
            .collect();
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "Missing prompt variables: {}",
                missing.join(", ")
            )));
        }

        // Single pass, so braces inside substituted values are left alone
        Ok(PLACEHOLDER
            .replace_all(&self.template, |caps: &regex::Captures| {
                values.get(&caps[1]).cloned().unwrap_or_default()
            })
            .into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_react_variables() {
        let template = PromptTemplate::react();
        let mut vars: Vec<&str> = template.variables().iter().map(String::as_str).collect();
        vars.sort_unstable();
        assert_eq!(
            vars,
            vec![
                "agent_scratchpad",
                "question",
                "question_id",
                "response_json",
                "tool_names",
                "tools"
            ]
        );
    }

    #[test]
    fn test_render_substitutes_once() {
        let template = PromptTemplate::new("Q{question_id}: {question} -> {response_json}");
        let values = HashMap::from([
            ("question_id", "3".to_string()),
            ("question", "Why?".to_string()),
            ("response_json", "{\"{question}\": 1}".to_string()),
        ]);
        assert_eq!(
            template.render(&values).unwrap(),
            "Q3: Why? -> {\"{question}\": 1}"
        );
    }

    #[test]
    fn test_missing_variable_is_config_error() {
        let template = PromptTemplate::new("{tools} {question}");
        let values = HashMap::from([("tools", "x".to_string())]);
        let err = template.render(&values).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("question")));
    }
}
