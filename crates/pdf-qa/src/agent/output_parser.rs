//! Parser for ReAct-style model output

use once_cell::sync::Lazy;
use regex::Regex;

const FINAL_ANSWER: &str = "Final Answer:";

static ACTION_WITH_INPUT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)").unwrap()
});
static ACTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)").unwrap());
static ACTION_INPUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)").unwrap());

pub const MISSING_ACTION: &str = "Invalid Format: Missing 'Action:' after 'Thought:'";
pub const MISSING_ACTION_INPUT: &str = "Invalid Format: Missing 'Action Input:' after 'Action:'";
pub const INVALID_RESPONSE: &str = "Invalid or incomplete response";

/// One decoded model turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStep {
    /// Call `tool` with `tool_input`
    Action {
        tool: String,
        tool_input: String,
        log: String,
    },
    /// The model is done
    Finish { output: String, log: String },
}

/// Model output that could not be decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputParseError {
    /// Human-readable reason
    pub message: String,
    /// Observation to feed back to the model when parse errors are tolerated
    pub observation: String,
    /// The raw model output
    pub llm_output: String,
}

impl std::fmt::Display for OutputParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Decode one model turn
pub fn parse(text: &str) -> Result<AgentStep, OutputParseError> {
    let includes_answer = text.contains(FINAL_ANSWER);

    if let Some(caps) = ACTION_WITH_INPUT.captures(text) {
        if includes_answer {
            return Err(OutputParseError {
                message: format!(
                    "Parsing LLM output produced both a final answer and a parse-able action: {}",
                    text
                ),
                observation: INVALID_RESPONSE.to_string(),
                llm_output: text.to_string(),
            });
        }

        let tool = caps[1].trim().to_string();
        let tool_input = caps[2].trim_matches(' ').trim_matches('"').to_string();
        return Ok(AgentStep::Action {
            tool,
            tool_input,
            log: text.to_string(),
        });
    }

    if includes_answer {
        let output = text
            .rsplit(FINAL_ANSWER)
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        return Ok(AgentStep::Finish {
            output,
            log: text.to_string(),
        });
    }

    let observation = if !ACTION.is_match(text) {
        MISSING_ACTION
    } else if !ACTION_INPUT.is_match(text) {
        MISSING_ACTION_INPUT
    } else {
        INVALID_RESPONSE
    };

    Err(OutputParseError {
        message: format!("Could not parse LLM output: `{}`", text),
        observation: observation.to_string(),
        llm_output: text.to_string(),
    })
}
