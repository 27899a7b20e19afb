//! ReAct agent loop

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{AgentConfig, EarlyStopping};
use crate::error::{Error, Result};
use crate::providers::{ChatModel, Message, TokenUsage};

use super::output_parser::{parse, AgentStep};
use super::prompt::PromptTemplate;
use super::tool::{render_tool_names, render_tools, Tool};

/// Stop sequence so the model does not invent its own observations
pub const OBSERVATION_STOP: &str = "\nObservation:";

pub const FORCE_STOP_MESSAGE: &str = "Agent stopped due to iteration limit or time limit.";

const GENERATE_FINAL_PROMPT: &str =
    "\n\nI now need to return a final answer based on the previous steps:";

/// How an agent run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome {
    /// The model produced a final answer
    Finished(String),
    /// Limits were hit and the run was stopped without an answer
    Stopped(String),
}

/// Result of one agent invocation
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub outcome: AgentOutcome,
    /// Tokens used across every model call of the run
    pub usage: TokenUsage,
    /// Model calls made inside the loop
    pub iterations: usize,
}

/// Runs a tool-using model until it answers or hits its limits.
///
/// The executor is shared by every question of a request and holds no
/// per-run state.
pub struct AgentExecutor {
    llm: Arc<dyn ChatModel>,
    tools: Vec<Arc<dyn Tool>>,
    prompt: PromptTemplate,
    max_iterations: usize,
    max_execution_time: Option<Duration>,
    early_stopping: EarlyStopping,
    handle_parsing_errors: bool,
}

impl AgentExecutor {
    pub fn new(
        llm: Arc<dyn ChatModel>,
        tools: Vec<Arc<dyn Tool>>,
        prompt: PromptTemplate,
        config: &AgentConfig,
    ) -> Self {
        Self {
            llm,
            tools,
            prompt,
            max_iterations: config.max_iterations,
            max_execution_time: config.max_execution_secs.map(Duration::from_secs),
            early_stopping: config.early_stopping,
            handle_parsing_errors: config.handle_parsing_errors,
        }
    }

    fn should_continue(&self, iterations: usize, started: Instant) -> bool {
        if iterations >= self.max_iterations {
            return false;
        }
        match self.max_execution_time {
            Some(limit) => started.elapsed() < limit,
            None => true,
        }
    }

    fn find_tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Build the prompt for the next model call
    fn render(&self, inputs: &HashMap<&str, String>, scratchpad: String) -> Result<String> {
        let mut values = inputs.clone();
        values.insert("tools", render_tools(&self.tools));
        values.insert("tool_names", render_tool_names(&self.tools));
        values.insert("agent_scratchpad", scratchpad);
        self.prompt.render(&values)
    }

    async fn call_model(&self, prompt: String, usage: &mut TokenUsage) -> Result<String> {
        let completion = self
            .llm
            .chat(&[Message::user(prompt)], &[OBSERVATION_STOP.to_string()])
            .await?;
        *usage += completion.usage.unwrap_or_default();
        Ok(completion.content)
    }

    /// Run the agent with the caller's prompt variables
    pub async fn invoke(&self, inputs: HashMap<&str, String>) -> Result<AgentRun> {
        let started = Instant::now();
        let mut steps: Vec<(String, String)> = Vec::new();
        let mut usage = TokenUsage::default();
        let mut iterations = 0;

        while self.should_continue(iterations, started) {
            let prompt = self.render(&inputs, format_scratchpad(&steps))?;
            let output = self.call_model(prompt, &mut usage).await?;
            iterations += 1;

            match parse(&output) {
                Ok(AgentStep::Finish { output, .. }) => {
                    tracing::debug!("Agent finished after {} iterations", iterations);
                    return Ok(AgentRun {
                        outcome: AgentOutcome::Finished(output),
                        usage,
                        iterations,
                    });
                }
                Ok(AgentStep::Action {
                    tool,
                    tool_input,
                    log,
                }) => {
                    let observation = match self.find_tool(&tool) {
                        Some(t) => {
                            tracing::debug!("Agent calling {} with {:?}", tool, tool_input);
                            t.call(&tool_input).await?
                        }
                        None => {
                            tracing::warn!("Agent asked for unknown tool {:?}", tool);
                            format!(
                                "{} is not a valid tool, try one of [{}].",
                                tool,
                                render_tool_names(&self.tools)
                            )
                        }
                    };
                    steps.push((log, observation));
                }
                Err(e) if self.handle_parsing_errors => {
                    tracing::warn!("Agent output parse error: {}", e.observation);
                    steps.push((e.llm_output, e.observation));
                }
                Err(e) => return Err(Error::Agent(e.to_string())),
            }
        }

        tracing::warn!(
            "Agent hit its limits after {} iterations in {:?}",
            iterations,
            started.elapsed()
        );

        let outcome = match self.early_stopping {
            EarlyStopping::Force => AgentOutcome::Stopped(FORCE_STOP_MESSAGE.to_string()),
            EarlyStopping::Generate => {
                let scratchpad = format!("{}{}", format_scratchpad(&steps), GENERATE_FINAL_PROMPT);
                let prompt = self.render(&inputs, scratchpad)?;
                let output = self.call_model(prompt, &mut usage).await?;
                match parse(&output) {
                    Ok(AgentStep::Finish { output, .. }) => AgentOutcome::Finished(output),
                    _ => AgentOutcome::Finished(output),
                }
            }
        };

        Ok(AgentRun {
            outcome,
            usage,
            iterations,
        })
    }
}

/// Render previous steps as `log\nObservation: obs\nThought: `
fn format_scratchpad(steps: &[(String, String)]) -> String {
    let mut thoughts = String::new();
    for (log, observation) in steps {
        thoughts.push_str(log);
        thoughts.push_str("\nObservation: ");
        thoughts.push_str(observation);
        thoughts.push_str("\nThought: ");
    }
    thoughts
}
