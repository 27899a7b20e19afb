//! Tool-using ReAct agent over a chat model

pub mod executor;
pub mod output_parser;
pub mod prompt;
pub mod tool;

pub use executor::{AgentExecutor, AgentOutcome, AgentRun, FORCE_STOP_MESSAGE, OBSERVATION_STOP};
pub use output_parser::{AgentStep, OutputParseError};
pub use prompt::{PromptTemplate, RESPONSE_JSON};
pub use tool::{RetrieverTool, Tool, RETRIEVER_TOOL_DESCRIPTION, RETRIEVER_TOOL_NAME};
