//! Tools the agent can call

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::providers::{EmbeddingProvider, VectorCollection};

/// A named, described callable exposed to the agent
#[async_trait]
pub trait Tool: Send + Sync {
    /// The name the model uses in `Action:`
    fn name(&self) -> &str;

    /// What the tool does, shown to the model
    fn description(&self) -> &str;

    /// Run the tool on the raw `Action Input:` text
    async fn call(&self, input: &str) -> Result<String>;
}

pub const RETRIEVER_TOOL_NAME: &str = "pdf_content_retriever";
pub const RETRIEVER_TOOL_DESCRIPTION: &str =
    "Searches and returns excerpts from the uploaded PDF document.";

/// Similarity search over one document collection
pub struct RetrieverTool {
    embedder: Arc<dyn EmbeddingProvider>,
    collection: Arc<dyn VectorCollection>,
    top_k: usize,
}

impl RetrieverTool {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        collection: Arc<dyn VectorCollection>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            collection,
            top_k,
        }
    }
}

#[async_trait]
impl Tool for RetrieverTool {
    fn name(&self) -> &str {
        RETRIEVER_TOOL_NAME
    }

    fn description(&self) -> &str {
        RETRIEVER_TOOL_DESCRIPTION
    }

    async fn call(&self, input: &str) -> Result<String> {
        let query = input.trim().trim_matches('"');
        let embedding = self.embedder.embed(query).await?;
        let results = self.collection.search(&embedding, self.top_k).await?;

        tracing::debug!(
            "Retrieved {} excerpts from {} for {:?}",
            results.len(),
            self.collection.name(),
            query
        );

        Ok(results
            .iter()
            .map(|r| r.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

/// Render tools as `name: description` lines for the prompt
pub fn render_tools(tools: &[Arc<dyn Tool>]) -> String {
    tools
        .iter()
        .map(|t| format!("{}: {}", t.name(), t.description()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Comma-separated tool names for the prompt
pub fn render_tool_names(tools: &[Arc<dyn Tool>]) -> String {
    tools
        .iter()
        .map(|t| t.name())
        .collect::<Vec<_>>()
        .join(", ")
}
