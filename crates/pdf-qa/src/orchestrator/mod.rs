//! Query orchestration: one uploaded PDF, many questions, one agent run per question

mod answers;

pub use answers::parse_agent_output;

use bytes::Bytes;
use futures::future::try_join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::agent::{AgentExecutor, AgentOutcome, PromptTemplate, RetrieverTool, Tool, RESPONSE_JSON};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::ingestion::{DocumentLoader, ScopedUpload};
use crate::providers::{ChatModel, EmbeddingProvider, TokenUsage, VectorCollection, VectorStoreProvider};
use crate::types::{Answer, Chunk, ProcessResponse, Question};

/// Turns an uploaded PDF and its questions into confidence-filtered answers
pub struct QueryOrchestrator {
    config: Arc<AppConfig>,
    embedder: Arc<dyn EmbeddingProvider>,
    chat: Arc<dyn ChatModel>,
    store: Arc<dyn VectorStoreProvider>,
}

impl QueryOrchestrator {
    pub fn new(
        config: Arc<AppConfig>,
        embedder: Arc<dyn EmbeddingProvider>,
        chat: Arc<dyn ChatModel>,
        store: Arc<dyn VectorStoreProvider>,
    ) -> Self {
        Self {
            config,
            embedder,
            chat,
            store,
        }
    }

    /// Answer every question about the uploaded file.
    ///
    /// Returns one answer per question, in input order. Any failure fails
    /// the whole request.
    pub async fn handle(
        &self,
        filename: &str,
        data: Bytes,
        questions: Vec<Question>,
    ) -> Result<Vec<Answer>> {
        if questions.is_empty() {
            tracing::info!("No questions for {}, skipping ingestion", filename);
            return Ok(Vec::new());
        }

        let started = Instant::now();
        match self.run(filename, data, &questions).await {
            Ok(answers) => {
                tracing::info!(
                    "Answered {} questions about {} in {:?}",
                    answers.len(),
                    filename,
                    started.elapsed()
                );
                Ok(answers)
            }
            Err(e) => {
                tracing::error!("Error processing {} and handling queries: {}", filename, e);
                Err(e)
            }
        }
    }

    /// Answer and render the question-text → answer-text mapping
    pub async fn process(
        &self,
        filename: &str,
        data: Bytes,
        questions: Vec<Question>,
    ) -> Result<ProcessResponse> {
        let answers = self.handle(filename, data, questions).await?;
        Ok(self.format_answers(&answers))
    }

    /// Apply the confidence threshold and key answers by question text
    pub fn format_answers(&self, answers: &[Answer]) -> ProcessResponse {
        ProcessResponse::from_answers(answers, self.config.agent.confidence_threshold)
    }

    async fn run(&self, filename: &str, data: Bytes, questions: &[Question]) -> Result<Vec<Answer>> {
        check_unique_questions(questions)?;

        let request_id = Uuid::new_v4();
        tracing::info!(
            "Request {}: {} ({} bytes), {} questions",
            request_id,
            filename,
            data.len(),
            questions.len()
        );

        // Lives until the end of the request; the file is removed on drop
        let upload =
            ScopedUpload::persist(self.config.upload.temp_dir.clone(), filename, data).await?;
        tracing::debug!(
            "Stored {} ({} bytes) at {}",
            upload.filename(),
            upload.size(),
            upload.path().display()
        );

        let chunks = self.load_chunks(&upload).await?;
        let collection = self.index_chunks(request_id, chunks).await?;

        let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(RetrieverTool::new(
            Arc::clone(&self.embedder),
            collection,
            self.config.vector_db.top_k,
        ))];
        let executor = AgentExecutor::new(
            Arc::clone(&self.chat),
            tools,
            PromptTemplate::react(),
            &self.config.agent,
        );
        tracing::info!(
            "Agent ready (model {}, max {} iterations)",
            self.chat.model(),
            self.config.agent.max_iterations
        );

        let results =
            try_join_all(questions.iter().map(|q| self.ask(&executor, q))).await?;

        let usage: TokenUsage = results.iter().map(|(_, usage)| *usage).sum();
        tracing::info!(
            "Request {} token usage: prompt={} completion={} total={}",
            request_id,
            usage.prompt_tokens,
            usage.completion_tokens,
            usage.total_tokens
        );

        drop(upload);
        Ok(results.into_iter().map(|(answer, _)| answer).collect())
    }

    async fn load_chunks(&self, upload: &ScopedUpload) -> Result<Vec<Chunk>> {
        let loader = DocumentLoader::new(&self.config.chunking);
        let path = upload.path().to_path_buf();
        let filename = upload.filename().to_string();

        tokio::task::spawn_blocking(move || loader.load(&path, &filename)).await?
    }

    async fn index_chunks(
        &self,
        request_id: Uuid,
        mut chunks: Vec<Chunk>,
    ) -> Result<Arc<dyn VectorCollection>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(Error::embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }
        if let Some(first) = embeddings.first() {
            if first.len() != self.embedder.dimensions() {
                tracing::warn!(
                    "{} returned {}-dimensional embeddings, configured for {}",
                    self.embedder.name(),
                    first.len(),
                    self.embedder.dimensions()
                );
            }
        }
        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            chunk.embedding = embedding;
        }

        let collection = self
            .store
            .create_collection(&format!("pdfqa-{}", request_id))
            .await?;
        collection.insert_chunks(&chunks).await?;

        tracing::info!(
            "Indexed {} chunks into {} ({})",
            chunks.len(),
            collection.name(),
            self.embedder.name()
        );
        Ok(collection)
    }

    /// One bounded agent invocation, decoded into an answer
    async fn ask(&self, executor: &AgentExecutor, question: &Question) -> Result<(Answer, TokenUsage)> {
        let inputs = HashMap::from([
            ("question_id", question.id.to_string()),
            ("question", question.text.clone()),
            ("response_json", RESPONSE_JSON.to_string()),
        ]);

        let limit = Duration::from_secs(self.config.agent.question_timeout_secs);
        let run = tokio::time::timeout(limit, executor.invoke(inputs))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "question {} exceeded {}s",
                    question.id,
                    limit.as_secs()
                ))
            })??;

        let answer = match run.outcome {
            AgentOutcome::Finished(output) => parse_agent_output(question, &output)?,
            AgentOutcome::Stopped(reason) => {
                tracing::warn!("Question {} stopped early: {}", question.id, reason);
                Answer {
                    question_id: question.id,
                    question: question.text.clone(),
                    answer: reason,
                    confidence: 0.0,
                }
            }
        };

        tracing::debug!(
            "Question {} answered after {} iterations (confidence {})",
            question.id,
            run.iterations,
            answer.confidence
        );
        Ok((answer, run.usage))
    }
}

/// Answers are keyed by id inside a request and by text in the response
fn check_unique_questions(questions: &[Question]) -> Result<()> {
    let mut ids = HashSet::new();
    let mut texts = HashSet::new();
    for q in questions {
        if !ids.insert(q.id) {
            return Err(Error::InvalidRequest(format!("duplicate question id {}", q.id)));
        }
        if !texts.insert(q.text.as_str()) {
            return Err(Error::InvalidRequest(format!("duplicate question: {:?}", q.text)));
        }
    }
    Ok(())
}
