//! Shared fixtures: deterministic providers and in-process PDFs
#![allow(dead_code)]

use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pdf_qa::config::AppConfig;
use pdf_qa::providers::{
    ChatCompletion, ChatModel, EmbeddingProvider, MemoryVectorStore, Message, TokenUsage,
};
use pdf_qa::server::state::AppState;
use pdf_qa::{QueryOrchestrator, Result};

pub const DIMENSIONS: usize = 64;

/// Bag-of-words embedder: each lowercase word is hashed into one of 64 buckets
pub struct HashEmbedder;

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            v[(hasher.finish() % DIMENSIONS as u64) as usize] += 1.0;
        }
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "hash"
    }
}

type AnswerFn = dyn Fn(&str, &str) -> String + Send + Sync;

/// A chat model that follows the ReAct protocol: it searches once with the
/// question, then hands the question and observation to `answer` to produce
/// the final answer text.
pub struct FakeAgentModel {
    answer: Box<AnswerFn>,
    calls: AtomicUsize,
}

impl FakeAgentModel {
    pub fn new<F>(answer: F) -> Arc<Self>
    where
        F: Fn(&str, &str) -> String + Send + Sync + 'static,
    {
        Arc::new(Self {
            answer: Box::new(answer),
            calls: AtomicUsize::new(0),
        })
    }

    /// Answers `answer` with confidence 0.92 when the question mentions
    /// `topic` and the retrieved text contains `answer`, otherwise a
    /// low-confidence guess.
    pub fn grounded(topic: &'static str, answer: &'static str) -> Arc<Self> {
        Self::new(move |question, observation| {
            if question.to_lowercase().contains(topic)
                && observation.to_lowercase().contains(answer)
            {
                format!(r#"{{"answer": "{}", "confidence": 0.92}}"#, answer)
            } else {
                r#"{"answer": "France", "confidence": "0.05"}"#.to_string()
            }
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Question id and text from the rendered prompt
fn prompt_question(prompt: &str) -> (String, String, &str) {
    let id = prompt
        .split("with \"")
        .nth(1)
        .and_then(|rest| rest.split('"').next())
        .unwrap_or("0")
        .to_string();

    let tail_start = prompt.rfind("\nQuestion: ").map(|i| i + "\nQuestion: ".len()).unwrap_or(0);
    let tail = &prompt[tail_start..];
    let (question, scratchpad) = tail.split_once("\nThought:").unwrap_or((tail, ""));
    (id, question.to_string(), scratchpad)
}

#[async_trait]
impl ChatModel for FakeAgentModel {
    async fn chat(&self, messages: &[Message], _stop: &[String]) -> Result<ChatCompletion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (id, question, scratchpad) = prompt_question(&messages[0].content);

        let content = match scratchpad.split_once("\nObservation: ") {
            None => format!(
                " I should search the document.\nAction: pdf_content_retriever\nAction Input: {}",
                question
            ),
            Some((_, rest)) => {
                let observation = rest.split("\nThought: ").next().unwrap_or_default();
                let entry = (self.answer)(&question, observation);
                // Splice the question into the model's entry
                let entry = entry.replacen('{', &format!("{{\"question\": {:?}, ", question), 1);
                format!(" I now know the final answer\nFinal Answer: {{\"{}\": {}}}", id, entry)
            }
        };

        Ok(ChatCompletion {
            content,
            usage: Some(TokenUsage {
                prompt_tokens: 100,
                completion_tokens: 20,
                total_tokens: 120,
            }),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-agent"
    }
}

/// Wraps a model, holding every call for `delay` and recording how many
/// calls were in flight at once
pub struct TrackingModel<M> {
    inner: Arc<M>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl<M: ChatModel> TrackingModel<M> {
    pub fn new(inner: Arc<M>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner,
            delay,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<M: ChatModel> ChatModel for TrackingModel<M> {
    async fn chat(&self, messages: &[Message], stop: &[String]) -> Result<ChatCompletion> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.chat(messages, stop).await
    }

    async fn health_check(&self) -> Result<bool> {
        self.inner.health_check().await
    }

    fn name(&self) -> &str {
        "tracking"
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}

/// A chat model whose calls never complete
#[derive(Default)]
pub struct HangingModel {
    started: AtomicUsize,
    pending: Arc<AtomicUsize>,
}

/// Counts a call as pending until its future is dropped
struct PendingCall(Arc<AtomicUsize>);

impl Drop for PendingCall {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl HangingModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Calls made so far
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Calls whose futures are still alive
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for HangingModel {
    async fn chat(&self, _messages: &[Message], _stop: &[String]) -> Result<ChatCompletion> {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.pending.fetch_add(1, Ordering::SeqCst);
        let _call = PendingCall(Arc::clone(&self.pending));
        std::future::pending().await
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "hanging"
    }

    fn model(&self) -> &str {
        "hanging"
    }
}

/// Configuration pointing every path into `dir`
pub fn test_config(dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.openai.api_key = Some("sk-test".into());
    config.openai.chat_model = Some("fake-agent".into());
    config.vector_db.storage_path = Some(dir.join("vectors"));
    config.upload.temp_dir = Some(dir.join("uploads"));
    config
}

pub fn state<M: ChatModel + 'static>(config: AppConfig, chat: Arc<M>) -> AppState {
    let store = MemoryVectorStore::new(
        config.vector_db.storage_path.as_deref().unwrap(),
        config.vector_db.persist_collections,
    )
    .unwrap();
    AppState::from_parts(config, Arc::new(HashEmbedder), chat, Arc::new(store))
}

pub fn orchestrator<M: ChatModel + 'static>(config: AppConfig, chat: Arc<M>) -> QueryOrchestrator {
    let store = MemoryVectorStore::new(config.vector_db.storage_path.as_deref().unwrap(), false)
        .unwrap();
    QueryOrchestrator::new(
        Arc::new(config),
        Arc::new(HashEmbedder),
        chat,
        Arc::new(store),
    )
}

/// Build a PDF with one text line per page
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Files left in a directory (0 if it does not exist)
pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}
