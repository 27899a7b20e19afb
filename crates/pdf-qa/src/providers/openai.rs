//! OpenAI-compatible API client for embeddings and chat completions, with retry logic

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::config::OpenAiConfig;
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::llm::{ChatCompletion, ChatModel, Message, TokenUsage};

/// Longest wait between two attempts
const MAX_BACKOFF_SECS: u64 = 30;

/// OpenAI API client with automatic retry
pub struct OpenAiClient {
    /// HTTP client
    client: Client,
    /// API base URL without trailing slash
    base_url: String,
    api_key: String,
    chat_model: String,
    embed_model: String,
    temperature: f32,
    embed_batch_size: usize,
    dimensions: usize,
    /// Maximum retries
    max_retries: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiClient {
    /// Create a new client. Fails if the API key or chat model is missing.
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();
        let chat_model = config.require_chat_model()?.to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            chat_model,
            embed_model: config.embed_model.clone(),
            temperature: config.temperature,
            embed_batch_size: config.embed_batch_size.max(1),
            dimensions: config.dimensions,
            max_retries: config.max_retries,
        })
    }

    async fn embed_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.base_url);

        retry_with_backoff(self.max_retries, || {
            let url = url.clone();

            async move {
                let request = EmbedRequest {
                    model: &self.embed_model,
                    input: texts,
                };

                let response = self
                    .client
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| {
                        Attempt::Transient(Error::embedding(format!(
                            "Embedding request failed: {}",
                            e
                        )))
                    })?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(Attempt::for_status(
                        status,
                        Error::embedding(format!("Embedding failed: HTTP {} - {}", status, body)),
                    ));
                }

                let mut embed_response: EmbedResponse = response.json().await.map_err(|e| {
                    Attempt::Permanent(Error::embedding(format!(
                        "Failed to parse embedding response: {}",
                        e
                    )))
                })?;

                if embed_response.data.len() != texts.len() {
                    return Err(Attempt::Permanent(Error::embedding(format!(
                        "Expected {} embeddings, got {}",
                        texts.len(),
                        embed_response.data.len()
                    ))));
                }

                embed_response.data.sort_by_key(|d| d.index);
                Ok(embed_response.data.into_iter().map(|d| d.embedding).collect())
            }
        })
        .await
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_request(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| Error::embedding("Empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.embed_batch_size) {
            embeddings.extend(self.embed_request(batch).await?);
        }
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        ChatModel::health_check(self).await
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn chat(&self, messages: &[Message], stop: &[String]) -> Result<ChatCompletion> {
        let url = format!("{}/chat/completions", self.base_url);

        tracing::debug!("Chat completion with model: {}", self.chat_model);

        retry_with_backoff(self.max_retries, || {
            let url = url.clone();

            async move {
                let request = ChatRequest {
                    model: &self.chat_model,
                    messages,
                    temperature: self.temperature,
                    stop,
                };

                let response = self
                    .client
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| {
                        Attempt::Transient(Error::llm(format!("Chat request failed: {}", e)))
                    })?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(Attempt::for_status(
                        status,
                        Error::llm(format!("Chat completion failed: HTTP {} - {}", status, body)),
                    ));
                }

                let chat_response: ChatResponse = response.json().await.map_err(|e| {
                    Attempt::Permanent(Error::llm(format!("Failed to parse chat response: {}", e)))
                })?;

                let content = chat_response
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .ok_or_else(|| {
                        Attempt::Permanent(Error::llm(
                            "Invalid response format: missing content in choices",
                        ))
                    })?;

                Ok(ChatCompletion {
                    content: truncate_at_stop(content, stop),
                    usage: chat_response.usage,
                })
            }
        })
        .await
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.base_url);

        match self.client.get(&url).bearer_auth(&self.api_key).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.chat_model
    }
}

/// A failed request attempt
enum Attempt {
    /// Connection failures, 429 and 5xx; worth another try
    Transient(Error),
    /// Fails the same way on every attempt
    Permanent(Error),
}

impl Attempt {
    fn for_status(status: StatusCode, error: Error) -> Self {
        if is_retryable_status(status) {
            Attempt::Transient(error)
        } else {
            Attempt::Permanent(error)
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Wait before retry number `attempt + 1`: 1s, 2s, 4s, ... capped
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt).min(MAX_BACKOFF_SECS))
}

/// Run `operation` until it succeeds, fails permanently, or `max_retries`
/// transient failures have been retried with exponential backoff
async fn retry_with_backoff<F, Fut, T>(max_retries: u32, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, Attempt>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(Attempt::Permanent(e)) => return Err(e),
            Err(Attempt::Transient(e)) if attempt >= max_retries => return Err(e),
            Err(Attempt::Transient(e)) => {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    "Request failed (attempt {}/{}), retrying in {:?}: {}",
                    attempt + 1,
                    max_retries + 1,
                    delay,
                    e
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Cut `content` at the first stop sequence; compatible servers do not all honour `stop`
fn truncate_at_stop(mut content: String, stop: &[String]) -> String {
    let cut = stop
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| content.find(s.as_str()))
        .min();
    if let Some(pos) = cut {
        content.truncate(pos);
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config() -> OpenAiConfig {
        OpenAiConfig {
            api_key: Some("sk-test".into()),
            chat_model: Some("gpt-4o-mini".into()),
            base_url: "http://localhost:1/v1/".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_requires_credentials() {
        let mut cfg = config();
        cfg.api_key = None;
        assert!(matches!(OpenAiClient::new(&cfg), Err(Error::Config(_))));

        let mut cfg = config();
        cfg.chat_model = Some("  ".into());
        assert!(matches!(OpenAiClient::new(&cfg), Err(Error::Config(_))));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = OpenAiClient::new(&config()).unwrap();
        assert_eq!(client.base_url, "http://localhost:1/v1");
        assert_eq!(ChatModel::model(&client), "gpt-4o-mini");
        assert_eq!(client.dimensions(), 1536);
    }

    #[test]
    fn test_truncate_at_stop() {
        let stop = vec!["\nObservation:".to_string()];
        assert_eq!(
            truncate_at_stop("Action: x\nAction Input: y\nObservation: z".into(), &stop),
            "Action: x\nAction Input: y"
        );
        assert_eq!(truncate_at_stop("Final Answer: ok".into(), &stop), "Final Answer: ok");
    }

    #[test]
    fn test_chat_request_omits_empty_stop() {
        let messages = vec![Message::user("hi")];
        let request = ChatRequest {
            model: "m",
            messages: &messages,
            temperature: 0.0,
            stop: &[],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("stop").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unhealthy() {
        let mut cfg = config();
        cfg.timeout_secs = 2;
        let client = OpenAiClient::new(&cfg).unwrap();
        assert!(!ChatModel::health_check(&client).await.unwrap());
    }

    #[test]
    fn test_only_rate_limits_and_server_errors_retry() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(3), Duration::from_secs(8));
        assert_eq!(backoff_delay(64), Duration::from_secs(MAX_BACKOFF_SECS));
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = retry_with_backoff(3, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Attempt::for_status(
                    StatusCode::UNAUTHORIZED,
                    Error::llm("invalid api key"),
                ))
            }
        })
        .await;

        assert!(matches!(result, Err(Error::Llm(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let calls = AtomicUsize::new(0);
        let result = retry_with_backoff(1, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(Attempt::for_status(
                        StatusCode::SERVICE_UNAVAILABLE,
                        Error::llm("overloaded"),
                    ))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
