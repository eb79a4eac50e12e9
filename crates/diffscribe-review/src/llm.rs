use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use diffscribe_core::{DiffscribeError, LlmConfig};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::CompletionBackend;
use crate::retry::{Attempt, RetryPolicy};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// A message in a chat conversation with the LLM.
///
/// # Examples
///
/// ```
/// use diffscribe_review::llm::{ChatMessage, Role};
///
/// let msg = ChatMessage::user("Review this code");
/// assert_eq!(msg.role, Role::User);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Role in the chat conversation.
///
/// # Examples
///
/// ```
/// use diffscribe_review::llm::Role;
///
/// let role = Role::System;
/// assert_eq!(serde_json::to_string(&role).unwrap(), "\"system\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions.
    System,
    /// User input.
    User,
}

/// OpenAI-compatible chat completions client.
///
/// Works with any provider that exposes the `/v1/chat/completions` endpoint.
/// Responses with status 429 are retried according to the client's
/// [`RetryPolicy`]; every other failure is returned immediately.
///
/// # Examples
///
/// ```
/// use diffscribe_core::LlmConfig;
/// use diffscribe_review::llm::LlmClient;
/// use diffscribe_review::retry::RetryPolicy;
///
/// let client = LlmClient::new(&LlmConfig::default(), "sk-test", RetryPolicy::default()).unwrap();
/// assert_eq!(client.model(), "gpt-4o-mini");
/// ```
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: String,
    retry: RetryPolicy,
    retries_spent: AtomicU32,
}

impl LlmClient {
    /// Create a new LLM client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DiffscribeError::Llm`] if the HTTP client cannot be built.
    pub fn new(
        config: &LlmConfig,
        api_key: impl Into<String>,
        retry: RetryPolicy,
    ) -> Result<Self, DiffscribeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DiffscribeError::Llm(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
            api_key: api_key.into(),
            retry,
            retries_spent: AtomicU32::new(0),
        })
    }

    /// Return the model name from the configuration.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        let base_url = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!("{base_url}/v1/chat/completions")
    }

    /// Send a chat completion request and return the trimmed text response.
    ///
    /// # Errors
    ///
    /// Returns [`DiffscribeError::RateLimited`] when every attempt got a 429,
    /// or [`DiffscribeError::Llm`] on other HTTP errors or response parsing
    /// failures.
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, DiffscribeError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });
        let url = self.endpoint();

        let outcome = self.retry.run(|| self.send_once(&url, &body)).await;
        match outcome {
            Ok(retried) => {
                self.retries_spent
                    .fetch_add(retried.retries, Ordering::Relaxed);
                Ok(retried.value)
            }
            Err(err) => {
                if let DiffscribeError::RateLimited { attempts } = &err {
                    self.retries_spent
                        .fetch_add(attempts.saturating_sub(1), Ordering::Relaxed);
                }
                Err(err)
            }
        }
    }

    async fn send_once(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<Attempt<String>, DiffscribeError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| DiffscribeError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(Attempt::RateLimited);
        }
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(DiffscribeError::Llm(format!(
                "LLM API error {status}: {body_text}"
            )));
        }

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DiffscribeError::Llm(format!("failed to parse response: {e}")))?;

        let content = extract_content(&response_body)?;
        debug!(chars = content.len(), "completion received");
        Ok(Attempt::Ready(content))
    }
}

/// Pull `choices[0].message.content` out of a chat completion response.
///
/// A `null` content counts as an empty reply.
fn extract_content(response: &serde_json::Value) -> Result<String, DiffscribeError> {
    let message = response
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .ok_or_else(|| {
            DiffscribeError::Llm(format!("unexpected response structure: {response}"))
        })?;

    match message.get("content") {
        Some(serde_json::Value::String(text)) => Ok(text.trim().to_string()),
        Some(serde_json::Value::Null) | None => Ok(String::new()),
        Some(other) => Err(DiffscribeError::Llm(format!(
            "unexpected message content: {other}"
        ))),
    }
}

#[async_trait]
impl CompletionBackend for LlmClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, DiffscribeError> {
        self.chat(messages).await
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    fn rate_limit_retries(&self) -> u32 {
        self.retries_spent.load(Ordering::Relaxed)
    }
}
