//! OpenAI-compatible chat completion client.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::{LlmError, LlmResult};

/// A single-turn chat completion.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> LlmResult<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for `POST <base_url>/chat/completions`.
pub struct OpenAiChatClient {
    config: LlmConfig,
    api_key: String,
    http_client: reqwest::Client,
}

impl OpenAiChatClient {
    pub fn new(config: LlmConfig) -> LlmResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(LlmError::MissingApiKey)?;

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("infrascore-llm/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            config,
            api_key,
            http_client,
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn send_once(&self, system: &str, user: &str) -> LlmResult<String> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .http_client
            .post(self.config.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyReply)
    }
}

#[async_trait]
impl ChatBackend for OpenAiChatClient {
    async fn complete(&self, system: &str, user: &str) -> LlmResult<String> {
        with_retry(self.config.max_attempts, self.config.initial_backoff, || {
            self.send_once(system, user)
        })
        .await
    }
}

/// Run `op` up to `max_attempts` times, sleeping `initial_backoff * 2^n`
/// between attempts. Only retryable errors are retried.
pub async fn with_retry<F, Fut, T>(
    max_attempts: u32,
    initial_backoff: Duration,
    mut op: F,
) -> LlmResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = LlmResult<T>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts && err.is_retryable() => {
                let delay = initial_backoff * 2u32.saturating_pow(attempt - 1);
                warn!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "chat call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                debug!(attempt, error = %err, "chat call failed");
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn status(code: u16) -> LlmError {
        LlmError::Status {
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn test_missing_api_key_is_rejected() {
        assert!(matches!(
            OpenAiChatClient::new(LlmConfig::default()),
            Err(LlmError::MissingApiKey)
        ));
        assert!(matches!(
            OpenAiChatClient::new(LlmConfig::default().with_api_key("  ")),
            Err(LlmError::MissingApiKey)
        ));
    }

    #[test]
    fn test_request_body_shape() {
        let body = ChatRequest {
            model: "m",
            messages: [
                ChatMessage {
                    role: "system",
                    content: "s",
                },
                ChatMessage {
                    role: "user",
                    content: "u",
                },
            ],
            temperature: 0.0,
            max_tokens: 900,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["messages"][0]["role"], "system");
        assert_eq!(v["messages"][1]["content"], "u");
        assert_eq!(v["max_tokens"], 900);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_transient_errors_with_backoff() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let out = with_retry(3, Duration::from_millis(350), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(status(429))
                } else {
                    Ok("done")
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(out, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 350ms + 700ms
        assert!(started.elapsed() >= Duration::from_millis(1050));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let err = with_retry(3, Duration::from_millis(10), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(status(503)) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, LlmError::Status { status: 503, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let err = with_retry(3, Duration::from_millis(10), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(status(401)) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, LlmError::Status { status: 401, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
