use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::types::{ChatCompletionRequest, ChatCompletionResponse, CompletionRequest};
use super::TextModel;
use crate::config::{OpenAiConfig, RequestConfig};
use crate::error::{ModelError, ModelResult};

/// Client for the OpenAI chat completions API
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    request_config: RequestConfig,
}

impl OpenAiClient {
    /// Create a new OpenAI client
    pub fn new(config: &OpenAiConfig, request_config: RequestConfig) -> ModelResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(ModelError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            request_config,
        })
    }

    /// Run a chat completion, retrying transient failures with exponential backoff.
    ///
    /// Cancellation is checked while waiting on the network and during
    /// backoff; it is never retried.
    pub async fn chat(
        &self,
        request: ChatCompletionRequest,
        cancel: &CancellationToken,
    ) -> ModelResult<ChatCompletionResponse> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut last_error = None;
        let mut retries = 0;

        while retries <= self.request_config.max_retries {
            if retries > 0 {
                let delay = Duration::from_millis(
                    self.request_config.retry_delay_ms * (2_u64.pow(retries - 1)),
                );
                warn!(
                    model = %request.model,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying chat completion"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ModelError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            let start = Instant::now();

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(model = %request.model, "Chat completion cancelled in flight");
                    return Err(ModelError::Cancelled);
                }
                outcome = self.execute_request(&url, &request) => outcome,
            };

            match outcome {
                Ok(response) => {
                    info!(
                        model = %request.model,
                        latency_ms = start.elapsed().as_millis(),
                        "Chat completion succeeded"
                    );
                    return Ok(response);
                }
                Err(e) => {
                    error!(
                        model = %request.model,
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        retry = retries,
                        "Chat completion failed"
                    );
                    if !Self::is_retryable(&e) {
                        return Err(e);
                    }
                    last_error = Some(e);
                    retries += 1;
                }
            }
        }

        Err(ModelError::Unavailable {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            retries,
        })
    }

    /// Client errors other than rate limiting will fail the same way again.
    fn is_retryable(err: &ModelError) -> bool {
        match err {
            ModelError::Api { status, .. } => *status == 429 || *status >= 500,
            ModelError::Cancelled => false,
            _ => true,
        }
    }

    /// Execute a single request (internal)
    async fn execute_request(
        &self,
        url: &str,
        request: &ChatCompletionRequest,
    ) -> ModelResult<ChatCompletionResponse> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Calling chat completions"
        );

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    ModelError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| ModelError::InvalidResponse {
                message: format!("Failed to parse response: {}", e),
            })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TextModel for OpenAiClient {
    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> ModelResult<String> {
        let chat = ChatCompletionRequest::new(&self.model, request.into_messages())
            .with_temperature(self.temperature);

        let response = self.chat(chat, &cancel).await?;

        response
            .first_content()
            .map(str::to_string)
            .ok_or_else(|| ModelError::InvalidResponse {
                message: "Completion contained no message content".to_string(),
            })
    }
}
