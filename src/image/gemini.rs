use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{GeneratedImage, ImageModel, ImageRequest};
use crate::config::{GeminiConfig, RequestConfig};
use crate::error::{ImageError, ImageResult};
use crate::prompts::image_prompt;

/// Request body for `models/{model}:generateContent`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

/// One conversational turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Text or inline binary content
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

/// Base64 payload with its MIME type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_modalities: Vec<String>,
    pub temperature: f32,
}

/// Response from `generateContent`
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// First inline image across the first candidate's parts.
    pub fn first_image(&self) -> Option<&InlineData> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|content| content.parts.iter().find_map(|p| p.inline_data.as_ref()))
    }
}

/// Client for Gemini image generation
#[derive(Clone)]
pub struct GeminiImageClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    timeout_ms: u64,
}

impl GeminiImageClient {
    pub fn new(
        config: &GeminiConfig,
        api_key: impl Into<String>,
        request_config: &RequestConfig,
    ) -> ImageResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(ImageError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout_ms: request_config.timeout_ms,
        })
    }

    /// Build the wire request: the instruction text, then the reference image if any.
    pub fn build_request(&self, request: &ImageRequest) -> GenerateContentRequest {
        let mut parts = vec![Part {
            text: Some(image_prompt(&request.prompt)),
            inline_data: None,
        }];

        if let Some(reference) = &request.reference {
            parts.push(Part {
                text: None,
                inline_data: Some(InlineData {
                    mime_type: reference.mime_type.clone(),
                    data: reference.data.clone(),
                }),
            });
        }

        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE".to_string()],
                temperature: self.temperature,
            },
        }
    }

    async fn execute_request(
        &self,
        body: &GenerateContentRequest,
    ) -> ImageResult<GenerateContentResponse> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ImageError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    ImageError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ImageError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| ImageError::InvalidResponse {
                message: format!("Failed to parse response: {}", e),
            })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ImageModel for GeminiImageClient {
    async fn generate(
        &self,
        request: ImageRequest,
        cancel: CancellationToken,
    ) -> ImageResult<Option<GeneratedImage>> {
        let body = self.build_request(&request);
        debug!(
            model = %self.model,
            has_reference = request.reference.is_some(),
            "Calling image model"
        );

        let start = Instant::now();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ImageError::Cancelled),
            response = self.execute_request(&body) => response?,
        };

        let image = response.first_image().map(|inline| GeneratedImage {
            mime_type: inline.mime_type.clone(),
            data: inline.data.clone(),
        });

        info!(
            model = %self.model,
            latency_ms = start.elapsed().as_millis(),
            has_image = image.is_some(),
            "Image model call completed"
        );

        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ReferenceImage;
    use serde_json::json;

    fn client() -> GeminiImageClient {
        let config = GeminiConfig {
            api_key: Some("key".to_string()),
            base_url: "https://generativelanguage.googleapis.com/".to_string(),
            model: "gemini-2.5-flash-image".to_string(),
            temperature: 0.7,
            rate_limit_ms: 1500,
        };
        GeminiImageClient::new(&config, "key", &RequestConfig::default()).unwrap()
    }

    #[test]
    fn test_build_request_without_reference() {
        let body = client().build_request(&ImageRequest::new("a cave"));
        let value = serde_json::to_value(&body).unwrap();

        let parts = value["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 1);
        assert!(parts[0]["text"].as_str().unwrap().contains("SCENE: a cave"));
        assert_eq!(value["generationConfig"]["responseModalities"], json!(["IMAGE"]));
        assert_eq!(client().base_url(), "https://generativelanguage.googleapis.com");
    }

    #[test]
    fn test_build_request_with_reference() {
        let request = ImageRequest::new("a cave").with_reference(ReferenceImage {
            mime_type: "image/png".to_string(),
            data: "AAAA".to_string(),
        });
        let value = serde_json::to_value(client().build_request(&request)).unwrap();

        let parts = value["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "AAAA");
        assert!(parts[1].get("text").is_none());
    }

    #[test]
    fn test_first_image_skips_text_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "Here is your image"},
                        {"inlineData": {"mimeType": "image/png", "data": "iVBOR"}}
                    ]
                }
            }]
        }))
        .unwrap();

        let image = response.first_image().unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, "iVBOR");
    }

    #[test]
    fn test_first_image_absent() {
        let response: GenerateContentResponse =
            serde_json::from_value(json!({"candidates": []})).unwrap();
        assert!(response.first_image().is_none());
    }
}
