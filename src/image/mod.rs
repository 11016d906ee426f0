//! Image generation: the outbound model seam, the global rate limiter and
//! the placeholder failure policy.

mod gemini;
mod limiter;

pub use gemini::*;
pub use limiter::RateLimiter;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{AppError, AppResult, ImageError, ImageResult};

/// Previous-scene image attached for style continuity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    pub mime_type: String,
    /// Base64 payload without the `data:` prefix.
    pub data: String,
}

impl ReferenceImage {
    /// Parse a `data:image/<type>;base64,<payload>` URI.
    ///
    /// Anything else (remote URLs, the placeholder) cannot be attached and yields `None`.
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix("data:")?;
        let (mime_type, data) = rest.split_once(";base64,")?;
        if !mime_type.starts_with("image/") || data.is_empty() {
            return None;
        }
        Some(Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }
}

/// Input to one image model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub prompt: String,
    pub reference: Option<ReferenceImage>,
}

impl ImageRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: ReferenceImage) -> Self {
        self.reference = Some(reference);
        self
    }
}

/// Encoded image returned by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub mime_type: String,
    pub data: String,
}

impl GeneratedImage {
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// An image generation model.
///
/// `Ok(None)` means the call succeeded but produced no image.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageModel: Send + Sync {
    async fn generate(
        &self,
        request: ImageRequest,
        cancel: CancellationToken,
    ) -> ImageResult<Option<GeneratedImage>>;
}

/// Rate-limited image generation with a never-fail policy.
///
/// Every caller, foreground or speculative, shares one [`RateLimiter`].
/// Failures come back as `Ok(None)` so the caller can substitute a
/// placeholder; only cancellation is an error.
#[derive(Clone)]
pub struct ImageGenerator {
    model: Option<Arc<dyn ImageModel>>,
    limiter: Arc<RateLimiter>,
}

impl ImageGenerator {
    pub fn new(model: Arc<dyn ImageModel>, min_interval: Duration) -> Self {
        Self {
            model: Some(model),
            limiter: Arc::new(RateLimiter::new(min_interval)),
        }
    }

    /// A generator that never calls out and always yields "no image".
    pub fn disabled() -> Self {
        Self {
            model: None,
            limiter: Arc::new(RateLimiter::new(Duration::ZERO)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.model.is_some()
    }

    /// Render `description`, returning a data URI or `None` on any failure.
    pub async fn generate(
        &self,
        description: &str,
        reference: Option<&str>,
        cancel: &CancellationToken,
    ) -> AppResult<Option<String>> {
        let Some(model) = &self.model else {
            return Ok(None);
        };
        if description.trim().is_empty() {
            debug!("Empty image description, skipping image generation");
            return Ok(None);
        }

        let mut request = ImageRequest::new(description);
        if let Some(reference) = reference.and_then(ReferenceImage::from_data_uri) {
            request = request.with_reference(reference);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            _ = self.limiter.acquire() => {}
        }

        match model.generate(request, cancel.clone()).await {
            Ok(Some(image)) => Ok(Some(image.to_data_uri())),
            Ok(None) => {
                warn!("Image model returned no image data, using placeholder");
                Ok(None)
            }
            Err(ImageError::Cancelled) => Err(AppError::Cancelled),
            Err(e) => {
                warn!(error = %e, "Image generation failed, using placeholder");
                Ok(None)
            }
        }
    }
}
