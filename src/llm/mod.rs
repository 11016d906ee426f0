//! Text model seam.
//!
//! The story generator talks to a [`TextModel`]; production uses
//! [`OpenAiClient`], demo mode uses [`DemoTextModel`].

mod client;
mod demo;
mod types;


pub use client::OpenAiClient;
pub use demo::DemoTextModel;
pub use types::*;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::ModelResult;

/// A chat-style text generation model.
///
/// Implementations must return [`ModelError::Cancelled`](crate::error::ModelError::Cancelled)
/// promptly once `cancel` fires, abandoning any in-flight network call.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Run one completion and return the raw message content.
    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> ModelResult<String>;
}
