//! Shared fakes for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use adventure_swipe::config::{CacheConfig, Config, StoryConfig};
use adventure_swipe::error::{ImageResult, ModelError, ModelResult};
use adventure_swipe::image::{GeneratedImage, ImageGenerator, ImageModel, ImageRequest};
use adventure_swipe::llm::{CompletionRequest, TextModel};
use adventure_swipe::story::{Choices, NodeGenerator, StoryGenerator, StoryNode};

pub const LATENCY: Duration = Duration::from_millis(200);

/// Text model that counts calls, waits `latency` and echoes the depth it saw.
///
/// Whether a call fails is decided when the call starts.
pub struct CountingTextModel {
    pub calls: AtomicUsize,
    pub latency: Duration,
    pub fail: AtomicBool,
}

impl CountingTextModel {
    pub fn new(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            latency,
            fail: AtomicBool::new(false),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

fn depth_of(prompt: &str) -> String {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix("Current depth: "))
        .unwrap_or("0")
        .to_string()
}

#[async_trait]
impl TextModel for CountingTextModel {
    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> ModelResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fail = self.fail.load(Ordering::SeqCst);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ModelError::Cancelled),
            _ = tokio::time::sleep(self.latency) => {}
        }

        if fail {
            return Err(ModelError::Api {
                status: 500,
                message: "model exploded".to_string(),
            });
        }

        let depth = depth_of(&request.prompt);
        Ok(json!({
            "image": format!("painting of scene {}", depth),
            "text": format!("Scene at depth {}", depth),
            "choices": {"left": "Go left", "right": "Go right"},
            "isEnding": false,
            "objectiveScore": 55,
            "inventory": ["Torch"]
        })
        .to_string())
    }
}

/// Image model that counts calls and returns a tiny PNG payload.
pub struct CountingImageModel {
    pub calls: AtomicUsize,
}

impl CountingImageModel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageModel for CountingImageModel {
    async fn generate(
        &self,
        _request: ImageRequest,
        _cancel: CancellationToken,
    ) -> ImageResult<Option<GeneratedImage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(GeneratedImage {
            mime_type: "image/png".to_string(),
            data: "iVBOR".to_string(),
        }))
    }
}

pub fn test_config(terminal_depth: u32) -> Config {
    Config {
        story: StoryConfig {
            terminal_depth,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn node_generator(text: Arc<CountingTextModel>, terminal_depth: u32) -> Arc<NodeGenerator> {
    let story = StoryGenerator::new(
        text,
        StoryConfig {
            terminal_depth,
            ..Default::default()
        },
    );
    Arc::new(NodeGenerator::new(
        story,
        ImageGenerator::disabled(),
        &CacheConfig::default(),
    ))
}

pub fn story_node(id: &str, depth: u32) -> StoryNode {
    StoryNode {
        id: id.to_string(),
        text: format!("Scene {}", id),
        image: "https://placehold.co/400x400/png".to_string(),
        choices: Choices::new("Go left", "Go right"),
        is_ending: false,
        ending_type: Default::default(),
        objective_score: 50,
        inventory: vec![],
        depth,
    }
}
