use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::types::CompletionRequest;
use super::TextModel;
use crate::error::{ModelError, ModelResult};

const SCENES: &[(&str, &str, &str)] = &[
    (
        "Rain hammers the broken gate of Ashfall Keep. Somewhere inside, the relic you were sent to recover pulses with a sick green light.",
        "Slip through the drain",
        "Climb the shattered wall",
    ),
    (
        "A hooded sentry turns, lantern raised. The stink of tallow and wet wool fills the corridor between you.",
        "Strike first",
        "Bluff your way past",
    ),
    (
        "The chapel floor gives way to a stairwell of bones. The relic's light throbs below, quicker now.",
        "Descend into the dark",
        "Search the altar",
    ),
    (
        "The warden of the keep rises from the reliquary, blade already drawn. Behind him the relic waits.",
        "Lunge for the relic",
        "Face the warden",
    ),
];

/// Offline text model returning canned scenes.
///
/// Reads `Current depth: N` from the prompt to pick a scene and returns an
/// ending at or beyond `terminal_depth`, so the whole preload pipeline can be
/// exercised without API keys.
#[derive(Debug, Clone)]
pub struct DemoTextModel {
    terminal_depth: u32,
    latency: Duration,
}

impl DemoTextModel {
    pub fn new(terminal_depth: u32) -> Self {
        Self {
            terminal_depth,
            latency: Duration::from_millis(400),
        }
    }

    /// Override the simulated model latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn depth_of(prompt: &str) -> u32 {
        prompt
            .lines()
            .find_map(|line| line.trim().strip_prefix("Current depth:"))
            .and_then(|d| d.trim().parse().ok())
            .unwrap_or(0)
    }

    fn render(&self, depth: u32) -> String {
        if depth >= self.terminal_depth {
            return json!({
                "image": "A lone figure holding a glowing relic on a rain-soaked rampart at dawn",
                "text": "The relic's light fades into your palm. The keep is silent at last, and the long road home begins.",
                "choices": {"left": "", "right": ""},
                "isEnding": true,
                "endingType": "success",
                "objectiveScore": 80,
                "inventory": ["Rusty Sword", "Ashfall Relic"]
            })
            .to_string();
        }

        let (text, left, right) = SCENES[depth as usize % SCENES.len()];
        json!({
            "image": format!("Digital oil painting, dark fantasy keep, scene {}", depth),
            "text": text,
            "choices": {"left": left, "right": right},
            "isEnding": false,
            "endingType": "neutral",
            "objectiveScore": 50,
            "inventory": ["Rusty Sword", "Health Potion"]
        })
        .to_string()
    }
}

#[async_trait]
impl TextModel for DemoTextModel {
    async fn complete(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> ModelResult<String> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ModelError::Cancelled),
            _ = tokio::time::sleep(self.latency) => {}
        }
        Ok(self.render(Self::depth_of(&request.prompt)))
    }
}
