use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::parser::{normalize, parse_completion, ScenePayload};
use super::prompt::build_prompt;
use super::types::GenerationRequest;
use crate::config::StoryConfig;
use crate::error::{AppError, AppResult, ModelError};
use crate::llm::{CompletionRequest, TextModel};
use crate::prompts::story_system_prompt;

/// Builds prompts, calls the text model and turns its reply into a normalised scene.
///
/// Does no caching of its own.
#[derive(Clone)]
pub struct StoryGenerator {
    model: Arc<dyn TextModel>,
    system_prompt: String,
    config: StoryConfig,
}

impl StoryGenerator {
    pub fn new(model: Arc<dyn TextModel>, config: StoryConfig) -> Self {
        Self {
            system_prompt: story_system_prompt(config.terminal_depth),
            model,
            config,
        }
    }

    /// Replace the storyteller system prompt.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn config(&self) -> &StoryConfig {
        &self.config
    }

    pub fn build_prompt(&self, request: &GenerationRequest) -> String {
        build_prompt(request, self.config.history_window)
    }

    /// Run the model on `prompt` and parse the result for a node at `depth`.
    ///
    /// Returns [`AppError::Cancelled`] when `cancel` fires mid-call.
    pub async fn generate(
        &self,
        prompt: &str,
        depth: u32,
        cancel: &CancellationToken,
    ) -> AppResult<ScenePayload> {
        let start = Instant::now();
        debug!(depth, prompt_len = prompt.len(), "Generating story scene");

        let request = CompletionRequest::new(&self.system_prompt, prompt);
        let content = match self.model.complete(request, cancel.clone()).await {
            Ok(content) => content,
            Err(ModelError::Cancelled) => return Err(AppError::Cancelled),
            Err(e) => return Err(e.into()),
        };

        let scene = normalize(
            parse_completion(&content),
            depth,
            self.config.terminal_depth,
        );

        info!(
            depth,
            is_ending = scene.is_ending,
            latency_ms = start.elapsed().as_millis(),
            "Story scene generated"
        );
        Ok(scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelResult;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedModel {
        reply: String,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl TextModel for ScriptedModel {
        async fn complete(
            &self,
            request: CompletionRequest,
            cancel: CancellationToken,
        ) -> ModelResult<String> {
            if cancel.is_cancelled() {
                return Err(ModelError::Cancelled);
            }
            self.seen.lock().unwrap().push(request);
            Ok(self.reply.clone())
        }
    }

    fn generator(reply: &str) -> (StoryGenerator, Arc<ScriptedModel>) {
        let model = Arc::new(ScriptedModel {
            reply: reply.to_string(),
            seen: Mutex::new(Vec::new()),
        });
        (
            StoryGenerator::new(model.clone(), StoryConfig::default()),
            model,
        )
    }

    #[tokio::test]
    async fn test_sends_system_and_user_prompt() {
        let (generator, model) = generator(r#"{"text":"t","choices":{"left":"a","right":"b"}}"#);
        generator
            .generate("Current depth: 1", 1, &CancellationToken::new())
            .await
            .unwrap();

        let seen = model.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].system.contains("Return ONLY valid JSON"));
        assert_eq!(seen[0].prompt, "Current depth: 1");
    }

    #[tokio::test]
    async fn test_malformed_output_yields_playable_scene() {
        let (generator, _) = generator("I refuse to answer in JSON.");
        let scene = generator
            .generate("p", 1, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!scene.is_ending);
        assert!(!scene.choices.left.is_empty());
        assert!(!scene.choices.right.is_empty());
    }

    #[tokio::test]
    async fn test_terminal_depth_forces_ending() {
        let (generator, _) = generator(
            r#"{"text":"t","isEnding":false,"choices":{"left":"a","right":"b"}}"#,
        );
        let scene = generator
            .generate("p", 5, &CancellationToken::new())
            .await
            .unwrap();
        assert!(scene.is_ending);
        assert!(scene.choices.is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_is_distinguishable() {
        let (generator, _) = generator("{}");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = generator.generate("p", 1, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_custom_system_prompt() {
        let (generator, _) = generator("{}");
        let generator = generator.with_system_prompt("custom");
        assert_eq!(generator.system_prompt, "custom");
        assert_eq!(generator.config().terminal_depth, 5);
    }
}
