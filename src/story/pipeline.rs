use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::generator::StoryGenerator;
use super::parser::ScenePayload;
use super::types::{GenerationRequest, StoryNode, NEUTRAL_OBJECTIVE_SCORE};
use crate::cache::{fingerprint, TtlCache};
use crate::config::CacheConfig;
use crate::error::AppResult;
use crate::image::ImageGenerator;

/// Story cache value: a normalised scene and its resolved image.
#[derive(Debug, Clone)]
pub struct CachedScene {
    pub scene: ScenePayload,
    pub image: String,
}

/// Produces complete nodes: story text, then illustration, through the two
/// content-addressed caches.
pub struct NodeGenerator {
    story: StoryGenerator,
    images: ImageGenerator,
    story_cache: TtlCache<CachedScene>,
    image_cache: TtlCache<String>,
}

impl NodeGenerator {
    pub fn new(story: StoryGenerator, images: ImageGenerator, cache: &CacheConfig) -> Self {
        Self {
            story,
            images,
            story_cache: TtlCache::new("story", cache.story_ttl()),
            image_cache: TtlCache::new("image", cache.image_ttl()),
        }
    }

    /// Generate the node a request describes.
    ///
    /// Non-start requests whose prompt fingerprint is cached make no model
    /// calls at all. Cancellation surfaces as [`AppError::Cancelled`](crate::error::AppError::Cancelled).
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> AppResult<StoryNode> {
        let prompt = self.story.build_prompt(request);
        let story_key = fingerprint(&prompt);

        if !request.is_start() {
            if let Some(cached) = self.story_cache.get(&story_key) {
                info!(
                    key = %story_key,
                    choice = request.choice_label(),
                    "Story cache hit"
                );
                return Ok(self.assemble(request, cached.scene, cached.image));
            }
        }

        let scene = self
            .story
            .generate(&prompt, request.depth(), cancel)
            .await?;

        let reference = request.current().map(|node| node.image.as_str());
        let image = self
            .resolve_image(&scene.image_prompt, reference, cancel)
            .await?;

        let image = match image {
            Some(uri) => {
                if !request.is_start() {
                    self.story_cache.set(
                        story_key,
                        CachedScene {
                            scene: scene.clone(),
                            image: uri.clone(),
                        },
                    );
                }
                uri
            }
            None => {
                // With images enabled a missing image is an outage; keep it out of the cache.
                if !request.is_start() && !self.images.is_enabled() {
                    self.story_cache.set(
                        story_key,
                        CachedScene {
                            scene: scene.clone(),
                            image: self.placeholder().to_string(),
                        },
                    );
                }
                self.placeholder().to_string()
            }
        };

        Ok(self.assemble(request, scene, image))
    }

    async fn resolve_image(
        &self,
        description: &str,
        reference: Option<&str>,
        cancel: &CancellationToken,
    ) -> AppResult<Option<String>> {
        if description.trim().is_empty() {
            return Ok(None);
        }

        let key = fingerprint(description);
        if let Some(uri) = self.image_cache.get(&key) {
            debug!(key = %key, "Image cache hit");
            return Ok(Some(uri));
        }

        let uri = self.images.generate(description, reference, cancel).await?;
        if let Some(uri) = &uri {
            self.image_cache.set(key, uri.clone());
        }
        Ok(uri)
    }

    /// Turn a scene into a node with a fresh id, carrying score and inventory
    /// forward when the model omitted them.
    fn assemble(&self, request: &GenerationRequest, scene: ScenePayload, image: String) -> StoryNode {
        let current = request.current();
        StoryNode {
            id: StoryNode::new_id(request.choice_label()),
            text: scene.text,
            image,
            choices: scene.choices,
            is_ending: scene.is_ending,
            ending_type: scene.ending_type,
            objective_score: scene
                .objective_score
                .or_else(|| current.map(|n| n.objective_score))
                .unwrap_or(NEUTRAL_OBJECTIVE_SCORE),
            inventory: scene
                .inventory
                .or_else(|| current.map(|n| n.inventory.clone()))
                .unwrap_or_default(),
            depth: request.depth(),
        }
    }

    fn placeholder(&self) -> &str {
        &self.story.config().placeholder_image_url
    }

    /// Drop expired entries from both caches.
    pub fn purge_expired(&self) -> usize {
        self.story_cache.purge_expired() + self.image_cache.purge_expired()
    }

    pub fn story_cache(&self) -> &TtlCache<CachedScene> {
        &self.story_cache
    }

    pub fn image_cache(&self) -> &TtlCache<String> {
        &self.image_cache
    }
}
