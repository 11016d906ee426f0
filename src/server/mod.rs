//! HTTP surface: shared application state and the axum router.

mod handlers;

pub use handlers::*;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::image::{ImageGenerator, ImageModel};
use crate::llm::TextModel;
use crate::orchestrator::Orchestrator;
use crate::preload::PreloadCoordinator;
use crate::story::{NodeGenerator, StoryGenerator};

/// Application state shared across handlers.
pub struct AppState {
    pub config: Config,
    pub generator: Arc<NodeGenerator>,
    pub preloads: Arc<PreloadCoordinator>,
    pub orchestrator: Orchestrator,
}

impl AppState {
    /// Wire the generation pipeline from its two model seams.
    ///
    /// Passing `None` for `image_model` serves the placeholder image everywhere.
    pub fn new(
        config: Config,
        text_model: Arc<dyn TextModel>,
        image_model: Option<Arc<dyn ImageModel>>,
    ) -> Self {
        let images = match image_model {
            Some(model) => ImageGenerator::new(
                model,
                Duration::from_millis(config.gemini.rate_limit_ms),
            ),
            None => ImageGenerator::disabled(),
        };

        info!(
            terminal_depth = config.story.terminal_depth,
            images_enabled = images.is_enabled(),
            demo_mode = config.demo_mode,
            "AppState initializing"
        );

        let story = StoryGenerator::new(text_model, config.story.clone());
        let generator = Arc::new(NodeGenerator::new(story, images, &config.cache));
        let preloads = Arc::new(PreloadCoordinator::new(
            Arc::clone(&generator),
            config.cache.preload_ttl(),
        ));
        let orchestrator = Orchestrator::new(
            Arc::clone(&generator),
            Arc::clone(&preloads),
            config.story.new_game_prompt.clone(),
        );

        Self {
            config,
            generator,
            preloads,
            orchestrator,
        }
    }

    /// Drop expired entries from every cache. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        self.generator.purge_expired() + self.preloads.purge_expired()
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;

/// Build the application router with body limit, CORS and request tracing.
pub fn router(state: SharedState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;
    let cors = build_cors_layer(state.config.server.cors_allowed_origins.as_deref());

    let mut router = Router::new()
        .route("/", get(health))
        .route("/next", post(next_node))
        .route("/new-game", get(new_game))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors {
        router = router.layer(cors);
    }

    router
}

/// Bind the HTTP listener. `host` may be an IP address or a host name.
pub async fn bind(host: &str, port: u16) -> std::io::Result<TcpListener> {
    TcpListener::bind((host, port)).await
}

/// `*` allows any origin; otherwise a comma-separated list. Empty disables CORS.
fn build_cors_layer(allowed_origins: Option<&str>) -> Option<CorsLayer> {
    let allowed_origins = allowed_origins.map(str::trim).filter(|s| !s.is_empty())?;

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if allowed_origins == "*" {
        return Some(cors.allow_origin(Any));
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| HeaderValue::from_str(s).ok())
        .collect();

    if origins.is_empty() {
        return None;
    }

    Some(cors.allow_origin(origins))
}
