//! # AdventureSwipe backend
//!
//! An HTTP service that generates a branching, illustrated story one node at a
//! time. The player swipes left or right; each node carries text, an image
//! and two labelled choices.
//!
//! ## Features
//!
//! - **Speculative preloading**: both children of every served node are
//!   generated in the background; a swipe joins or reuses the matching one
//!   and cancels its sibling
//! - **Content-addressed caches**: story scenes keyed by prompt fingerprint,
//!   images keyed by description fingerprint
//! - **Paced narrative**: every node at the terminal depth is an ending
//! - **Never-fail images**: image errors degrade to a placeholder
//! - **Demo mode**: canned scenes, no API keys needed
//!
//! ## Architecture
//!
//! ```text
//! HTTP (axum) → Orchestrator → PreloadCoordinator ─┐
//!                    │                             │
//!                    └──────► NodeGenerator ◄──────┘
//!                              ├─ StoryGenerator → TextModel (OpenAI)
//!                              └─ ImageGenerator → RateLimiter → ImageModel (Gemini)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use adventure_swipe::{Config, server::{router, AppState}};
//! use adventure_swipe::llm::OpenAiClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let text = OpenAiClient::new(&config.openai, config.request.clone())?;
//!     let state = Arc::new(AppState::new(config, Arc::new(text), None));
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await?;
//!     axum::serve(listener, router(state)).await?;
//!     Ok(())
//! }
//! ```

/// In-memory TTL caches and content fingerprints.
pub mod cache;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Image generation and the shared rate limiter.
pub mod image;
/// Text model clients and chat wire types.
pub mod llm;
/// Swipe resolution and new-game flow.
pub mod orchestrator;
/// Background generation of both branches of a node.
pub mod preload;
/// System prompts for the text and image models.
pub mod prompts;
/// HTTP server, routes and shared state.
pub mod server;
/// Story data model, prompt building and node generation.
pub mod story;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{AppState, SharedState};
