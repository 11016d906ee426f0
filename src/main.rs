use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use adventure_swipe::{
    config::{Config, LogFormat},
    image::{GeminiImageClient, ImageModel},
    llm::{DemoTextModel, OpenAiClient, TextModel},
    server::{self, router, AppState},
};

/// Swipe-driven adventure story server
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Address to bind (overrides HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Serve canned offline content, no API keys needed (overrides DEMO_MODE)
    #[arg(long)]
    demo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.demo {
        std::env::set_var("DEMO_MODE", "true");
    }

    // Load configuration
    let mut config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "AdventureSwipe backend starting..."
    );

    let text_model: Arc<dyn TextModel> = if config.demo_mode {
        warn!("Demo mode enabled, serving canned scenes");
        Arc::new(DemoTextModel::new(config.story.terminal_depth))
    } else {
        match OpenAiClient::new(&config.openai, config.request.clone()) {
            Ok(c) => {
                info!(base_url = %config.openai.base_url, model = %config.openai.model, "Text model client initialized");
                Arc::new(c)
            }
            Err(e) => {
                error!(error = %e, "Failed to initialize text model client");
                return Err(e.into());
            }
        }
    };

    let image_model: Option<Arc<dyn ImageModel>> = match config.gemini.api_key.as_deref() {
        Some(key) => match GeminiImageClient::new(&config.gemini, key, &config.request) {
            Ok(c) => {
                info!(model = %config.gemini.model, rate_limit_ms = config.gemini.rate_limit_ms, "Image model client initialized");
                Some(Arc::new(c) as Arc<dyn ImageModel>)
            }
            Err(e) => {
                error!(error = %e, "Failed to initialize image model client");
                return Err(e.into());
            }
        },
        None => {
            warn!("GEMINI_API_KEY not set, serving placeholder images");
            None
        }
    };

    let sweep_interval = Duration::from_secs(config.cache.sweep_interval_secs.max(1));
    let host = config.server.host.clone();
    let port = config.server.port;

    let state = Arc::new(AppState::new(config, text_model, image_model));

    let sweep_state = Arc::clone(&state);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = sweep_state.purge_expired();
            let stats = sweep_state.preloads.stats();
            info!(
                removed,
                pending = stats.pending,
                resolved = stats.resolved,
                "Cache sweep complete"
            );
        }
    });

    let app = router(state);

    let listener = server::bind(&host, port).await?;
    info!("Listening on {}", listener.local_addr()?);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
