use std::env;
use std::time::Duration;

use crate::error::AppError;
use crate::prompts::NEW_GAME_PROMPT;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub openai: OpenAiConfig,
    pub gemini: GeminiConfig,
    pub cache: CacheConfig,
    pub story: StoryConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    /// Serve canned offline content instead of calling the models.
    pub demo_mode: bool,
}

/// Text model (OpenAI chat completions) configuration
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
}

/// Image model (Gemini) configuration
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// `None` disables image generation; every node gets the placeholder.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Minimum spacing between dispatched image calls, across all callers.
    pub rate_limit_ms: u64,
}

/// Time-to-live settings for the in-memory caches
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub story_ttl_secs: u64,
    pub image_ttl_secs: u64,
    pub preload_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

/// Narrative pacing and fallback settings
#[derive(Debug, Clone)]
pub struct StoryConfig {
    /// Depth at or beyond which every generated node is an ending.
    pub terminal_depth: u32,
    /// Trailing history entries folded into each prompt.
    pub history_window: usize,
    pub placeholder_image_url: String,
    /// Instruction that opens every new game.
    pub new_game_prompt: String,
}

/// HTTP listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub body_limit_bytes: usize,
    /// `*` or a comma-separated origin list; `None` disables the CORS layer.
    pub cors_allowed_origins: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Outbound HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    matches!(
        env::var(key).unwrap_or_default().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let demo_mode = env_flag("DEMO_MODE");

        let api_key = match env::var("OPENAI_API_KEY") {
            Ok(key) if !key.trim().is_empty() => key,
            _ if demo_mode => String::new(),
            _ => {
                return Err(AppError::Config {
                    message: "OPENAI_API_KEY is required".to_string(),
                })
            }
        };

        let openai = OpenAiConfig {
            api_key,
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
            model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            temperature: env_or("STORY_TEMPERATURE", 0.8),
        };

        let gemini = GeminiConfig {
            api_key: env::var("GEMINI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty() && !demo_mode),
            base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".to_string()),
            model: env::var("GEMINI_IMAGE_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash-image".to_string()),
            temperature: env_or("IMAGE_TEMPERATURE", 0.7),
            rate_limit_ms: env_or("IMAGE_RATE_LIMIT_MS", 1500),
        };

        let cache = CacheConfig {
            story_ttl_secs: env_or("STORY_CACHE_TTL_SECS", 3600),
            image_ttl_secs: env_or("IMAGE_CACHE_TTL_SECS", 24 * 3600),
            preload_ttl_secs: env_or("PRELOAD_CACHE_TTL_SECS", 3600),
            sweep_interval_secs: env_or("CACHE_SWEEP_INTERVAL_SECS", 600),
        };

        let story = StoryConfig {
            terminal_depth: env_or("TERMINAL_DEPTH", 5),
            history_window: env_or("HISTORY_WINDOW", 5),
            placeholder_image_url: env::var("PLACEHOLDER_IMAGE_URL")
                .unwrap_or_else(|_| StoryConfig::default().placeholder_image_url),
            new_game_prompt: env::var("NEW_GAME_PROMPT")
                .unwrap_or_else(|_| NEW_GAME_PROMPT.to_string()),
        };

        let server = ServerConfig {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("PORT", 5000),
            body_limit_bytes: env_or("BODY_LIMIT_BYTES", 50 * 1024 * 1024),
            cors_allowed_origins: match env::var("CORS_ALLOWED_ORIGINS") {
                Ok(origins) if origins.trim().is_empty() => None,
                Ok(origins) => Some(origins.trim().to_string()),
                Err(_) => Some("*".to_string()),
            },
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env_or("REQUEST_TIMEOUT_MS", 60000),
            max_retries: env_or("MAX_RETRIES", 2),
            retry_delay_ms: env_or("RETRY_DELAY_MS", 1000),
        };

        Ok(Config {
            openai,
            gemini,
            cache,
            story,
            server,
            logging,
            request,
            demo_mode,
        })
    }
}

impl CacheConfig {
    pub fn story_ttl(&self) -> Duration {
        Duration::from_secs(self.story_ttl_secs)
    }

    pub fn image_ttl(&self) -> Duration {
        Duration::from_secs(self.image_ttl_secs)
    }

    pub fn preload_ttl(&self) -> Duration {
        Duration::from_secs(self.preload_ttl_secs)
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.8,
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.5-flash-image".to_string(),
            temperature: 0.7,
            rate_limit_ms: 1500,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            story_ttl_secs: 3600,
            image_ttl_secs: 24 * 3600,
            preload_ttl_secs: 3600,
            sweep_interval_secs: 600,
        }
    }
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            terminal_depth: 5,
            history_window: 5,
            placeholder_image_url: "https://placehold.co/400x400/png".to_string(),
            new_game_prompt: NEW_GAME_PROMPT.to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            body_limit_bytes: 50 * 1024 * 1024,
            cors_allowed_origins: Some("*".to_string()),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 60000,
            max_retries: 2,
            retry_delay_ms: 1000,
        }
    }
}
