use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation failed: {field} - {reason}")]
    Validation { field: String, reason: String },

    #[error("Text model error: {0}")]
    Model(#[from] ModelError),

    #[error("Generation cancelled")]
    Cancelled,
}

impl AppError {
    /// Whether this error is the expected outcome of a cancelled generation.
    ///
    /// Cancellation is routine (every swipe retires one sibling branch) and
    /// must never be reported as a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            AppError::Cancelled | AppError::Model(ModelError::Cancelled)
        )
    }

    /// Shorthand for a missing or empty required field.
    pub fn missing_field(field: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            reason: "is required".to_string(),
        }
    }
}

/// Text model (chat completion) errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Text model unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Request cancelled")]
    Cancelled,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Image model errors.
///
/// These never reach a player: the image generator turns every variant
/// except `Cancelled` into a placeholder.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Request cancelled")]
    Cancelled,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for text model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// Result type alias for image model operations
pub type ImageResult<T> = Result<T, ImageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Config {
            message: "missing key".to_string(),
        };
        assert_eq!(err.to_string(), "Configuration error: missing key");

        let err = AppError::missing_field("choice");
        assert_eq!(err.to_string(), "Validation failed: choice - is required");
    }

    #[test]
    fn test_model_error_display() {
        let err = ModelError::Unavailable {
            message: "server down".to_string(),
            retries: 3,
        };
        assert_eq!(
            err.to_string(),
            "Text model unavailable: server down (retries: 3)"
        );

        let err = ModelError::Api {
            status: 401,
            message: "unauthorized".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 401 - unauthorized");

        let err = ModelError::Timeout { timeout_ms: 5000 };
        assert_eq!(err.to_string(), "Request timeout after 5000ms");
    }

    #[test]
    fn test_image_error_display() {
        let err = ImageError::Api {
            status: 429,
            message: "quota".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 429 - quota");
        assert_eq!(ImageError::Cancelled.to_string(), "Request cancelled");
    }

    #[test]
    fn test_cancellation_is_distinguishable() {
        assert!(AppError::Cancelled.is_cancelled());
        assert!(AppError::from(ModelError::Cancelled).is_cancelled());

        let failure: AppError = ModelError::Timeout { timeout_ms: 10 }.into();
        assert!(!failure.is_cancelled());
        assert!(!AppError::missing_field("currentNode").is_cancelled());
    }

    #[test]
    fn test_model_error_conversion_to_app_error() {
        let app_err: AppError = ModelError::Timeout { timeout_ms: 1000 }.into();
        assert!(matches!(app_err, AppError::Model(_)));
    }
}
