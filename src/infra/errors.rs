// src/infra/errors.rs — Error types for pathmentor

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MentorError {
    // Provider errors (retriable)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    // User errors
    #[error("{var} is not configured. Export it or set [mentor] api_key_env in config.toml.")]
    MissingCredential { var: String },

    // Infra
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MentorError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            MentorError::Provider {
                retriable: true,
                ..
            } | MentorError::RateLimited { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_is_retriable() {
        let err = MentorError::RateLimited {
            provider: "gemini".into(),
            retry_after_ms: 0,
        };
        assert!(err.is_retriable());
    }

    #[test]
    fn test_missing_credential_not_retriable() {
        let err = MentorError::MissingCredential {
            var: "GEMINI_MENTOR_API_KEY".into(),
        };
        assert!(!err.is_retriable());
        assert!(err.to_string().starts_with("GEMINI_MENTOR_API_KEY is not configured"));
    }

    #[test]
    fn test_provider_error_display() {
        let err = MentorError::Provider {
            provider: "gemini".into(),
            message: "HTTP 500".into(),
            retriable: true,
        };
        assert_eq!(err.to_string(), "Provider 'gemini' error: HTTP 500");
        assert!(err.is_retriable());
    }
}
