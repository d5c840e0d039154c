//! Error types for Gramcast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GramcastError>;

#[derive(Error, Debug)]
pub enum GramcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl GramcastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            GramcastError::InvalidInput(_) => 3,
            GramcastError::Publish(PublishError::Authentication(_)) => 2,
            GramcastError::Publish(_) => 1,
            GramcastError::Config(_) => 1,
            GramcastError::Database(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database operation failed: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Failures raised while driving the Instagram publish protocol.
///
/// `ContainerFailed` (remote reported ERROR) and `Timeout` (readiness never
/// reached before the deadline) are deliberately distinct variants so the
/// persisted diagnostics tell the two apart.
#[derive(Error, Debug, Clone)]
pub enum PublishError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Media validation failed: {0}")]
    Validation(String),

    #[error("Instagram API error: {message}")]
    Api {
        message: String,
        /// Raw remote diagnostic payload, persisted as error_details
        payload: Option<String>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Container processing failed: {container_id}")]
    ContainerFailed { container_id: String },

    #[error("Container did not become ready in time: {container_id}")]
    Timeout { container_id: String },
}

impl PublishError {
    /// Whether the error is worth retrying inside a readiness-poll loop.
    ///
    /// Network blips and rate limiting are transient; everything else is
    /// terminal for the post within the current run.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PublishError::Network(_) | PublishError::RateLimit(_)
        )
    }

    /// The remote diagnostic payload, if the remote sent one
    pub fn payload(&self) -> Option<&str> {
        match self {
            PublishError::Api { payload, .. } => payload.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = GramcastError::InvalidInput("Empty media list".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_authentication_error() {
        let error = GramcastError::Publish(PublishError::Authentication(
            "Token expired".to_string(),
        ));
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_other_publish_errors() {
        let api = GramcastError::Publish(PublishError::Api {
            message: "bad request".to_string(),
            payload: None,
        });
        assert_eq!(api.exit_code(), 1);

        let timeout = GramcastError::Publish(PublishError::Timeout {
            container_id: "c1".to_string(),
        });
        assert_eq!(timeout.exit_code(), 1);

        let config = GramcastError::Config(ConfigError::MissingField("database.path".to_string()));
        assert_eq!(config.exit_code(), 1);
    }

    #[test]
    fn test_container_failed_message_mentions_processing() {
        let error = PublishError::ContainerFailed {
            container_id: "17890000001".to_string(),
        };
        let message = format!("{}", error);
        assert!(message.contains("processing failed"));
        assert!(message.contains("17890000001"));
    }

    #[test]
    fn test_timeout_message_distinct_from_container_error() {
        let timeout = PublishError::Timeout {
            container_id: "17890000002".to_string(),
        };
        let message = format!("{}", timeout);
        assert!(message.contains("did not become ready"));
        assert!(!message.contains("processing failed"));
        assert!(message.contains("17890000002"));
    }

    #[test]
    fn test_is_transient() {
        assert!(PublishError::Network("connection reset".to_string()).is_transient());
        assert!(PublishError::RateLimit("too many requests".to_string()).is_transient());
        assert!(!PublishError::Authentication("expired".to_string()).is_transient());
        assert!(!PublishError::Validation("bad url".to_string()).is_transient());
        assert!(!PublishError::ContainerFailed {
            container_id: "c1".to_string()
        }
        .is_transient());
        assert!(!PublishError::Timeout {
            container_id: "c1".to_string()
        }
        .is_transient());
    }

    #[test]
    fn test_api_error_payload() {
        let error = PublishError::Api {
            message: "media creation failed".to_string(),
            payload: Some(r#"{"error":{"code":100}}"#.to_string()),
        };
        assert_eq!(error.payload(), Some(r#"{"error":{"code":100}}"#));
        assert_eq!(
            PublishError::Network("down".to_string()).payload(),
            None
        );
    }

    #[test]
    fn test_error_conversion_from_publish_error() {
        let publish_error = PublishError::Validation("unsupported media url".to_string());
        let error: GramcastError = publish_error.into();

        match error {
            GramcastError::Publish(_) => {}
            _ => panic!("Expected GramcastError::Publish"),
        }
    }

    #[test]
    fn test_error_message_formatting() {
        let error = GramcastError::Publish(PublishError::RateLimit(
            "Application request limit reached".to_string(),
        ));
        assert_eq!(
            format!("{}", error),
            "Publish error: Rate limit exceeded: Application request limit reached"
        );
    }

    #[test]
    fn test_publish_error_clone() {
        let original = PublishError::Network("Connection failed".to_string());
        let cloned = original.clone();
        assert_eq!(format!("{}", original), format!("{}", cloned));
    }
}
