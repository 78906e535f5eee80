//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (missing environment variable, invalid flag, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport failure (connection refused, TLS, timeout)
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx API response with status and response body
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Rate limit still exhausted after the single automatic retry
    #[error("Rate limit exhausted after retry: {url}")]
    RateLimitExhausted { url: String },

    /// GraphQL response carried an errors array
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// Enumerating an entire resource type failed
    #[error("Enumeration failed for {resource}: {message}")]
    Enumeration { resource: String, message: String },

    /// External tool exited non-zero
    #[error("Tool `{program}` failed: {message}")]
    Tool { program: String, message: String },

    /// CSV read/parse error (secrets file, username mapping)
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Sealed-box encryption failed
    #[error("Encryption error: {0}")]
    Seal(String),

    /// IO error (staging files, CSV artifacts)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create an Api error from a status code and response body.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        MigrateError::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a Tool error.
    pub fn tool(program: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Tool {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Create an Enumeration error for a resource type.
    pub fn enumeration(resource: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Enumeration {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Process exit code for the CLI. Item-level failures never reach this;
    /// only process-level fatality maps to a non-zero exit.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) => 1,
            MigrateError::Http(_)
            | MigrateError::Api { .. }
            | MigrateError::RateLimitExhausted { .. }
            | MigrateError::GraphQl(_)
            | MigrateError::Enumeration { .. } => 2,
            MigrateError::Tool { .. } => 3,
            MigrateError::Csv(_) => 4,
            MigrateError::Seal(_) => 5,
            MigrateError::Json(_) => 6,
            MigrateError::Io(_) => 7,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(MigrateError::Config("x".into()).exit_code(), 1);
        assert_eq!(MigrateError::api(500, "boom").exit_code(), 2);
        assert_eq!(MigrateError::tool("git", "exit 128").exit_code(), 3);
        let io = MigrateError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(io.exit_code(), 7);
    }

    #[test]
    fn test_api_error_display_carries_status_and_body() {
        let err = MigrateError::api(422, "Validation Failed");
        assert_eq!(err.to_string(), "API error (422): Validation Failed");
    }
}
