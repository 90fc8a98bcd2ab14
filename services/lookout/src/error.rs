//! Error types for the lookout monitors

/// Errors that can occur in a lookout monitor
#[derive(Debug, thiserror::Error)]
pub enum LookoutError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{url} is unreachable: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("{url} returned HTTP status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Notifier error: {0}")]
    Notifier(String),
}

impl LookoutError {
    /// True for the failures a poll can produce. Connection problems and
    /// bad status codes are handled the same way by the monitors; the
    /// variant only matters for the log line.
    pub fn is_poll_failure(&self) -> bool {
        matches!(
            self,
            LookoutError::Unreachable { .. } | LookoutError::HttpStatus { .. }
        )
    }
}

/// Result type alias for lookout operations
pub type Result<T> = std::result::Result<T, LookoutError>;
