use thiserror::Error;

/// Error types for playlist matching operations.
///
/// Most of these never escape a whole run: the track searcher catches them at
/// the per-track boundary, logs them, and records a placeholder for the row.
/// Only failures of the row store itself are propagated to the caller.
///
/// # Error Handling Examples
///
/// ```rust,no_run
/// # use playlist_match::{MatchError, SpotifyProvider};
/// # tokio_test::block_on(async {
/// let http_client = http_client::native::NativeClient::new();
/// match SpotifyProvider::connect(Box::new(http_client), "id", "secret").await {
///     Ok(_) => println!("Connected"),
///     Err(MatchError::Auth(msg)) => eprintln!("Bad credentials: {}", msg),
///     Err(MatchError::RateLimit { retry_after }) => {
///         eprintln!("Rate limited, retry in {} seconds", retry_after);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # });
/// ```
#[derive(Error, Debug)]
pub enum MatchError {
    /// HTTP/network related errors.
    ///
    /// Connection failures, timeouts and non-success statuses returned by a
    /// search provider all end up here.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Authentication failures against a search provider.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Rate limiting signalled by a search provider.
    ///
    /// The `retry_after` field indicates how many seconds the provider asked
    /// us to wait before the next request.
    #[error("Rate limited, retry after {retry_after} seconds")]
    RateLimit {
        /// Number of seconds to wait before retrying
        retry_after: u64,
    },

    /// A provider response did not have the expected shape.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// A row is missing the artist or title needed to search for it.
    #[error("Malformed row {row}: {reason}")]
    MalformedRow {
        /// Key of the offending row
        row: usize,
        /// What was missing
        reason: String,
    },

    /// Invalid or missing configuration (credentials, config file values).
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system I/O errors, mostly from the row store.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MatchError {
    /// Whether this error came from talking to a remote service.
    ///
    /// Only transport errors count towards the failure burst that triggers a
    /// cooldown between tracks. Credential and configuration errors do not.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            MatchError::Http(_) | MatchError::RateLimit { .. } | MatchError::Parse(_)
        )
    }
}

impl From<config::ConfigError> for MatchError {
    fn from(err: config::ConfigError) -> Self {
        MatchError::Config(err.to_string())
    }
}
