use thiserror::Error;

/// Application-wide error types.
///
/// This enum represents all errors that can surface from matchday components.
/// It uses the `thiserror` crate for ergonomic error handling and automatic
/// conversion from underlying library errors.
///
/// # Error Conversion
///
/// - `sqlx::Error` → `AppError::DatabaseError`
/// - `serde_json::Error` → `AppError::SerializationError`
///
/// # Classification
///
/// Two classifiers drive how the rest of the system reacts to an error:
///
/// - [`is_retryable`](AppError::is_retryable) — whether the *next scheduled
///   run* is expected to succeed. There is no in-run retry anywhere; a failed
///   work unit simply does not contribute a change signal and is picked up
///   again on the next cadence tick.
/// - [`counts_toward_health`](AppError::counts_toward_health) — whether the
///   failure should increment a provider's consecutive-failure count. A
///   structural mismatch (an external record with no matching internal
///   entity) is logged and skipped but says nothing about the provider's
///   availability, so it never degrades health.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// Provider call failed in transit: network error, 5xx, connection reset.
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Provider responded, but the payload could not be interpreted.
    ///
    /// Adapters are responsible for distinguishing a known-empty response
    /// (which is a success) from an unparseable one (which is this error).
    #[error("Parse error: {0}")]
    ParseError(String),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A provider call exceeded its timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Too many calls in a short period; the provider pushed back.
    #[error("Rate limit exceeded. Please wait and try again.")]
    RateLimitExceeded,

    /// An external record references an entity we do not track.
    ///
    /// The record is skipped; this is not a provider failure.
    #[error("Structural mismatch: {0}")]
    StructuralMismatch(String),

    /// Configuration file error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic application error for cases not covered by specific variants.
    ///
    /// Use this sparingly - prefer creating specific error variants.
    #[error("Error: {0}")]
    Generic(String),
}

impl AppError {
    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::DatabaseError(e) => {
                if e.to_string().contains("connection") {
                    "Cannot connect to database. Is PostgreSQL running?\n   Try: docker-compose up -d".to_string()
                } else {
                    format!("Database error: {}", e)
                }
            }
            AppError::ProviderError(msg) => {
                if msg.contains("connect") {
                    format!(
                        "Cannot reach provider: {}\n   Check your network connection and the feed location.",
                        msg
                    )
                } else {
                    format!("Provider error: {}", msg)
                }
            }
            AppError::Timeout(secs) => {
                format!(
                    "Request timed out after {} seconds.\n   The provider may be overloaded. It will be retried on the next run.",
                    secs
                )
            }
            AppError::RateLimitExceeded => {
                "Too many requests. Increase the provider cooldown or reduce the batch size."
                    .to_string()
            }
            AppError::ConfigError(msg) => {
                format!(
                    "Configuration error: {}\n   Check your providers.toml.",
                    msg
                )
            }
            _ => self.to_string(),
        }
    }

    /// Returns true if the next scheduled run is expected to clear this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use matchday_core::error::AppError;
    ///
    /// assert!(AppError::ProviderError("connection reset".into()).is_retryable());
    /// assert!(AppError::RateLimitExceeded.is_retryable());
    /// assert!(!AppError::ConfigError("bad providers.toml".into()).is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::ProviderError(_)
                | AppError::ParseError(_)
                | AppError::Timeout(_)
                | AppError::RateLimitExceeded
        )
    }

    /// Returns true if this failure should count against the provider's
    /// consecutive-failure threshold.
    ///
    /// Transport problems, timeouts, rate limiting, and unparseable payloads
    /// all indicate the provider is not currently trustworthy. A structural
    /// mismatch or a local configuration/database problem does not.
    ///
    /// # Examples
    ///
    /// ```
    /// use matchday_core::error::AppError;
    ///
    /// assert!(AppError::Timeout(30).counts_toward_health());
    /// assert!(!AppError::StructuralMismatch("unknown team 'FC Ghost'".into())
    ///     .counts_toward_health());
    /// ```
    pub fn counts_toward_health(&self) -> bool {
        match self {
            AppError::ProviderError(_)
            | AppError::ParseError(_)
            | AppError::Timeout(_)
            | AppError::RateLimitExceeded => true,

            AppError::StructuralMismatch(_)
            | AppError::DatabaseError(_)
            | AppError::SerializationError(_)
            | AppError::ConfigError(_)
            | AppError::Generic(_) => false,
        }
    }
}
