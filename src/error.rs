use thiserror::Error;

/// Main error type for the bot
#[derive(Error, Debug)]
pub enum BotError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Order errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Transient exchange failure: {0}")]
    Transient(String),

    #[error("Order rejected (code {code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("Fatal: {0}")]
    Fatal(String),

    // Authentication errors
    #[error("Authentication error: {0}")]
    Auth(String),
}

/// Result type alias for BotError
pub type Result<T> = std::result::Result<T, BotError>;

/// How a failed step is treated by the strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller error; never retried
    InvalidRequest,
    /// Timeouts, rate limits, 5xx; retried with a fixed backoff
    Transient,
    /// Exchange declined the order; recorded, not retried
    Rejected,
    /// Credentials or configuration; aborts the whole run
    Fatal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidRequest => write!(f, "invalid_request"),
            ErrorKind::Transient => write!(f, "transient"),
            ErrorKind::Rejected => write!(f, "rejected"),
            ErrorKind::Fatal => write!(f, "fatal"),
        }
    }
}

impl BotError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BotError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            BotError::Transient(_) => ErrorKind::Transient,
            BotError::Rejected { .. } => ErrorKind::Rejected,
            BotError::Http(e) => {
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    return ErrorKind::Transient;
                }
                match e.status() {
                    Some(s) if s.as_u16() == 401 || s.as_u16() == 403 => ErrorKind::Fatal,
                    Some(s) if s.is_client_error() => ErrorKind::Rejected,
                    Some(_) => ErrorKind::Transient,
                    // Body read failures after the order may have landed
                    None => ErrorKind::Transient,
                }
            }
            // A success response we cannot decode means the API contract changed
            BotError::Json(_) => ErrorKind::Fatal,
            BotError::Config(_) | BotError::Fatal(_) | BotError::Auth(_) => ErrorKind::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_order_errors() {
        assert_eq!(
            BotError::InvalidRequest("qty".into()).kind(),
            ErrorKind::InvalidRequest
        );
        assert_eq!(BotError::Transient("503".into()).kind(), ErrorKind::Transient);
        assert_eq!(
            BotError::Rejected {
                code: -2019,
                message: "Margin is insufficient.".into()
            }
            .kind(),
            ErrorKind::Rejected
        );
        assert_eq!(BotError::Auth("bad key".into()).kind(), ErrorKind::Fatal);
    }

    #[test]
    fn only_transient_is_retryable() {
        assert!(BotError::Transient("timeout".into()).is_retryable());
        assert!(!BotError::Fatal("config".into()).is_retryable());
        assert!(!BotError::InvalidRequest("price".into()).is_retryable());
    }
}
