use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("Blocked with HTTP {status} from {url} (challenge: {challenge})")]
    Blocked {
        status: u16,
        url: String,
        challenge: bool,
    },

    #[error("No products found on {url}")]
    EmptyPage { url: String },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Errors a fetch attempt may recover from on the next try.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.is_body()
                    || e.is_decode()
                    || e.status().is_some()
            }
            AppError::UnexpectedStatus { .. }
            | AppError::Blocked { .. }
            | AppError::EmptyPage { .. }
            | AppError::Browser(_) => true,
            _ => false,
        }
    }

    /// A challenge block means the session needs a fresh warm-up before retrying.
    pub fn needs_session_refresh(&self) -> bool {
        matches!(self, AppError::Blocked { challenge: true, .. })
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
