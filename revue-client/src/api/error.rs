use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The service has no procedure under the requested name
    #[error("Missing procedure: {0}")]
    MissingProcedure(String),

    /// A referenced row (media item, post, parent comment, author) does not exist
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// The procedure ran but refused the request (`success: false`)
    #[error("Rejected: {0}")]
    Rejected(String),
}

impl ApiError {
    /// Whether repeating the same call could succeed: transport failures and 5xx
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(e) => !e.is_decode() && !e.is_builder(),
            ApiError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
