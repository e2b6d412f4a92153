use thiserror::Error;

#[derive(Debug, Error)]
pub enum BotError {
    #[error("authorization required, open {url} and re-run")]
    AuthorizationRequired { url: String },

    #[error("model request failed: {0}")]
    ModelRequestFailed(String),

    #[error("post rejected as too long: {0}")]
    PostTooLong(String),

    #[error("post failed: {0}")]
    PostFailed(String),

    #[error("web search failed: {0}")]
    SearchFailed(String),

    #[error("authorization state does not match the issued request")]
    StateMismatch,

    #[error("fetch failed: {0}")]
    FetchFailed(String),

    #[error("state store error: {0}")]
    Store(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl BotError {
    /// Classifies a failed post by the platform's message.
    pub fn from_post_failure(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.to_lowercase().contains("too long") {
            BotError::PostTooLong(message)
        } else {
            BotError::PostFailed(message)
        }
    }

    /// Whether an item that hit this error is finished with and may be
    /// recorded as handled.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BotError::PostFailed(_) | BotError::PostTooLong(_))
    }
}

impl From<std::io::Error> for BotError {
    fn from(e: std::io::Error) -> Self {
        BotError::Store(e.to_string())
    }
}

impl From<serde_json::Error> for BotError {
    fn from(e: serde_json::Error) -> Self {
        BotError::Store(e.to_string())
    }
}
