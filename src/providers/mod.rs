pub mod anthropic;
pub mod auth;
pub mod openai;
pub mod search;
pub mod twitter;

#[cfg(test)]
mod tests;

use async_trait::async_trait;

use crate::error::BotError;
use crate::models::{CandidateItem, EvidenceResult, ModelRequest, SearchRequest};

/// Text-generation backend. Returns every choice the backend produced,
/// already reduced to its text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> Result<Vec<String>, BotError>;
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<EvidenceResult>, BotError>;
}

#[async_trait]
pub trait SocialPlatform: Send + Sync {
    async fn fetch_mentions(&self, since_id: Option<&str>) -> Result<Vec<CandidateItem>, BotError>;
    async fn search_recent(&self, request: &SearchRequest) -> Result<Vec<CandidateItem>, BotError>;
    /// Returns the id of the new post.
    async fn post_reply(&self, text: &str, in_reply_to_id: &str) -> Result<String, BotError>;
    async fn post_quote(&self, text: &str, quoted_id: &str) -> Result<String, BotError>;
}

/// User-context access for posting.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn has_valid_access(&self) -> bool;
    async fn access_token(&self) -> Result<String, BotError>;
    fn reauthorization_url(&self) -> Result<String, BotError>;
}
