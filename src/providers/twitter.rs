//! Twitter API v2 client for the mentions timeline, recent search and posting.
//!
//! Reads use the app bearer token; posts use the user token handed out by the
//! configured [`Authorizer`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::error::BotError;
use crate::models::{CandidateItem, Metrics, ReferencedItem, SearchRequest};
use crate::providers::{Authorizer, SocialPlatform};

/// Twitter API v2 base URL
pub const TWITTER_API_BASE: &str = "https://api.twitter.com/2";

/// Mentions page size (API maximum)
const MENTIONS_PAGE_SIZE: &str = "100";

const TWEET_FIELDS: &str = "author_id,created_at,public_metrics,referenced_tweets";
const EXPANSIONS: &str = "referenced_tweets.id,referenced_tweets.id.author_id";

#[derive(Debug, Deserialize)]
pub(crate) struct TweetsResponse {
    pub data: Option<Vec<ApiTweet>>,
    pub includes: Option<Includes>,
    pub errors: Option<Vec<ApiError>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Includes {
    #[serde(default)]
    pub tweets: Vec<ApiTweet>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct ApiTweet {
    pub id: String,
    #[serde(default)]
    pub text: String,
    pub author_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub public_metrics: Option<PublicMetrics>,
    pub referenced_tweets: Option<Vec<ReferencedTweet>>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct PublicMetrics {
    pub impression_count: Option<u64>,
    pub reply_count: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct ReferencedTweet {
    #[serde(rename = "type")]
    pub ref_type: String,
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiError {
    #[serde(default)]
    pub message: String,
    pub detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostTweetResponse {
    data: Option<PostedTweet>,
    errors: Option<Vec<ApiError>>,
}

#[derive(Debug, Deserialize)]
struct PostedTweet {
    id: String,
}

impl From<PublicMetrics> for Metrics {
    fn from(m: PublicMetrics) -> Self {
        Metrics {
            impression_count: m.impression_count,
            reply_count: m.reply_count,
        }
    }
}

fn join_errors(errors: &[ApiError]) -> String {
    errors
        .iter()
        .map(|e| e.detail.clone().unwrap_or_else(|| e.message.clone()))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Resolves each tweet's parent (the replied-to tweet, else the quoted one)
/// from the `includes` side list. A parent missing from `includes` is kept
/// with empty text so the item never passes the length rule.
pub(crate) fn candidates_from_response(response: TweetsResponse) -> Vec<CandidateItem> {
    let included = response.includes.map(|i| i.tweets).unwrap_or_default();

    response
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|tweet| {
            let parent_ref = tweet.referenced_tweets.as_ref().and_then(|refs| {
                refs.iter()
                    .find(|r| r.ref_type == "replied_to")
                    .or_else(|| refs.iter().find(|r| r.ref_type == "quoted"))
            });

            let referenced = parent_ref.map(|r| match included.iter().find(|t| t.id == r.id) {
                Some(parent) => ReferencedItem {
                    id: parent.id.clone(),
                    text: parent.text.clone(),
                    author_id: parent.author_id.clone(),
                    metrics: parent.public_metrics.clone().map(Metrics::from),
                },
                None => ReferencedItem {
                    id: r.id.clone(),
                    text: String::new(),
                    author_id: None,
                    metrics: None,
                },
            });

            let mut item = CandidateItem::new(tweet.id, tweet.text);
            item.author_id = tweet.author_id;
            item.created_at = tweet.created_at;
            item.metrics = tweet.public_metrics.map(Metrics::from);
            item.referenced = referenced;
            item
        })
        .collect()
}

pub struct TwitterClient {
    client: reqwest::Client,
    api_base: String,
    bearer_token: String,
    bot_id: String,
    auth: Arc<dyn Authorizer>,
}

impl TwitterClient {
    pub fn new(bearer_token: &str, bot_id: &str, auth: Arc<dyn Authorizer>) -> Self {
        TwitterClient {
            client: reqwest::Client::new(),
            api_base: TWITTER_API_BASE.to_string(),
            bearer_token: bearer_token.to_string(),
            bot_id: bot_id.to_string(),
            auth,
        }
    }

    async fn get_tweets(&self, url: &str, params: &[(&str, String)]) -> Result<Vec<CandidateItem>, BotError> {
        log::debug!("Making request to: {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.bearer_token)
            .query(params)
            .send()
            .await
            .map_err(|e| BotError::FetchFailed(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(BotError::FetchFailed(format!("API error ({}): {}", status, body)));
        }

        let data: TweetsResponse = serde_json::from_str(&body)
            .map_err(|e| BotError::FetchFailed(format!("Failed to parse response: {}", e)))?;

        if let Some(errors) = &data.errors {
            let message = join_errors(errors);
            if data.data.is_none() {
                return Err(BotError::FetchFailed(format!("Twitter API errors: {}", message)));
            }
            log::warn!("Twitter: partial errors in response: {}", message);
        }

        Ok(candidates_from_response(data))
    }

    async fn post(&self, body: serde_json::Value) -> Result<String, BotError> {
        let url = format!("{}/tweets", self.api_base);
        let token = self.auth.access_token().await?;

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| BotError::PostFailed(format!("Request failed: {}", e)))?;

        let status = response.status();
        let response_body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(BotError::from_post_failure(format!(
                "API error ({}): {}",
                status, response_body
            )));
        }

        let data: PostTweetResponse = serde_json::from_str(&response_body)
            .map_err(|e| BotError::PostFailed(format!("Failed to parse response: {}", e)))?;

        if let Some(errors) = &data.errors {
            if data.data.is_none() {
                return Err(BotError::from_post_failure(join_errors(errors)));
            }
        }

        data.data
            .map(|tweet| tweet.id)
            .ok_or_else(|| BotError::PostFailed("No tweet data returned".to_string()))
    }
}

#[async_trait]
impl SocialPlatform for TwitterClient {
    async fn fetch_mentions(&self, since_id: Option<&str>) -> Result<Vec<CandidateItem>, BotError> {
        let url = format!("{}/users/{}/mentions", self.api_base, self.bot_id);
        let mut params = vec![
            ("max_results", MENTIONS_PAGE_SIZE.to_string()),
            ("expansions", EXPANSIONS.to_string()),
            ("tweet.fields", TWEET_FIELDS.to_string()),
        ];
        if let Some(id) = since_id {
            params.push(("since_id", id.to_string()));
        }
        self.get_tweets(&url, &params).await
    }

    async fn search_recent(&self, request: &SearchRequest) -> Result<Vec<CandidateItem>, BotError> {
        let url = format!("{}/tweets/search/recent", self.api_base);
        let mut params = vec![
            ("query", request.query.clone()),
            ("max_results", request.max_results.clamp(10, 100).to_string()),
            ("expansions", EXPANSIONS.to_string()),
            ("tweet.fields", TWEET_FIELDS.to_string()),
        ];
        if let Some(start) = request.start_time {
            params.push(("start_time", start.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }
        self.get_tweets(&url, &params).await
    }

    async fn post_reply(&self, text: &str, in_reply_to_id: &str) -> Result<String, BotError> {
        let id = self
            .post(json!({
                "text": text,
                "reply": { "in_reply_to_tweet_id": in_reply_to_id }
            }))
            .await?;
        log::info!("Twitter: replied to {} with tweet {}", in_reply_to_id, id);
        Ok(id)
    }

    async fn post_quote(&self, text: &str, quoted_id: &str) -> Result<String, BotError> {
        let id = self
            .post(json!({
                "text": text,
                "quote_tweet_id": quoted_id
            }))
            .await?;
        log::info!("Twitter: quoted {} with tweet {}", quoted_id, id);
        Ok(id)
    }
}
