use async_trait::async_trait;
use serde::Deserialize;

use crate::config::SearchSettings;
use crate::error::BotError;
use crate::models::EvidenceResult;
use crate::providers::WebSearch;

pub const GOOGLE_SEARCH_URL: &str = "https://www.googleapis.com/customsearch/v1";

/// The API returns at most 10 items per page.
const MAX_PAGE_SIZE: usize = 10;

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchItem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub snippet: String,
}

pub(crate) fn evidence_from_response(response: SearchResponse, limit: usize) -> Vec<EvidenceResult> {
    response
        .items
        .into_iter()
        .take(limit)
        .map(|item| EvidenceResult {
            title: item.title,
            link: item.link,
            snippet: item.snippet.split_whitespace().collect::<Vec<_>>().join(" "),
        })
        .collect()
}

/// Google Programmable Search Engine JSON API.
pub struct GoogleSearch {
    client: reqwest::Client,
    settings: SearchSettings,
}

impl GoogleSearch {
    pub fn new(settings: SearchSettings) -> Self {
        GoogleSearch {
            client: reqwest::Client::new(),
            settings,
        }
    }
}

#[async_trait]
impl WebSearch for GoogleSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<EvidenceResult>, BotError> {
        let num = limit.clamp(1, MAX_PAGE_SIZE).to_string();

        let response = self
            .client
            .get(GOOGLE_SEARCH_URL)
            .query(&[
                ("key", self.settings.api_key.as_str()),
                ("cx", self.settings.engine_id.as_str()),
                ("q", query),
                ("num", num.as_str()),
            ])
            .send()
            .await
            .map_err(|e| BotError::SearchFailed(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(BotError::SearchFailed(format!(
                "API request failed with status: {}. Response: {}",
                status, body
            )));
        }

        let parsed: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| BotError::SearchFailed(format!("Failed to parse response: {}", e)))?;
        Ok(evidence_from_response(parsed, limit))
    }
}
