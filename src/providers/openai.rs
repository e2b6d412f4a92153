use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ModelSettings;
use crate::error::BotError;
use crate::models::{ModelRequest, ModelTurn};
use crate::providers::LanguageModel;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [ModelTurn],
    n: u32,
    temperature: f64,
    max_tokens: u64,
}

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u32,
    temperature: f64,
    max_tokens: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChoicesResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// A chat choice carries `message.content`, a completion choice `text`.
#[derive(Debug, Deserialize)]
pub(crate) struct Choice {
    pub text: Option<String>,
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChoiceMessage {
    pub content: Option<String>,
}

impl Choice {
    pub fn into_text(self) -> String {
        self.message
            .and_then(|m| m.content)
            .or(self.text)
            .unwrap_or_default()
    }
}

pub(crate) fn choice_texts(response: ChoicesResponse) -> Vec<String> {
    response.choices.into_iter().map(Choice::into_text).collect()
}

/// OpenAI chat and legacy completions endpoints, asking for `n` choices.
pub struct OpenAiModel {
    client: reqwest::Client,
    api_base: String,
    settings: ModelSettings,
}

impl OpenAiModel {
    pub fn new(settings: ModelSettings) -> Self {
        OpenAiModel {
            client: reqwest::Client::new(),
            api_base: OPENAI_API_BASE.to_string(),
            settings,
        }
    }

    async fn send<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Vec<String>, BotError> {
        let url = format!("{}/{}", self.api_base, path);
        log::debug!("Making request to: {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| BotError::ModelRequestFailed(format!("Request failed: {}", e)))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(BotError::ModelRequestFailed(format!(
                "API request failed with status: {}. Response: {}",
                status, text
            )));
        }

        let parsed: ChoicesResponse = serde_json::from_str(&text)
            .map_err(|e| BotError::ModelRequestFailed(format!("Failed to parse response: {}", e)))?;
        Ok(choice_texts(parsed))
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    async fn complete(&self, request: &ModelRequest) -> Result<Vec<String>, BotError> {
        let s = &self.settings;
        match request {
            ModelRequest::Chat(turns) => {
                let body = ChatBody {
                    model: s.name.as_str(),
                    messages: turns.as_slice(),
                    n: s.choices,
                    temperature: s.temperature,
                    max_tokens: s.max_tokens,
                };
                self.send("chat/completions", &body).await
            }
            ModelRequest::Completion(prompt) => {
                let body = CompletionBody {
                    model: s.name.as_str(),
                    prompt: prompt.as_str(),
                    n: s.choices,
                    temperature: s.temperature,
                    max_tokens: s.max_tokens,
                };
                self.send("completions", &body).await
            }
        }
    }
}
