use async_trait::async_trait;
use rig::completion::Prompt;
use rig::providers::anthropic;

use crate::config::ModelSettings;
use crate::error::BotError;
use crate::models::{ModelRequest, Role};
use crate::providers::LanguageModel;

/// Splits a request into the agent preamble (system turns) and the prompt
/// (user turns). A completion prompt has no preamble.
pub(crate) fn split_request(request: &ModelRequest) -> (Option<String>, String) {
    match request {
        ModelRequest::Chat(turns) => {
            let join = |role: Role| {
                turns
                    .iter()
                    .filter(|t| t.role == role)
                    .map(|t| t.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n")
            };
            let preamble = join(Role::System);
            let preamble = if preamble.is_empty() { None } else { Some(preamble) };
            (preamble, join(Role::User))
        }
        ModelRequest::Completion(prompt) => (None, prompt.clone()),
    }
}

/// Claude through a rig agent. The preamble changes with every request, so
/// an agent is built per call; Anthropic yields a single choice.
pub struct AnthropicModel {
    client: anthropic::Client,
    settings: ModelSettings,
}

impl AnthropicModel {
    pub fn new(settings: ModelSettings) -> Self {
        let client = anthropic::ClientBuilder::new(&settings.api_key).build();
        AnthropicModel { client, settings }
    }
}

#[async_trait]
impl LanguageModel for AnthropicModel {
    async fn complete(&self, request: &ModelRequest) -> Result<Vec<String>, BotError> {
        let (preamble, prompt) = split_request(request);

        let mut builder = self
            .client
            .agent(&self.settings.name)
            .temperature(self.settings.temperature)
            .max_tokens(self.settings.max_tokens);
        if let Some(preamble) = &preamble {
            builder = builder.preamble(preamble);
        }
        let agent = builder.build();

        let response = agent
            .prompt(&prompt)
            .await
            .map_err(|e| BotError::ModelRequestFailed(e.to_string()))?;
        Ok(vec![response.trim().to_string()])
    }
}
