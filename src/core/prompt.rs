use chrono::{NaiveDate, Utc};

use crate::config::ModelEndpoint;
use crate::models::{EvidenceResult, ModelRequest, ModelTurn};

pub const QUERY_START: &str = "QSTART";
pub const QUERY_END: &str = "QEND";

const BASE_BUDGET: usize = 250;
const BUDGET_STEP: usize = 40;
const MIN_BUDGET: usize = 100;

/// Character budget requested from the model on a given attempt.
pub fn reply_budget(attempt: u32) -> usize {
    BASE_BUDGET
        .saturating_sub(BUDGET_STEP * attempt as usize)
        .max(MIN_BUDGET)
}

/// Builds model requests around a claim. Chat mode sends a system turn and a
/// user turn; completion mode folds both into one prompt string.
#[derive(Debug, Clone)]
pub struct PromptComposer {
    bot_name: String,
    bot_handle: String,
    endpoint: ModelEndpoint,
    allow_search: bool,
}

impl PromptComposer {
    pub fn new(bot_name: &str, bot_handle: &str, endpoint: ModelEndpoint, allow_search: bool) -> Self {
        PromptComposer {
            bot_name: bot_name.to_string(),
            bot_handle: bot_handle.trim_start_matches('@').to_string(),
            endpoint,
            allow_search,
        }
    }

    pub fn compose_retry(
        &self,
        text: &str,
        task_prompt: &str,
        evidence: Option<&[EvidenceResult]>,
        attempt: u32,
    ) -> ModelRequest {
        self.compose_on(Utc::now().date_naive(), text, task_prompt, evidence, attempt)
    }

    pub fn compose_on(
        &self,
        today: NaiveDate,
        text: &str,
        task_prompt: &str,
        evidence: Option<&[EvidenceResult]>,
        attempt: u32,
    ) -> ModelRequest {
        let system = format!(
            "Today is {}. You are {} (@{}), a Twitter bot that checks whether the claims in tweets are true or false.",
            today.format("%B %-d, %Y"),
            self.bot_name,
            self.bot_handle
        );

        let mut user = format!("Tweet:\n\"\"\"\n{}\n\"\"\"\n\n{}", text, task_prompt.trim());

        if attempt > 0 {
            user.push_str(&format!(
                "\n\nYour previous answer did not fit in a tweet. Keep it under {} characters.",
                reply_budget(attempt)
            ));
        }

        match evidence {
            Some(results) => {
                let block = serde_json::to_string_pretty(results).unwrap_or_else(|_| "[]".to_string());
                if results.is_empty() {
                    user.push_str("\n\nA web search found nothing useful; rely on what you already know.");
                }
                user.push_str(&format!("\n\nWeb search results:\n```json\n{}\n```", block));
            }
            None if self.allow_search => {
                user.push_str(&format!(
                    "\n\nIf you need current information to judge the claim, do not answer yet. \
                     Reply only with a web search query written between {start} and {end}, \
                     for example: {start} unemployment rate in Germany 2024 {end}",
                    start = QUERY_START,
                    end = QUERY_END
                ));
            }
            None => {}
        }

        match self.endpoint {
            ModelEndpoint::Chat => ModelRequest::Chat(vec![ModelTurn::system(system), ModelTurn::user(user)]),
            ModelEndpoint::Completions => ModelRequest::Completion(format!("{}\n\n{}", system, user)),
        }
    }
}
