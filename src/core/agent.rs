use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::prompt::PromptComposer;
use crate::error::BotError;
use crate::models::EvidenceResult;
use crate::providers::{LanguageModel, WebSearch};

static QUERY_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)QSTART\s*(.*?)\s*QEND").unwrap());

/// Replies shorter than this after cleanup are noise.
const MIN_REPLY_CHARS: usize = 10;

const QUOTES: [char; 3] = ['"', '\u{201C}', '\u{201D}'];

/// Returns the search query from the first choice that asks for one.
pub fn extract_search_query(choices: &[String]) -> Option<String> {
    choices.iter().find_map(|choice| {
        QUERY_PATTERN
            .captures(choice)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|query| !query.is_empty())
    })
}

fn ends_with_digit(s: &str) -> bool {
    s.chars().last().map_or(false, |c| c.is_ascii_digit())
}

/// Cleans one raw completion, or drops it when it carries the "no verdict"
/// sentinel or is too short to be an answer.
pub fn clean_candidate(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('0') {
        return None;
    }

    // A trailing 0 after a number is part of the number, not the sentinel.
    let mut text = trimmed;
    if let Some(rest) = text.strip_suffix("0.") {
        if !ends_with_digit(rest) {
            text = rest;
        }
    } else if let Some(rest) = text.strip_suffix("\".") {
        text = rest;
    } else if let Some(rest) = text.strip_suffix('0') {
        if !ends_with_digit(rest) {
            text = rest;
        }
    }

    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix(&QUOTES[..]) {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix(&QUOTES[..]) {
        text = rest;
    }
    let text = text.trim();

    if text.chars().count() < MIN_REPLY_CHARS {
        return None;
    }
    Some(text.to_string())
}

/// First usable reply among the choices, or an empty string.
pub fn extract_reply(choices: &[String]) -> String {
    choices
        .iter()
        .find_map(|choice| clean_candidate(choice))
        .unwrap_or_default()
}

/// Turns a claim into a verdict: asks the model, gives it one round of web
/// evidence when it asks for it, and extracts the reply.
pub struct Agent {
    model: Arc<dyn LanguageModel>,
    search: Option<Arc<dyn WebSearch>>,
    composer: PromptComposer,
    evidence_limit: usize,
}

impl Agent {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        search: Option<Arc<dyn WebSearch>>,
        composer: PromptComposer,
        evidence_limit: usize,
    ) -> Self {
        Agent {
            model,
            search,
            composer,
            evidence_limit: evidence_limit.max(1),
        }
    }

    /// Evidence results requested on a given attempt; later attempts ask for
    /// fewer so the model has less to summarise.
    pub fn evidence_limit_for(&self, attempt: u32) -> usize {
        self.evidence_limit.saturating_sub(attempt as usize).max(1)
    }

    async fn gather_evidence(&self, query: &str, limit: usize) -> Vec<EvidenceResult> {
        let Some(search) = &self.search else {
            log::debug!("Model asked for '{}' but web search is not configured", query);
            return Vec::new();
        };

        match search.search(query, limit).await {
            Ok(mut results) => {
                results.truncate(limit);
                log::info!("Search '{}' returned {} results", query, results.len());
                results
            }
            Err(e) => {
                log::warn!("Search '{}' failed, continuing without evidence: {}", query, e);
                Vec::new()
            }
        }
    }

    /// Runs the model once, plus at most one evidence round.
    pub async fn resolve(&self, text: &str, task_prompt: &str, attempt: u32) -> Result<String, BotError> {
        let request = self.composer.compose_retry(text, task_prompt, None, attempt);
        log::debug!("Model request:\n{}", request.text());
        let choices = self.model.complete(&request).await?;

        let Some(query) = extract_search_query(&choices) else {
            return Ok(extract_reply(&choices));
        };

        log::info!("Model requested evidence: {}", query);
        let evidence = self.gather_evidence(&query, self.evidence_limit_for(attempt)).await;

        let request = self
            .composer
            .compose_retry(text, task_prompt, Some(evidence.as_slice()), attempt);
        log::debug!("Model request with evidence:\n{}", request.text());
        let mut choices = self.model.complete(&request).await?;

        // No second evidence round; a repeated query is not an answer.
        choices.retain(|choice| !QUERY_PATTERN.is_match(choice));
        Ok(extract_reply(&choices))
    }
}
