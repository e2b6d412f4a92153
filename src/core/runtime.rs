use std::cmp::Ordering;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::{sleep, Duration, Instant};

use crate::{
    character::CharacterConfig,
    config::{Config, ModelProvider},
    core::agent::Agent,
    core::eligibility::{self, strip_mentions, EligibilityContext},
    core::prompt::PromptComposer,
    error::BotError,
    memory::{FileCache, KeyValueStore, RunStateStore},
    models::{CandidateItem, Outcome, SearchRequest, Source},
    providers::anthropic::AnthropicModel,
    providers::openai::OpenAiModel,
    providers::search::GoogleSearch,
    providers::twitter::TwitterClient,
    providers::{Authorizer, LanguageModel, SocialPlatform, WebSearch},
};

/// Snowflake ids order numerically: shorter is older, then lexicographic.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn sort_oldest_first(items: &mut [CandidateItem]) {
    items.sort_by(|a, b| compare_ids(&a.id, &b.id));
}

#[derive(Debug, Default, Clone)]
pub struct TickSummary {
    pub fetched: usize,
    pub ineligible: usize,
    pub failed: usize,
    pub outcomes: Vec<(String, Outcome)>,
}

impl TickSummary {
    pub fn sent(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, Outcome::Sent { .. }))
            .count()
    }
}

pub struct Runtime {
    config: Arc<Config>,
    platform: Arc<dyn SocialPlatform>,
    auth: Arc<dyn Authorizer>,
    agent: Agent,
    state: RunStateStore,
    prompt: String,
    reply_prompt: String,
    fallback_reply: String,
}

impl Runtime {
    pub fn new(
        config: Arc<Config>,
        character: &CharacterConfig,
        platform: Arc<dyn SocialPlatform>,
        auth: Arc<dyn Authorizer>,
        agent: Agent,
        cache: Arc<dyn KeyValueStore>,
    ) -> Self {
        let state = RunStateStore::new(cache, config.state_ttl, config.checked_capacity);
        let prompt = config
            .prompt_template
            .clone()
            .unwrap_or_else(|| character.prompt.clone());
        let reply_prompt = config
            .reply_prompt_template
            .clone()
            .unwrap_or_else(|| character.reply_prompt.clone());

        Runtime {
            config,
            platform,
            auth,
            agent,
            state,
            prompt,
            reply_prompt,
            fallback_reply: character.fallback_reply.clone(),
        }
    }

    /// Wires the production collaborators named by the configuration.
    pub fn from_config(config: Arc<Config>, character: &CharacterConfig, auth: Arc<dyn Authorizer>) -> Self {
        let model: Arc<dyn LanguageModel> = match config.model.provider {
            ModelProvider::OpenAi => Arc::new(OpenAiModel::new(config.model.clone())),
            ModelProvider::Anthropic => Arc::new(AnthropicModel::new(config.model.clone())),
        };
        let search: Option<Arc<dyn WebSearch>> = config
            .search
            .clone()
            .map(|settings| Arc::new(GoogleSearch::new(settings)) as Arc<dyn WebSearch>);

        let composer = PromptComposer::new(
            &character.name,
            &config.bot_handle,
            config.model.endpoint,
            search.is_some(),
        );
        let agent = Agent::new(model, search, composer, config.evidence_limit);

        let platform = Arc::new(TwitterClient::new(
            &config.twitter.bearer_token,
            &config.bot_id,
            auth.clone(),
        ));
        let cache = Arc::new(FileCache::new(config.storage_dir.join("cache.json")));

        Self::new(config, character, platform, auth, agent, cache)
    }

    fn task_prompt(&self, source: Source) -> &str {
        match source {
            Source::Mention => &self.reply_prompt,
            Source::Search => &self.prompt,
        }
    }

    async fn post(&self, source: Source, text: &str, item_id: &str) -> Result<String, BotError> {
        match source {
            Source::Mention => self.platform.post_reply(text, item_id).await,
            Source::Search => self.platform.post_quote(text, item_id).await,
        }
    }

    /// Generates a verdict for one eligible item and delivers it. Only a
    /// "too long" rejection loops, regenerating the whole verdict, and at most
    /// `max_attempts` rounds run. Model failures, lost authorization and
    /// token refresh errors come back as `Err`; post rejections end in an
    /// `Outcome`.
    pub async fn respond(&self, item: &CandidateItem, source: Source) -> Result<Outcome, BotError> {
        let text = strip_mentions(item.claim_text(source));
        let task_prompt = self.task_prompt(source);
        let mut attempt: u32 = 0;

        loop {
            if attempt >= self.config.max_attempts {
                log::warn!("Giving up on {} after {} too-long replies", item.id, attempt);
                return Ok(Outcome::Abandoned { attempts: attempt });
            }

            let mut reply = self.agent.resolve(&text, task_prompt, attempt).await?;

            if reply.is_empty() {
                if source == Source::Search || self.config.silent_mode {
                    log::info!("No verdict for {}", item.id);
                    return Ok(Outcome::NoVerdict);
                }
                reply = self.fallback_reply.clone();
            }

            if self.config.silent_mode {
                log::info!("[silent] would answer {}: {}", item.id, reply);
                return Ok(Outcome::SkippedSilent { reply });
            }

            sleep(self.config.post_delay).await;

            match self.post(source, &reply, &item.id).await {
                Ok(post_id) => {
                    log::info!("Answered {} ({} chars): {}", item.id, reply.chars().count(), reply);
                    return Ok(Outcome::Sent {
                        post_id,
                        attempts: attempt + 1,
                    });
                }
                Err(BotError::PostTooLong(message)) => {
                    log::warn!("Reply to {} too long (attempt {}): {}", item.id, attempt + 1, message);
                    attempt += 1;
                }
                Err(e) if e.is_terminal() => {
                    log::error!("Error sending reply to {}: {}", item.id, e);
                    return Ok(Outcome::Failed {
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Answers new mentions. The cursor moves past every item that reached a
    /// terminal outcome; a model failure ends the batch so that item is
    /// retried next run. Silent mode leaves the cursor where it was.
    pub async fn run_mentions_tick(&self) -> Result<TickSummary, BotError> {
        let state = self.state.load()?;
        let pending_cursor = state.last_mention_id.clone();

        if !self.config.silent_mode && !self.auth.has_valid_access().await {
            if let Some(cursor) = &pending_cursor {
                self.state.save_mention_cursor(cursor)?;
            }
            let url = self.auth.reauthorization_url()?;
            log::error!("Open the following URL and re-run the bot: {}", url);
            return Err(BotError::AuthorizationRequired { url });
        }

        let mut mentions = self.platform.fetch_mentions(pending_cursor.as_deref()).await?;
        sort_oldest_first(&mut mentions);
        log::info!("Found {} new mentions", mentions.len());

        let mut summary = TickSummary {
            fetched: mentions.len(),
            ..Default::default()
        };
        let mut cursor = pending_cursor.clone();

        for mention in &mentions {
            let ctx = EligibilityContext::from_config(&self.config, Source::Mention, &state.checked);
            match eligibility::check(mention, &ctx) {
                Err(reason) => {
                    log::debug!("Skipping mention {}: {}", mention.id, reason);
                    summary.ineligible += 1;
                }
                Ok(()) => {
                    log::info!("Processing mention {}: {}", mention.id, mention.claim_text(Source::Mention));
                    match self.respond(mention, Source::Mention).await {
                        Ok(outcome) => summary.outcomes.push((mention.id.clone(), outcome)),
                        Err(e) => {
                            summary.failed += 1;
                            self.flush_cursor(&cursor)?;
                            if let BotError::AuthorizationRequired { url } = &e {
                                log::error!("Open the following URL and re-run the bot: {}", url);
                                return Err(e);
                            }
                            log::error!("Stopping mentions batch at {}: {}", mention.id, e);
                            return Ok(summary);
                        }
                    }
                }
            }

            if !self.config.silent_mode {
                cursor = Some(mention.id.clone());
            }
        }

        self.flush_cursor(&cursor)?;
        Ok(summary)
    }

    fn flush_cursor(&self, cursor: &Option<String>) -> Result<(), BotError> {
        match cursor {
            Some(id) => self.state.save_mention_cursor(id),
            None => Ok(()),
        }
    }

    /// Quote-answers recent posts matching the search query, oldest first.
    /// Items that reached an outcome join the checked set; the set is saved
    /// once at the end of the batch.
    pub async fn run_search_tick(&self) -> Result<TickSummary, BotError> {
        let mut state = self.state.load()?;

        if !self.config.silent_mode && !self.auth.has_valid_access().await {
            let url = self.auth.reauthorization_url()?;
            log::error!("Open the following URL and re-run the bot: {}", url);
            return Err(BotError::AuthorizationRequired { url });
        }

        let window_start = Utc::now();
        let request = SearchRequest {
            query: self.config.search_query.clone(),
            max_results: self.config.max_results,
            start_time: if self.config.search_since_last_window {
                state.last_search_window_start
            } else {
                None
            },
        };

        let mut items = self.platform.search_recent(&request).await?;
        sort_oldest_first(&mut items);
        log::info!("Search returned {} posts", items.len());

        let mut summary = TickSummary {
            fetched: items.len(),
            ..Default::default()
        };

        for item in &items {
            let verdict = {
                let ctx = EligibilityContext::from_config(&self.config, Source::Search, &state.checked);
                eligibility::check(item, &ctx)
            };
            if let Err(reason) = verdict {
                log::debug!("Skipping post {}: {}", item.id, reason);
                summary.ineligible += 1;
                continue;
            }

            sleep(self.config.model_delay).await;
            log::info!("Checking post {}: {}", item.id, item.text);

            match self.respond(item, Source::Search).await {
                Ok(outcome) => {
                    state.checked.insert(item.id.clone());
                    summary.outcomes.push((item.id.clone(), outcome));
                }
                Err(e @ BotError::AuthorizationRequired { .. }) => {
                    self.state.save_search_state(&state)?;
                    return Err(e);
                }
                Err(e) => {
                    log::error!("Failed to check post {}: {}", item.id, e);
                    summary.failed += 1;
                }
            }
        }

        state.last_search_window_start = Some(window_start);
        log::debug!("Checked set holds {} ids", state.checked.len());
        self.state.save_search_state(&state)?;
        Ok(summary)
    }

    fn log_tick(name: &str, result: Result<TickSummary, BotError>) {
        match result {
            Ok(summary) => log::info!(
                "{} tick: {} fetched, {} ineligible, {} answered, {} failed",
                name,
                summary.fetched,
                summary.ineligible,
                summary.sent(),
                summary.failed
            ),
            Err(BotError::AuthorizationRequired { url }) => {
                log::error!("{} tick needs authorization: {}", name, url)
            }
            Err(e) => log::error!("Error in {} tick: {}", name, e),
        }
    }

    /// Runs both ticks on their intervals until the process is stopped.
    pub async fn run_periodically(&self) -> Result<(), BotError> {
        log::info!("=== Starting debunk bot ===");
        log::info!("Bot: @{} ({})", self.config.bot_handle, self.config.bot_id);
        log::info!("Silent mode: {}", self.config.silent_mode);
        log::info!(
            "Mentions every {:?}, search every {:?}",
            self.config.mentions_interval,
            self.config.search_interval
        );

        let mut last_mentions: Option<Instant> = None;
        let mut last_search: Option<Instant> = None;
        let due = |last: Option<Instant>, every: Duration| last.map_or(true, |at| at.elapsed() >= every);

        loop {
            if due(last_mentions, self.config.mentions_interval) {
                last_mentions = Some(Instant::now());
                Self::log_tick("mentions", self.run_mentions_tick().await);
            }

            if due(last_search, self.config.search_interval) {
                last_search = Some(Instant::now());
                Self::log_tick("search", self.run_search_tick().await);
            }

            sleep(Duration::from_secs(1)).await;
        }
    }
}
