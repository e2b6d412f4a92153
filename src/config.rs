use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::BotError;

/// Which posts found by search may be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPolicy {
    /// Reject posts that open with an `@handle` (replies and mentions).
    SkipReplies,
    /// Reject posts that already have replies.
    SkipAnswered,
    Both,
    None,
}

impl SearchPolicy {
    pub fn skips_replies(self) -> bool {
        matches!(self, SearchPolicy::SkipReplies | SearchPolicy::Both)
    }

    pub fn skips_answered(self) -> bool {
        matches!(self, SearchPolicy::SkipAnswered | SearchPolicy::Both)
    }
}

impl FromStr for SearchPolicy {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip_replies" => Ok(SearchPolicy::SkipReplies),
            "skip_answered" => Ok(SearchPolicy::SkipAnswered),
            "both" => Ok(SearchPolicy::Both),
            "none" => Ok(SearchPolicy::None),
            other => Err(BotError::Config(format!("unknown SEARCH_POLICY '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelProvider {
    OpenAi,
    Anthropic,
}

/// Shape of the request sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelEndpoint {
    Chat,
    Completions,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub provider: ModelProvider,
    pub endpoint: ModelEndpoint,
    pub name: String,
    pub api_key: String,
    pub choices: u32,
    pub temperature: f64,
    pub max_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub api_key: String,
    pub engine_id: String,
}

#[derive(Debug, Clone)]
pub struct TwitterSettings {
    pub bearer_token: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Process configuration, read once at startup and never reloaded.
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_id: String,
    pub bot_handle: String,
    pub character_name: String,
    pub search_query: String,
    pub prompt_template: Option<String>,
    pub reply_prompt_template: Option<String>,
    pub silent_mode: bool,
    pub max_results: u32,
    /// Negative disables the impression check.
    pub impression_threshold: i64,
    pub min_text_length: usize,
    pub max_mentions: usize,
    pub search_policy: SearchPolicy,
    pub search_since_last_window: bool,
    pub evidence_limit: usize,
    pub max_attempts: u32,
    pub model_delay: Duration,
    pub post_delay: Duration,
    pub state_ttl: Duration,
    pub checked_capacity: usize,
    pub mentions_interval: Duration,
    pub search_interval: Duration,
    pub storage_dir: PathBuf,
    pub model: ModelSettings,
    pub search: Option<SearchSettings>,
    pub twitter: TwitterSettings,
}

fn var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(key: &str) -> Result<String, BotError> {
    var(key).ok_or_else(|| BotError::Config(format!("{} not set", key)))
}

fn parsed<T: FromStr>(key: &str, default: T) -> Result<T, BotError> {
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| BotError::Config(format!("{} has invalid value '{}'", key, raw))),
        None => Ok(default),
    }
}

/// Keywords searched when `SEARCH_QUERY` is unset.
const DEFAULT_SEARCH_TERMS: &str = "(fake OR hoax OR misinformation OR debunked)";

/// Operators the search API only accepts next to a standalone term.
const CONJUNCTION_REQUIRED: &[&str] = &[
    "is:",
    "has:",
    "lang:",
    "sample:",
    "place_country:",
    "point_radius:",
    "bounding_box:",
];

/// Upper bound of the checked id set kept between runs.
pub const MAX_CHECKED_CAPACITY: usize = 500;

pub fn default_search_query(bot_handle: &str) -> String {
    format!(
        "{} -is:retweet -is:reply lang:en -from:{}",
        DEFAULT_SEARCH_TERMS, bot_handle
    )
}

/// True when the query has at least one term that is neither negated nor a
/// conjunction-required operator. Twitter rejects queries without one.
pub fn has_positive_term(query: &str) -> bool {
    query
        .split_whitespace()
        .map(|token| token.trim_start_matches('(').trim_end_matches(')'))
        .filter(|token| !token.is_empty() && *token != "OR")
        .any(|token| {
            !token.starts_with('-') && !CONJUNCTION_REQUIRED.iter().any(|op| token.starts_with(op))
        })
}

fn search_query_from(raw: Option<String>, bot_handle: &str) -> Result<String, BotError> {
    match raw {
        None => Ok(default_search_query(bot_handle)),
        Some(query) if has_positive_term(&query) => Ok(query),
        Some(query) => Err(BotError::Config(format!(
            "SEARCH_QUERY '{}' needs a search term besides negations and operators like lang:",
            query
        ))),
    }
}

fn checked_capacity_from(raw: usize) -> usize {
    let capacity = raw.clamp(1, MAX_CHECKED_CAPACITY);
    if capacity != raw {
        log::warn!("CHECKED_CAPACITY {} out of range, using {}", raw, capacity);
    }
    capacity
}

fn flag(key: &str) -> bool {
    matches!(
        var(key).map(|v| v.to_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

impl Config {
    pub fn from_env() -> Result<Self, BotError> {
        let provider = match var("MODEL_PROVIDER").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("openai") => ModelProvider::OpenAi,
            Some("anthropic") => ModelProvider::Anthropic,
            Some(other) => {
                return Err(BotError::Config(format!("unknown MODEL_PROVIDER '{}'", other)))
            }
        };

        let endpoint = match var("MODEL_ENDPOINT").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("chat") => ModelEndpoint::Chat,
            Some("completions") => ModelEndpoint::Completions,
            Some(other) => {
                return Err(BotError::Config(format!("unknown MODEL_ENDPOINT '{}'", other)))
            }
        };

        let (api_key, default_model) = match provider {
            ModelProvider::OpenAi => (required("OPENAI_API_KEY")?, "gpt-4o-mini"),
            ModelProvider::Anthropic => (required("ANTHROPIC_API_KEY")?, "claude-3-haiku-20240307"),
        };

        let search = match (var("GOOGLE_SEARCH_KEY"), var("GOOGLE_SEARCH_CX")) {
            (Some(api_key), Some(engine_id)) => Some(SearchSettings { api_key, engine_id }),
            _ => None,
        };

        let bot_handle = var("BOT_HANDLE")
            .unwrap_or_else(|| "pleasedebunk".to_string())
            .trim_start_matches('@')
            .to_string();

        Ok(Config {
            bot_id: required("BOT_ID")?,
            search_query: search_query_from(var("SEARCH_QUERY"), &bot_handle)?,
            bot_handle,
            character_name: var("CHARACTER_NAME").unwrap_or_else(|| "debunk".to_string()),
            prompt_template: var("PROMPT_TEMPLATE"),
            reply_prompt_template: var("REPLY_PROMPT_TEMPLATE"),
            silent_mode: flag("SILENT_MODE"),
            max_results: parsed("MAX_RESULTS", 10u32)?.clamp(10, 100),
            impression_threshold: parsed("IMPRESSION_THRESHOLD", -1i64)?,
            min_text_length: parsed("MIN_TEXT_LENGTH", 50usize)?,
            max_mentions: parsed("MAX_MENTIONS", 5usize)?,
            search_policy: parsed("SEARCH_POLICY", SearchPolicy::SkipReplies)?,
            search_since_last_window: flag("SEARCH_SINCE_LAST_WINDOW"),
            evidence_limit: parsed("EVIDENCE_LIMIT", 3usize)?.max(1),
            max_attempts: parsed("MAX_ATTEMPTS", 5u32)?.max(1),
            model_delay: Duration::from_secs(parsed("MODEL_DELAY_SECS", 5u64)?),
            post_delay: Duration::from_secs(parsed("POST_DELAY_SECS", 1u64)?),
            state_ttl: Duration::from_secs(parsed("STATE_TTL_SECS", 6 * 60 * 60u64)?),
            checked_capacity: checked_capacity_from(parsed("CHECKED_CAPACITY", MAX_CHECKED_CAPACITY)?),
            mentions_interval: Duration::from_secs(parsed("MENTIONS_INTERVAL_SECS", 60u64)?),
            search_interval: Duration::from_secs(parsed("SEARCH_INTERVAL_SECS", 15 * 60u64)?),
            storage_dir: PathBuf::from(var("STORAGE_DIR").unwrap_or_else(|| "./storage".to_string())),
            model: ModelSettings {
                provider,
                endpoint,
                name: var("MODEL_NAME").unwrap_or_else(|| default_model.to_string()),
                api_key,
                choices: parsed("MODEL_CHOICES", 1u32)?.max(1),
                temperature: parsed("MODEL_TEMPERATURE", 0.2f64)?,
                max_tokens: parsed("MODEL_MAX_TOKENS", 256u64)?,
            },
            search,
            twitter: TwitterSettings {
                bearer_token: required("TWITTER_BEARER_TOKEN")?,
                client_id: required("TWITTER_CLIENT_ID")?,
                client_secret: required("TWITTER_CLIENT_SECRET")?,
                redirect_uri: var("TWITTER_REDIRECT_URI")
                    .unwrap_or_else(|| "http://localhost:8080/callback".to_string()),
            },
        })
    }

    #[cfg(test)]
    pub fn for_bot(bot_id: &str, bot_handle: &str) -> Self {
        Config {
            bot_id: bot_id.to_string(),
            bot_handle: bot_handle.to_string(),
            character_name: "debunk".to_string(),
            search_query: default_search_query(bot_handle),
            prompt_template: None,
            reply_prompt_template: None,
            silent_mode: false,
            max_results: 10,
            impression_threshold: -1,
            min_text_length: 50,
            max_mentions: 5,
            search_policy: SearchPolicy::SkipReplies,
            search_since_last_window: false,
            evidence_limit: 3,
            max_attempts: 5,
            model_delay: Duration::ZERO,
            post_delay: Duration::ZERO,
            state_ttl: Duration::from_secs(6 * 60 * 60),
            checked_capacity: MAX_CHECKED_CAPACITY,
            mentions_interval: Duration::from_secs(60),
            search_interval: Duration::from_secs(15 * 60),
            storage_dir: PathBuf::from("./storage"),
            model: ModelSettings {
                provider: ModelProvider::OpenAi,
                endpoint: ModelEndpoint::Chat,
                name: "gpt-4o-mini".to_string(),
                api_key: String::new(),
                choices: 1,
                temperature: 0.2,
                max_tokens: 256,
            },
            search: None,
            twitter: TwitterSettings {
                bearer_token: String::new(),
                client_id: String::new(),
                client_secret: String::new(),
                redirect_uri: "http://localhost:8080/callback".to_string(),
            },
        }
    }
}
