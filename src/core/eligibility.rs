use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::{Config, SearchPolicy};
use crate::memory::CheckedIds;
use crate::models::{CandidateItem, Source};

static MENTION_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"@\w+").unwrap());

/// Everything the filter looks at besides the item itself.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityContext<'a> {
    pub bot_id: &'a str,
    pub bot_handle: &'a str,
    pub source: Source,
    pub checked: &'a CheckedIds,
    pub min_text_length: usize,
    pub max_mentions: usize,
    /// Negative disables the check.
    pub impression_threshold: i64,
    pub search_policy: SearchPolicy,
}

impl<'a> EligibilityContext<'a> {
    pub fn from_config(config: &'a Config, source: Source, checked: &'a CheckedIds) -> Self {
        EligibilityContext {
            bot_id: &config.bot_id,
            bot_handle: &config.bot_handle,
            source,
            checked,
            min_text_length: config.min_text_length,
            max_mentions: config.max_mentions,
            impression_threshold: config.impression_threshold,
            search_policy: config.search_policy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ineligible {
    SelfAuthored,
    AlreadyAnswered,
    IsReply,
    HasReplies(u64),
    TooShort(usize),
    OverMentioned(usize),
    LowReach(u64),
    AlreadyChecked,
}

impl std::fmt::Display for Ineligible {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ineligible::SelfAuthored => write!(f, "authored by the bot"),
            Ineligible::AlreadyAnswered => write!(f, "thread already carries the bot handle"),
            Ineligible::IsReply => write!(f, "post is itself a reply"),
            Ineligible::HasReplies(n) => write!(f, "post already has {} replies", n),
            Ineligible::TooShort(n) => write!(f, "only {} characters without mentions", n),
            Ineligible::OverMentioned(n) => write!(f, "{} mentions", n),
            Ineligible::LowReach(n) => write!(f, "only {} impressions", n),
            Ineligible::AlreadyChecked => write!(f, "already checked"),
        }
    }
}

/// Removes every `@handle` token and collapses the whitespace left behind.
pub fn strip_mentions(text: &str) -> String {
    MENTION_PATTERN
        .replace_all(text, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn count_mentions(text: &str) -> usize {
    MENTION_PATTERN.find_iter(text).count()
}

fn contains_handle(text: &str, handle: &str) -> bool {
    let needle = format!("@{}", handle.trim_start_matches('@')).to_lowercase();
    text.to_lowercase().contains(&needle)
}

/// Applies every rule and reports the first one that fails.
pub fn check(item: &CandidateItem, ctx: &EligibilityContext<'_>) -> Result<(), Ineligible> {
    let is_bot = |author: Option<&String>| author.map_or(false, |a| a == ctx.bot_id);
    if is_bot(item.author_id.as_ref())
        || is_bot(item.referenced.as_ref().and_then(|r| r.author_id.as_ref()))
    {
        return Err(Ineligible::SelfAuthored);
    }

    // A mention always carries the handle itself, so only its parent counts.
    let parent_answered = item
        .referenced
        .as_ref()
        .map_or(false, |parent| contains_handle(&parent.text, ctx.bot_handle));
    let answered = match ctx.source {
        Source::Mention => parent_answered,
        Source::Search => parent_answered || contains_handle(&item.text, ctx.bot_handle),
    };
    if answered {
        return Err(Ineligible::AlreadyAnswered);
    }

    if ctx.source == Source::Search {
        if ctx.search_policy.skips_replies() && item.text.trim_start().starts_with('@') {
            return Err(Ineligible::IsReply);
        }
        if ctx.search_policy.skips_answered() {
            let replies = item
                .metrics
                .as_ref()
                .and_then(|m| m.reply_count)
                .unwrap_or(0);
            if replies > 0 {
                return Err(Ineligible::HasReplies(replies));
            }
        }
    }

    let claim = item.claim_text(ctx.source);
    let length = strip_mentions(claim).chars().count();
    if length < ctx.min_text_length {
        return Err(Ineligible::TooShort(length));
    }

    let mentions = count_mentions(claim);
    if mentions > ctx.max_mentions {
        return Err(Ineligible::OverMentioned(mentions));
    }

    if ctx.impression_threshold >= 0 {
        let impressions = item
            .claim_metrics(ctx.source)
            .and_then(|m| m.impression_count)
            .unwrap_or(0);
        if impressions < ctx.impression_threshold as u64 {
            return Err(Ineligible::LowReach(impressions));
        }
    }

    if ctx.checked.contains(&item.id) {
        return Err(Ineligible::AlreadyChecked);
    }

    Ok(())
}
