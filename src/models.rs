use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a candidate came from. The two ticks differ in how they answer.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Mention,
    Search,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Metrics {
    pub impression_count: Option<u64>,
    pub reply_count: Option<u64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReferencedItem {
    pub id: String,
    pub text: String,
    pub author_id: Option<String>,
    pub metrics: Option<Metrics>,
}

/// A post the bot may answer. `text` is never rewritten in place; prompt
/// text is derived from it with mentions stripped.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CandidateItem {
    pub id: String,
    pub text: String,
    pub author_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub metrics: Option<Metrics>,
    pub referenced: Option<ReferencedItem>,
}

impl CandidateItem {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        CandidateItem {
            id: id.into(),
            text: text.into(),
            author_id: None,
            created_at: None,
            metrics: None,
            referenced: None,
        }
    }

    /// The text whose claim gets judged. A mention is judged on the post it
    /// replies to or quotes; a search hit on its own text.
    pub fn claim_text(&self, source: Source) -> &str {
        match (source, &self.referenced) {
            (Source::Mention, Some(parent)) => &parent.text,
            _ => &self.text,
        }
    }

    pub fn claim_metrics(&self, source: Source) -> Option<&Metrics> {
        match (source, &self.referenced) {
            (Source::Mention, Some(parent)) => parent.metrics.as_ref(),
            _ => self.metrics.as_ref(),
        }
    }
}

#[cfg(test)]
impl CandidateItem {
    pub fn with_author(mut self, author_id: impl Into<String>) -> Self {
        self.author_id = Some(author_id.into());
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_referenced(mut self, referenced: ReferencedItem) -> Self {
        self.referenced = Some(referenced);
        self
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EvidenceResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ModelTurn {
    pub role: Role,
    pub content: String,
}

impl ModelTurn {
    pub fn system(content: impl Into<String>) -> Self {
        ModelTurn { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ModelTurn { role: Role::User, content: content.into() }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ModelRequest {
    Chat(Vec<ModelTurn>),
    Completion(String),
}

impl ModelRequest {
    /// Flattened text of the request, used for logging and assertions.
    pub fn text(&self) -> String {
        match self {
            ModelRequest::Chat(turns) => turns
                .iter()
                .map(|t| t.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
            ModelRequest::Completion(prompt) => prompt.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub max_results: u32,
    pub start_time: Option<DateTime<Utc>>,
}

/// Terminal state of one item passing through dispatch.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Sent { post_id: String, attempts: u32 },
    SkippedSilent { reply: String },
    NoVerdict,
    Abandoned { attempts: u32 },
    Failed { reason: String },
}
