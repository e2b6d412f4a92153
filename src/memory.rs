use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BotError;

/// A string key-value store with optional per-entry expiry.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, BotError>;
    /// `ttl = None` keeps the entry until it is removed.
    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), BotError>;
    fn remove(&self, key: &str) -> Result<(), BotError>;
}

#[derive(Serialize, Deserialize, Clone, Debug)]
struct CacheEntry {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    fn new(value: &str, ttl: Option<Duration>) -> Self {
        // A ttl too large to represent is treated as no expiry
        let expires_at = ttl.and_then(|ttl| {
            chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        });
        CacheEntry { value: value.to_string(), expires_at }
    }

    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// JSON file on disk holding every entry. Each call reads and rewrites the
/// whole file; entries are few and invocations never overlap.
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileCache { path: path.into() }
    }

    fn load(&self) -> Result<HashMap<String, CacheEntry>, BotError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let data = fs::read_to_string(&self.path)?;
        if data.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&data)?)
    }

    /// Writes a sibling temp file and renames it over the cache, so a crash
    /// mid-write leaves the previous file intact.
    fn save(&self, entries: &HashMap<String, CacheEntry>) -> Result<(), BotError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let data = serde_json::to_string_pretty(entries)?;
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        file.write_all(data.as_bytes())?;
        file.as_file().sync_all()?;
        file.persist(&self.path)
            .map_err(|e| BotError::Store(format!("Failed to replace {}: {}", self.path.display(), e)))?;
        Ok(())
    }
}

impl KeyValueStore for FileCache {
    fn get(&self, key: &str) -> Result<Option<String>, BotError> {
        let entries = self.load()?;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(Utc::now()))
            .map(|e| e.value.clone()))
    }

    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), BotError> {
        let mut entries = self.load()?;
        let now = Utc::now();
        entries.retain(|_, e| e.is_live(now));
        entries.insert(key.to_string(), CacheEntry::new(value, ttl));
        self.save(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), BotError> {
        let mut entries = self.load()?;
        if entries.remove(key).is_some() {
            self.save(&entries)?;
        }
        Ok(())
    }
}

/// Process-local store for tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

#[cfg(test)]
impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<String>, BotError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| BotError::Store(e.to_string()))?;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(Utc::now()))
            .map(|e| e.value.clone()))
    }

    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), BotError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| BotError::Store(e.to_string()))?;
        entries.insert(key.to_string(), CacheEntry::new(value, ttl));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), BotError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| BotError::Store(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

/// Insertion-ordered id memory that forgets its oldest ids past `capacity`.
#[derive(Clone, Debug)]
pub struct CheckedIds {
    ids: VecDeque<String>,
    capacity: usize,
}

impl CheckedIds {
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        CheckedIds { ids: VecDeque::new(), capacity: capacity.max(1) }
    }

    pub fn from_ids(ids: Vec<String>, capacity: usize) -> Self {
        let mut checked = Self::new(capacity);
        for id in ids {
            checked.insert(id);
        }
        checked
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|known| known == id)
    }

    pub fn insert(&mut self, id: impl Into<String>) {
        let id = id.into();
        if self.contains(&id) {
            return;
        }
        self.ids.push_back(id);
        while self.ids.len() > self.capacity {
            self.ids.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.ids.iter().cloned().collect()
    }
}

#[derive(Clone, Debug)]
pub struct RunState {
    pub last_mention_id: Option<String>,
    pub last_search_window_start: Option<DateTime<Utc>>,
    pub checked: CheckedIds,
}

/// Cursor and dedup memory kept in a TTL cache between invocations.
pub struct RunStateStore {
    cache: Arc<dyn KeyValueStore>,
    ttl: Duration,
    capacity: usize,
}

impl RunStateStore {
    const LAST_MENTION_ID: &'static str = "last_mention_id";
    const LAST_SEARCH_WINDOW_START: &'static str = "last_search_window_start";
    const CHECKED_IDS: &'static str = "checked_tweet_ids";

    pub fn new(cache: Arc<dyn KeyValueStore>, ttl: Duration, capacity: usize) -> Self {
        RunStateStore { cache, ttl, capacity }
    }

    pub fn load(&self) -> Result<RunState, BotError> {
        let last_mention_id = self.cache.get(Self::LAST_MENTION_ID)?;

        let last_search_window_start = self
            .cache
            .get(Self::LAST_SEARCH_WINDOW_START)?
            .and_then(|raw| match DateTime::parse_from_rfc3339(&raw) {
                Ok(at) => Some(at.with_timezone(&Utc)),
                Err(e) => {
                    log::warn!("Ignoring unreadable search window start {}: {}", raw, e);
                    None
                }
            });

        let ids: Vec<String> = match self.cache.get(Self::CHECKED_IDS)? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("Discarding unreadable checked id set: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        let checked = CheckedIds::from_ids(ids, self.capacity);
        if !checked.is_empty() {
            log::debug!("Loaded {} checked ids", checked.len());
        }

        Ok(RunState {
            last_mention_id,
            last_search_window_start,
            checked,
        })
    }

    pub fn save_mention_cursor(&self, last_mention_id: &str) -> Result<(), BotError> {
        self.cache
            .put(Self::LAST_MENTION_ID, last_mention_id, Some(self.ttl))
    }

    pub fn save_search_state(&self, state: &RunState) -> Result<(), BotError> {
        let ids = serde_json::to_string(&state.checked.to_vec())?;
        self.cache.put(Self::CHECKED_IDS, &ids, Some(self.ttl))?;
        if let Some(start) = state.last_search_window_start {
            self.cache.put(
                Self::LAST_SEARCH_WINDOW_START,
                &start.to_rfc3339(),
                Some(self.ttl),
            )?;
        }
        Ok(())
    }
}
