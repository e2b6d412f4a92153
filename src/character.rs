use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROMPT: &str = "Decide whether the claim in this tweet is true or false. \
If it is false or misleading, debunk it in short tweet form (no more than 250 characters!!). \
If it is true or you cannot tell, answer with the single character 0.";

pub const DEFAULT_REPLY_PROMPT: &str = "Please debunk it in short (no more than 250 characters!!) tweet form. \
If the claim is true or cannot be checked, answer with the single character 0.";

pub const DEFAULT_FALLBACK_REPLY: &str =
    "I could not determine whether this claim is true or false.";

/// Persona and prompt texts for one bot character. The bot's handle comes
/// from `BOT_HANDLE`; a `handle` key left in older files is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterConfig {
    pub name: String,
    /// Task instruction for posts found through search.
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Task instruction for posts the bot was mentioned under.
    #[serde(default = "default_reply_prompt")]
    pub reply_prompt: String,
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
}

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

fn default_reply_prompt() -> String {
    DEFAULT_REPLY_PROMPT.to_string()
}

fn default_fallback_reply() -> String {
    DEFAULT_FALLBACK_REPLY.to_string()
}

impl CharacterConfig {
    pub fn builtin() -> Self {
        CharacterConfig {
            name: "debunk".to_string(),
            prompt: default_prompt(),
            reply_prompt: default_reply_prompt(),
            fallback_reply: default_fallback_reply(),
        }
    }
}

pub fn character_path(root: &Path, character_name: &str) -> PathBuf {
    let mut config_path = root.to_path_buf();
    config_path.push("characters");
    config_path.push(character_name);
    config_path.push("config.json");
    config_path
}

/// Loads `characters/<name>/config.json` under `root`, falling back to the
/// built-in persona when the file does not exist.
pub fn load_character_config(root: &Path, character_name: &str) -> Result<CharacterConfig> {
    let config_path = character_path(root, character_name);

    if !config_path.exists() {
        log::warn!(
            "Character config not found for '{}' at {:?}, using built-in prompts",
            character_name,
            config_path
        );
        return Ok(CharacterConfig::builtin());
    }

    let config_str = fs::read_to_string(&config_path)?;
    let config: CharacterConfig = serde_json::from_str(&config_str)
        .map_err(|e| anyhow::anyhow!("Invalid character config {:?}: {}", config_path, e))?;

    log::info!("Loaded character profile: {}", config.name);
    Ok(config)
}
