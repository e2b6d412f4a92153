mod character;
mod config;
mod core;
mod error;
mod memory;
mod models;
mod providers;
extern crate dotenv;

use std::env;
use std::path::Path;
use std::sync::Arc;

use dotenv::dotenv;

use crate::character::load_character_config;
use crate::config::Config;
use crate::core::runtime::Runtime;
use crate::memory::{FileCache, KeyValueStore};
use crate::providers::auth::OAuth2Session;
use crate::providers::Authorizer;

const USAGE: &str = "usage: debunk-bot <mentions|search|run|authorize|callback <code> <state>|reset>";

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = dotenv() {
        log::warn!("Error loading .env file: {}", e);
    }

    let command = env::args().nth(1).unwrap_or_else(|| "run".to_string());
    let config = Arc::new(Config::from_env()?);
    let character = load_character_config(Path::new("."), &config.character_name)?;

    let properties: Arc<dyn KeyValueStore> =
        Arc::new(FileCache::new(config.storage_dir.join("properties.json")));
    let session = Arc::new(OAuth2Session::new(config.twitter.clone(), properties));

    match command.as_str() {
        "authorize" => {
            println!("Open the following URL, then run `debunk-bot callback <code> <state>` with the values from the redirect:");
            println!("{}", session.reauthorization_url()?);
        }
        "callback" => {
            let code = env::args()
                .nth(2)
                .ok_or_else(|| anyhow::anyhow!("missing authorization code\n{}", USAGE))?;
            let state = env::args()
                .nth(3)
                .ok_or_else(|| anyhow::anyhow!("missing authorization state\n{}", USAGE))?;
            session.exchange_code(code.trim(), state.trim()).await?;
            println!("Success!");
        }
        "reset" => {
            session.reset()?;
            println!("Stored authorization cleared");
        }
        "mentions" | "search" | "run" => {
            log::info!("Running character: {} (@{})", character.name, config.bot_handle);
            let runtime = Runtime::from_config(config.clone(), &character, session.clone());
            match command.as_str() {
                "mentions" => {
                    let summary = runtime.run_mentions_tick().await?;
                    log::info!("Mentions tick done: {} answered of {}", summary.sent(), summary.fetched);
                }
                "search" => {
                    let summary = runtime.run_search_tick().await?;
                    log::info!("Search tick done: {} answered of {}", summary.sent(), summary.fetched);
                }
                _ => runtime.run_periodically().await?,
            }
        }
        other => return Err(anyhow::anyhow!("unknown command '{}'\n{}", other, USAGE)),
    }

    Ok(())
}
