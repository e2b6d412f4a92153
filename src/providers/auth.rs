//! OAuth 2.0 authorization-code flow with PKCE for posting as the bot user.
//!
//! The verifier, challenge and tokens live in the property store so a
//! scheduled run can reuse them until `reset`.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::TwitterSettings;
use crate::error::BotError;
use crate::memory::KeyValueStore;
use crate::providers::Authorizer;

pub const AUTHORIZE_URL: &str = "https://twitter.com/i/oauth2/authorize";
pub const TOKEN_URL: &str = "https://api.twitter.com/2/oauth2/token";
const SCOPES: &str = "users.read tweet.read offline.access tweet.write";

const VERIFIER_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";
const VERIFIER_LENGTH: usize = 128;
const STATE_LENGTH: usize = 32;

/// Tokens count as expired this long before the server says so.
const EXPIRY_MARGIN_SECS: i64 = 60;

const CODE_VERIFIER_KEY: &str = "code_verifier";
const TOKEN_KEY: &str = "oauth2_token";
const STATE_KEY: &str = "oauth2_state";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .map_or(false, |at| at <= now + chrono::Duration::seconds(EXPIRY_MARGIN_SECS))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

fn random_string(charset: &[u8], length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| charset[rng.gen_range(0..charset.len())] as char)
        .collect()
}

pub fn generate_verifier() -> String {
    random_string(VERIFIER_CHARSET, VERIFIER_LENGTH)
}

/// Alphanumeric only, so it needs no escaping in the redirect.
fn generate_state() -> String {
    random_string(&VERIFIER_CHARSET[..62], STATE_LENGTH)
}

/// S256 challenge: base64url without padding of the verifier's SHA-256.
pub fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

pub struct OAuth2Session {
    client: reqwest::Client,
    settings: TwitterSettings,
    store: Arc<dyn KeyValueStore>,
}

impl OAuth2Session {
    pub fn new(settings: TwitterSettings, store: Arc<dyn KeyValueStore>) -> Self {
        OAuth2Session {
            client: reqwest::Client::new(),
            settings,
            store,
        }
    }

    fn stored_or_new(&self, key: &str, generate: fn() -> String) -> Result<String, BotError> {
        if let Some(value) = self.store.get(key)? {
            return Ok(value);
        }
        let value = generate();
        self.store.put(key, &value, None)?;
        Ok(value)
    }

    fn verifier(&self) -> Result<String, BotError> {
        self.stored_or_new(CODE_VERIFIER_KEY, generate_verifier)
    }

    /// The redirect must echo the state issued with the authorization URL.
    fn check_state(&self, returned: &str) -> Result<(), BotError> {
        match self.store.get(STATE_KEY)? {
            Some(issued) if issued == returned => Ok(()),
            _ => Err(BotError::StateMismatch),
        }
    }

    fn load_token(&self) -> Result<Option<StoredToken>, BotError> {
        match self.store.get(TOKEN_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn save_token(&self, token: &StoredToken) -> Result<(), BotError> {
        self.store.put(TOKEN_KEY, &serde_json::to_string(token)?, None)
    }

    fn authorization_required(&self) -> BotError {
        match self.reauthorization_url() {
            Ok(url) => BotError::AuthorizationRequired { url },
            Err(e) => e,
        }
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, BotError> {
        let response = self
            .client
            .post(TOKEN_URL)
            .basic_auth(&self.settings.client_id, Some(&self.settings.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| BotError::FetchFailed(format!("Token request failed: {}", e)))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(BotError::FetchFailed(format!(
                "Token endpoint error ({}): {}",
                status, body
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| BotError::FetchFailed(format!("Failed to parse token response: {}", e)))
    }

    fn store_response(&self, response: TokenResponse, previous_refresh: Option<String>) -> Result<StoredToken, BotError> {
        let token = StoredToken {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(previous_refresh),
            expires_at: response
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
        };
        self.save_token(&token)?;
        Ok(token)
    }

    /// Completes the flow with the code and state handed to the redirect URI.
    pub async fn exchange_code(&self, code: &str, state: &str) -> Result<(), BotError> {
        self.check_state(state)?;
        let verifier = self.verifier()?;
        let response = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("code_verifier", verifier.as_str()),
                ("client_id", self.settings.client_id.as_str()),
            ])
            .await?;
        self.store_response(response, None)?;
        self.store.remove(STATE_KEY)?;
        log::info!("Twitter authorization stored");
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<StoredToken, BotError> {
        let response = self
            .request_token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.settings.client_id.as_str()),
            ])
            .await?;
        log::info!("Refreshed Twitter access token");
        self.store_response(response, Some(refresh_token.to_string()))
    }

    async fn valid_token(&self) -> Result<StoredToken, BotError> {
        let Some(token) = self.load_token()? else {
            return Err(self.authorization_required());
        };
        if !token.is_expired(Utc::now()) {
            return Ok(token);
        }

        match &token.refresh_token {
            Some(refresh_token) => self.refresh(refresh_token).await.map_err(|e| {
                log::warn!("Token refresh failed: {}", e);
                self.authorization_required()
            }),
            None => Err(self.authorization_required()),
        }
    }

    /// Forgets tokens, state and the PKCE verifier; the next run needs a new grant.
    pub fn reset(&self) -> Result<(), BotError> {
        self.store.remove(TOKEN_KEY)?;
        self.store.remove(STATE_KEY)?;
        self.store.remove(CODE_VERIFIER_KEY)
    }
}

#[async_trait]
impl Authorizer for OAuth2Session {
    async fn has_valid_access(&self) -> bool {
        self.valid_token().await.is_ok()
    }

    async fn access_token(&self) -> Result<String, BotError> {
        self.valid_token().await.map(|token| token.access_token)
    }

    fn reauthorization_url(&self) -> Result<String, BotError> {
        let challenge = challenge_for(&self.verifier()?);
        let state = self.stored_or_new(STATE_KEY, generate_state)?;

        let url = url::Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("response_type", "code"),
                ("client_id", self.settings.client_id.as_str()),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("scope", SCOPES),
                ("state", state.as_str()),
                ("code_challenge", challenge.as_str()),
                ("code_challenge_method", "S256"),
            ],
        )
        .map_err(|e| BotError::Config(format!("Invalid authorization URL: {}", e)))?;
        Ok(url.to_string())
    }
}
