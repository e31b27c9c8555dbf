//! Session management for the Discord REST API
//!
//! Provides:
//! - A single "connect and wait for ready" call that validates the bot token
//! - The `ChatPlatform` implementation used by the resolver and paginator
//! - Translation of Discord's wire JSON into the crate's own models

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::chat::ChatPlatform;
use crate::config::DISCORD_API_URL;
use crate::error::{Error, Result};
use crate::models::{Attachment, Channel, ChannelKind, Message};

/// Rate-limited requests are retried at most this many times in total.
const MAX_RATE_LIMIT_ATTEMPTS: usize = 3;

/// Fallback wait when a 429 body carries no `retry_after`.
const DEFAULT_RETRY_AFTER_SECS: f64 = 1.0;

/// Longer rate-limit waits are treated as a failure.
const MAX_RETRY_AFTER_SECS: f64 = 60.0;

/// Build the HTTP client shared by the REST adapter and attachment downloads.
pub fn build_http_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!(
            "DiscordBot (discord_archiver, ",
            env!("CARGO_PKG_VERSION"),
            ")"
        ))
        .build()
        .map_err(|e| Error::InvalidArgument(format!("HTTP client error: {}", e)))
}

/// The bot account the session is logged in as.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUser {
    pub username: String,
}

/// An authenticated, ready Discord session.
pub struct DiscordSession {
    http: Client,
    token: String,
    base_url: String,
    user: CurrentUser,
}

impl std::fmt::Debug for DiscordSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordSession")
            .field("base_url", &self.base_url)
            .field("user", &self.user.username)
            .finish()
    }
}

impl DiscordSession {
    /// Connect to the public Discord API.
    pub async fn connect(token: &str) -> Result<Self> {
        Self::connect_to(DISCORD_API_URL, token).await
    }

    /// Connect to a Discord-compatible API and wait until the session is ready.
    ///
    /// Ready means the token was accepted and the bot user was returned.
    pub async fn connect_to(base_url: &str, token: &str) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::InvalidArgument("Discord token is empty".to_string()));
        }

        let http = build_http_client()?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let response = send_get(&http, token, &format!("{}/users/@me", base_url), &[])
            .await
            .map_err(|e| Error::ConnectionError(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::ConnectionError(
                "Discord rejected the bot token (401 Unauthorized)".to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ConnectionError(format!(
                "Login failed with {}: {}",
                status, body
            )));
        }

        let user: CurrentUser = decode(response).await?;
        info!("Logged in as {}", user.username);

        Ok(Self {
            http,
            token: token.to_string(),
            base_url,
            user,
        })
    }

    pub fn user(&self) -> &CurrentUser {
        &self.user
    }

    /// HTTP client to reuse for attachment downloads.
    pub fn http_client(&self) -> Client {
        self.http.clone()
    }

    /// Tear the session down.
    pub fn close(self) {
        debug!("Closing Discord session for {}", self.user.username);
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response> {
        send_get(&self.http, &self.token, &format!("{}{}", self.base_url, path), query).await
    }
}

#[async_trait]
impl ChatPlatform for DiscordSession {
    async fn fetch_channel(&self, channel_id: u64) -> Result<Option<Channel>> {
        let response = self.get(&format!("/channels/{}", channel_id), &[]).await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN {
            debug!("Channel {} not reachable: {}", channel_id, status);
            return Ok(None);
        }
        let response = ensure_success(response).await?;

        let channel: WireChannel = decode(response).await?;
        channel.into_channel().map(Some)
    }

    async fn fetch_messages(
        &self,
        channel_id: u64,
        limit: usize,
        before: Option<u64>,
    ) -> Result<Vec<Message>> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(before) = before {
            query.push(("before", before.to_string()));
        }

        let response = self
            .get(&format!("/channels/{}/messages", channel_id), &query)
            .await?;
        let response = ensure_success(response).await?;

        let messages: Vec<WireMessage> = decode(response).await?;
        messages.into_iter().map(WireMessage::into_message).collect()
    }
}

/// Issue an authenticated GET, waiting out 429 responses.
async fn send_get(
    http: &Client,
    token: &str,
    url: &str,
    query: &[(&str, String)],
) -> Result<Response> {
    let mut attempt = 1;
    loop {
        let response = http
            .get(url)
            .header("Authorization", format!("Bot {}", token))
            .query(query)
            .send()
            .await?;

        if response.status() != StatusCode::TOO_MANY_REQUESTS {
            return Ok(response);
        }

        if attempt >= MAX_RATE_LIMIT_ATTEMPTS {
            return Err(Error::DiscordError(format!(
                "rate limited on {} after {} attempts",
                url, attempt
            )));
        }

        let retry_after = response
            .json::<RateLimitBody>()
            .await
            .ok()
            .and_then(|body| body.retry_after)
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
            .max(0.0);
        if retry_after > MAX_RETRY_AFTER_SECS {
            return Err(Error::DiscordError(format!(
                "rate limited on {} for {}s, not waiting",
                url, retry_after
            )));
        }
        let wait = Duration::try_from_secs_f64(retry_after)
            .map_err(|e| Error::DiscordError(format!("invalid retry_after {}: {}", retry_after, e)))?;
        warn!("Rate limited on {}, retrying in {:.2}s", url, retry_after);
        tokio::time::sleep(wait).await;
        attempt += 1;
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::DiscordError(format!("{}: {}", status, body)))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}

fn parse_snowflake(raw: &str) -> Result<u64> {
    raw.parse()
        .map_err(|_| Error::DiscordError(format!("invalid snowflake '{}'", raw)))
}

#[derive(Debug, Deserialize)]
struct RateLimitBody {
    retry_after: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    username: String,
    #[serde(default)]
    discriminator: Option<String>,
}

impl WireUser {
    /// `name#1234` for legacy accounts, plain username after the migration.
    fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            None | Some("") | Some("0") => self.username.clone(),
            Some(discriminator) => format!("{}#{}", self.username, discriminator),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireChannel {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    recipients: Vec<WireUser>,
}

impl WireChannel {
    fn into_channel(self) -> Result<Channel> {
        let id = parse_snowflake(&self.id)?;
        let name = self
            .name
            .filter(|name| !name.trim().is_empty())
            .or_else(|| self.recipients.first().map(|r| r.username.clone()))
            .unwrap_or_else(|| self.id.clone());

        Ok(Channel {
            id,
            name,
            kind: ChannelKind::from_code(self.kind),
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireAttachment {
    id: String,
    filename: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: String,
    #[serde(default)]
    content: String,
    author: WireUser,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    edited_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    attachments: Vec<WireAttachment>,
}

impl WireMessage {
    fn into_message(self) -> Result<Message> {
        let attachments = self
            .attachments
            .into_iter()
            .map(|a| {
                Ok(Attachment {
                    id: parse_snowflake(&a.id)?,
                    name: a.filename,
                    url: a.url,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Message {
            id: parse_snowflake(&self.id)?,
            author_tag: self.author.tag(),
            content: self.content,
            created_at: self.timestamp,
            edited_at: self.edited_timestamp,
            attachments,
        })
    }
}
