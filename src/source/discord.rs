use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use super::{http_client, MessageSource, RawMessage};
use crate::error::SourceError;

const API_BASE: &str = "https://discord.com/api/v9";

/// Latest messages of a Discord channel, read with a user token.
pub struct DiscordChannel {
    id: String,
    channel_id: String,
    token: String,
    limit: usize,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    id: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    timestamp: Option<String>,
}

impl DiscordChannel {
    pub fn new(channel_id: &str, token: &str, limit: usize, timeout_secs: u64) -> Self {
        DiscordChannel {
            id: format!("discord:{}", channel_id),
            channel_id: channel_id.to_string(),
            token: token.to_string(),
            limit,
            client: http_client(timeout_secs),
        }
    }
}

impl MessageSource for DiscordChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn newest_first(&self) -> bool {
        true
    }

    fn fetch(&self) -> Result<Vec<RawMessage>, SourceError> {
        let url = format!(
            "{}/channels/{}/messages?limit={}",
            API_BASE, self.channel_id, self.limit
        );
        info!("Checking Discord channel {}", self.channel_id);
        let resp = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, &self.token)
            .send()?;
        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        parse_messages(&body, &self.channel_id, &self.id)
    }
}

/// Parse a channel message listing; order is preserved (newest first).
pub fn parse_messages(
    json: &str,
    channel_id: &str,
    source_id: &str,
) -> Result<Vec<RawMessage>, SourceError> {
    let messages: Vec<ApiMessage> = serde_json::from_str(json)?;
    Ok(messages
        .into_iter()
        .map(|m| RawMessage {
            provenance_link: format!(
                "https://discord.com/channels/@me/{}/{}",
                channel_id, m.id
            ),
            published_at: m
                .timestamp
                .as_deref()
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            text: m.content,
            source_id: source_id.to_string(),
        })
        .collect())
}
