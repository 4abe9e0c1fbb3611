//! Discord REST API client for message operations.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::handler::Replier;

const BASE_URL: &str = "https://discord.com/api/v10";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RestClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
pub struct DiscordMessage {
    pub id: String,
}

#[derive(Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
}

impl RestClient {
    #[must_use]
    pub fn new(token: String) -> Self {
        Self {
            client: repomind_llm::http::default_client(),
            token,
            base_url: BASE_URL.to_owned(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.token)
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP request fails.
    pub async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
    ) -> Result<DiscordMessage, reqwest::Error> {
        self.client
            .post(format!("{}/channels/{channel_id}/messages", self.base_url))
            .header("Authorization", self.auth_header())
            .timeout(REQUEST_TIMEOUT)
            .json(&CreateMessage { content })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }

    /// # Errors
    ///
    /// Returns an error if the HTTP request fails.
    pub async fn trigger_typing(&self, channel_id: &str) -> Result<(), reqwest::Error> {
        self.client
            .post(format!("{}/channels/{channel_id}/typing", self.base_url))
            .header("Authorization", self.auth_header())
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

impl Replier for RestClient {
    async fn reply(&self, channel_id: &str, text: &str) -> Result<(), ChannelError> {
        self.send_message(channel_id, text)
            .await
            .map(|_| ())
            .map_err(ChannelError::Discord)
    }

    async fn typing(&self, channel_id: &str) {
        if let Err(e) = self.trigger_typing(channel_id).await {
            tracing::debug!("discord typing indicator failed: {e}");
        }
    }
}
