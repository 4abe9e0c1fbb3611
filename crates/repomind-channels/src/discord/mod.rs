//! Discord bot using Gateway WebSocket + REST API.

pub mod gateway;
pub mod rest;

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use self::gateway::IncomingMessage;
use self::rest::RestClient;
use crate::handler::CommandHandler;

/// Receives gateway messages and runs each authorized command on its own task,
/// so a long ingestion does not block other users.
pub struct DiscordBot {
    rx: mpsc::Receiver<IncomingMessage>,
    rest: Arc<RestClient>,
    handler: Arc<CommandHandler>,
    allowed_user_ids: Vec<String>,
    allowed_channel_ids: Vec<String>,
}

impl std::fmt::Debug for DiscordBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordBot")
            .field("allowed_user_ids", &self.allowed_user_ids)
            .field("allowed_channel_ids", &self.allowed_channel_ids)
            .finish_non_exhaustive()
    }
}

impl DiscordBot {
    /// Connect to the gateway and prepare the REST client.
    #[must_use]
    pub fn new(
        token: String,
        handler: CommandHandler,
        allowed_user_ids: Vec<String>,
        allowed_channel_ids: Vec<String>,
    ) -> Self {
        let rx = gateway::spawn_gateway(token.clone());
        Self::with_parts(
            rx,
            RestClient::new(token),
            handler,
            allowed_user_ids,
            allowed_channel_ids,
        )
    }

    #[must_use]
    pub fn with_parts(
        rx: mpsc::Receiver<IncomingMessage>,
        rest: RestClient,
        handler: CommandHandler,
        allowed_user_ids: Vec<String>,
        allowed_channel_ids: Vec<String>,
    ) -> Self {
        Self {
            rx,
            rest: Arc::new(rest),
            handler: Arc::new(handler),
            allowed_user_ids,
            allowed_channel_ids,
        }
    }

    fn is_authorized(&self, msg: &IncomingMessage) -> bool {
        if !self.allowed_channel_ids.is_empty()
            && !self.allowed_channel_ids.contains(&msg.channel_id)
        {
            return false;
        }
        self.allowed_user_ids.is_empty() || self.allowed_user_ids.contains(&msg.author_id)
    }

    /// Process messages until the gateway stops or `shutdown` flips to `true`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(prefix = self.handler.prefix(), "discord bot started");
        loop {
            let incoming = tokio::select! {
                msg = self.rx.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };

            if !incoming.content.trim_start().starts_with(self.handler.prefix()) {
                continue;
            }
            if !self.is_authorized(&incoming) {
                tracing::warn!(
                    "rejected discord command from unauthorized user: {}",
                    incoming.author_id
                );
                continue;
            }

            let rest = Arc::clone(&self.rest);
            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                if let Err(e) = handler
                    .handle(
                        rest.as_ref(),
                        &incoming.channel_id,
                        &incoming.author_name,
                        &incoming.content,
                    )
                    .await
                {
                    tracing::error!(channel = %incoming.channel_id, "failed to reply: {e}");
                }
            });
        }
        tracing::info!("discord bot stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::backend::BackendClient;

    fn handler() -> CommandHandler {
        let backend = BackendClient::new(
            "http://127.0.0.1:1",
            Duration::from_secs(1),
            Duration::from_secs(1),
        )
        .unwrap();
        CommandHandler::new(backend, "!")
    }

    fn incoming(author_id: &str, channel_id: &str, content: &str) -> IncomingMessage {
        IncomingMessage {
            channel_id: channel_id.into(),
            content: content.into(),
            author_id: author_id.into(),
            author_name: "Ann".into(),
        }
    }

    fn bot(users: Vec<String>, channels: Vec<String>) -> DiscordBot {
        let (_tx, rx) = mpsc::channel(1);
        DiscordBot::with_parts(rx, RestClient::new("t".into()), handler(), users, channels)
    }

    #[test]
    fn authorized_when_lists_empty() {
        assert!(bot(vec![], vec![]).is_authorized(&incoming("u", "c", "!hello")));
    }

    #[test]
    fn channel_allowlist() {
        let b = bot(vec![], vec!["c1".into()]);
        assert!(b.is_authorized(&incoming("u", "c1", "!hello")));
        assert!(!b.is_authorized(&incoming("u", "c2", "!hello")));
    }

    #[test]
    fn user_allowlist() {
        let b = bot(vec!["u1".into()], vec![]);
        assert!(b.is_authorized(&incoming("u1", "c", "!hello")));
        assert!(!b.is_authorized(&incoming("u2", "c", "!hello")));
    }

    #[tokio::test]
    async fn run_replies_and_stops_when_gateway_closes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/channels/c1/messages"))
            .and(body_json(serde_json::json!({"content": "Hello, Ann!"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "1"})))
            .expect(1)
            .mount(&server)
            .await;

        let (tx, rx) = mpsc::channel(4);
        let rest = RestClient::new("t".into()).with_base_url(server.uri());
        let bot = DiscordBot::with_parts(rx, rest, handler(), vec![], vec![]);
        let (_stx, srx) = watch::channel(false);

        tx.send(incoming("u", "c1", "!hello")).await.unwrap();
        tx.send(incoming("u", "c1", "not a command")).await.unwrap();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(5), bot.run(srx))
            .await
            .unwrap();
        // the reply runs on a spawned task
        tokio::time::sleep(Duration::from_millis(300)).await;
        server.verify().await;
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let (_tx, rx) = mpsc::channel(1);
        let bot = DiscordBot::with_parts(rx, RestClient::new("t".into()), handler(), vec![], vec![]);
        let (stx, srx) = watch::channel(false);
        let task = tokio::spawn(bot.run(srx));
        stx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
