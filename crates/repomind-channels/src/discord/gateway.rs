//! Discord Gateway WebSocket client: identify, heartbeat, reconnect, and
//! forwarding of user messages.

use std::time::Duration;

use futures::{SinkExt, Stream, StreamExt};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};

const GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";
const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_HEARTBEAT_MS: u64 = 41_250;

const GUILD_MESSAGES: u64 = 1 << 9;
const DIRECT_MESSAGES: u64 = 1 << 12;
const MESSAGE_CONTENT: u64 = 1 << 15;
const INTENTS: u64 = GUILD_MESSAGES | DIRECT_MESSAGES | MESSAGE_CONTENT;

/// A user message seen on the gateway.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub channel_id: String,
    pub content: String,
    pub author_id: String,
    /// Global display name, falling back to the username.
    pub author_name: String,
}

#[derive(Debug, thiserror::Error)]
enum SessionError {
    #[error("websocket: {0}")]
    Ws(#[from] tungstenite::Error),
    #[error("malformed payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("handshake failed: {0}")]
    Handshake(String),
}

/// One decoded gateway frame.
#[derive(Debug, PartialEq)]
enum Frame {
    Hello { heartbeat_ms: u64 },
    Dispatch { event: String, data: Value },
    HeartbeatRequest,
    /// Op 7 (reconnect) or op 9 (invalid session): start a fresh session.
    Restart,
    Other,
}

fn decode(text: &str) -> Result<(Frame, Option<u64>), serde_json::Error> {
    let payload: Value = serde_json::from_str(text)?;
    let seq = payload.get("s").and_then(Value::as_u64);
    let frame = match payload.get("op").and_then(Value::as_u64) {
        Some(0) => Frame::Dispatch {
            event: payload
                .get("t")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            data: payload.get("d").cloned().unwrap_or(Value::Null),
        },
        Some(1) => Frame::HeartbeatRequest,
        Some(7 | 9) => Frame::Restart,
        Some(10) => Frame::Hello {
            heartbeat_ms: payload
                .pointer("/d/heartbeat_interval")
                .and_then(Value::as_u64)
                .unwrap_or(DEFAULT_HEARTBEAT_MS),
        },
        _ => Frame::Other,
    };
    Ok((frame, seq))
}

fn heartbeat(seq: Option<u64>) -> WsMessage {
    WsMessage::Text(json!({ "op": 1, "d": seq }).to_string().into())
}

fn identify(token: &str) -> WsMessage {
    let payload = json!({
        "op": 2,
        "d": {
            "token": token,
            "intents": INTENTS,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "repomind",
                "device": "repomind",
            },
        },
    });
    WsMessage::Text(payload.to_string().into())
}

/// Spawn the connection loop and return the stream of user messages.
///
/// The loop reconnects until the receiver is dropped.
#[must_use]
pub fn spawn_gateway(token: String) -> mpsc::Receiver<IncomingMessage> {
    let (tx, rx) = mpsc::channel(64);
    tokio::spawn(async move {
        while !tx.is_closed() {
            match run_session(&token, &tx).await {
                Ok(()) => tracing::info!("discord gateway session ended, reconnecting"),
                Err(e) => {
                    tracing::warn!(
                        "discord gateway error: {e}, reconnecting in {}s",
                        RECONNECT_DELAY.as_secs()
                    );
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
        tracing::debug!("discord gateway loop stopped");
    });
    rx
}

async fn run_session(token: &str, tx: &mpsc::Sender<IncomingMessage>) -> Result<(), SessionError> {
    let (ws, _) = connect_async(GATEWAY_URL).await?;
    let (mut write, mut read) = ws.split();

    let heartbeat_ms = match decode(&next_text(&mut read).await?)?.0 {
        Frame::Hello { heartbeat_ms } => heartbeat_ms,
        other => return Err(SessionError::Handshake(format!("expected hello, got {other:?}"))),
    };
    write.send(identify(token)).await?;

    let mut seq = None;
    let mut ticker = tokio::time::interval(Duration::from_millis(heartbeat_ms));
    loop {
        let text = tokio::select! {
            _ = ticker.tick() => {
                write.send(heartbeat(seq)).await?;
                continue;
            }
            msg = read.next() => match msg.transpose()? {
                Some(WsMessage::Text(t)) => t,
                Some(WsMessage::Close(_)) | None => return Ok(()),
                Some(_) => continue,
            },
        };

        let (frame, s) = decode(&text)?;
        seq = s.or(seq);
        match frame {
            Frame::Dispatch { event, data } if event == "READY" => {
                let user = data
                    .pointer("/user/username")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                tracing::info!(user, "discord gateway ready");
            }
            Frame::Dispatch { event, data } if event == "MESSAGE_CREATE" => {
                if let Some(incoming) = parse_message_create(&data)
                    && tx.send(incoming).await.is_err()
                {
                    return Ok(());
                }
            }
            Frame::HeartbeatRequest => write.send(heartbeat(seq)).await?,
            Frame::Restart => return Ok(()),
            Frame::Hello { .. } | Frame::Dispatch { .. } | Frame::Other => {}
        }
    }
}

/// Messages from bots, including this one, are dropped.
fn parse_message_create(d: &Value) -> Option<IncomingMessage> {
    let author = d.get("author")?;
    if author.get("bot").and_then(Value::as_bool).unwrap_or(false) {
        return None;
    }
    let author_name = ["global_name", "username"]
        .iter()
        .find_map(|key| author.get(*key).and_then(Value::as_str))
        .unwrap_or("there");

    Some(IncomingMessage {
        channel_id: d.get("channel_id")?.as_str()?.to_owned(),
        content: d.get("content")?.as_str()?.to_owned(),
        author_id: author.get("id")?.as_str()?.to_owned(),
        author_name: author_name.to_owned(),
    })
}

async fn next_text<S>(read: &mut S) -> Result<String, SessionError>
where
    S: Stream<Item = Result<WsMessage, tungstenite::Error>> + Unpin,
{
    while let Some(msg) = read.next().await {
        match msg? {
            WsMessage::Text(t) => return Ok(t.to_string()),
            WsMessage::Close(_) => break,
            _ => {}
        }
    }
    Err(SessionError::Handshake("connection closed before hello".into()))
}
