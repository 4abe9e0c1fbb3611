//! Turns parsed commands into backend calls and chat replies.

use std::borrow::Cow;
use std::future::Future;

use crate::backend::BackendClient;
use crate::commands::{Command, ParseError, help_text, parse_command};
use crate::error::ChannelError;
use crate::split::{MAX_MESSAGE_CHARS, SPLIT_CHARS, split_message, truncate_chars};

const DEFAULT_BRANCH: &str = "main";

/// Where replies go.
pub trait Replier: Send + Sync {
    fn reply(
        &self,
        channel_id: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Best-effort "bot is typing" indicator.
    fn typing(&self, channel_id: &str) -> impl Future<Output = ()> + Send;
}

pub struct CommandHandler {
    backend: BackendClient,
    prefix: String,
}

impl CommandHandler {
    #[must_use]
    pub fn new(backend: BackendClient, prefix: impl Into<String>) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Handle one chat message. Messages without the prefix are ignored.
    ///
    /// Backend failures are reported to the channel, not returned. Every
    /// reply stays within Discord's message limit.
    ///
    /// # Errors
    ///
    /// Returns an error only if a reply cannot be delivered.
    pub async fn handle<R: Replier>(
        &self,
        replier: &R,
        channel_id: &str,
        author_name: &str,
        content: &str,
    ) -> Result<(), ChannelError> {
        let Some(parsed) = parse_command(content, &self.prefix) else {
            return Ok(());
        };

        match parsed {
            Ok(Command::Hello) => {
                say(replier, channel_id, &format!("Hello, {}!", preview(author_name))).await
            }
            Ok(Command::Help) => say(replier, channel_id, &help_text(&self.prefix)).await,
            Ok(Command::AddRepo { url, name, branch }) => {
                let branch = branch.as_deref().unwrap_or(DEFAULT_BRANCH);
                self.add_repo(replier, channel_id, &url, &name, branch).await
            }
            Ok(Command::AnalyzeRepo { name, question }) => {
                self.analyze_repo(replier, channel_id, &name, &question).await
            }
            Err(ParseError::MissingArguments { usage }) => {
                say(replier, channel_id, &format!("Missing arguments. Usage: `{usage}`")).await
            }
            Err(ParseError::Unknown(name)) => {
                tracing::debug!(command = %name, "unknown command");
                say(
                    replier,
                    channel_id,
                    &format!("Unknown command. Type `{}help` to see what I can do.", self.prefix),
                )
                .await
            }
        }
    }

    async fn add_repo<R: Replier>(
        &self,
        replier: &R,
        channel_id: &str,
        url: &str,
        name: &str,
        branch: &str,
    ) -> Result<(), ChannelError> {
        say(
            replier,
            channel_id,
            &format!(
                "Processing repository '{}' ({}). This may take a while...",
                preview(name),
                preview(url)
            ),
        )
        .await?;
        replier.typing(channel_id).await;

        let text = match self.backend.process_repo(url, name, branch).await {
            Ok(reply) => {
                tracing::info!(repo = name, chunks = reply.total_chunks_processed, "repository added");
                format!(
                    "✅ Repository '{}' was added.\nProcessed {} code chunks from {} files.",
                    preview(name),
                    reply.total_chunks_processed,
                    reply.total_files
                )
            }
            Err(e) => failure(&format!("❌ Failed to add repository '{}': {e}", preview(name))),
        };
        say(replier, channel_id, &text).await
    }

    async fn analyze_repo<R: Replier>(
        &self,
        replier: &R,
        channel_id: &str,
        name: &str,
        question: &str,
    ) -> Result<(), ChannelError> {
        say(
            replier,
            channel_id,
            &format!(
                "Looking into '{}' for: {}\nPlease wait...",
                preview(name),
                preview(question)
            ),
        )
        .await?;
        replier.typing(channel_id).await;

        let answer = match self.backend.query(question, name).await {
            Ok(reply) if reply.ai_response.trim().is_empty() => {
                "No answer could be generated.".to_owned()
            }
            Ok(reply) => reply.ai_response,
            Err(e) => {
                let text = failure(&format!("❌ Failed to analyze '{}': {e}", preview(name)));
                return say(replier, channel_id, &text).await;
            }
        };

        if answer.chars().count() > MAX_MESSAGE_CHARS {
            say(replier, channel_id, "The answer is long, sending it in parts:").await?;
        }
        say(replier, channel_id, &answer).await
    }
}

/// User input echoed back in progress messages.
const PREVIEW_CHARS: usize = 200;

fn preview(text: &str) -> Cow<'_, str> {
    truncate_chars(text, PREVIEW_CHARS)
}

/// A failure is one message; oversized backend details are cut.
fn failure(text: &str) -> String {
    truncate_chars(text, SPLIT_CHARS).into_owned()
}

/// Send `text`, split into ordered pieces when it exceeds the message limit.
async fn say<R: Replier>(replier: &R, channel_id: &str, text: &str) -> Result<(), ChannelError> {
    for piece in split_message(text) {
        replier.reply(channel_id, piece).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, String)>>,
        typing: Mutex<usize>,
    }

    impl Recorder {
        fn texts(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
        }
    }

    impl Replier for Recorder {
        async fn reply(&self, channel_id: &str, text: &str) -> Result<(), ChannelError> {
            self.sent
                .lock()
                .unwrap()
                .push((channel_id.to_owned(), text.to_owned()));
            Ok(())
        }

        async fn typing(&self, _channel_id: &str) {
            *self.typing.lock().unwrap() += 1;
        }
    }

    fn handler(base: &str) -> CommandHandler {
        let backend =
            BackendClient::new(base, Duration::from_secs(5), Duration::from_secs(5)).unwrap();
        CommandHandler::new(backend, "!")
    }

    #[tokio::test]
    async fn ignores_plain_messages() {
        let rec = Recorder::default();
        handler("http://127.0.0.1:1")
            .handle(&rec, "c", "ann", "just chatting")
            .await
            .unwrap();
        assert!(rec.texts().is_empty());
    }

    #[tokio::test]
    async fn hello_and_help() {
        let rec = Recorder::default();
        let h = handler("http://127.0.0.1:1");
        h.handle(&rec, "c", "Ann", "!hello").await.unwrap();
        h.handle(&rec, "c", "Ann", "!help").await.unwrap();
        let texts = rec.texts();
        assert_eq!(texts[0], "Hello, Ann!");
        assert!(texts[1].contains("!analyze-repo"));
    }

    #[tokio::test]
    async fn usage_and_unknown_replies() {
        let rec = Recorder::default();
        let h = handler("http://127.0.0.1:1");
        h.handle(&rec, "c", "a", "!add-repo onlyurl").await.unwrap();
        h.handle(&rec, "c", "a", "!nope").await.unwrap();
        let texts = rec.texts();
        assert!(texts[0].starts_with("Missing arguments"));
        assert!(texts[1].contains("`!help`"));
    }

    #[tokio::test]
    async fn add_repo_defaults_branch_and_reports_chunks() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repo/process"))
            .and(query_param("branch", "main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "total_files": 3, "total_chunks_processed": 5
            })))
            .expect(1)
            .mount(&server)
            .await;

        let rec = Recorder::default();
        handler(&server.uri())
            .handle(&rec, "c", "a", "!add-repo https://github.com/a/b b")
            .await
            .unwrap();
        let texts = rec.texts();
        assert_eq!(texts.len(), 2);
        assert!(texts[0].contains("Processing repository 'b'"));
        assert!(texts[1].contains("Processed 5 code chunks"));
        assert_eq!(*rec.typing.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn add_repo_failure_shows_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repo/process"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"detail": "repo_name must not be empty"})),
            )
            .mount(&server)
            .await;

        let rec = Recorder::default();
        handler(&server.uri())
            .handle(&rec, "c", "a", "!add-repo https://github.com/a/b b")
            .await
            .unwrap();
        let last = rec.texts().pop().unwrap();
        assert!(last.contains("HTTP 400"));
        assert!(last.contains("repo_name must not be empty"));
    }

    #[tokio::test]
    async fn analyze_unreachable_backend() {
        let rec = Recorder::default();
        handler("http://127.0.0.1:1")
            .handle(&rec, "c", "a", "!analyze-repo widgets what is this?")
            .await
            .unwrap();
        let last = rec.texts().pop().unwrap();
        assert!(last.contains("cannot reach the backend"));
    }

    #[tokio::test]
    async fn long_answer_is_split() {
        let server = MockServer::start().await;
        let answer = "x".repeat(4500);
        Mock::given(method("POST"))
            .and(path("/repo/query"))
            .and(query_param("repo_name", "widgets"))
            .and(query_param("query_text", "explain everything"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"ai_response": answer})),
            )
            .mount(&server)
            .await;

        let rec = Recorder::default();
        handler(&server.uri())
            .handle(&rec, "c", "a", "!analyze-repo widgets explain everything")
            .await
            .unwrap();
        let texts = rec.texts();
        // progress, notice, 1900 + 1900 + 700
        assert_eq!(texts.len(), 5);
        assert!(texts[1].contains("in parts"));
        assert_eq!(texts[2].len(), 1900);
        assert_eq!(texts[4].len(), 700);
        assert_eq!(texts[2..].concat(), answer);
    }

    #[tokio::test]
    async fn short_answer_single_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repo/query"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"ai_response": "It is a CLI."})),
            )
            .mount(&server)
            .await;

        let rec = Recorder::default();
        handler(&server.uri())
            .handle(&rec, "c", "a", "!analyze-repo widgets what?")
            .await
            .unwrap();
        assert_eq!(rec.texts().last().unwrap(), "It is a CLI.");
        assert_eq!(rec.texts().len(), 2);
    }

    /// Rejects oversized messages the way Discord does.
    #[derive(Default)]
    struct LimitedChannel(Recorder);

    impl Replier for LimitedChannel {
        async fn reply(&self, channel_id: &str, text: &str) -> Result<(), ChannelError> {
            if text.chars().count() > MAX_MESSAGE_CHARS {
                return Err(ChannelError::InvalidResponse(format!(
                    "message of {} chars rejected",
                    text.chars().count()
                )));
            }
            self.0.reply(channel_id, text).await
        }

        async fn typing(&self, channel_id: &str) {
            self.0.typing(channel_id).await;
        }
    }

    #[tokio::test]
    async fn long_question_still_reaches_backend() {
        let server = MockServer::start().await;
        let question = "why ".repeat(492) + "ok";
        assert!(question.len() > 1960 && question.len() < MAX_MESSAGE_CHARS);
        Mock::given(method("POST"))
            .and(path("/repo/query"))
            .and(query_param("query_text", question.as_str()))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"ai_response": "Because."})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let chan = LimitedChannel::default();
        handler(&server.uri())
            .handle(&chan, "c", "a", &format!("!analyze-repo widgets {question}"))
            .await
            .unwrap();
        let texts = chan.0.texts();
        assert_eq!(texts.len(), 2);
        assert!(texts[0].contains("Looking into 'widgets'"));
        assert!(texts[0].contains('…'));
        assert_eq!(texts[1], "Because.");
    }

    #[tokio::test]
    async fn oversized_error_body_is_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repo/process"))
            .respond_with(ResponseTemplate::new(502).set_body_string("e".repeat(3000)))
            .mount(&server)
            .await;

        let chan = LimitedChannel::default();
        handler(&server.uri())
            .handle(&chan, "c", "a", "!add-repo https://github.com/a/b b")
            .await
            .unwrap();
        let texts = chan.0.texts();
        assert_eq!(texts.len(), 2);
        let failure = &texts[1];
        assert!(failure.starts_with("❌ Failed to add repository 'b'"));
        assert!(failure.contains("HTTP 502"));
        assert!(failure.ends_with('…'));
        assert!(failure.chars().count() <= SPLIT_CHARS);
    }

    #[tokio::test]
    async fn long_author_name_is_bounded() {
        let chan = LimitedChannel::default();
        handler("http://127.0.0.1:1")
            .handle(&chan, "c", &"n".repeat(2500), "!hello")
            .await
            .unwrap();
        let texts = chan.0.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].chars().count() <= MAX_MESSAGE_CHARS);
    }
}
