//! Prompt assembly and answer generation from retrieved chunks.

use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

use repomind_llm::{LlmProvider, Message, with_deadline};

use crate::error::{IndexError, Result};
use crate::store::QueryResult;

const SYSTEM_WITH_CONTEXT: &str = "You are a code analysis assistant for a source repository. \
Answer the question using only the repository context provided. \
If the context does not contain the answer, say so plainly instead of guessing. \
When you rely on a snippet, cite its file path.";

const SYSTEM_WITHOUT_CONTEXT: &str = "You are a code analysis assistant for a source repository. \
No repository context was found for this question. \
Tell the user that no relevant code or documentation is available, \
and do not present guesses as facts about the repository.";

const NO_CONTEXT: &str = "No code or documentation context is available.";

/// Turns retrieved chunks and a question into a model answer.
pub struct AnswerSynthesizer<P: LlmProvider> {
    provider: Arc<P>,
    timeout: Duration,
    response_language: Option<String>,
}

impl<P: LlmProvider> AnswerSynthesizer<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, timeout: Duration) -> Self {
        Self {
            provider,
            timeout,
            response_language: None,
        }
    }

    /// Ask the model to answer in a specific natural language.
    #[must_use]
    pub fn with_response_language(mut self, language: Option<String>) -> Self {
        self.response_language = language.filter(|l| !l.trim().is_empty());
        self
    }

    /// # Errors
    ///
    /// Returns `IndexError::Generation` on provider failure, rate limiting or timeout.
    pub async fn answer(&self, question: &str, results: &[QueryResult]) -> Result<String> {
        let messages = self.build_messages(question, results);
        with_deadline("generation", self.timeout, self.provider.chat(&messages))
            .await
            .map_err(IndexError::Generation)
    }

    #[must_use]
    pub fn build_messages(&self, question: &str, results: &[QueryResult]) -> Vec<Message> {
        let mut system = if results.is_empty() {
            SYSTEM_WITHOUT_CONTEXT.to_owned()
        } else {
            SYSTEM_WITH_CONTEXT.to_owned()
        };
        if let Some(lang) = &self.response_language {
            let _ = write!(system, " Respond in {lang}.");
        }

        let context = if results.is_empty() {
            NO_CONTEXT.to_owned()
        } else {
            format_context(results)
        };

        vec![
            Message::system(system),
            Message::user(format!(
                "Use the following context to answer the question.\n\n\
                 Context:\n{context}\n\nQuestion: {question}"
            )),
        ]
    }
}

/// Render results as labelled blocks, in the given order.
///
/// Blocks are numbered by rank, so `Chunk 1` is the closest match.
#[must_use]
pub fn format_context(results: &[QueryResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(rank, r)| {
            format!(
                "--- File: {} (Language: {}, Chunk {}) ---\n{}\n---",
                r.metadata.file_path,
                r.metadata.language,
                rank + 1,
                r.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
