//! HTTP client for the RepoMind request surface.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::ChannelError;

/// Chunks requested per question.
pub const QUERY_N_RESULTS: usize = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessReply {
    #[serde(default)]
    pub total_files: usize,
    #[serde(default)]
    pub total_chunks_processed: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueryReply {
    #[serde(default)]
    pub ai_response: String,
}

pub struct BackendClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    ingest_timeout: Duration,
    query_timeout: Duration,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl BackendClient {
    /// # Errors
    ///
    /// Returns `ChannelError::InvalidUrl` if `base_url` does not parse.
    pub fn new(
        base_url: &str,
        ingest_timeout: Duration,
        query_timeout: Duration,
    ) -> Result<Self, ChannelError> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        Url::parse(&base_url)?;
        Ok(Self {
            client: repomind_llm::http::default_client(),
            base_url,
            token: None,
            ingest_timeout,
            query_timeout,
        })
    }

    /// Bearer token for a backend that requires authentication.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the backend to clone and index a repository.
    ///
    /// # Errors
    ///
    /// `Backend` carries the backend's `detail`; `Unreachable` and `Timeout`
    /// cover transport failures.
    pub async fn process_repo(
        &self,
        repo_url: &str,
        repo_name: &str,
        branch: &str,
    ) -> Result<ProcessReply, ChannelError> {
        let url = self.endpoint(
            "repo/process",
            &[
                ("repo_url", repo_url),
                ("repo_name", repo_name),
                ("branch", branch),
            ],
        )?;
        self.post(url, self.ingest_timeout).await
    }

    /// Ask a question scoped to one repository.
    ///
    /// # Errors
    ///
    /// Same as [`BackendClient::process_repo`].
    pub async fn query(&self, question: &str, repo_name: &str) -> Result<QueryReply, ChannelError> {
        let n_results = QUERY_N_RESULTS.to_string();
        let url = self.endpoint(
            "repo/query",
            &[
                ("query_text", question),
                ("repo_name", repo_name),
                ("n_results", n_results.as_str()),
            ],
        )?;
        self.post(url, self.query_timeout).await
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, ChannelError> {
        let mut url = Url::parse(&format!("{}/{path}", self.base_url))?;
        url.query_pairs_mut().extend_pairs(params);
        Ok(url)
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        timeout: Duration,
    ) -> Result<T, ChannelError> {
        let mut req = self.client.post(url).timeout(timeout);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| self.transport_error(e, timeout))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let detail = extract_detail(&body);
            tracing::error!(status = status.as_u16(), %detail, "backend request failed");
            return Err(ChannelError::Backend {
                status: status.as_u16(),
                detail,
            });
        }

        let body = resp.text().await.map_err(|e| self.transport_error(e, timeout))?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!("unparsable backend response: {e}");
            ChannelError::InvalidResponse(e.to_string())
        })
    }

    fn transport_error(&self, e: reqwest::Error, timeout: Duration) -> ChannelError {
        if e.is_timeout() {
            tracing::error!(seconds = timeout.as_secs(), "backend request timed out");
            ChannelError::Timeout {
                seconds: timeout.as_secs(),
            }
        } else {
            tracing::error!(url = %self.base_url, "backend request failed: {e}");
            ChannelError::Unreachable {
                url: self.base_url.clone(),
                source: e,
            }
        }
    }
}

/// The `detail` field of an error body, or the raw body when it is not JSON.
fn extract_detail(body: &str) -> String {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("detail") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => body.to_owned(),
        },
        _ if body.trim().is_empty() => "unknown error".to_owned(),
        _ => body.to_owned(),
    }
}
