//! Error types for repomind-channels.

/// Failures talking to the backend or to Discord.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The backend answered with a non-success status.
    #[error("backend returned HTTP {status}: {detail}")]
    Backend { status: u16, detail: String },

    /// The backend could not be reached at all.
    #[error("cannot reach the backend at {url}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("backend did not respond within {seconds}s")]
    Timeout { seconds: u64 },

    /// The backend answered 2xx with a body we could not read.
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),

    #[error("invalid backend url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Discord REST API failure.
    #[error("discord API error: {0}")]
    Discord(#[source] reqwest::Error),
}
