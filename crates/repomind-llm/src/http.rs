//! Shared HTTP client construction for consistent timeout and TLS configuration.

use std::time::Duration;

/// Create a shared HTTP client with standard `RepoMind` configuration.
///
/// Config: 30s connect timeout, rustls TLS, `repomind/{version}` user-agent,
/// redirect limit 10.
///
/// No client-wide request timeout; callers bound their own requests.
#[must_use]
pub fn default_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .user_agent(concat!("repomind/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .expect("default HTTP client construction must not fail")
}
