//! Repository sources: produce a local checkout for a remote URL.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use url::Url;

use crate::vault::Secret;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const REDACTED: &str = "***";

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("invalid repository url: {0}")]
    InvalidUrl(String),

    #[error("failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("git {command} failed: {stderr}")]
    Git { command: &'static str, stderr: String },

    #[error("git {command} timed out after {seconds}s")]
    Timeout { command: &'static str, seconds: u64 },

    #[error("local source {} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Anything that can materialise a repository on disk.
pub trait RepoSource: Send + Sync {
    /// Make `url` at `branch` available under `dest` and return the directory
    /// that should be indexed.
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        dest: &'a Path,
        branch: &'a str,
    ) -> BoxFuture<'a, Result<PathBuf, SourceError>>;
}

/// Clones with the `git` CLI, authenticating HTTPS remotes with an access token.
pub struct GitSource {
    token: Option<Secret>,
    timeout: Duration,
}

impl GitSource {
    #[must_use]
    pub fn new(token: Option<Secret>, timeout: Duration) -> Self {
        Self { token, timeout }
    }

    async fn clone_fresh(&self, remote: &str, clean: &str, dest: &Path, branch: &str) -> Result<(), SourceError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let dest_str = dest.to_string_lossy();
        let result = async {
            self.git(
                "clone",
                None,
                &["clone", "--branch", branch, "--", remote, dest_str.as_ref()],
            )
            .await?;
            self.git("remote", Some(dest), &["remote", "set-url", "origin", clean])
                .await
        }
        .await;

        if result.is_err() && dest.exists() {
            if let Err(e) = tokio::fs::remove_dir_all(dest).await {
                tracing::warn!(path = %dest.display(), "failed to remove partial clone: {e}");
            }
        }
        result
    }

    async fn update(&self, remote: &str, clean: &str, dest: &Path, branch: &str) -> Result<(), SourceError> {
        self.git("remote", Some(dest), &["remote", "set-url", "origin", remote])
            .await?;
        let result = async {
            self.git("fetch", Some(dest), &["fetch", "origin", branch])
                .await?;
            self.git("checkout", Some(dest), &["checkout", branch])
                .await?;
            self.git("pull", Some(dest), &["pull", "--ff-only", "origin", branch])
                .await
        }
        .await;
        // Never leave the token in .git/config, even after a failed update.
        let reset = self
            .git("remote", Some(dest), &["remote", "set-url", "origin", clean])
            .await;
        result.and(reset)
    }

    async fn git(
        &self,
        command: &'static str,
        cwd: Option<&Path>,
        args: &[&str],
    ) -> Result<(), SourceError> {
        let mut cmd = Command::new("git");
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| SourceError::Timeout {
                command,
                seconds: self.timeout.as_secs(),
            })?
            .map_err(SourceError::Spawn)?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(SourceError::Git {
            command,
            stderr: self.redact(stderr.trim()),
        })
    }

    fn redact(&self, text: &str) -> String {
        match &self.token {
            Some(token) => token.scrub(text, REDACTED),
            None => text.to_owned(),
        }
    }
}

impl RepoSource for GitSource {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        dest: &'a Path,
        branch: &'a str,
    ) -> BoxFuture<'a, Result<PathBuf, SourceError>> {
        Box::pin(async move {
            validate_url(url)?;
            if branch.trim().is_empty() || branch.starts_with('-') {
                return Err(SourceError::InvalidUrl(format!("invalid branch name: {branch}")));
            }
            let remote = authenticated_url(url, self.token.as_ref())?;

            if dest.join(".git").is_dir() {
                tracing::info!(repo = %display_url(url), %branch, path = %dest.display(), "updating existing checkout");
                self.update(&remote, url, dest, branch).await?;
            } else {
                tracing::info!(repo = %display_url(url), %branch, path = %dest.display(), "cloning repository");
                self.clone_fresh(&remote, url, dest, branch).await?;
            }
            Ok(dest.to_path_buf())
        })
    }
}

/// Uses an existing directory as-is; `url` is the directory path.
pub struct LocalSource;

impl RepoSource for LocalSource {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        _dest: &'a Path,
        _branch: &'a str,
    ) -> BoxFuture<'a, Result<PathBuf, SourceError>> {
        Box::pin(async move {
            let path = PathBuf::from(url);
            if !tokio::fs::metadata(&path)
                .await
                .is_ok_and(|m| m.is_dir())
            {
                return Err(SourceError::NotADirectory { path });
            }
            Ok(path)
        })
    }
}

fn validate_url(url: &str) -> Result<(), SourceError> {
    if url.trim().is_empty() {
        return Err(SourceError::InvalidUrl("repository url is empty".into()));
    }
    if url.chars().any(char::is_whitespace) {
        return Err(SourceError::InvalidUrl(
            "repository url must not contain whitespace".into(),
        ));
    }
    if url.starts_with('-') {
        return Err(SourceError::InvalidUrl(display_url(url)));
    }
    Ok(())
}

/// Embed `token` into an HTTPS remote as `oauth2:{token}@host`.
///
/// Non-HTTPS remotes (ssh, local paths, `file://`) are returned unchanged.
///
/// # Errors
///
/// Returns `SourceError::InvalidUrl` when an `https://` URL cannot be parsed.
pub fn authenticated_url(url: &str, token: Option<&Secret>) -> Result<String, SourceError> {
    let Some(token) = token else {
        return Ok(url.to_owned());
    };
    if !url.starts_with("https://") {
        return Ok(url.to_owned());
    }
    let mut parsed = Url::parse(url).map_err(|e| SourceError::InvalidUrl(e.to_string()))?;
    if parsed.set_username("oauth2").is_err() || parsed.set_password(Some(token.expose())).is_err() {
        return Err(SourceError::InvalidUrl(display_url(url)));
    }
    Ok(parsed.into())
}

/// Strip any credentials from a URL before it reaches logs.
#[must_use]
pub fn display_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if !parsed.username().is_empty() || parsed.password().is_some() => {
            let _ = parsed.set_username("");
            let _ = parsed.set_password(None);
            parsed.into()
        }
        _ => url.to_owned(),
    }
}
