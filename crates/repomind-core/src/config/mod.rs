mod env;
mod types;


pub use types::*;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use repomind_index::ChunkerConfig;
use repomind_index::IndexerConfig;
use repomind_index::discovery::DiscoveryConfig;

use crate::vault::{Secret, VaultProvider};

pub const GITHUB_TOKEN_KEY: &str = "REPOMIND_GITHUB_TOKEN";
pub const OPENAI_API_KEY_KEY: &str = "REPOMIND_OPENAI_API_KEY";
pub const DISCORD_TOKEN_KEY: &str = "REPOMIND_DISCORD_TOKEN";
pub const GATEWAY_TOKEN_KEY: &str = "REPOMIND_GATEWAY_TOKEN";
pub const BACKEND_TOKEN_KEY: &str = "REPOMIND_BACKEND_TOKEN";

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Check values that would otherwise fail deep inside a request.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        ChunkerConfig::new(self.chunking.chunk_size, self.chunking.overlap)
            .context("invalid [chunking] section")?;
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be greater than zero");
        }
        if self.repos.default_branch.trim().is_empty() {
            bail!("repos.default_branch must not be empty");
        }
        if self.vector_store.collection.trim().is_empty() {
            bail!("vector_store.collection must not be empty");
        }
        if self.gateway.port == 0 {
            bail!("gateway.port must be between 1 and 65535");
        }
        if self.discord.command_prefix.is_empty() {
            bail!("discord.command_prefix must not be empty");
        }
        for (name, secs) in [
            ("repos.clone_timeout_secs", self.repos.clone_timeout_secs),
            ("embedding.timeout_secs", self.embedding.timeout_secs),
            ("llm.timeout_secs", self.llm.timeout_secs),
            ("discord.ingest_timeout_secs", self.discord.ingest_timeout_secs),
            ("discord.query_timeout_secs", self.discord.query_timeout_secs),
        ] {
            if secs == 0 {
                bail!("{name} must be greater than zero");
            }
        }
        Ok(())
    }

    /// Resolve sensitive configuration values through the vault.
    ///
    /// # Errors
    ///
    /// Returns an error if the vault backend fails.
    pub async fn resolve_secrets(&mut self, vault: &dyn VaultProvider) -> anyhow::Result<()> {
        if let Some(val) = non_empty(vault.get_secret(GITHUB_TOKEN_KEY).await?) {
            self.secrets.github_token = Some(Secret::new(val));
        }
        if let Some(val) = non_empty(vault.get_secret(OPENAI_API_KEY_KEY).await?) {
            self.secrets.openai_api_key = Some(Secret::new(val));
        }
        if let Some(val) = non_empty(vault.get_secret(DISCORD_TOKEN_KEY).await?) {
            self.secrets.discord_token = Some(Secret::new(val));
        }
        if let Some(val) = non_empty(vault.get_secret(GATEWAY_TOKEN_KEY).await?) {
            self.gateway.auth_token = Some(val);
        }
        if let Some(val) = non_empty(vault.get_secret(BACKEND_TOKEN_KEY).await?) {
            self.discord.backend_token = Some(val);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Fails when no version-control token was resolved.
    pub fn require_github_token(&self) -> anyhow::Result<&Secret> {
        require(
            self.secrets.github_token.as_ref(),
            GITHUB_TOKEN_KEY,
            "a GitHub access token is needed to clone repositories",
        )
    }

    /// # Errors
    ///
    /// Fails when no model provider key was resolved.
    pub fn require_openai_key(&self) -> anyhow::Result<&Secret> {
        require(
            self.secrets.openai_api_key.as_ref(),
            OPENAI_API_KEY_KEY,
            "an OpenAI API key is needed for embeddings and answers",
        )
    }

    /// # Errors
    ///
    /// Fails when no bot token was resolved.
    pub fn require_discord_token(&self) -> anyhow::Result<&Secret> {
        require(
            self.secrets.discord_token.as_ref(),
            DISCORD_TOKEN_KEY,
            "a Discord bot token is needed to connect to the gateway",
        )
    }

    /// Ingestion settings derived from `[chunking]`, `[embedding]` and `[repos]`.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid chunk parameters.
    pub fn indexer_config(&self) -> anyhow::Result<IndexerConfig> {
        let chunker = ChunkerConfig::new(self.chunking.chunk_size, self.chunking.overlap)
            .context("invalid [chunking] section")?;
        Ok(IndexerConfig {
            chunker,
            discovery: DiscoveryConfig {
                extra_ignore: self.repos.ignore.clone(),
                respect_gitignore: self.repos.respect_gitignore,
            },
            embed_batch_size: self.embedding.batch_size,
            embed_timeout: Duration::from_secs(self.embedding.timeout_secs),
        })
    }

    #[must_use]
    pub fn repos_dir(&self) -> PathBuf {
        PathBuf::from(&self.repos.root_dir)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn require<'a>(secret: Option<&'a Secret>, key: &str, purpose: &str) -> anyhow::Result<&'a Secret> {
    match secret {
        Some(secret) => Ok(secret),
        None => bail!("missing required secret {key}: {purpose}; set it in the environment"),
    }
}
