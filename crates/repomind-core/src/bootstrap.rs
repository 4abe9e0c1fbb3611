//! Turns a [`Config`] into ready-to-use collaborators.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use repomind_index::ChunkStore;
use repomind_llm::AnyProvider;
use repomind_llm::openai::OpenAiProvider;
use repomind_vectors::{InMemoryVectorStore, QdrantOps, VectorStore};

use crate::config::{Config, VectorBackend};
use crate::service::{RepoService, ServiceParts};
use crate::source::{GitSource, RepoSource};
use crate::vault::{EnvVaultProvider, VaultProvider};

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

pub struct AppBuilder {
    config: Config,
}

impl AppBuilder {
    /// Load, validate and resolve secrets from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file is malformed, invalid, or the vault fails.
    pub async fn load(cli_path: Option<&Path>) -> anyhow::Result<Self> {
        Self::load_with_vault(cli_path, &EnvVaultProvider).await
    }

    /// # Errors
    ///
    /// See [`AppBuilder::load`].
    pub async fn load_with_vault(
        cli_path: Option<&Path>,
        vault: &dyn VaultProvider,
    ) -> anyhow::Result<Self> {
        let config_path = resolve_config_path(cli_path);
        let mut config = Config::load(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?;
        config.validate()?;
        config.resolve_secrets(vault).await?;
        tracing::debug!(path = %config_path.display(), "configuration loaded");
        Ok(Self { config })
    }

    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// # Errors
    ///
    /// Fails when the provider API key is missing.
    pub fn build_provider(&self) -> anyhow::Result<AnyProvider> {
        let key = self.config.require_openai_key()?;
        let llm = &self.config.llm;
        let provider = OpenAiProvider::new(
            key.expose().to_owned(),
            llm.base_url.clone(),
            llm.model.clone(),
            llm.max_tokens,
            Some(self.config.embedding.model.clone()),
        )
        .with_temperature(llm.temperature);
        tracing::info!(model = %llm.model, embedding_model = %self.config.embedding.model, "llm provider configured");
        Ok(AnyProvider::OpenAi(provider))
    }

    /// # Errors
    ///
    /// Fails when the Qdrant client cannot be constructed.
    pub fn build_vector_store(&self) -> anyhow::Result<Arc<dyn VectorStore>> {
        let vs = &self.config.vector_store;
        match vs.backend {
            VectorBackend::Qdrant => {
                let ops = QdrantOps::new(&vs.url)
                    .map_err(|e| anyhow::anyhow!("failed to create qdrant client for {}: {e}", vs.url))?;
                tracing::info!(url = %vs.url, collection = %vs.collection, "using qdrant vector store");
                Ok(Arc::new(ops))
            }
            VectorBackend::Memory => {
                tracing::warn!("using in-memory vector store; indexed data is lost on exit");
                Ok(Arc::new(InMemoryVectorStore::new()))
            }
        }
    }

    /// Git source authenticated with the resolved access token.
    ///
    /// # Errors
    ///
    /// Fails when the version-control token is missing.
    pub fn build_git_source(&self) -> anyhow::Result<GitSource> {
        let token = self.config.require_github_token()?.clone();
        Ok(GitSource::new(
            Some(token),
            Duration::from_secs(self.config.repos.clone_timeout_secs),
        ))
    }

    /// # Errors
    ///
    /// Fails on missing secrets or an unusable vector store configuration.
    pub fn build_service(
        &self,
        source: Arc<dyn RepoSource>,
    ) -> anyhow::Result<RepoService<AnyProvider>> {
        let provider = Arc::new(self.build_provider()?);
        self.build_service_with(source, provider)
    }

    /// Same as [`AppBuilder::build_service`] with an explicit provider.
    ///
    /// # Errors
    ///
    /// Fails on an unusable vector store or chunking configuration.
    pub fn build_service_with<P: repomind_llm::LlmProvider>(
        &self,
        source: Arc<dyn RepoSource>,
        provider: Arc<P>,
    ) -> anyhow::Result<RepoService<P>> {
        let store = ChunkStore::new(
            self.build_vector_store()?,
            self.config.vector_store.collection.clone(),
        );
        Ok(RepoService::new(ServiceParts {
            source,
            store,
            provider,
            indexer: self.config.indexer_config()?,
            generation_timeout: Duration::from_secs(self.config.llm.timeout_secs),
            response_language: self.config.llm.response_language.clone(),
            repos_dir: self.config.repos_dir(),
            default_branch: self.config.repos.default_branch.clone(),
        }))
    }
}

/// `--config` wins, then `REPOMIND_CONFIG`, then `config/default.toml`.
#[must_use]
pub fn resolve_config_path(cli_path: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_path {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("REPOMIND_CONFIG")
        && !path.is_empty()
    {
        return PathBuf::from(path);
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}
