use serde::Deserialize;

use crate::vault::Secret;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub repos: RepoConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

/// Where checkouts live and how they are fetched.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoConfig {
    #[serde(default = "default_repos_dir")]
    pub root_dir: String,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    #[serde(default = "default_clone_timeout")]
    pub clone_timeout_secs: u64,
    /// Extra ignore patterns on top of the built-in list.
    #[serde(default)]
    pub ignore: Vec<String>,
    #[serde(default = "default_true")]
    pub respect_gitignore: bool,
}

fn default_repos_dir() -> String {
    "./data/repos".into()
}

fn default_branch() -> String {
    "main".into()
}

fn default_clone_timeout() -> u64 {
    600
}

fn default_true() -> bool {
    true
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            root_dir: default_repos_dir(),
            default_branch: default_branch(),
            clone_timeout_secs: default_clone_timeout(),
            ignore: Vec::new(),
            respect_gitignore: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_chunk_overlap(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embed_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

fn default_embed_batch_size() -> usize {
    100
}

fn default_embedding_timeout() -> u64 {
    120
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            batch_size: default_embed_batch_size(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    /// Language the answer should be written in; unset means the question's language.
    #[serde(default)]
    pub response_language: Option<String>,
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".into()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.7
}

fn default_llm_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
            response_language: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    #[default]
    Qdrant,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub backend: VectorBackend,
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".into()
}

fn default_collection() -> String {
    "repomind_chunks".into()
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: VectorBackend::default(),
            url: default_qdrant_url(),
            collection: default_collection(),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("bind", &self.bind)
            .field("port", &self.port)
            .field(
                "auth_token",
                &self.auth_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("max_body_size", &self.max_body_size)
            .finish()
    }
}

fn default_gateway_bind() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_max_body_size() -> usize {
    1_048_576
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_gateway_bind(),
            port: default_gateway_port(),
            auth_token: None,
            max_body_size: default_max_body_size(),
        }
    }
}

#[derive(Clone, Deserialize)]
pub struct DiscordConfig {
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    #[serde(default = "default_ingest_timeout")]
    pub ingest_timeout_secs: u64,
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
    /// Bearer token sent to the backend when its gateway requires one.
    #[serde(default)]
    pub backend_token: Option<String>,
    #[serde(default)]
    pub allowed_user_ids: Vec<String>,
    #[serde(default)]
    pub allowed_channel_ids: Vec<String>,
}

impl std::fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("backend_url", &self.backend_url)
            .field("command_prefix", &self.command_prefix)
            .field("ingest_timeout_secs", &self.ingest_timeout_secs)
            .field("query_timeout_secs", &self.query_timeout_secs)
            .field(
                "backend_token",
                &self.backend_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("allowed_user_ids", &self.allowed_user_ids)
            .field("allowed_channel_ids", &self.allowed_channel_ids)
            .finish()
    }
}

fn default_backend_url() -> String {
    "http://localhost:8000".into()
}

fn default_command_prefix() -> String {
    "!".into()
}

fn default_ingest_timeout() -> u64 {
    600
}

fn default_query_timeout() -> u64 {
    300
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            command_prefix: default_command_prefix(),
            ingest_timeout_secs: default_ingest_timeout(),
            query_timeout_secs: default_query_timeout(),
            backend_token: None,
            allowed_user_ids: Vec::new(),
            allowed_channel_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ResolvedSecrets {
    pub github_token: Option<Secret>,
    pub openai_api_key: Option<Secret>,
    pub discord_token: Option<Secret>,
}
