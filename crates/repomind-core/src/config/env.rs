use super::{Config, VectorBackend};

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_pipeline();
        self.apply_env_overrides_surfaces();
    }

    fn apply_env_overrides_pipeline(&mut self) {
        if let Ok(v) = std::env::var("REPOMIND_REPOS_DIR") {
            self.repos.root_dir = v;
        }
        if let Ok(v) = std::env::var("REPOMIND_DEFAULT_BRANCH")
            && !v.trim().is_empty()
        {
            self.repos.default_branch = v;
        }
        if let Ok(v) = std::env::var("REPOMIND_TIMEOUT_CLONE")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.repos.clone_timeout_secs = secs;
        }
        if let Ok(v) = std::env::var("REPOMIND_CHUNK_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.chunking.chunk_size = n;
        }
        if let Ok(v) = std::env::var("REPOMIND_CHUNK_OVERLAP")
            && let Ok(n) = v.parse::<usize>()
        {
            self.chunking.overlap = n;
        }
        if let Ok(v) = std::env::var("REPOMIND_EMBEDDING_MODEL") {
            self.embedding.model = v;
        }
        if let Ok(v) = std::env::var("REPOMIND_EMBED_BATCH_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.embedding.batch_size = n;
        }
        if let Ok(v) = std::env::var("REPOMIND_TIMEOUT_EMBEDDING")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.embedding.timeout_secs = secs;
        }
        if let Ok(v) = std::env::var("REPOMIND_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("REPOMIND_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("REPOMIND_TIMEOUT_LLM")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.llm.timeout_secs = secs;
        }
        if let Ok(v) = std::env::var("REPOMIND_RESPONSE_LANGUAGE") {
            self.llm.response_language = if v.trim().is_empty() { None } else { Some(v) };
        }
        if let Ok(v) = std::env::var("REPOMIND_VECTOR_BACKEND") {
            match v.to_lowercase().as_str() {
                "qdrant" => self.vector_store.backend = VectorBackend::Qdrant,
                "memory" => self.vector_store.backend = VectorBackend::Memory,
                _ => tracing::warn!("ignoring invalid REPOMIND_VECTOR_BACKEND value: {v}"),
            }
        }
        if let Ok(v) = std::env::var("REPOMIND_QDRANT_URL") {
            self.vector_store.url = v;
        }
        if let Ok(v) = std::env::var("REPOMIND_COLLECTION") {
            self.vector_store.collection = v;
        }
    }

    fn apply_env_overrides_surfaces(&mut self) {
        if let Ok(v) = std::env::var("REPOMIND_GATEWAY_BIND") {
            self.gateway.bind = v;
        }
        if let Ok(v) = std::env::var("REPOMIND_GATEWAY_PORT")
            && let Ok(port) = v.parse::<u16>()
        {
            self.gateway.port = port;
        }
        if let Ok(v) = std::env::var("REPOMIND_GATEWAY_MAX_BODY_SIZE")
            && let Ok(size) = v.parse::<usize>()
        {
            self.gateway.max_body_size = size;
        }
        if let Ok(v) = std::env::var("REPOMIND_BACKEND_URL") {
            self.discord.backend_url = v;
        }
        if let Ok(v) = std::env::var("REPOMIND_DISCORD_PREFIX")
            && !v.is_empty()
        {
            self.discord.command_prefix = v;
        }
        if let Ok(v) = std::env::var("REPOMIND_DISCORD_ALLOWED_USERS") {
            self.discord.allowed_user_ids = split_list(&v);
        }
        if let Ok(v) = std::env::var("REPOMIND_DISCORD_ALLOWED_CHANNELS") {
            self.discord.allowed_channel_ids = split_list(&v);
        }
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
