use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use repomind_channels::{BackendClient, CommandHandler, DiscordBot};
use repomind_core::service::DEFAULT_N_RESULTS;
use repomind_core::{AppBuilder, LocalSource, RepoSource};
use repomind_gateway::GatewayServer;
use tokio::sync::watch;

#[derive(Debug, Parser)]
#[command(name = "repomind", version, about = "Ask questions about your code repositories")]
struct Cli {
    /// Config file (falls back to REPOMIND_CONFIG, then config/default.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP request surface.
    Serve,
    /// Run the Discord bot against a running server.
    Bot,
    /// Clone and index a repository in-process.
    Ingest {
        repo_url: String,
        repo_name: String,
        #[arg(long)]
        branch: Option<String>,
        /// Treat REPO_URL as an existing local directory instead of cloning it.
        #[arg(long)]
        local: bool,
    },
    /// Answer a question from indexed repositories in-process.
    Ask {
        question: String,
        #[arg(long)]
        repo: Option<String>,
        #[arg(short = 'n', long, default_value_t = DEFAULT_N_RESULTS)]
        n_results: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();
    let cli = Cli::parse();
    let app = AppBuilder::load(cli.config.as_deref()).await?;

    match cli.command {
        Command::Serve => serve(&app).await,
        Command::Bot => bot(&app).await,
        Command::Ingest {
            repo_url,
            repo_name,
            branch,
            local,
        } => ingest(&app, &repo_url, &repo_name, branch.as_deref(), local).await,
        Command::Ask {
            question,
            repo,
            n_results,
        } => ask(&app, &question, repo.as_deref(), n_results).await,
    }
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn shutdown_signal() -> watch::Receiver<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });
    shutdown_rx
}

async fn serve(app: &AppBuilder) -> anyhow::Result<()> {
    let config = app.config();
    // Both secrets are checked before any client is constructed.
    config.require_github_token()?;
    config.require_openai_key()?;

    let source: Arc<dyn RepoSource> = Arc::new(app.build_git_source()?);
    let service = Arc::new(app.build_service(source)?);

    GatewayServer::new(
        &config.gateway.bind,
        config.gateway.port,
        service,
        shutdown_signal(),
    )
    .with_auth(config.gateway.auth_token.clone())
    .with_max_body_size(config.gateway.max_body_size)
    .serve()
    .await
    .context("gateway failed")
}

async fn bot(app: &AppBuilder) -> anyhow::Result<()> {
    let config = app.config();
    let token = config.require_discord_token()?.expose().to_owned();
    let dc = &config.discord;

    let backend = BackendClient::new(
        &dc.backend_url,
        Duration::from_secs(dc.ingest_timeout_secs),
        Duration::from_secs(dc.query_timeout_secs),
    )
    .context("invalid discord.backend_url")?
    .with_token(dc.backend_token.clone());
    tracing::info!(backend = %backend.base_url(), "starting discord bot");

    let handler = CommandHandler::new(backend, dc.command_prefix.clone());
    DiscordBot::new(
        token,
        handler,
        dc.allowed_user_ids.clone(),
        dc.allowed_channel_ids.clone(),
    )
    .run(shutdown_signal())
    .await;
    Ok(())
}

async fn ingest(
    app: &AppBuilder,
    repo_url: &str,
    repo_name: &str,
    branch: Option<&str>,
    local: bool,
) -> anyhow::Result<()> {
    app.config().require_openai_key()?;
    let source: Arc<dyn RepoSource> = if local {
        Arc::new(LocalSource)
    } else {
        Arc::new(app.build_git_source()?)
    };
    let service = app.build_service(source)?;
    let report = service.ingest(repo_url, repo_name, branch).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn ask(
    app: &AppBuilder,
    question: &str,
    repo: Option<&str>,
    n_results: usize,
) -> anyhow::Result<()> {
    let service = app.build_service(Arc::new(LocalSource))?;
    let answer = service.answer(question, repo, n_results).await?;

    println!("{}", answer.ai_response);
    if !answer.source_chunks.is_empty() {
        println!("\nSources:");
        for chunk in &answer.source_chunks {
            println!(
                "  {} [{}] chunk {} (distance {:.3})",
                chunk.metadata.file_path,
                chunk.metadata.repo_name,
                chunk.metadata.chunk_index + 1,
                chunk.distance
            );
        }
    }
    Ok(())
}
