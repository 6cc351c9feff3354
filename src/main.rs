use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use repogpt_core::Config;
use repogpt_core::bootstrap::{build_assistant, resolve_config_path};
use repogpt_core::secret::Secret;
use repogpt_gateway::GatewayServer;
use repogpt_index::source::RepoRef;
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(
    name = "repogpt",
    version,
    about = "Index a GitHub repository and ask questions about its code"
)]
struct Cli {
    /// Path to the TOML config (defaults to REPOGPT_CONFIG or config/default.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP gateway
    Serve,
    /// Ingest every includable file of a repository
    Ingest {
        #[arg(long)]
        owner: String,
        #[arg(long)]
        repo: String,
        #[arg(long, default_value = "main")]
        branch: String,
    },
    /// Ask a question against the indexed files and stream the answer
    Ask { question: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(resolve_config_path);
    let config = Config::load(&config_path)?;
    config.validate()?;

    let assistant = build_assistant(&config).await?;

    match cli.command {
        Command::Serve => {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("failed to listen for ctrl-c: {e}");
                    return;
                }
                tracing::info!("shutting down");
                let _ = shutdown_tx.send(true);
            });

            let gateway = &config.gateway;
            let auth_token = config.secrets.gateway_token.as_ref().map(expose_owned);
            let source_token = config.secrets.github_token.as_ref().map(expose_owned);
            GatewayServer::new(&gateway.bind, gateway.port, assistant, shutdown_rx)
                .with_auth(auth_token)
                .with_source_token(source_token)
                .with_rate_limit(gateway.rate_limit)
                .with_max_body_size(gateway.max_body_size)
                .serve()
                .await?;
        }
        Command::Ingest {
            owner,
            repo,
            branch,
        } => {
            let repo = RepoRef::new(owner, repo, branch)?;
            let token = config.secrets.github_token.as_ref().map(Secret::expose);
            let report = assistant
                .indexer()
                .ingest_repository(&repo, token)
                .await
                .with_context(|| format!("failed to ingest {repo}"))?;
            println!("processed {}/{} files", report.processed, report.total);
            for failure in &report.failures {
                println!("  failed: {} ({})", failure.file_name, failure.error);
            }
        }
        Command::Ask { question } => {
            let mut answer = assistant.ask(&question).await?;
            let mut stdout = std::io::stdout();
            while let Some(chunk) = answer.next().await {
                stdout.write_all(chunk?.as_bytes())?;
                stdout.flush()?;
            }
            writeln!(stdout)?;
        }
    }

    Ok(())
}

fn expose_owned(secret: &Secret) -> String {
    secret.expose().to_owned()
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("REPOGPT_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
