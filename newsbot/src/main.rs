/*
newsbot - single-binary main.rs
Loads configuration, builds the shared clients once and either serves the `/run` trigger,
runs one cycle from the command line, or performs first-time Blogger consent.
*/

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::{resolve_api_key, Config};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use newsbot::auth::CredentialManager;
use newsbot::blogger::{BloggerClient, BloggerPublisher};
use newsbot::llm::remote::GeminiProvider;
use newsbot::news::WorldNewsClient;
use newsbot::pipeline::{NewsBot, RunSettings};
use newsbot::server::{launch_rocket, AppState};

#[derive(Parser, Debug)]
#[command(name = "newsbot", about = "Fetch news, write a post with Gemini, publish it to Blogger")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Serve the HTTP trigger (default)
    Serve,
    /// Run one fetch -> generate -> publish cycle and exit
    RunOnce,
    /// Grant Blogger access once and write the credential store
    Authorize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = load_config(args.config.clone()).await?;

    let credentials = Arc::new(
        CredentialManager::new(
            &config.blogger.client_secret_file,
            &config.blogger.storage_file,
            &config.blogger.scopes,
            Duration::from_secs(config.blogger.timeout_seconds),
        )
        .context("failed to build credential manager")?,
    );

    match args.command.unwrap_or(Command::Serve) {
        Command::Authorize => {
            let mut stdin = BufReader::new(tokio::io::stdin());
            let mut stdout = tokio::io::stdout();
            credentials
                .authorize_interactive(&mut stdin, &mut stdout)
                .await
                .context("Blogger authorization failed")?;
            info!(path = %credentials.storage_file().display(), "Blogger credentials saved");
        }
        Command::RunOnce => {
            let bot = build_bot(&config, credentials)?;
            let report = bot.run().await?;
            info!(
                articles = report.articles_fetched,
                url = %report.post.url,
                "run-once completed"
            );
        }
        Command::Serve => {
            let bot = Arc::new(build_bot(&config, credentials)?);
            if let Err(e) = launch_rocket(AppState::new(bot), &config.server).await {
                error!(%e, "Rocket server failed");
                return Err(e);
            }
            info!("Shutdown complete");
        }
    }

    Ok(())
}

/// `config.default.toml` merged with `--config` (or `./config.toml`), then the environment.
async fn load_config(explicit: Option<PathBuf>) -> Result<Config> {
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = explicit {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let mut config = Config::load_with_defaults(Some(&default_path), override_path.as_deref())
        .await
        .inspect_err(|e| error!(%e, "failed to load configuration"))?;
    config.apply_env_overrides();

    info!(default = ?default_path, override = ?override_path, "configuration loaded");
    Ok(config)
}

/// Construct the long-lived clients and wire them into the pipeline.
fn build_bot(config: &Config, credentials: Arc<CredentialManager>) -> Result<NewsBot> {
    let news = WorldNewsClient::new(
        &config.news.api_url,
        resolve_api_key(&config.news.api_key_env),
        config.news.timeout_seconds,
    )
    .context("failed to build news client")?;

    let llm = GeminiProvider::new(
        &config.llm.api_url,
        resolve_api_key(&config.llm.api_key_env),
        &config.llm.model,
    )
    .with_defaults(
        config.llm.timeout_seconds,
        config.llm.max_tokens,
        config.llm.temperature,
    );
    info!(model = %config.llm.model, "LLM provider initialized");

    let blogger = BloggerClient::new(&config.blogger.api_url, config.blogger.timeout_seconds)
        .context("failed to build Blogger client")?;
    let publisher = BloggerPublisher::new(credentials, blogger, &config.blogger.blog_url);

    Ok(NewsBot::new(
        Arc::new(news),
        Arc::new(llm),
        Arc::new(publisher),
        RunSettings {
            count: config.news.count,
            country: config.news.country.clone(),
        },
    ))
}
