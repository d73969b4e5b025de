mod app;
mod cli;
mod config;
mod git;
mod license;
mod paths;
mod prompt;
mod provider;
mod singleflight;

use anyhow::Context;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = cli::Args::parse();

    // Resolve and create dirs early.
    let config_dir = paths::config_dir()?;
    let _state_dir = paths::state_dir()?;

    let cfg = config::Config::load_optional(config_dir.join("config.toml"))?;
    tracing::debug!(?config_dir, loaded = cfg.is_some(), "resolved config");

    let http = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    match args.cmd {
        Some(cli::Command::Trial) => app::cmd_trial(cfg.as_ref()),
        None => app::cmd_generate(&http, cfg.as_ref(), &args).await,
    }
}
