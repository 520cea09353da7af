use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use bulksync::config::Config;
use bulksync::credentials::CREDENTIAL_HELP;
use bulksync::{Credential, Manifest, SyncClientBuilder, SyncError};

mod args;
use args::Args;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run(Args::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        // per-file failures were already summarized; exit clean so a cron
        // re-run can pick up where this one left off
        Ok(false) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            if matches!(e, SyncError::MissingCredential) {
                eprintln!("{}", CREDENTIAL_HELP);
            }
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(args: Args) -> Result<bool, SyncError> {
    // fail before touching the filesystem or network when no credential is set
    let credential = Credential::from_env()?;

    let config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load_from_dir(&args.target_dir)?,
    };

    let mut builder = SyncClientBuilder::default();
    if let Some(retry) = args.retry.or(config.max_retries) {
        builder.max_retries(retry);
    }
    if let Some(secs) = args.waitretry.or(config.wait_between_retries_secs) {
        builder.wait_between_retries(Duration::from_secs_f64(secs));
    }
    if let Some(user_agent) = args.user_agent.or(config.user_agent) {
        builder.user_agent(user_agent);
    }
    if let Some(proxy) = args.proxy.or(config.proxy) {
        let proxy = reqwest::Proxy::all(&proxy).map_err(|e| SyncError::CliError {
            message: format!("invalid proxy url {:?}: {}", proxy, e),
        })?;
        builder.proxy(Some(proxy));
    }
    if let Some(secs) = config.connect_timeout_secs {
        builder.connect_timeout(Some(Duration::from_secs_f64(secs)));
    }
    let client = builder.build().map_err(|e| SyncError::CliError {
        message: e.to_string(),
    })?;

    let manifest = Manifest::load(&args.urls, &args.checksums).await?;
    let session = client
        .sync(&manifest, &args.target_dir, &credential)
        .await?;

    Ok(session.all_valid())
}
