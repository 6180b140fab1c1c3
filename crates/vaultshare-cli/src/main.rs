//! Vaultshare - encrypted file vault client

use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vaultshare_cli::{CliConfig, Command, Runner};
use vaultshare_client::HttpBackend;

#[derive(Parser, Debug)]
#[command(name = "vaultshare")]
#[command(about = "Encrypt-before-upload file vault client")]
#[command(version)]
struct Args {
    /// API base URL
    #[arg(long, default_value = "http://localhost:8000/api/v1", env = "VAULTSHARE_ENDPOINT")]
    endpoint: String,

    /// Account name
    #[arg(short, long, env = "VAULTSHARE_USERNAME")]
    username: Option<String>,

    /// Account password
    #[arg(long, env = "VAULTSHARE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Current authenticator code
    #[arg(short, long, env = "VAULTSHARE_MFA_CODE", hide_env_values = true)]
    mfa_code: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30", env = "VAULTSHARE_TIMEOUT_SECS")]
    timeout_secs: u64,

    /// Enable debug logging
    #[arg(short, long, env = "VAULTSHARE_DEBUG")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("vaultshare_cli={0},vaultshare_client={0}", log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = CliConfig {
        endpoint: args.endpoint,
        username: args.username,
        password: args.password,
        mfa_code: args.mfa_code,
        timeout_secs: args.timeout_secs,
    };
    tracing::debug!(?config, "configuration");

    let backend = Arc::new(HttpBackend::new(&config.client_config())?);
    let runner = Runner::new(config, backend);

    let mut stdout = std::io::stdout().lock();
    runner.run(args.command, &mut stdout).await
}
