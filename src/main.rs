use anyhow::Context;
use clap::Parser; // for cli
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use token_gate::config::Args;
use token_gate::discord::DiscordValidator;
use token_gate::rate_limit::AdmissionController;
use token_gate::state::AppState;

// this is main async function with tokio
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("token_gate=info,tower_http=info")),
        )
        .with_target(false)
        .init();

    // parse cli arguments
    let args = Args::parse();
    let policy = args.policy().context("invalid rate limit settings")?;
    let api = args.api().context("invalid api settings")?;

    let validator = Arc::new(DiscordValidator::new(reqwest::Client::new(), &args.discord_api));
    let state = AppState::new(AdmissionController::new(policy), validator, api);

    let app = token_gate::app_with_static(state, &args.static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("Server running at http://localhost:{}", args.port);
    info!("Token info endpoint at {}", args.api_path);
    info!(
        "Rate limiting: {} seconds between requests",
        args.request_interval
    );
    info!(
        "Ban duration: {} minutes after {} violations",
        args.ban_duration, args.max_violations
    );

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("server error")?;
    Ok(())
}
