use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use gitea_plane_bridge::config::Config;
use tracing_subscriber::EnvFilter;

async fn run_server(config: Config) -> anyhow::Result<()> {
    let ctx = gitea_plane_bridge::context_from_config(&config)?;
    tracing::info!("starting with {config:?}");

    let app = gitea_plane_bridge::app(Arc::new(ctx));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_ansi(std::env::var_os("DISABLE_COLOR").is_none())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e:?}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_server(config).await {
        eprintln!("Failed to run server: {e:?}");
        std::process::exit(1);
    }
}
