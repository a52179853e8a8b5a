use std::net::SocketAddr;

use tracing::info;

use towel_determinism::server::{DeterminismServer, DEFAULT_ADDR};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let addr: SocketAddr = std::env::var("TOWEL_MOCK_ADDR")
        .unwrap_or_else(|_| DEFAULT_ADDR.to_string())
        .parse()?;

    info!("Starting towel determinism service (clock and identifiers)");

    DeterminismServer::new().serve(addr).await?;
    Ok(())
}
