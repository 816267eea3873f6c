//! Hub server binary
//!
//! Binds the WebSocket broadcast hub on the port given by the `PORT`
//! environment variable (default 8080) and runs until Ctrl+C.

use std::net::{Ipv4Addr, SocketAddr};

use wshub_rs::{Hub, HubConfig, HubServer, ServerConfig};

fn listen_addr() -> Result<SocketAddr, Box<dyn std::error::Error>> {
    let port = match std::env::var("PORT") {
        Ok(raw) => raw
            .parse::<u16>()
            .map_err(|_| format!("invalid PORT: {}", raw))?,
        Err(_) => 8080,
    };
    Ok(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("wshub_rs=info".parse()?),
        )
        .init();

    let addr = listen_addr()?;

    let (hub, handle) = Hub::new(HubConfig::default());
    let hub_task = tokio::spawn(hub.run());

    let server = HubServer::bind(ServerConfig::with_addr(addr), handle).await?;

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    let stats = server.hub().stats();
    tracing::info!(
        messages = stats.messages_dispatched(),
        connections = stats.total_connections(),
        "Shutdown complete"
    );
    hub_task.abort();

    Ok(())
}
