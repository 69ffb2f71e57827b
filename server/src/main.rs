use clap::Parser;
use log::{info, warn};
use server::config::{ServerArgs, ServerConfig};
use server::network::Server;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = ServerArgs::parse();
    let config = ServerConfig::try_from(args)?;
    info!("Using seed {}", config.seed);

    let port = config.port;
    let mut server = match Server::new(&format!("[::]:{}", port), config.clone()).await {
        Ok(server) => server,
        Err(e) => {
            warn!("IPv6 listener unavailable ({}), falling back to IPv4", e);
            Server::new(&format!("0.0.0.0:{}", port), config).await?
        }
    };

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
    }

    Ok(())
}
