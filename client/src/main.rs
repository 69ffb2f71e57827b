use clap::Parser;
use client::config::{ClientArgs, ClientConfig};
use client::network;
use log::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = ClientArgs::parse();
    let config = ClientConfig::resolve(args).await?;

    info!("Starting client as '{}'", config.player_name);
    info!("Display at {}, input port {}", config.gui_address, config.port);

    network::run(config).await?;

    Ok(())
}
