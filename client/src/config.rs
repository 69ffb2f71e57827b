//! Command-line arguments and resolved client configuration

use clap::Parser;
use shared::MAX_STRING_LEN;
use std::io;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::lookup_host;

#[derive(Parser, Debug)]
#[command(author, version, about = "Relay between a robots server and a display", long_about = None)]
pub struct ClientArgs {
    /// Display address as host:port
    #[arg(short = 'd', long)]
    pub gui_address: String,

    /// Server address as host:port
    #[arg(short = 's', long)]
    pub server_address: String,

    /// Name sent when joining a game
    #[arg(short = 'n', long)]
    pub player_name: String,

    /// UDP port on which display input is received
    #[arg(short = 'p', long)]
    pub port: u16,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("player name is {0} bytes long, at most 255 are allowed")]
    NameTooLong(usize),
    #[error("'{0}' is not of the form host:port")]
    InvalidAddress(String),
    #[error("could not resolve '{address}': {source}")]
    Resolve {
        address: String,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub gui_address: SocketAddr,
    pub server_address: SocketAddr,
    pub player_name: String,
    pub port: u16,
}

impl ClientConfig {
    pub async fn resolve(args: ClientArgs) -> Result<Self, ConfigError> {
        if args.player_name.len() > MAX_STRING_LEN {
            return Err(ConfigError::NameTooLong(args.player_name.len()));
        }

        Ok(Self {
            gui_address: resolve_address(&args.gui_address).await?,
            server_address: resolve_address(&args.server_address).await?,
            player_name: args.player_name,
            port: args.port,
        })
    }
}

/// Splits `address` on its last colon and resolves the host part.
///
/// Accepts IPv4 literals, bracketed or bare IPv6 literals and host names.
pub fn split_address(address: &str) -> Result<(&str, u16), ConfigError> {
    let invalid = || ConfigError::InvalidAddress(address.to_string());

    let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
    let port = port.parse::<u16>().map_err(|_| invalid())?;
    let host = host
        .strip_prefix('[')
        .and_then(|inner| inner.strip_suffix(']'))
        .unwrap_or(host);

    if host.is_empty() {
        return Err(invalid());
    }
    Ok((host, port))
}

pub async fn resolve_address(address: &str) -> Result<SocketAddr, ConfigError> {
    let (host, port) = split_address(address)?;
    let resolve_error = |source| ConfigError::Resolve {
        address: address.to_string(),
        source,
    };

    lookup_host((host, port))
        .await
        .map_err(resolve_error)?
        .next()
        .ok_or_else(|| {
            resolve_error(io::Error::new(
                io::ErrorKind::NotFound,
                "no addresses returned",
            ))
        })
}
