//! Command-line arguments and validated server configuration

use clap::Parser;
use shared::{Hello, MAX_CLIENTS, MAX_STRING_LEN};
use std::time::Duration;
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(author, version, about = "Authoritative robots arena server", long_about = None)]
pub struct ServerArgs {
    /// Number of turns it takes for a bomb to explode
    #[arg(short = 'b', long)]
    pub bomb_timer: u16,

    /// Number of players needed for a game to start
    #[arg(short = 'c', long)]
    pub players_count: u8,

    /// Length of a turn in milliseconds
    #[arg(short = 'd', long)]
    pub turn_duration: u64,

    /// Number of tiles an explosion can reach along one axis
    #[arg(short = 'e', long)]
    pub explosion_radius: u16,

    /// Number of blocks drawn at the start of a game
    #[arg(short = 'k', long)]
    pub initial_blocks: u16,

    /// Number of turns in a game
    #[arg(short = 'l', long)]
    pub game_length: u16,

    /// Name announced to connecting clients
    #[arg(short = 'n', long)]
    pub server_name: String,

    /// TCP port for client connections
    #[arg(short = 'p', long)]
    pub port: u16,

    /// Seed for the random generator
    #[arg(short = 's', long)]
    pub seed: Option<u32>,

    /// Width of the board
    #[arg(short = 'x', long)]
    pub size_x: u16,

    /// Height of the board
    #[arg(short = 'y', long)]
    pub size_y: u16,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("players count must be between 1 and {max}, got {got}")]
    PlayersCount { got: u8, max: usize },
    #[error("board dimensions must be positive, got {0}x{1}")]
    EmptyBoard(u16, u16),
    #[error("{0} must be positive")]
    NotPositive(&'static str),
    #[error("server name is {0} bytes long, at most 255 are allowed")]
    NameTooLong(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub server_name: String,
    pub players_count: u8,
    pub size_x: u16,
    pub size_y: u16,
    pub game_length: u16,
    pub explosion_radius: u16,
    pub bomb_timer: u16,
    pub turn_duration: Duration,
    pub initial_blocks: u16,
    pub port: u16,
    pub seed: u32,
}

impl ServerConfig {
    /// The configuration message every new connection receives first.
    pub fn hello(&self) -> Hello {
        Hello {
            server_name: self.server_name.clone(),
            players_count: self.players_count,
            size_x: self.size_x,
            size_y: self.size_y,
            game_length: self.game_length,
            explosion_radius: self.explosion_radius,
            bomb_timer: self.bomb_timer,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.players_count == 0 || self.players_count as usize > MAX_CLIENTS {
            return Err(ConfigError::PlayersCount {
                got: self.players_count,
                max: MAX_CLIENTS,
            });
        }
        if self.size_x == 0 || self.size_y == 0 {
            return Err(ConfigError::EmptyBoard(self.size_x, self.size_y));
        }
        if self.game_length == 0 {
            return Err(ConfigError::NotPositive("game length"));
        }
        if self.bomb_timer == 0 {
            return Err(ConfigError::NotPositive("bomb timer"));
        }
        if self.turn_duration.is_zero() {
            return Err(ConfigError::NotPositive("turn duration"));
        }
        if self.server_name.len() > MAX_STRING_LEN {
            return Err(ConfigError::NameTooLong(self.server_name.len()));
        }
        Ok(())
    }
}

impl TryFrom<ServerArgs> for ServerConfig {
    type Error = ConfigError;

    fn try_from(args: ServerArgs) -> Result<Self, Self::Error> {
        let config = ServerConfig {
            server_name: args.server_name,
            players_count: args.players_count,
            size_x: args.size_x,
            size_y: args.size_y,
            game_length: args.game_length,
            explosion_radius: args.explosion_radius,
            bomb_timer: args.bomb_timer,
            turn_duration: Duration::from_millis(args.turn_duration),
            initial_blocks: args.initial_blocks,
            port: args.port,
            seed: args.seed.unwrap_or_else(rand::random),
        };
        config.validate()?;
        Ok(config)
    }
}
