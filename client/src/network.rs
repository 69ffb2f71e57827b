//! Relay loop between the server connection and the display sockets

use crate::config::ClientConfig;
use crate::display::{BombView, DisplayInput, DisplayMessage, GameView};
use crate::mirror::GameMirror;
use log::{debug, error, info, warn};
use shared::{
    ClientMessage, Decode, Encode, Hello, MessageReader, PlayerId, PlayerInfo, ReadError,
    ServerMessage,
};
use std::collections::BTreeMap;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};

/// Larger than any valid display input, so oversized datagrams are detected.
const DATAGRAM_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    Game,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("server sent {message} while in {phase:?}")]
    UnexpectedMessage {
        message: &'static str,
        phase: Phase,
    },
    #[error("expected Hello as the first message, got {0}")]
    MissingHello(&'static str),
    #[error("connection with the server lost")]
    ServerClosed,
    #[error("failed to read from the server: {0}")]
    Read(#[from] ReadError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

fn message_name(message: &ServerMessage) -> &'static str {
    match message {
        ServerMessage::Hello(_) => "Hello",
        ServerMessage::AcceptedPlayer(_) => "AcceptedPlayer",
        ServerMessage::GameStarted(_) => "GameStarted",
        ServerMessage::Turn { .. } => "Turn",
        ServerMessage::GameEnded(_) => "GameEnded",
    }
}

/// Protocol state of one relay, independent of any socket.
pub struct Client {
    hello: Hello,
    player_name: String,
    phase: Phase,
    players: BTreeMap<PlayerId, PlayerInfo>,
    mirror: GameMirror,
}

impl Client {
    pub fn new(hello: Hello, player_name: String) -> Self {
        let mirror = GameMirror::new(
            hello.size_x,
            hello.size_y,
            hello.explosion_radius,
            hello.bomb_timer,
        );
        Self {
            hello,
            player_name,
            phase: Phase::Lobby,
            players: BTreeMap::new(),
            mirror,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn players(&self) -> &BTreeMap<PlayerId, PlayerInfo> {
        &self.players
    }

    pub fn mirror(&self) -> &GameMirror {
        &self.mirror
    }

    /// Applies a server message and returns the snapshot to show, if any.
    pub fn handle_server_message(
        &mut self,
        message: ServerMessage,
    ) -> Result<Option<DisplayMessage>, ClientError> {
        match (self.phase, message) {
            (Phase::Lobby, ServerMessage::AcceptedPlayer(player)) => {
                info!("Player {} '{}' joined", player.id, player.name);
                self.players.insert(player.id, player);
                Ok(Some(self.lobby_view()))
            }
            (Phase::Lobby, ServerMessage::GameStarted(players)) => {
                info!("Game started with {} players", players.len());
                self.players = players
                    .into_iter()
                    .map(|player| (player.id, player))
                    .collect();
                self.mirror.start(self.players.keys().copied());
                self.phase = Phase::Game;
                Ok(None)
            }
            (Phase::Game, ServerMessage::Turn { turn, events }) => {
                debug!("Turn {}: {} events", turn, events.len());
                self.mirror.apply_turn(turn, &events);
                Ok(Some(self.game_view()))
            }
            (Phase::Game, ServerMessage::GameEnded(scores)) => {
                info!("Game ended, scores: {:?}", scores);
                self.players.clear();
                self.mirror.reset();
                self.phase = Phase::Lobby;
                Ok(Some(self.lobby_view()))
            }
            (phase, message) => Err(ClientError::UnexpectedMessage {
                message: message_name(&message),
                phase,
            }),
        }
    }

    /// Any input joins the game while in the lobby.
    pub fn handle_display_input(&self, input: DisplayInput) -> ClientMessage {
        match self.phase {
            Phase::Lobby => ClientMessage::Join {
                name: self.player_name.clone(),
            },
            Phase::Game => ClientMessage::from(input.action()),
        }
    }

    pub fn lobby_view(&self) -> DisplayMessage {
        DisplayMessage::Lobby {
            hello: self.hello.clone(),
            players: self.players.clone(),
        }
    }

    pub fn game_view(&self) -> DisplayMessage {
        let bombs = self
            .mirror
            .bombs()
            .values()
            .map(|bomb| BombView {
                position: bomb.position,
                timer: bomb.timer,
            })
            .collect();

        DisplayMessage::Game(GameView {
            server_name: self.hello.server_name.clone(),
            size_x: self.hello.size_x,
            size_y: self.hello.size_y,
            game_length: self.hello.game_length,
            turn: self.mirror.turn(),
            players: self.players.clone(),
            player_positions: self.mirror.positions().clone(),
            blocks: self.mirror.board().blocked_tiles(),
            bombs,
            explosions: self.mirror.explosions().iter().copied().collect(),
            scores: self.mirror.scores().clone(),
        })
    }
}

/// Binds the display input port, preferring a dual-stack socket.
async fn bind_input(port: u16) -> io::Result<UdpSocket> {
    match UdpSocket::bind((Ipv6Addr::UNSPECIFIED, port)).await {
        Ok(socket) => Ok(socket),
        Err(e) => {
            debug!("IPv6 bind failed ({}), falling back to IPv4", e);
            UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)).await
        }
    }
}

async fn bind_output(target: SocketAddr) -> io::Result<UdpSocket> {
    match target {
        SocketAddr::V4(_) => UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await,
        SocketAddr::V6(_) => UdpSocket::bind((Ipv6Addr::UNSPECIFIED, 0)).await,
    }
}

async fn send_to_display(socket: &UdpSocket, target: SocketAddr, message: &DisplayMessage) {
    if let Err(e) = socket.send_to(&message.to_bytes(), target).await {
        warn!("Failed to send snapshot to display at {}: {}", target, e);
    }
}

/// Runs the relay until the server connection ends or misbehaves.
pub async fn run(config: ClientConfig) -> Result<(), ClientError> {
    info!("Connecting to server at {}", config.server_address);
    let stream = TcpStream::connect(config.server_address).await?;
    stream.set_nodelay(true)?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = MessageReader::new(read_half);

    let hello = match reader.read_message::<ServerMessage>().await? {
        Some(ServerMessage::Hello(hello)) => hello,
        Some(other) => return Err(ClientError::MissingHello(message_name(&other))),
        None => return Err(ClientError::ServerClosed),
    };
    info!(
        "Connected to '{}': {}x{} board, {} players, {} turns",
        hello.server_name, hello.size_x, hello.size_y, hello.players_count, hello.game_length
    );

    let display_in = bind_input(config.port).await?;
    let display_out = bind_output(config.gui_address).await?;
    info!(
        "Listening for display input on {}, sending to {}",
        display_in.local_addr()?,
        config.gui_address
    );

    let mut client = Client::new(hello, config.player_name);
    send_to_display(&display_out, config.gui_address, &client.lobby_view()).await;

    let mut datagram = [0u8; DATAGRAM_BUFFER];

    loop {
        tokio::select! {
            received = display_in.recv_from(&mut datagram) => {
                let (len, from) = match received {
                    Ok(received) => received,
                    Err(e) => {
                        warn!("Failed to receive display input: {}", e);
                        continue;
                    }
                };

                match DisplayInput::from_bytes(&datagram[..len]) {
                    Ok(input) => {
                        let message = client.handle_display_input(input);
                        write_half.write_all(&message.to_bytes()).await?;
                    }
                    Err(e) => warn!("Dropping malformed display input from {}: {}", from, e),
                }
            },

            message = reader.read_message::<ServerMessage>() => {
                let message = match message {
                    Ok(Some(message)) => message,
                    Ok(None) => return Err(ClientError::ServerClosed),
                    Err(e) => {
                        error!("Server stream broken: {}", e);
                        return Err(e.into());
                    }
                };

                if let Some(view) = client.handle_server_message(message)? {
                    send_to_display(&display_out, config.gui_address, &view).await;
                }
            },
        }
    }
}
