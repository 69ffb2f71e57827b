//! Session loop: accepts connections, runs the lobby/game state machine and
//! drives the turn clock

use crate::client_manager::{ClientManager, ConnectionId, Outgoing, Role};
use crate::config::ServerConfig;
use crate::game::{GameRules, GameState};
use crate::random::Random;
use log::{debug, error, info, warn};
use shared::{
    Action, ClientMessage, Encode, Event, MessageReader, PlayerId, PlayerInfo, ServerMessage,
    MAX_CLIENTS,
};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};

/// How long a peer may stall in the middle of a message before it is dropped.
pub const PARTIAL_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Live messages a connection may fall behind by, on top of a full replay.
pub const QUEUE_SLACK: usize = 64;

/// Outgoing queue length per connection: a late spectator is handed Hello,
/// GameStarted and every turn of the game at once, and must still have room
/// for the live traffic that follows.
pub fn outgoing_capacity(game_length: u16) -> usize {
    game_length as usize + 2 + QUEUE_SLACK
}

/// Messages sent from connection tasks to the session loop
#[derive(Debug)]
pub enum ConnectionEvent {
    Message {
        connection: ConnectionId,
        message: ClientMessage,
    },
    Closed {
        connection: ConnectionId,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lobby,
    Game,
}

pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    hello: Outgoing,
    clients: ClientManager,
    roster: Vec<PlayerInfo>,
    phase: Phase,
    game: GameState,
    rng: Random,
    history: Vec<Outgoing>,
    next_turn: Instant,

    // Communication channels
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    events_rx: mpsc::UnboundedReceiver<ConnectionEvent>,
}

impl Server {
    pub async fn new(addr: &str, config: ServerConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server '{}' listening on {}", config.server_name, listener.local_addr()?);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let hello = encode(&ServerMessage::Hello(config.hello()));

        Ok(Server {
            listener,
            hello,
            clients: ClientManager::new(MAX_CLIENTS),
            roster: Vec::new(),
            phase: Phase::Lobby,
            game: GameState::new(GameRules::from(&config)),
            rng: Random::new(config.seed),
            history: Vec::new(),
            next_turn: Instant::now(),
            config,
            events_tx,
            events_rx,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Main server loop. A due turn boundary is handled before new
    /// connections, and new connections before messages from existing ones.
    pub async fn run(&mut self) -> io::Result<()> {
        info!(
            "Waiting for {} players on a {}x{} board",
            self.config.players_count, self.config.size_x, self.config.size_y
        );

        loop {
            let in_game = self.phase == Phase::Game;
            let deadline = self.next_turn;

            tokio::select! {
                biased;

                _ = sleep_until(deadline), if in_game => {
                    self.play_turn();
                },

                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.accept_client(stream, addr),
                        Err(e) => warn!("Failed to accept connection: {}", e),
                    }
                },

                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event);
                },
            }
        }
    }

    fn accept_client(&mut self, stream: TcpStream, addr: SocketAddr) {
        if self.clients.is_full() {
            warn!("Rejecting {}: all {} slots are taken", addr, MAX_CLIENTS);
            return;
        }
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to disable Nagle's algorithm for {}: {}", addr, e);
        }

        let (read_half, write_half) = stream.into_split();
        let capacity = outgoing_capacity(self.config.game_length);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(capacity);
        let Some(connection) = self.clients.add_client(addr, outgoing_tx) else {
            return;
        };

        let writer = tokio::spawn(write_loop(
            connection,
            write_half,
            outgoing_rx,
            self.events_tx.clone(),
        ));
        let reader = tokio::spawn(read_loop(connection, read_half, self.events_tx.clone()));
        self.clients.attach_task(connection, writer);
        self.clients.attach_task(connection, reader);

        self.clients.send(connection, Arc::clone(&self.hello));
        match self.phase {
            Phase::Lobby => {
                for player in &self.roster {
                    let accepted = ServerMessage::AcceptedPlayer(player.clone());
                    self.clients.send(connection, encode(&accepted));
                }
            }
            Phase::Game => {
                let started = ServerMessage::GameStarted(self.roster.clone());
                self.clients.send(connection, encode(&started));
                for turn in &self.history {
                    self.clients.send(connection, Arc::clone(turn));
                }
                debug!(
                    "Replayed {} turns to connection {}",
                    self.history.len(),
                    connection
                );
            }
        }
    }

    fn handle_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Message {
                connection,
                message: ClientMessage::Join { name },
            } => self.handle_join(connection, name),
            ConnectionEvent::Message {
                connection,
                message,
            } => {
                if let Some(action) = message.action() {
                    self.handle_action(connection, action);
                }
            }
            ConnectionEvent::Closed { connection, reason } => {
                if let Some(client) = self.clients.remove_client(connection) {
                    info!(
                        "Connection {} from {} closed: {}",
                        connection, client.addr, reason
                    );
                }
            }
        }
    }

    fn handle_join(&mut self, connection: ConnectionId, name: String) {
        if self.phase == Phase::Game {
            debug!("Ignoring join from connection {} during a game", connection);
            return;
        }
        let Some(client) = self.clients.get(connection) else {
            return;
        };
        if let Role::Player(id) = client.role {
            debug!("Connection {} already joined as player {}", connection, id);
            return;
        }

        let id = self.roster.len() as PlayerId;
        let player = PlayerInfo {
            id,
            name,
            address: format_address(client.addr),
        };
        self.clients.set_role(connection, Role::Player(id));
        info!(
            "Player {} '{}' joined from {}",
            id, player.name, player.address
        );

        self.broadcast(&ServerMessage::AcceptedPlayer(player.clone()));
        self.roster.push(player);

        if self.roster.len() == self.config.players_count as usize {
            self.start_game();
        }
    }

    fn handle_action(&mut self, connection: ConnectionId, action: Action) {
        match (self.phase, self.clients.role(connection)) {
            (Phase::Game, Some(Role::Player(id))) => self.game.queue_action(id, action),
            _ => debug!("Discarding {:?} from connection {}", action, connection),
        }
    }

    fn start_game(&mut self) {
        info!("Starting game with {} players", self.roster.len());
        self.phase = Phase::Game;
        self.broadcast(&ServerMessage::GameStarted(self.roster.clone()));

        let events = self.game.start(&mut self.rng);
        self.record_turn(0, events);
        self.next_turn = Instant::now() + self.config.turn_duration;
    }

    fn play_turn(&mut self) {
        let events = self.game.advance_turn(&mut self.rng);
        let turn = self.game.turn();
        debug!("Turn {}: {} events", turn, events.len());
        self.record_turn(turn, events);

        if self.game.is_finished() {
            self.end_game();
        } else {
            self.next_turn = Instant::now() + self.config.turn_duration;
        }
    }

    fn record_turn(&mut self, turn: u16, events: Vec<Event>) {
        let bytes = encode(&ServerMessage::Turn { turn, events });
        self.clients.broadcast(&bytes);
        self.history.push(bytes);
    }

    fn end_game(&mut self) {
        let scores = self.game.scores();
        info!("Game ended, scores: {:?}", scores);
        self.broadcast(&ServerMessage::GameEnded(scores));

        self.phase = Phase::Lobby;
        self.roster.clear();
        self.history.clear();
        self.clients.make_all_spectators();
        self.game.reset();
    }

    fn broadcast(&mut self, message: &ServerMessage) {
        self.clients.broadcast(&encode(message));
    }
}

fn encode(message: &ServerMessage) -> Outgoing {
    Arc::from(message.to_bytes())
}

/// `ip:port`, with IPv4-mapped IPv6 peers shown as plain IPv4.
pub fn format_address(addr: SocketAddr) -> String {
    let ip = match addr.ip() {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(IpAddr::V6(v6), IpAddr::V4),
        v4 => v4,
    };
    SocketAddr::new(ip, addr.port()).to_string()
}

async fn read_loop(
    connection: ConnectionId,
    read_half: OwnedReadHalf,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) {
    let mut reader = MessageReader::new(read_half).with_partial_timeout(PARTIAL_READ_TIMEOUT);

    let reason = loop {
        match reader.read_message::<ClientMessage>().await {
            Ok(Some(message)) => {
                if events
                    .send(ConnectionEvent::Message {
                        connection,
                        message,
                    })
                    .is_err()
                {
                    return;
                }
            }
            Ok(None) => break "closed by peer".to_string(),
            Err(e) => {
                warn!("Dropping connection {}: {}", connection, e);
                break e.to_string();
            }
        }
    };

    let _ = events.send(ConnectionEvent::Closed { connection, reason });
}

async fn write_loop(
    connection: ConnectionId,
    mut write_half: OwnedWriteHalf,
    mut outgoing: mpsc::Receiver<Outgoing>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
) {
    while let Some(bytes) = outgoing.recv().await {
        if let Err(e) = write_half.write_all(&bytes).await {
            error!("Failed to write to connection {}: {}", connection, e);
            let _ = events.send(ConnectionEvent::Closed {
                connection,
                reason: e.to_string(),
            });
            return;
        }
    }

    let _ = write_half.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Decode, Hello};
    use std::net::{Ipv4Addr, Ipv6Addr};
    use tokio::io::AsyncReadExt;

    fn test_config(players_count: u8) -> ServerConfig {
        ServerConfig {
            server_name: "unit".to_string(),
            players_count,
            size_x: 4,
            size_y: 4,
            game_length: 3,
            explosion_radius: 1,
            bomb_timer: 2,
            turn_duration: Duration::from_millis(20),
            initial_blocks: 2,
            port: 0,
            seed: 1,
        }
    }

    async fn start_server(players_count: u8) -> SocketAddr {
        let mut server = Server::new("127.0.0.1:0", test_config(players_count))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move { server.run().await });
        addr
    }

    async fn read_one(stream: &mut TcpStream, buffer: &mut Vec<u8>) -> ServerMessage {
        loop {
            if let Some((message, used)) = ServerMessage::decode_prefix(buffer).unwrap() {
                buffer.drain(..used);
                return message;
            }
            let mut chunk = [0u8; 1024];
            let read = stream.read(&mut chunk).await.unwrap();
            assert!(read > 0, "server closed the connection");
            buffer.extend_from_slice(&chunk[..read]);
        }
    }

    #[test]
    fn test_format_address() {
        let v4 = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 2022);
        assert_eq!(format_address(v4), "10.0.0.1:2022");

        let v6 = SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), 80);
        assert_eq!(format_address(v6), "[::1]:80");

        let mapped = SocketAddr::new(
            IpAddr::V6(Ipv4Addr::new(127, 0, 0, 1).to_ipv6_mapped()),
            9,
        );
        assert_eq!(format_address(mapped), "127.0.0.1:9");
    }

    #[test]
    fn test_outgoing_capacity_holds_a_full_replay() {
        // Hello, GameStarted, turns 0..=game_length and GameEnded
        for game_length in [1, 100, u16::MAX] {
            assert!(outgoing_capacity(game_length) >= game_length as usize + 4);
        }
    }

    #[tokio::test]
    async fn test_new_connection_receives_hello() {
        let addr = start_server(2).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut buffer = Vec::new();

        assert_eq!(
            read_one(&mut stream, &mut buffer).await,
            ServerMessage::Hello(Hello {
                server_name: "unit".to_string(),
                players_count: 2,
                size_x: 4,
                size_y: 4,
                game_length: 3,
                explosion_radius: 1,
                bomb_timer: 2,
            })
        );
    }

    #[tokio::test]
    async fn test_single_player_game_runs_to_the_end() {
        let addr = start_server(1).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut buffer = Vec::new();
        read_one(&mut stream, &mut buffer).await;

        let join = ClientMessage::Join {
            name: "solo".to_string(),
        };
        stream.write_all(&join.to_bytes()).await.unwrap();

        match read_one(&mut stream, &mut buffer).await {
            ServerMessage::AcceptedPlayer(player) => {
                assert_eq!(player.id, 0);
                assert_eq!(player.name, "solo");
            }
            other => panic!("expected AcceptedPlayer, got {:?}", other),
        }
        assert!(matches!(
            read_one(&mut stream, &mut buffer).await,
            ServerMessage::GameStarted(players) if players.len() == 1
        ));

        for expected in 0..=3 {
            match read_one(&mut stream, &mut buffer).await {
                ServerMessage::Turn { turn, .. } => assert_eq!(turn, expected),
                other => panic!("expected turn {}, got {:?}", expected, other),
            }
        }
        assert!(matches!(
            read_one(&mut stream, &mut buffer).await,
            ServerMessage::GameEnded(scores) if scores.len() == 1
        ));
    }
}
