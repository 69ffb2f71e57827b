//! Binary wire codec for the client/server protocol
//!
//! Every message starts with a one-byte type tag. Multi-byte integers are
//! big-endian, text is a one-byte length followed by that many bytes, and
//! sequences are a four-byte count followed by their elements in order.
//! Nothing in here performs I/O; see [`crate::frame`] for stream reading.

use crate::{Action, BombId, Direction, PlayerId, Position, Score, MAX_STRING_LEN};
use std::collections::BTreeMap;
use thiserror::Error;

pub const HELLO: u8 = 0;
pub const ACCEPTED_PLAYER: u8 = 1;
pub const GAME_STARTED: u8 = 2;
pub const TURN: u8 = 3;
pub const GAME_ENDED: u8 = 4;

pub const JOIN: u8 = 0;
pub const PLACE_BOMB: u8 = 1;
pub const PLACE_BLOCK: u8 = 2;
pub const MOVE: u8 = 3;

pub const BOMB_PLACED: u8 = 0;
pub const BOMB_EXPLODED: u8 = 1;
pub const PLAYER_MOVED: u8 = 2;
pub const BLOCK_PLACED: u8 = 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("message ended unexpectedly")]
    UnexpectedEnd,
    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),
    #[error("unknown message type {0}")]
    UnknownMessage(u8),
    #[error("unknown event type {0}")]
    UnknownEvent(u8),
    #[error("invalid direction {0}")]
    InvalidDirection(u8),
}

/// Cursor over a borrowed byte slice.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn consumed(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::UnexpectedEnd);
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Text fields are opaque bytes on the wire; invalid UTF-8 is replaced
    /// rather than rejected.
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u8()? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn read_position(&mut self) -> Result<Position, DecodeError> {
        let x = self.read_u16()?;
        let y = self.read_u16()?;
        Ok(Position::new(x, y))
    }

    pub fn read_direction(&mut self) -> Result<Direction, DecodeError> {
        let raw = self.read_u8()?;
        Direction::from_u8(raw).ok_or(DecodeError::InvalidDirection(raw))
    }

    /// Reads a u32 count followed by that many elements.
    pub fn read_list<T>(
        &mut self,
        mut element: impl FnMut(&mut Self) -> Result<T, DecodeError>,
    ) -> Result<Vec<T>, DecodeError> {
        let count = self.read_u32()? as usize;
        // every element takes at least one byte
        if count > self.remaining() {
            return Err(DecodeError::UnexpectedEnd);
        }
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(element(self)?);
        }
        Ok(items)
    }
}

/// Big-endian primitive writers for outgoing buffers.
pub trait WireWrite {
    fn put_u8(&mut self, value: u8);
    fn put_u16(&mut self, value: u16);
    fn put_u32(&mut self, value: u32);
    fn put_string(&mut self, value: &str);
    fn put_position(&mut self, pos: Position);
    fn put_len(&mut self, len: usize);
}

impl WireWrite for Vec<u8> {
    fn put_u8(&mut self, value: u8) {
        self.push(value);
    }

    fn put_u16(&mut self, value: u16) {
        self.extend_from_slice(&value.to_be_bytes());
    }

    fn put_u32(&mut self, value: u32) {
        self.extend_from_slice(&value.to_be_bytes());
    }

    fn put_string(&mut self, value: &str) {
        let text = truncate_str(value, MAX_STRING_LEN);
        self.push(text.len() as u8);
        self.extend_from_slice(text.as_bytes());
    }

    fn put_position(&mut self, pos: Position) {
        self.put_u16(pos.x);
        self.put_u16(pos.y);
    }

    fn put_len(&mut self, len: usize) {
        self.put_u32(len as u32);
    }
}

/// Longest prefix of `value` that fits in `max` bytes on a char boundary.
pub fn truncate_str(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

pub trait Encode {
    fn encode(&self, out: &mut Vec<u8>);

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }
}

pub trait Decode: Sized {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError>;

    /// Decodes a buffer holding exactly one message.
    fn from_bytes(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(buf);
        let value = Self::decode(&mut reader)?;
        match reader.remaining() {
            0 => Ok(value),
            extra => Err(DecodeError::TrailingBytes(extra)),
        }
    }

    /// Decodes one message from the front of `buf`, returning it with the
    /// number of bytes it took. `Ok(None)` means more bytes are needed.
    fn decode_prefix(buf: &[u8]) -> Result<Option<(Self, usize)>, DecodeError> {
        let mut reader = Reader::new(buf);
        match Self::decode(&mut reader) {
            Ok(value) => Ok(Some((value, reader.consumed()))),
            Err(DecodeError::UnexpectedEnd) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Server configuration announced to every new connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hello {
    pub server_name: String,
    pub players_count: u8,
    pub size_x: u16,
    pub size_y: u16,
    pub game_length: u16,
    pub explosion_radius: u16,
    pub bomb_timer: u16,
}

impl Encode for Hello {
    fn encode(&self, out: &mut Vec<u8>) {
        out.put_string(&self.server_name);
        out.put_u8(self.players_count);
        out.put_u16(self.size_x);
        out.put_u16(self.size_y);
        out.put_u16(self.game_length);
        out.put_u16(self.explosion_radius);
        out.put_u16(self.bomb_timer);
    }
}

impl Decode for Hello {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(Hello {
            server_name: reader.read_string()?,
            players_count: reader.read_u8()?,
            size_x: reader.read_u16()?,
            size_y: reader.read_u16()?,
            game_length: reader.read_u16()?,
            explosion_radius: reader.read_u16()?,
            bomb_timer: reader.read_u16()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerInfo {
    pub id: PlayerId,
    pub name: String,
    pub address: String,
}

impl Encode for PlayerInfo {
    fn encode(&self, out: &mut Vec<u8>) {
        out.put_u8(self.id);
        out.put_string(&self.name);
        out.put_string(&self.address);
    }
}

impl Decode for PlayerInfo {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        Ok(PlayerInfo {
            id: reader.read_u8()?,
            name: reader.read_string()?,
            address: reader.read_string()?,
        })
    }
}

/// One atomic fact about what changed during a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    BombPlaced {
        id: BombId,
        position: Position,
    },
    BombExploded {
        id: BombId,
        robots_destroyed: Vec<PlayerId>,
        blocks_destroyed: Vec<Position>,
    },
    PlayerMoved {
        id: PlayerId,
        position: Position,
    },
    BlockPlaced {
        position: Position,
    },
}

impl Encode for Event {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Event::BombPlaced { id, position } => {
                out.put_u8(BOMB_PLACED);
                out.put_u32(*id);
                out.put_position(*position);
            }
            Event::BombExploded {
                id,
                robots_destroyed,
                blocks_destroyed,
            } => {
                out.put_u8(BOMB_EXPLODED);
                out.put_u32(*id);
                out.put_len(robots_destroyed.len());
                robots_destroyed.iter().for_each(|robot| out.put_u8(*robot));
                out.put_len(blocks_destroyed.len());
                blocks_destroyed.iter().for_each(|pos| out.put_position(*pos));
            }
            Event::PlayerMoved { id, position } => {
                out.put_u8(PLAYER_MOVED);
                out.put_u8(*id);
                out.put_position(*position);
            }
            Event::BlockPlaced { position } => {
                out.put_u8(BLOCK_PLACED);
                out.put_position(*position);
            }
        }
    }
}

impl Decode for Event {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        match reader.read_u8()? {
            BOMB_PLACED => Ok(Event::BombPlaced {
                id: reader.read_u32()?,
                position: reader.read_position()?,
            }),
            BOMB_EXPLODED => Ok(Event::BombExploded {
                id: reader.read_u32()?,
                robots_destroyed: reader.read_list(Reader::read_u8)?,
                blocks_destroyed: reader.read_list(Reader::read_position)?,
            }),
            PLAYER_MOVED => Ok(Event::PlayerMoved {
                id: reader.read_u8()?,
                position: reader.read_position()?,
            }),
            BLOCK_PLACED => Ok(Event::BlockPlaced {
                position: reader.read_position()?,
            }),
            other => Err(DecodeError::UnknownEvent(other)),
        }
    }
}

/// Messages sent from the server to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Hello(Hello),
    AcceptedPlayer(PlayerInfo),
    GameStarted(Vec<PlayerInfo>),
    Turn { turn: u16, events: Vec<Event> },
    GameEnded(BTreeMap<PlayerId, Score>),
}

impl Encode for ServerMessage {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            ServerMessage::Hello(hello) => {
                out.put_u8(HELLO);
                hello.encode(out);
            }
            ServerMessage::AcceptedPlayer(player) => {
                out.put_u8(ACCEPTED_PLAYER);
                player.encode(out);
            }
            ServerMessage::GameStarted(players) => {
                out.put_u8(GAME_STARTED);
                out.put_len(players.len());
                players.iter().for_each(|player| player.encode(out));
            }
            ServerMessage::Turn { turn, events } => {
                out.put_u8(TURN);
                out.put_u16(*turn);
                out.put_len(events.len());
                events.iter().for_each(|event| event.encode(out));
            }
            ServerMessage::GameEnded(scores) => {
                out.put_u8(GAME_ENDED);
                out.put_len(scores.len());
                for (id, score) in scores {
                    out.put_u8(*id);
                    out.put_u32(*score);
                }
            }
        }
    }
}

impl Decode for ServerMessage {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        match reader.read_u8()? {
            HELLO => Ok(ServerMessage::Hello(Hello::decode(reader)?)),
            ACCEPTED_PLAYER => Ok(ServerMessage::AcceptedPlayer(PlayerInfo::decode(reader)?)),
            GAME_STARTED => Ok(ServerMessage::GameStarted(
                reader.read_list(PlayerInfo::decode)?,
            )),
            TURN => Ok(ServerMessage::Turn {
                turn: reader.read_u16()?,
                events: reader.read_list(Event::decode)?,
            }),
            GAME_ENDED => {
                let entries = reader.read_list(|r| Ok((r.read_u8()?, r.read_u32()?)))?;
                Ok(ServerMessage::GameEnded(entries.into_iter().collect()))
            }
            other => Err(DecodeError::UnknownMessage(other)),
        }
    }
}

/// Messages sent from clients to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Join { name: String },
    PlaceBomb,
    PlaceBlock,
    Move(Direction),
}

impl ClientMessage {
    /// The game action carried by this message, if any.
    pub fn action(&self) -> Option<Action> {
        match self {
            ClientMessage::Join { .. } => None,
            ClientMessage::PlaceBomb => Some(Action::PlaceBomb),
            ClientMessage::PlaceBlock => Some(Action::PlaceBlock),
            ClientMessage::Move(direction) => Some(Action::Move(*direction)),
        }
    }
}

impl From<Action> for ClientMessage {
    fn from(action: Action) -> Self {
        match action {
            Action::PlaceBomb => ClientMessage::PlaceBomb,
            Action::PlaceBlock => ClientMessage::PlaceBlock,
            Action::Move(direction) => ClientMessage::Move(direction),
        }
    }
}

impl Encode for ClientMessage {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            ClientMessage::Join { name } => {
                out.put_u8(JOIN);
                out.put_string(name);
            }
            ClientMessage::PlaceBomb => out.put_u8(PLACE_BOMB),
            ClientMessage::PlaceBlock => out.put_u8(PLACE_BLOCK),
            ClientMessage::Move(direction) => {
                out.put_u8(MOVE);
                out.put_u8(direction.as_u8());
            }
        }
    }
}

impl Decode for ClientMessage {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        match reader.read_u8()? {
            JOIN => Ok(ClientMessage::Join {
                name: reader.read_string()?,
            }),
            PLACE_BOMB => Ok(ClientMessage::PlaceBomb),
            PLACE_BLOCK => Ok(ClientMessage::PlaceBlock),
            MOVE => Ok(ClientMessage::Move(reader.read_direction()?)),
            other => Err(DecodeError::UnknownMessage(other)),
        }
    }
}
