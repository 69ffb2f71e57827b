//! Datagram protocol spoken with the display program
//!
//! Inputs arrive one per datagram and must match a known shape exactly;
//! anything else is dropped by the caller. Outputs are full-state snapshots,
//! never deltas, so a lost datagram only delays the picture by one turn.

use shared::codec::{Reader, WireWrite};
use shared::{
    Action, Decode, DecodeError, Direction, Encode, Hello, PlayerId, PlayerInfo, Position, Score,
};
use std::collections::BTreeMap;

pub const INPUT_PLACE_BOMB: u8 = 0;
pub const INPUT_PLACE_BLOCK: u8 = 1;
pub const INPUT_MOVE: u8 = 2;

pub const LOBBY: u8 = 0;
pub const GAME: u8 = 1;

/// A command typed into the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayInput {
    PlaceBomb,
    PlaceBlock,
    Move(Direction),
}

impl DisplayInput {
    pub fn action(self) -> Action {
        match self {
            DisplayInput::PlaceBomb => Action::PlaceBomb,
            DisplayInput::PlaceBlock => Action::PlaceBlock,
            DisplayInput::Move(direction) => Action::Move(direction),
        }
    }
}

impl Encode for DisplayInput {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            DisplayInput::PlaceBomb => out.put_u8(INPUT_PLACE_BOMB),
            DisplayInput::PlaceBlock => out.put_u8(INPUT_PLACE_BLOCK),
            DisplayInput::Move(direction) => {
                out.put_u8(INPUT_MOVE);
                out.put_u8(direction.as_u8());
            }
        }
    }
}

impl Decode for DisplayInput {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        match reader.read_u8()? {
            INPUT_PLACE_BOMB => Ok(DisplayInput::PlaceBomb),
            INPUT_PLACE_BLOCK => Ok(DisplayInput::PlaceBlock),
            INPUT_MOVE => Ok(DisplayInput::Move(reader.read_direction()?)),
            other => Err(DecodeError::UnknownMessage(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BombView {
    pub position: Position,
    pub timer: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameView {
    pub server_name: String,
    pub size_x: u16,
    pub size_y: u16,
    pub game_length: u16,
    pub turn: u16,
    pub players: BTreeMap<PlayerId, PlayerInfo>,
    pub player_positions: BTreeMap<PlayerId, Position>,
    pub blocks: Vec<Position>,
    pub bombs: Vec<BombView>,
    pub explosions: Vec<Position>,
    pub scores: BTreeMap<PlayerId, Score>,
}

/// Snapshots sent to the display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayMessage {
    Lobby {
        hello: Hello,
        players: BTreeMap<PlayerId, PlayerInfo>,
    },
    Game(GameView),
}

fn put_players(out: &mut Vec<u8>, players: &BTreeMap<PlayerId, PlayerInfo>) {
    out.put_len(players.len());
    // the map key is the id that starts every encoded player
    players.values().for_each(|player| player.encode(out));
}

fn read_players(reader: &mut Reader<'_>) -> Result<BTreeMap<PlayerId, PlayerInfo>, DecodeError> {
    let players = reader.read_list(PlayerInfo::decode)?;
    Ok(players.into_iter().map(|player| (player.id, player)).collect())
}

impl Encode for DisplayMessage {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            DisplayMessage::Lobby { hello, players } => {
                out.put_u8(LOBBY);
                hello.encode(out);
                put_players(out, players);
            }
            DisplayMessage::Game(view) => {
                out.put_u8(GAME);
                out.put_string(&view.server_name);
                out.put_u16(view.size_x);
                out.put_u16(view.size_y);
                out.put_u16(view.game_length);
                out.put_u16(view.turn);
                put_players(out, &view.players);

                out.put_len(view.player_positions.len());
                for (id, position) in &view.player_positions {
                    out.put_u8(*id);
                    out.put_position(*position);
                }

                out.put_len(view.blocks.len());
                view.blocks.iter().for_each(|pos| out.put_position(*pos));

                out.put_len(view.bombs.len());
                for bomb in &view.bombs {
                    out.put_position(bomb.position);
                    out.put_u16(bomb.timer);
                }

                out.put_len(view.explosions.len());
                view.explosions.iter().for_each(|pos| out.put_position(*pos));

                out.put_len(view.scores.len());
                for (id, score) in &view.scores {
                    out.put_u8(*id);
                    out.put_u32(*score);
                }
            }
        }
    }
}

impl Decode for DisplayMessage {
    fn decode(reader: &mut Reader<'_>) -> Result<Self, DecodeError> {
        match reader.read_u8()? {
            LOBBY => Ok(DisplayMessage::Lobby {
                hello: Hello::decode(reader)?,
                players: read_players(reader)?,
            }),
            GAME => {
                let server_name = reader.read_string()?;
                let size_x = reader.read_u16()?;
                let size_y = reader.read_u16()?;
                let game_length = reader.read_u16()?;
                let turn = reader.read_u16()?;
                let players = read_players(reader)?;
                let player_positions = reader
                    .read_list(|r| Ok((r.read_u8()?, r.read_position()?)))?
                    .into_iter()
                    .collect();
                let blocks = reader.read_list(Reader::read_position)?;
                let bombs = reader.read_list(|r| {
                    Ok(BombView {
                        position: r.read_position()?,
                        timer: r.read_u16()?,
                    })
                })?;
                let explosions = reader.read_list(Reader::read_position)?;
                let scores = reader
                    .read_list(|r| Ok((r.read_u8()?, r.read_u32()?)))?
                    .into_iter()
                    .collect();

                Ok(DisplayMessage::Game(GameView {
                    server_name,
                    size_x,
                    size_y,
                    game_length,
                    turn,
                    players,
                    player_positions,
                    blocks,
                    bombs,
                    explosions,
                    scores,
                }))
            }
            other => Err(DecodeError::UnknownMessage(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hello() -> Hello {
        Hello {
            server_name: "srv".to_string(),
            players_count: 2,
            size_x: 3,
            size_y: 4,
            game_length: 5,
            explosion_radius: 6,
            bomb_timer: 7,
        }
    }

    fn player(id: PlayerId) -> PlayerInfo {
        PlayerInfo {
            id,
            name: "a".to_string(),
            address: "b".to_string(),
        }
    }

    #[test]
    fn test_input_shapes() {
        assert_eq!(DisplayInput::from_bytes(&[0]), Ok(DisplayInput::PlaceBomb));
        assert_eq!(DisplayInput::from_bytes(&[1]), Ok(DisplayInput::PlaceBlock));
        assert_eq!(
            DisplayInput::from_bytes(&[2, 3]),
            Ok(DisplayInput::Move(Direction::Left))
        );
    }

    #[test]
    fn test_malformed_inputs_rejected() {
        assert!(DisplayInput::from_bytes(&[]).is_err());
        assert!(DisplayInput::from_bytes(&[0, 0]).is_err());
        assert!(DisplayInput::from_bytes(&[1, 9]).is_err());
        assert!(DisplayInput::from_bytes(&[2]).is_err());
        assert!(DisplayInput::from_bytes(&[2, 4]).is_err());
        assert!(DisplayInput::from_bytes(&[2, 1, 0]).is_err());
        assert!(DisplayInput::from_bytes(&[3]).is_err());
    }

    #[test]
    fn test_input_actions() {
        assert_eq!(DisplayInput::PlaceBomb.action(), Action::PlaceBomb);
        assert_eq!(DisplayInput::PlaceBlock.action(), Action::PlaceBlock);
        assert_eq!(
            DisplayInput::Move(Direction::Down).action(),
            Action::Move(Direction::Down)
        );
    }

    #[test]
    fn test_lobby_layout() {
        let message = DisplayMessage::Lobby {
            hello: hello(),
            players: BTreeMap::from([(1, player(1))]),
        };
        let bytes = message.to_bytes();
        assert_eq!(
            bytes,
            vec![
                LOBBY, 3, b's', b'r', b'v', 2, 0, 3, 0, 4, 0, 5, 0, 6, 0, 7, // hello
                0, 0, 0, 1, 1, 1, b'a', 1, b'b', // players
            ]
        );
        assert_eq!(DisplayMessage::from_bytes(&bytes), Ok(message));
    }

    #[test]
    fn test_game_layout() {
        let message = DisplayMessage::Game(GameView {
            server_name: "s".to_string(),
            size_x: 2,
            size_y: 3,
            game_length: 4,
            turn: 1,
            players: BTreeMap::from([(0, player(0))]),
            player_positions: BTreeMap::from([(0, Position::new(1, 2))]),
            blocks: vec![Position::new(0, 1)],
            bombs: vec![BombView {
                position: Position::new(1, 1),
                timer: 2,
            }],
            explosions: vec![],
            scores: BTreeMap::from([(0, 9)]),
        });
        let bytes = message.to_bytes();
        assert_eq!(
            bytes,
            vec![
                GAME, 1, b's', 0, 2, 0, 3, 0, 4, 0, 1, // header
                0, 0, 0, 1, 0, 1, b'a', 1, b'b', // players
                0, 0, 0, 1, 0, 0, 1, 0, 2, // positions
                0, 0, 0, 1, 0, 0, 0, 1, // blocks
                0, 0, 0, 1, 0, 1, 0, 1, 0, 2, // bombs
                0, 0, 0, 0, // explosions
                0, 0, 0, 1, 0, 0, 0, 0, 9, // scores
            ]
        );
        assert_eq!(DisplayMessage::from_bytes(&bytes), Ok(message));
    }
}
