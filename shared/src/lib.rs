pub mod board;
pub mod codec;
pub mod frame;

pub use board::Board;
pub use codec::{
    ClientMessage, Decode, DecodeError, Encode, Event, Hello, PlayerInfo, ServerMessage,
};
pub use frame::{MessageReader, ReadError};

/// Upper bound on simultaneously connected peers, listener excluded.
pub const MAX_CLIENTS: usize = 25;

/// Longest text field the protocol can carry (one length byte).
pub const MAX_STRING_LEN: usize = u8::MAX as usize;

pub type PlayerId = u8;
pub type BombId = u32;
pub type Score = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub x: u16,
    pub y: u16,
}

impl Position {
    pub fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

/// Four discrete directions, each a quarter turn clockwise from the previous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up = 0,
    Right = 1,
    Down = 2,
    Left = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Direction::Up),
            1 => Some(Direction::Right),
            2 => Some(Direction::Down),
            3 => Some(Direction::Left),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Unit displacement `(dx, dy)`; `Up` increases `y`.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, 1),
            Direction::Right => (1, 0),
            Direction::Down => (0, -1),
            Direction::Left => (-1, 0),
        }
    }
}

/// A game action a player can queue for the next turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    PlaceBomb,
    PlaceBlock,
    Move(Direction),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_round_trip() {
        for direction in Direction::ALL {
            assert_eq!(Direction::from_u8(direction.as_u8()), Some(direction));
        }
        assert_eq!(Direction::from_u8(4), None);
        assert_eq!(Direction::from_u8(255), None);
    }

    #[test]
    fn test_direction_is_clockwise_rotation() {
        // (dx, dy) -> (dy, -dx) rotates a quarter turn clockwise
        for pair in Direction::ALL.windows(2) {
            let (dx, dy) = pair[0].delta();
            assert_eq!(pair[1].delta(), (dy, -dx));
        }
    }

    #[test]
    fn test_position_ordering() {
        assert!(Position::new(0, 5) < Position::new(1, 0));
        assert!(Position::new(1, 0) < Position::new(1, 1));
    }
}
