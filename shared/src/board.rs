//! Board occupancy and explosion geometry
//!
//! Both the authoritative simulation and the client mirror walk blasts with
//! the same code so that they can never disagree on which tiles a bomb reaches.

use crate::{Direction, Position};

/// A `width x height` grid of blocked flags stored row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    width: u16,
    height: u16,
    blocked: Vec<bool>,
}

impl Board {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            blocked: vec![false; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width as i32 && y < self.height as i32
    }

    fn index(&self, pos: Position) -> Option<usize> {
        if pos.x < self.width && pos.y < self.height {
            Some(pos.y as usize * self.width as usize + pos.x as usize)
        } else {
            None
        }
    }

    /// Out-of-bounds tiles are never blocked.
    pub fn is_blocked(&self, pos: Position) -> bool {
        self.index(pos).map_or(false, |i| self.blocked[i])
    }

    /// Returns false when `pos` lies outside the board.
    pub fn set_blocked(&mut self, pos: Position, blocked: bool) -> bool {
        match self.index(pos) {
            Some(i) => {
                self.blocked[i] = blocked;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.blocked.iter_mut().for_each(|cell| *cell = false);
    }

    /// Blocked tiles ordered by `x`, then `y`.
    pub fn blocked_tiles(&self) -> Vec<Position> {
        let mut tiles = Vec::new();
        for x in 0..self.width {
            for y in 0..self.height {
                let pos = Position::new(x, y);
                if self.is_blocked(pos) {
                    tiles.push(pos);
                }
            }
        }
        tiles
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.iter().filter(|cell| **cell).count()
    }

    /// The in-bounds tile one step from `pos`, ignoring blocks.
    pub fn neighbor(&self, pos: Position, direction: Direction) -> Option<Position> {
        let (dx, dy) = direction.delta();
        let x = pos.x as i32 + dx;
        let y = pos.y as i32 + dy;
        if self.contains(x, y) {
            Some(Position::new(x as u16, y as u16))
        } else {
            None
        }
    }

    /// Tiles reached by a bomb exploding at `origin`, in walk order.
    ///
    /// The origin always comes first. A bomb sitting on a blocked tile only
    /// reaches that tile. Otherwise each direction is walked independently up
    /// to `radius` steps, stopping at the board edge (exclusive) or at the
    /// first blocked tile (inclusive).
    pub fn blast(&self, origin: Position, radius: u16) -> Vec<Position> {
        let mut tiles = vec![origin];
        if self.is_blocked(origin) {
            return tiles;
        }

        for direction in Direction::ALL {
            let (dx, dy) = direction.delta();
            for step in 1..=radius as i32 {
                let x = origin.x as i32 + step * dx;
                let y = origin.y as i32 + step * dy;
                if !self.contains(x, y) {
                    break;
                }

                let tile = Position::new(x as u16, y as u16);
                tiles.push(tile);
                if self.is_blocked(tile) {
                    break;
                }
            }
        }

        tiles
    }
}
