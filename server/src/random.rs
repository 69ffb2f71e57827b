//! Seeded linear-congruential generator
//!
//! `next = prev * 48271 mod (2^31 - 1)`. Reproducible bit for bit from the
//! seed so whole games can be replayed in tests.

use shared::Position;

const MULTIPLIER: u64 = 48271;
const MODULUS: u64 = 2_147_483_647;

#[derive(Debug, Clone)]
pub struct Random {
    previous: u32,
}

impl Random {
    pub fn new(seed: u32) -> Self {
        Self { previous: seed }
    }

    pub fn next_u32(&mut self) -> u32 {
        let next = (self.previous as u64 * MULTIPLIER) % MODULUS;
        self.previous = next as u32;
        self.previous
    }

    /// Uniform coordinate in `0..size`. `size` must be non-zero.
    pub fn position_in(&mut self, size: u16) -> u16 {
        (self.next_u32() % size as u32) as u16
    }

    /// Draws `x` first, then `y`.
    pub fn position(&mut self, size_x: u16, size_y: u16) -> Position {
        let x = self.position_in(size_x);
        let y = self.position_in(size_y);
        Position::new(x, y)
    }
}
