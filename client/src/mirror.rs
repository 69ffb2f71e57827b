//! Client-side replica of the game, rebuilt purely from turn events
//!
//! The mirror never draws random numbers and never decides anything on its
//! own: every position, block and bomb comes from the event stream. The only
//! geometry it computes is the blast pattern shown to the display, using the
//! same walk the server uses.

use log::warn;
use shared::{BombId, Board, Event, PlayerId, Position, Score};
use std::collections::{BTreeMap, BTreeSet};

/// A bomb as the client knows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bomb {
    pub position: Position,
    /// Turns left, counted down locally once per applied turn.
    pub timer: u16,
    /// Set by the turn that blows the bomb up; the bomb is discarded once its
    /// blast has been recorded.
    pub exploded: bool,
}

/// Board, bombs, positions and scores rebuilt from the event stream.
#[derive(Debug, Clone)]
pub struct GameMirror {
    explosion_radius: u16,
    bomb_timer: u16,
    turn: u16,
    board: Board,
    bombs: BTreeMap<BombId, Bomb>,
    positions: BTreeMap<PlayerId, Position>,
    scores: BTreeMap<PlayerId, Score>,
    explosions: BTreeSet<Position>,
    pending_clear: Vec<Position>,
}

impl GameMirror {
    pub fn new(size_x: u16, size_y: u16, explosion_radius: u16, bomb_timer: u16) -> Self {
        Self {
            explosion_radius,
            bomb_timer,
            turn: 0,
            board: Board::new(size_x, size_y),
            bombs: BTreeMap::new(),
            positions: BTreeMap::new(),
            scores: BTreeMap::new(),
            explosions: BTreeSet::new(),
            pending_clear: Vec::new(),
        }
    }

    /// Forgets the game, keeping the board size and rules.
    pub fn reset(&mut self) {
        self.turn = 0;
        self.board.clear();
        self.bombs.clear();
        self.positions.clear();
        self.scores.clear();
        self.explosions.clear();
        self.pending_clear.clear();
    }

    /// Starts a fresh game where every listed player has a zero score.
    pub fn start(&mut self, players: impl IntoIterator<Item = PlayerId>) {
        self.reset();
        self.scores = players.into_iter().map(|id| (id, 0)).collect();
    }

    /// Applies one turn's events in order.
    pub fn apply_turn(&mut self, turn: u16, events: &[Event]) {
        self.turn = turn;
        self.explosions.clear();
        for bomb in self.bombs.values_mut() {
            bomb.timer = bomb.timer.saturating_sub(1);
        }

        let mut counted = BTreeSet::new();

        for event in events {
            match event {
                Event::BombExploded {
                    id,
                    robots_destroyed,
                    blocks_destroyed,
                } => {
                    for robot in robots_destroyed {
                        if counted.insert(*robot) {
                            *self.scores.entry(*robot).or_insert(0) += 1;
                        }
                    }
                    match self.bombs.get_mut(id) {
                        Some(bomb) => bomb.exploded = true,
                        None => warn!("Unknown bomb {} exploded", id),
                    }
                    self.pending_clear.extend_from_slice(blocks_destroyed);
                }
                Event::BombPlaced { id, position } => {
                    self.settle_explosions();
                    self.bombs.insert(
                        *id,
                        Bomb {
                            position: *position,
                            timer: self.bomb_timer,
                            exploded: false,
                        },
                    );
                }
                Event::PlayerMoved { id, position } => {
                    self.settle_explosions();
                    self.positions.insert(*id, *position);
                }
                Event::BlockPlaced { position } => {
                    self.settle_explosions();
                    self.board.set_blocked(*position, true);
                }
            }
        }

        self.settle_explosions();
    }

    /// Records the blast of every exploded bomb against the board as it stood
    /// during the explosions, then clears the destroyed blocks.
    fn settle_explosions(&mut self) {
        let exploded: Vec<BombId> = self
            .bombs
            .iter()
            .filter(|(_, bomb)| bomb.exploded)
            .map(|(id, _)| *id)
            .collect();

        for id in exploded {
            if let Some(bomb) = self.bombs.remove(&id) {
                self.explosions
                    .extend(self.board.blast(bomb.position, self.explosion_radius));
            }
        }

        for tile in self.pending_clear.drain(..) {
            self.board.set_blocked(tile, false);
        }
    }

    /// Number of the last applied turn.
    pub fn turn(&self) -> u16 {
        self.turn
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Bombs that have not exploded yet, keyed by id.
    pub fn bombs(&self) -> &BTreeMap<BombId, Bomb> {
        &self.bombs
    }

    /// Last known tile of every player placed so far.
    pub fn positions(&self) -> &BTreeMap<PlayerId, Position> {
        &self.positions
    }

    /// Times each player has been destroyed this game.
    pub fn scores(&self) -> &BTreeMap<PlayerId, Score> {
        &self.scores
    }

    /// Tiles hit by explosions during the last applied turn, ordered by `x`, then `y`.
    pub fn explosions(&self) -> &BTreeSet<Position> {
        &self.explosions
    }
}
