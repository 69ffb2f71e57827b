use crate::config::ServerConfig;
use crate::random::Random;
use log::debug;
use shared::{Action, BombId, Board, Event, PlayerId, Position, Score};
use std::collections::BTreeMap;

/// Parameters fixed for the lifetime of the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRules {
    pub size_x: u16,
    pub size_y: u16,
    pub players_count: u8,
    pub game_length: u16,
    pub explosion_radius: u16,
    pub bomb_timer: u16,
    pub initial_blocks: u16,
}

impl From<&ServerConfig> for GameRules {
    fn from(config: &ServerConfig) -> Self {
        Self {
            size_x: config.size_x,
            size_y: config.size_y,
            players_count: config.players_count,
            game_length: config.game_length,
            explosion_radius: config.explosion_radius,
            bomb_timer: config.bomb_timer,
            initial_blocks: config.initial_blocks,
        }
    }
}

/// A bomb still ticking on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bomb {
    pub position: Position,
    /// Turns left before it explodes.
    pub timer: u16,
}

/// Authoritative state of one game.
///
/// Players are indexed densely by id. Every mutation happens inside
/// [`GameState::start`] or [`GameState::advance_turn`], each of which returns
/// the events describing it in the order clients must apply them.
#[derive(Debug, Clone)]
pub struct GameState {
    rules: GameRules,
    turn: u16,
    board: Board,
    bombs: BTreeMap<BombId, Bomb>,
    next_bomb_id: BombId,
    positions: Vec<Position>,
    scores: Vec<Score>,
    destroyed: Vec<bool>,
    actions: Vec<Option<Action>>,
}

impl GameState {
    pub fn new(rules: GameRules) -> Self {
        let players = rules.players_count as usize;
        Self {
            board: Board::new(rules.size_x, rules.size_y),
            turn: 0,
            bombs: BTreeMap::new(),
            next_bomb_id: 0,
            positions: vec![Position::default(); players],
            scores: vec![0; players],
            destroyed: vec![false; players],
            actions: vec![None; players],
            rules,
        }
    }

    /// Drops all per-game state, keeping the rules.
    pub fn reset(&mut self) {
        *self = Self::new(self.rules.clone());
    }

    /// Places every player and the initial blocks. Returns the events of turn 0.
    pub fn start(&mut self, rng: &mut Random) -> Vec<Event> {
        self.reset();
        let mut events = Vec::new();

        for id in 0..self.rules.players_count {
            let position = rng.position(self.rules.size_x, self.rules.size_y);
            self.positions[id as usize] = position;
            events.push(Event::PlayerMoved { id, position });
        }

        for _ in 0..self.rules.initial_blocks {
            let position = rng.position(self.rules.size_x, self.rules.size_y);
            if !self.board.is_blocked(position) {
                self.board.set_blocked(position, true);
                events.push(Event::BlockPlaced { position });
            }
        }

        debug!(
            "Game started with {} players and {} blocks",
            self.rules.players_count,
            self.board.blocked_count()
        );
        events
    }

    /// Records the action `id` performs next turn, replacing any earlier one.
    pub fn queue_action(&mut self, id: PlayerId, action: Action) {
        if let Some(slot) = self.actions.get_mut(id as usize) {
            *slot = Some(action);
        }
    }

    /// Simulates one turn and returns its events.
    pub fn advance_turn(&mut self, rng: &mut Random) -> Vec<Event> {
        self.turn += 1;
        let mut events = self.resolve_bombs();
        self.respawn(rng, &mut events);
        self.apply_actions(&mut events);

        for (score, destroyed) in self.scores.iter_mut().zip(&self.destroyed) {
            if *destroyed {
                *score += 1;
            }
        }
        self.destroyed.iter_mut().for_each(|flag| *flag = false);
        self.actions.iter_mut().for_each(|action| *action = None);

        events
    }

    fn resolve_bombs(&mut self) -> Vec<Event> {
        let mut exploding = Vec::new();
        for (id, bomb) in self.bombs.iter_mut() {
            bomb.timer = bomb.timer.saturating_sub(1);
            if bomb.timer == 0 {
                exploding.push(*id);
            }
        }

        let mut events = Vec::new();
        let mut cleared = Vec::new();

        for id in exploding {
            let Some(bomb) = self.bombs.remove(&id) else {
                continue;
            };

            let mut robots_destroyed = Vec::new();
            let mut blocks_destroyed = Vec::new();
            for tile in self.board.blast(bomb.position, self.rules.explosion_radius) {
                for (player, position) in self.positions.iter().enumerate() {
                    if *position == tile && !self.destroyed[player] {
                        self.destroyed[player] = true;
                        robots_destroyed.push(player as PlayerId);
                    }
                }
                if self.board.is_blocked(tile) {
                    blocks_destroyed.push(tile);
                    cleared.push(tile);
                }
            }

            events.push(Event::BombExploded {
                id,
                robots_destroyed,
                blocks_destroyed,
            });
        }

        // blocks only disappear once every bomb of this turn has been walked
        for tile in cleared {
            self.board.set_blocked(tile, false);
        }

        events
    }

    fn respawn(&mut self, rng: &mut Random, events: &mut Vec<Event>) {
        for (player, destroyed) in self.destroyed.iter().enumerate() {
            if *destroyed {
                let position = rng.position(self.rules.size_x, self.rules.size_y);
                self.positions[player] = position;
                events.push(Event::PlayerMoved {
                    id: player as PlayerId,
                    position,
                });
            }
        }
    }

    fn apply_actions(&mut self, events: &mut Vec<Event>) {
        for player in 0..self.actions.len() {
            let Some(action) = self.actions[player] else {
                continue;
            };
            let position = self.positions[player];

            match action {
                Action::PlaceBomb => {
                    let id = self.next_bomb_id;
                    self.next_bomb_id = self.next_bomb_id.wrapping_add(1);
                    self.bombs.insert(
                        id,
                        Bomb {
                            position,
                            timer: self.rules.bomb_timer,
                        },
                    );
                    events.push(Event::BombPlaced { id, position });
                }
                Action::PlaceBlock => {
                    self.board.set_blocked(position, true);
                    events.push(Event::BlockPlaced { position });
                }
                Action::Move(direction) => {
                    if self.destroyed[player] {
                        continue;
                    }
                    let Some(target) = self.board.neighbor(position, direction) else {
                        continue;
                    };
                    if self.board.is_blocked(target) {
                        continue;
                    }
                    self.positions[player] = target;
                    events.push(Event::PlayerMoved {
                        id: player as PlayerId,
                        position: target,
                    });
                }
            }
        }
    }

    /// Parameters this game was created with.
    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    /// Number of the last simulated turn; 0 right after [`GameState::start`].
    pub fn turn(&self) -> u16 {
        self.turn
    }

    /// True once the last turn of the game has been simulated.
    pub fn is_finished(&self) -> bool {
        self.turn >= self.rules.game_length
    }

    /// Blocked tiles as they stand after the last turn.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Live bombs keyed by id. Bombs that exploded are already gone.
    pub fn bombs(&self) -> &BTreeMap<BombId, Bomb> {
        &self.bombs
    }

    /// Current tile of a player, or None for an id outside the game.
    pub fn position(&self, id: PlayerId) -> Option<Position> {
        self.positions.get(id as usize).copied()
    }

    /// Scores of every player id in `0..players_count`.
    pub fn scores(&self) -> BTreeMap<PlayerId, Score> {
        self.scores
            .iter()
            .enumerate()
            .map(|(id, score)| (id as PlayerId, *score))
            .collect()
    }
}
