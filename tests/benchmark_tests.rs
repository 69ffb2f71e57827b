//! Performance benchmarks for critical game systems

use client::mirror::GameMirror;
use server::game::{GameRules, GameState};
use server::random::Random;
use shared::{
    Action, Board, Decode, Direction, Encode, Event, PlayerInfo, Position, ServerMessage,
};
use std::time::Instant;

fn large_rules() -> GameRules {
    GameRules {
        size_x: 40,
        size_y: 40,
        players_count: 25,
        game_length: 2000,
        explosion_radius: 5,
        bomb_timer: 4,
        initial_blocks: 300,
    }
}

fn scripted_action(source: &mut Random) -> Action {
    match source.next_u32() % 6 {
        0 => Action::PlaceBomb,
        1 => Action::PlaceBlock,
        n => Direction::from_u8((n - 2) as u8).map_or(Action::PlaceBomb, Action::Move),
    }
}

/// Benchmarks blast walking on a sparse board
#[test]
fn benchmark_blast_computation() {
    let mut board = Board::new(64, 64);
    for i in 0..64 {
        board.set_blocked(Position::new(i, (i * 7) % 64), true);
    }

    let iterations = 100_000;
    let start = Instant::now();

    let mut tiles = 0;
    for i in 0..iterations {
        let origin = Position::new((i % 64) as u16, ((i / 64) % 64) as u16);
        tiles += board.blast(origin, 8).len();
    }

    let duration = start.elapsed();
    println!(
        "Blast computation: {} iterations in {:?} ({:.2} ns/iter, {} tiles)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64,
        tiles
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks a full game of busy turns on a large board
#[test]
fn benchmark_turn_simulation() {
    let rules = large_rules();
    let players = rules.players_count;
    let mut game = GameState::new(rules);
    let mut rng = Random::new(42);
    let mut actions = Random::new(7);

    let start = Instant::now();
    let mut event_count = game.start(&mut rng).len();
    while !game.is_finished() {
        for id in 0..players {
            game.queue_action(id, scripted_action(&mut actions));
        }
        event_count += game.advance_turn(&mut rng).len();
    }

    let duration = start.elapsed();
    println!(
        "Turn simulation: {} turns, {} events in {:?} ({:.2} μs/turn)",
        game.turn(),
        event_count,
        duration,
        duration.as_micros() as f64 / game.turn() as f64
    );

    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks encoding and decoding of large turn messages
#[test]
fn benchmark_turn_codec() {
    let events: Vec<Event> = (0..1000u32)
        .map(|i| match i % 4 {
            0 => Event::BombPlaced {
                id: i,
                position: Position::new((i % 40) as u16, (i / 40) as u16),
            },
            1 => Event::BombExploded {
                id: i,
                robots_destroyed: vec![0, 1, 2],
                blocks_destroyed: (0..8).map(|y| Position::new(1, y)).collect(),
            },
            2 => Event::PlayerMoved {
                id: (i % 25) as u8,
                position: Position::new(3, 4),
            },
            _ => Event::BlockPlaced {
                position: Position::new(5, 6),
            },
        })
        .collect();
    let message = ServerMessage::Turn { turn: 1, events };

    let iterations = 1000;
    let start = Instant::now();

    let mut bytes_total = 0;
    for _ in 0..iterations {
        let bytes = message.to_bytes();
        bytes_total += bytes.len();
        let decoded = ServerMessage::from_bytes(&bytes).unwrap();
        assert!(matches!(decoded, ServerMessage::Turn { turn: 1, .. }));
    }

    let duration = start.elapsed();
    println!(
        "Turn codec: {} iterations, {} bytes in {:?} ({:.2} μs/iter)",
        iterations,
        bytes_total,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks streaming decode of many small messages from one buffer
#[test]
fn benchmark_prefix_decoding() {
    let player = ServerMessage::AcceptedPlayer(PlayerInfo {
        id: 3,
        name: "benchmark".to_string(),
        address: "[::1]:10022".to_string(),
    });
    let mut buffer = Vec::new();
    for _ in 0..50_000 {
        player.encode(&mut buffer);
    }

    let start = Instant::now();

    let mut offset = 0;
    let mut count = 0;
    while offset < buffer.len() {
        let (_, used) = ServerMessage::decode_prefix(&buffer[offset..])
            .unwrap()
            .expect("complete message");
        offset += used;
        count += 1;
    }

    let duration = start.elapsed();
    println!(
        "Prefix decoding: {} messages in {:?} ({:.2} ns/msg)",
        count,
        duration,
        duration.as_nanos() as f64 / count as f64
    );

    assert_eq!(count, 50_000);
    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks replaying a recorded game into the client replica
#[test]
fn benchmark_mirror_replay() {
    let rules = large_rules();
    let players = rules.players_count;
    let mut game = GameState::new(rules.clone());
    let mut rng = Random::new(3);
    let mut actions = Random::new(11);

    let mut recorded = vec![game.start(&mut rng)];
    while !game.is_finished() {
        for id in 0..players {
            game.queue_action(id, scripted_action(&mut actions));
        }
        recorded.push(game.advance_turn(&mut rng));
    }

    let start = Instant::now();

    let mut mirror = GameMirror::new(
        rules.size_x,
        rules.size_y,
        rules.explosion_radius,
        rules.bomb_timer,
    );
    mirror.start(0..players);
    for (turn, events) in recorded.iter().enumerate() {
        mirror.apply_turn(turn as u16, events);
    }

    let duration = start.elapsed();
    println!(
        "Mirror replay: {} turns in {:?} ({:.2} μs/turn)",
        recorded.len(),
        duration,
        duration.as_micros() as f64 / recorded.len() as f64
    );

    assert_eq!(&game.scores(), mirror.scores());
    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}
