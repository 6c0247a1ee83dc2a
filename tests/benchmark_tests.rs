//! Performance benchmarks for critical coordinator paths

use server::matchmaker::find_match;
use server::moves::{make_move, MoveOutcome};
use server::outbox::Outbox;
use server::registry::SessionRegistry;
use server::rules::Board;
use shared::{decode_binary, decode_text, encode, ConnectionId, Encoding, Frame, MoveSpec};
use std::time::Instant;

/// Main line of the Ruy Lopez, including white castling short
const RUY_LOPEZ: [&str; 10] = [
    "e2e4", "e7e5", "g1f3", "b8c6", "f1b5", "a7a6", "b5a4", "g8f6", "e1g1", "f8e7",
];

/// Benchmarks legal move application on a single board
#[test]
fn benchmark_move_application() {
    let specs: Vec<MoveSpec> = RUY_LOPEZ
        .iter()
        .map(|mv| MoveSpec::parse_compact(mv).unwrap())
        .collect();

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let mut board = Board::new();
        for spec in &specs {
            board.apply(spec).unwrap();
        }
        assert!(board.terminal().is_none());
    }

    let duration = start.elapsed();
    println!(
        "Move application: {} games × {} plies in {:?} ({:.2} μs/game)",
        iterations,
        specs.len(),
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks pairing a large number of searching connections
#[test]
fn benchmark_matchmaking_throughput() {
    let mut registry = SessionRegistry::with_seed(7);
    let mut outbox = Outbox::new();

    let connections = 10_000u32;
    let start = Instant::now();

    for id in 1..=connections {
        find_match(&mut registry, ConnectionId(id), &mut outbox);
    }

    let duration = start.elapsed();
    println!(
        "Matchmaking: {} connections in {:?} ({:.2} μs/connection)",
        connections,
        duration,
        duration.as_micros() as f64 / connections as f64
    );

    assert_eq!(registry.session_count(), (connections / 2) as usize);
    assert_eq!(registry.waiting_len(), 0);
    // One matchFound per player
    assert_eq!(outbox.len(), connections as usize);

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks move handling across many concurrent sessions
#[test]
fn benchmark_moves_across_sessions() {
    let mut registry = SessionRegistry::with_seed(3);
    let mut setup = Outbox::new();
    let sessions = 200u32;
    for id in 1..=sessions * 2 {
        find_match(&mut registry, ConnectionId(id), &mut setup);
    }

    let games: Vec<_> = (1..=sessions * 2)
        .step_by(2)
        .map(|id| {
            let session = registry.session_by_connection(ConnectionId(id)).unwrap();
            (session.id.clone(), session.white, session.black)
        })
        .collect();
    let specs: Vec<MoveSpec> = RUY_LOPEZ
        .iter()
        .map(|mv| MoveSpec::parse_compact(mv).unwrap())
        .collect();

    let start = Instant::now();

    // Interleave the games ply by ply, like concurrent players would.
    for (ply, spec) in specs.iter().enumerate() {
        for (id, white, black) in &games {
            let mover = if ply % 2 == 0 { *white } else { *black };
            let mut outbox = Outbox::new();
            let outcome = make_move(&mut registry, mover, id, spec, &mut outbox);
            assert!(matches!(outcome, MoveOutcome::Accepted { terminal: None, .. }));
        }
    }

    let duration = start.elapsed();
    let total = games.len() * specs.len();
    println!(
        "Session moves: {} moves in {:?} ({:.2} μs/move)",
        total,
        duration,
        duration.as_micros() as f64 / total as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks frame encoding in both wire formats
#[test]
fn benchmark_frame_encoding() {
    let message = shared::ServerMessage::MoveMade {
        fen: "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4".to_string(),
        san: "Qxf7#".to_string(),
    };

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        for encoding in [Encoding::Json, Encoding::Bincode] {
            let decoded: shared::ServerMessage = match encode(&message, encoding).unwrap() {
                Frame::Text(text) => decode_text(&text).unwrap(),
                Frame::Binary(bytes) => decode_binary(&bytes).unwrap(),
            };
            assert_eq!(decoded, message);
        }
    }

    let duration = start.elapsed();
    println!(
        "Frame encoding: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}
