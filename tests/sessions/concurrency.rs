//! Operations racing on one session from several OS threads.
//!
//! Every operation holds the session mutex from its first read to its last
//! write, so whichever thread wins, the losers observe a consistent session
//! (or none at all) and the registry is left without stale bindings.

use std::sync::Barrier;
use std::thread;

use crate::common::stubs::{Harness, PileRules, BLACK_PEER, WHITE_PEER};
use crate::common::{active_session, coordinator};
use rook_relay::prelude::*;
use rook_relay::telemetry::ViolationSeverity;

const ROUNDS: usize = 200;

fn terminal_events(harness: &Harness, peer: u32) -> usize {
    harness
        .transport
        .names()
        .iter()
        .filter(|(to, name)| *to == peer && matches!(*name, "gameOver" | "playerLeft"))
        .count()
}

fn assert_no_errors(harness: &Harness) {
    let errors: Vec<_> = harness
        .observer
        .violations()
        .into_iter()
        .filter(|v| v.severity >= ViolationSeverity::Error)
        .collect();
    assert!(errors.is_empty(), "unexpected violations: {errors:#?}");
}

/// Eight peers race for the one open seat: exactly one is seated and every
/// other one is told the session is full.
#[test]
fn racing_joiners_fill_one_seat() {
    const JOINERS: u32 = 8;

    for _ in 0..ROUNDS {
        let harness = coordinator(PileRules::default());
        let code = harness
            .coordinator
            .create_game(
                &WHITE_PEER,
                CreateGame::new(ColorPreference::White, "pile", 5),
            )
            .unwrap();
        let barrier = Barrier::new(JOINERS as usize);

        let results: Vec<_> = thread::scope(|scope| {
            let handles: Vec<_> = (0..JOINERS)
                .map(|i| {
                    let (harness, code, barrier) = (&harness, &code, &barrier);
                    scope.spawn(move || {
                        let peer = 100 + i;
                        barrier.wait();
                        (peer, harness.coordinator.join_game(&peer, code))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let seated: Vec<_> = results
            .iter()
            .filter(|(_, result)| *result == Ok(Side::Black))
            .map(|(peer, _)| *peer)
            .collect();
        assert_eq!(seated.len(), 1, "{results:?}");
        assert!(results
            .iter()
            .filter(|(peer, _)| *peer != seated[0])
            .all(|(_, result)| *result == Err(JoinErrorKind::Full)));

        let snap = harness.coordinator.snapshot(&code).unwrap();
        assert_eq!(snap.status, SessionStatus::Active);
        assert_eq!(harness.coordinator.session_of(&seated[0]), Some(code));
        for (peer, _) in results.iter().filter(|(peer, _)| *peer != seated[0]) {
            assert_eq!(harness.coordinator.session_of(peer), None);
        }
        assert_no_errors(&harness);
    }
}

/// A mating move, the opponent's disconnect and an ambient tick all land at
/// once. Whichever wins, the session ends exactly once and is fully torn down.
#[test]
fn mating_move_disconnect_and_tick_end_the_session_once() {
    for _ in 0..ROUNDS {
        // One stone: white's only move takes it and mates.
        let harness = coordinator(PileRules::new(1));
        let code = active_session(&harness, 5);
        let barrier = Barrier::new(3);

        thread::scope(|scope| {
            scope.spawn(|| {
                barrier.wait();
                let _ = harness.coordinator.make_move(&WHITE_PEER, &code, 1);
            });
            scope.spawn(|| {
                barrier.wait();
                harness.coordinator.disconnect(&BLACK_PEER);
            });
            scope.spawn(|| {
                barrier.wait();
                harness.coordinator.tick(&code);
            });
        });

        assert_eq!(harness.coordinator.session_count(), 0);
        assert_eq!(harness.coordinator.session_of(&WHITE_PEER), None);
        assert_eq!(harness.coordinator.session_of(&BLACK_PEER), None);
        assert_eq!(terminal_events(&harness, WHITE_PEER), 1);
        assert!(terminal_events(&harness, BLACK_PEER) <= 1);
        assert_no_errors(&harness);
    }
}

/// Both peers drop at the same moment: one disconnect resolves the session,
/// the other finds nothing left to do.
#[test]
fn simultaneous_disconnects_resolve_once() {
    for _ in 0..ROUNDS {
        let harness = coordinator(PileRules::default());
        let code = active_session(&harness, 5);
        let barrier = Barrier::new(2);

        let resolved = thread::scope(|scope| {
            let handles = [WHITE_PEER, BLACK_PEER].map(|peer| {
                let (harness, barrier) = (&harness, &barrier);
                scope.spawn(move || {
                    barrier.wait();
                    harness.coordinator.disconnect(&peer)
                })
            });
            handles.map(|h| h.join().unwrap())
        });

        assert_eq!(resolved.iter().filter(|done| **done).count(), 1, "{resolved:?}");
        assert!(harness.coordinator.snapshot(&code).is_none());
        assert_eq!(harness.coordinator.session_count(), 0);
        assert_eq!(harness.coordinator.session_of(&WHITE_PEER), None);
        assert_eq!(harness.coordinator.session_of(&BLACK_PEER), None);
        assert!(terminal_events(&harness, WHITE_PEER) <= 1);
        assert!(terminal_events(&harness, BLACK_PEER) <= 1);
        assert_no_errors(&harness);
    }
}
