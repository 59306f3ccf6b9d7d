use std::time::Duration;

use crate::common::stubs::{PileRules, BLACK_PEER, WHITE_PEER};
use crate::common::{active_session, coordinator};
use rook_relay::prelude::*;

#[test]
fn create_seats_creator_and_replies_once() {
    let harness = coordinator(PileRules::default());
    let code = harness
        .coordinator
        .create_game(&WHITE_PEER, CreateGame::new(ColorPreference::Black, "pile", 3))
        .unwrap();

    let sent = harness.transport.take();
    assert_eq!(sent.len(), 1);
    let (peer, ServerEvent::GameCreated(created)) = &sent[0] else {
        panic!("unexpected {sent:?}");
    };
    assert_eq!(*peer, WHITE_PEER);
    assert_eq!(created.code, code);
    assert_eq!(created.color, Side::Black);
    assert_eq!(created.board, "21w");
    assert_eq!(created.game_type, "pile");
    assert_eq!(created.time_control_minutes.minutes(), 3);

    let snap = harness.coordinator.snapshot(&code).unwrap();
    assert_eq!(snap.status, SessionStatus::WaitingForOpponent);
    assert_eq!(snap.black, Some(WHITE_PEER));
    assert_eq!(snap.white, None);
    assert!(!snap.clock_running);
    assert_eq!(snap.time_left, TimeLeft::uniform(Duration::from_secs(180)));
}

#[test]
fn codes_are_unique_and_well_formed() {
    let harness = coordinator(PileRules::default());
    let mut codes = std::collections::HashSet::new();
    for peer in 0..200 {
        let code = harness
            .coordinator
            .create_game(&peer, CreateGame::new(ColorPreference::Random, "pile", 1))
            .unwrap();
        assert_eq!(code.as_str().len(), 6);
        assert!(code
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
        assert!(codes.insert(code));
    }
    assert_eq!(harness.coordinator.session_count(), 200);
}

#[test]
fn random_preference_uses_both_colors() {
    let harness = coordinator(PileRules::default());
    let mut seen = Vec::new();
    for peer in 0..64 {
        let code = harness
            .coordinator
            .create_game(&peer, CreateGame::new(ColorPreference::Random, "pile", 1))
            .unwrap();
        let snap = harness.coordinator.snapshot(&code).unwrap();
        seen.push(snap.white == Some(peer));
    }
    assert!(seen.iter().any(|white| *white));
    assert!(seen.iter().any(|white| !*white));
}

#[test]
fn create_refused_while_seated() {
    let harness = coordinator(PileRules::default());
    let first = harness
        .coordinator
        .create_game(&WHITE_PEER, CreateGame::new(ColorPreference::White, "pile", 1))
        .unwrap();
    harness.transport.take();

    let err = harness
        .coordinator
        .create_game(&WHITE_PEER, CreateGame::new(ColorPreference::White, "pile", 1))
        .unwrap_err();
    assert_eq!(err, CreateErrorKind::AlreadySeated);
    assert_eq!(harness.coordinator.session_count(), 1);
    assert_eq!(harness.coordinator.session_of(&WHITE_PEER), Some(first));
    let sent = harness.transport.take_for(WHITE_PEER);
    assert!(matches!(
        sent.as_slice(),
        [ServerEvent::CreateError(rejection)] if rejection.reason == CreateErrorKind::AlreadySeated
    ));
}

#[test]
fn create_refuses_time_control_above_cap() {
    let harness = coordinator(PileRules::default());
    let err = harness
        .coordinator
        .create_game(&WHITE_PEER, CreateGame::new(ColorPreference::White, "pile", 181))
        .unwrap_err();
    assert_eq!(err, CreateErrorKind::InvalidTimeControl);
    assert_eq!(harness.coordinator.session_of(&WHITE_PEER), None);
}

#[test]
fn join_fills_empty_seat_and_activates() {
    let harness = coordinator(PileRules::default());
    let code = harness
        .coordinator
        .create_game(&WHITE_PEER, CreateGame::new(ColorPreference::White, "pile", 5))
        .unwrap();
    harness.transport.take();

    assert_eq!(
        harness.coordinator.join_game(&BLACK_PEER, &code),
        Ok(Side::Black)
    );

    let sent = harness.transport.take();
    assert_eq!(sent.len(), 2);
    match &sent[0] {
        (BLACK_PEER, ServerEvent::GameJoined(joined)) => {
            assert_eq!(joined.code, code);
            assert_eq!(joined.color, Side::Black);
            assert_eq!(joined.board, "21w");
            assert_eq!(joined.opponent_name, "Opponent");
            assert_eq!(joined.time_left, TimeLeft::uniform(Duration::from_secs(300)));
            assert_eq!(joined.time_control_minutes.minutes(), 5);
        },
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(
        &sent[1],
        (WHITE_PEER, ServerEvent::OpponentJoined(joined)) if joined.board == "21w"
    ));

    let snap = harness.coordinator.snapshot(&code).unwrap();
    assert_eq!(snap.status, SessionStatus::Active);
    assert!(snap.clock_running);
    assert_eq!(harness.coordinator.session_of(&BLACK_PEER), Some(code));
}

#[test]
fn join_prefers_white_when_creator_took_black() {
    let harness = coordinator(PileRules::default());
    let code = harness
        .coordinator
        .create_game(&WHITE_PEER, CreateGame::new(ColorPreference::Black, "pile", 5))
        .unwrap();
    assert_eq!(
        harness.coordinator.join_game(&BLACK_PEER, &code),
        Ok(Side::White)
    );
}

#[test]
fn join_code_is_case_insensitive() {
    let harness = coordinator(PileRules::default());
    let code = harness
        .coordinator
        .create_game(&WHITE_PEER, CreateGame::new(ColorPreference::White, "pile", 5))
        .unwrap();
    let lower: SessionCode = code.as_str().to_ascii_lowercase().parse().unwrap();
    assert_eq!(
        harness.coordinator.join_game(&BLACK_PEER, &lower),
        Ok(Side::Black)
    );
}

#[test]
fn join_errors_reach_only_the_joiner() {
    let harness = coordinator(PileRules::default());
    let code = active_session(&harness, 5);

    let cases = [
        (3, SessionCode::new("ZZZZZZ"), JoinErrorKind::NotFound),
        (3, code.clone(), JoinErrorKind::Full),
        (WHITE_PEER, code.clone(), JoinErrorKind::AlreadySeated),
    ];
    for (peer, target, expected) in cases {
        assert_eq!(harness.coordinator.join_game(&peer, &target), Err(expected));
        let sent = harness.transport.take();
        assert_eq!(sent.len(), 1, "{expected:?}");
        assert_eq!(sent[0].0, peer);
        assert!(matches!(
            &sent[0].1,
            ServerEvent::JoinError(rejection) if rejection.reason == expected
        ));
    }

    let snap = harness.coordinator.snapshot(&code).unwrap();
    assert_eq!(snap.white, Some(WHITE_PEER));
    assert_eq!(snap.black, Some(BLACK_PEER));
}

#[test]
fn join_refused_for_peer_seated_elsewhere() {
    let harness = coordinator(PileRules::default());
    let mine = harness
        .coordinator
        .create_game(&WHITE_PEER, CreateGame::new(ColorPreference::White, "pile", 5))
        .unwrap();
    let theirs = harness
        .coordinator
        .create_game(&BLACK_PEER, CreateGame::new(ColorPreference::White, "pile", 5))
        .unwrap();

    assert_eq!(
        harness.coordinator.join_game(&WHITE_PEER, &theirs),
        Err(JoinErrorKind::AlreadySeated)
    );
    assert_eq!(harness.coordinator.session_of(&WHITE_PEER), Some(mine));
    let snap = harness.coordinator.snapshot(&theirs).unwrap();
    assert_eq!(snap.black, None);
    assert_eq!(snap.status, SessionStatus::WaitingForOpponent);
}

#[test]
fn finished_session_is_not_joinable() {
    let harness = coordinator(PileRules::new(1));
    let code = active_session(&harness, 5);
    harness.coordinator.make_move(&WHITE_PEER, &code, 1).unwrap();
    assert_eq!(
        harness.coordinator.join_game(&3, &code),
        Err(JoinErrorKind::NotFound)
    );
}
