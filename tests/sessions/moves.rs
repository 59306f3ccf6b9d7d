use crate::common::stubs::{PileRules, BLACK_PEER, WHITE_PEER};
use crate::common::{active_session, coordinator};
use rook_relay::prelude::*;

#[test]
fn accepted_move_is_broadcast_and_passes_turn() {
    let harness = coordinator(PileRules::default());
    let code = active_session(&harness, 5);

    assert_eq!(harness.coordinator.make_move(&WHITE_PEER, &code, 3), Ok(3));

    let sent = harness.transport.take();
    assert_eq!(sent.len(), 2);
    let peers: Vec<u32> = sent.iter().map(|(peer, _)| *peer).collect();
    assert_eq!(peers, vec![WHITE_PEER, BLACK_PEER]);
    for (_, event) in &sent {
        let ServerEvent::MoveMade(made) = event else {
            panic!("unexpected {event:?}");
        };
        assert_eq!(made.board, "18b");
        assert_eq!(made.move_detail, 3);
        assert_eq!(made.side_to_move, Side::Black);
    }
    assert_eq!(sent[0].1, sent[1].1);
}

#[test]
fn out_of_turn_move_is_refused() {
    let harness = coordinator(PileRules::default());
    let code = active_session(&harness, 5);

    assert_eq!(
        harness.coordinator.make_move(&BLACK_PEER, &code, 1),
        Err(MoveErrorKind::NotYourTurn)
    );
    let sent = harness.transport.take();
    assert!(matches!(
        sent.as_slice(),
        [(BLACK_PEER, ServerEvent::MoveError(rejection))] if rejection.reason == MoveErrorKind::NotYourTurn
    ));
    assert_eq!(harness.coordinator.snapshot(&code).unwrap().board, "21w");
}

#[test]
fn stranger_cannot_move() {
    let harness = coordinator(PileRules::default());
    let code = active_session(&harness, 5);
    assert_eq!(
        harness.coordinator.make_move(&9, &code, 1),
        Err(MoveErrorKind::NotYourTurn)
    );
}

#[test]
fn illegal_move_changes_nothing_and_reaches_only_mover() {
    let harness = coordinator(PileRules::default());
    let code = active_session(&harness, 5);
    let before = harness.coordinator.snapshot(&code).unwrap();

    assert_eq!(
        harness.coordinator.make_move(&WHITE_PEER, &code, 4),
        Err(MoveErrorKind::InvalidMove)
    );

    let after = harness.coordinator.snapshot(&code).unwrap();
    assert_eq!(before.board, after.board);
    assert_eq!(before.time_left, after.time_left);
    assert_eq!(before.side_to_move, after.side_to_move);
    let sent = harness.transport.take();
    assert_eq!(sent.len(), 1);
    assert!(matches!(
        &sent[0],
        (WHITE_PEER, ServerEvent::MoveError(rejection))
            if rejection.reason == MoveErrorKind::InvalidMove && rejection.message == "Invalid move"
    ));
}

#[test]
fn unknown_code_is_not_found() {
    let harness = coordinator(PileRules::default());
    active_session(&harness, 5);
    assert_eq!(
        harness
            .coordinator
            .make_move(&WHITE_PEER, &SessionCode::new("NOPE00"), 1),
        Err(MoveErrorKind::NotFound)
    );
}

#[test]
fn creator_cannot_move_alone() {
    let harness = coordinator(PileRules::default());
    let code = harness
        .coordinator
        .create_game(&WHITE_PEER, CreateGame::new(ColorPreference::White, "pile", 5))
        .unwrap();
    assert_eq!(
        harness.coordinator.make_move(&WHITE_PEER, &code, 1),
        Err(MoveErrorKind::WaitingForOpponent)
    );
}

#[test]
fn taking_the_last_stone_wins() {
    let harness = coordinator(PileRules::new(5));
    let code = active_session(&harness, 5);

    harness.coordinator.make_move(&WHITE_PEER, &code, 3).unwrap();
    harness.coordinator.make_move(&BLACK_PEER, &code, 1).unwrap();
    harness.transport.take();
    harness.coordinator.make_move(&WHITE_PEER, &code, 1).unwrap();

    let names = harness.transport.names();
    assert_eq!(
        names,
        vec![
            (WHITE_PEER, "moveMade"),
            (BLACK_PEER, "moveMade"),
            (WHITE_PEER, "gameOver"),
            (BLACK_PEER, "gameOver"),
        ]
    );
    let sent = harness.transport.take();
    let ServerEvent::GameOver(over) = &sent[3].1 else {
        panic!("unexpected {sent:?}");
    };
    assert_eq!(over.board, "0b");
    assert_eq!(over.reason, "Checkmate: white wins");

    assert!(harness.coordinator.snapshot(&code).is_none());
    assert_eq!(harness.coordinator.session_count(), 0);
    assert_eq!(harness.coordinator.session_of(&WHITE_PEER), None);
    assert_eq!(harness.coordinator.session_of(&BLACK_PEER), None);
}

#[test]
fn move_after_finish_is_not_found() {
    let harness = coordinator(PileRules::new(1));
    let code = active_session(&harness, 5);
    harness.coordinator.make_move(&WHITE_PEER, &code, 1).unwrap();
    assert_eq!(
        harness.coordinator.make_move(&BLACK_PEER, &code, 1),
        Err(MoveErrorKind::NotFound)
    );
}

#[test]
fn stalemate_is_a_draw() {
    let harness = coordinator(PileRules::new(10).with_stalemate_at(7));
    let code = active_session(&harness, 5);
    harness.coordinator.make_move(&WHITE_PEER, &code, 3).unwrap();

    let sent = harness.transport.take_for(BLACK_PEER);
    assert!(matches!(
        sent.last(),
        Some(ServerEvent::GameOver(over)) if over.reason == "Draw by stalemate"
    ));
    assert_eq!(harness.coordinator.session_count(), 0);
}

#[test]
fn pass_keeps_the_turn_with_the_mover() {
    let harness = coordinator(PileRules::default());
    let code = active_session(&harness, 5);

    harness.coordinator.make_move(&WHITE_PEER, &code, 0).unwrap();
    let snap = harness.coordinator.snapshot(&code).unwrap();
    assert_eq!(snap.side_to_move, Side::White);
    assert_eq!(
        harness.coordinator.make_move(&BLACK_PEER, &code, 1),
        Err(MoveErrorKind::NotYourTurn)
    );
    assert_eq!(harness.coordinator.make_move(&WHITE_PEER, &code, 1), Ok(1));
}

#[test]
fn frames_drive_the_same_operations() {
    let harness = coordinator(PileRules::default());
    let code = active_session(&harness, 5);

    let frame = format!(r#"{{"event":"makeMove","payload":{{"code":"{code}","move":2}}}}"#);
    harness.coordinator.handle_frame(&WHITE_PEER, &frame).unwrap();
    assert_eq!(harness.coordinator.snapshot(&code).unwrap().board, "19b");

    let wire: Vec<String> = harness
        .transport
        .take_for(BLACK_PEER)
        .iter()
        .map(|event| rook_relay::encode_frame(event).unwrap())
        .collect();
    assert_eq!(wire.len(), 1);
    assert!(wire[0].starts_with(r#"{"event":"moveMade","payload":{"board":"19b","moveDetail":2,"#));
}
