use std::time::Duration;

use crate::common::stubs::{PileRules, StubConfig, BLACK_PEER, WHITE_PEER};
use crate::common::{active_session, coordinator, init_tracing};
use rook_relay::prelude::*;
use rook_relay::telemetry::ViolationKind;
use rook_relay::{assert_no_violations, OutboundEvent};
use tokio::sync::mpsc;
use tokio::time::sleep;

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

fn time_updates(events: &[OutboundEvent<StubConfig>]) -> Vec<TimeLeft> {
    events
        .iter()
        .filter_map(|event| match event {
            ServerEvent::TimeUpdate(update) => Some(update.time_left),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn ambient_ticks_charge_the_side_to_move() {
    init_tracing();
    let harness = coordinator(PileRules::default());
    active_session(&harness, 1);

    sleep(Duration::from_millis(3_500)).await;

    let updates = time_updates(&harness.transport.take_for(BLACK_PEER));
    assert_eq!(
        updates,
        vec![
            TimeLeft {
                white: ms(59_000),
                black: ms(60_000)
            },
            TimeLeft {
                white: ms(58_000),
                black: ms(60_000)
            },
            TimeLeft {
                white: ms(57_000),
                black: ms(60_000)
            },
        ]
    );
    assert_no_violations!(harness.observer);
}

#[tokio::test(start_paused = true)]
async fn moves_and_ticks_share_one_accounting_path() {
    let harness = coordinator(PileRules::default());
    let code = active_session(&harness, 1);

    sleep(Duration::from_millis(2_500)).await;
    harness.coordinator.make_move(&WHITE_PEER, &code, 1).unwrap();
    let snap = harness.coordinator.snapshot(&code).unwrap();
    assert_eq!(snap.time_left.white, ms(57_500));
    assert_eq!(snap.time_left.black, ms(60_000));

    // Next tick lands at 3s and charges black only for the half second it held the turn.
    sleep(Duration::from_millis(700)).await;
    let snap = harness.coordinator.snapshot(&code).unwrap();
    assert_eq!(snap.time_left.white, ms(57_500));
    assert_eq!(snap.time_left.black, ms(59_500));
}

#[tokio::test(start_paused = true)]
async fn a_pass_is_charged_to_the_mover() {
    let harness = coordinator(PileRules::default());
    let code = active_session(&harness, 1);

    sleep(Duration::from_millis(400)).await;
    harness.coordinator.make_move(&WHITE_PEER, &code, 0).unwrap();
    let snap = harness.coordinator.snapshot(&code).unwrap();
    assert_eq!(snap.time_left.white, ms(59_600));
    assert_eq!(snap.time_left.black, ms(60_000));
}

#[tokio::test(start_paused = true)]
async fn flag_fall_ends_the_session_once() {
    let harness = coordinator(PileRules::default());
    let code = active_session(&harness, 1);
    harness.coordinator.make_move(&WHITE_PEER, &code, 1).unwrap();
    harness.transport.take();

    sleep(Duration::from_secs(61)).await;

    let sent = harness.transport.take();
    for peer in [WHITE_PEER, BLACK_PEER] {
        let overs: Vec<_> = sent
            .iter()
            .filter_map(|(to, event)| match event {
                ServerEvent::GameOver(over) if *to == peer => Some(over.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(overs.len(), 1, "peer {peer}");
        assert_eq!(overs[0].reason, "white wins on time");
        assert_eq!(overs[0].board, "20b");
    }
    assert_eq!(sent.last().map(|(_, event)| event.name()), Some("gameOver"));
    let to_black: Vec<_> = sent
        .iter()
        .filter(|(to, _)| *to == BLACK_PEER)
        .map(|(_, event)| event.clone())
        .collect();
    let final_update = *time_updates(&to_black).last().unwrap();
    assert_eq!(final_update.black, Duration::ZERO);
    assert_eq!(final_update.white, ms(60_000));

    assert!(harness.coordinator.snapshot(&code).is_none());
    assert_eq!(harness.coordinator.session_of(&WHITE_PEER), None);
    assert_eq!(harness.coordinator.session_of(&BLACK_PEER), None);

    sleep(Duration::from_secs(5)).await;
    assert!(harness.transport.is_empty(), "ticker outlived its session");
}

#[tokio::test(start_paused = true)]
async fn stale_move_after_flag_fall_is_refused() {
    let harness = coordinator(PileRules::default());
    let code = active_session(&harness, 1);
    sleep(Duration::from_secs(61)).await;
    assert_eq!(
        harness.coordinator.make_move(&WHITE_PEER, &code, 1),
        Err(MoveErrorKind::NotFound)
    );
}

#[tokio::test(start_paused = true)]
async fn ticker_stops_on_disconnect() {
    let harness = coordinator(PileRules::default());
    active_session(&harness, 1);
    sleep(Duration::from_millis(1_500)).await;

    harness.coordinator.disconnect(&BLACK_PEER);
    harness.transport.take();

    sleep(Duration::from_secs(10)).await;
    assert!(harness.transport.is_empty());
    assert_eq!(harness.coordinator.session_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn ticker_stops_on_checkmate() {
    let harness = coordinator(PileRules::new(2));
    let code = active_session(&harness, 1);
    harness.coordinator.make_move(&WHITE_PEER, &code, 2).unwrap();
    harness.transport.take();

    sleep(Duration::from_secs(10)).await;
    assert!(harness.transport.is_empty());
}

#[tokio::test(start_paused = true)]
async fn run_pumps_signals_until_closed() {
    init_tracing();
    let harness = coordinator(PileRules::default());
    let (signals, receiver) = mpsc::channel(16);
    let pump = tokio::spawn(harness.coordinator.clone().run(receiver));

    signals
        .send(PeerSignal::Connected(WHITE_PEER))
        .await
        .unwrap();
    signals
        .send(PeerSignal::Event(
            WHITE_PEER,
            ClientEvent::CreateGame(CreateGame::new(ColorPreference::White, "pile", 1)),
        ))
        .await
        .unwrap();
    signals
        .send(PeerSignal::Frame(BLACK_PEER, "garbage".to_owned()))
        .await
        .unwrap();
    sleep(Duration::from_millis(10)).await;

    let code = harness.coordinator.session_of(&WHITE_PEER).unwrap();
    assert!(harness.observer.has_violation(ViolationKind::Codec));

    signals
        .send(PeerSignal::Event(
            BLACK_PEER,
            ClientEvent::JoinGame(JoinGame { code: code.clone() }),
        ))
        .await
        .unwrap();
    signals
        .send(PeerSignal::Disconnected(WHITE_PEER))
        .await
        .unwrap();
    drop(signals);
    pump.await.unwrap();

    assert!(harness.coordinator.snapshot(&code).is_none());
    let names = harness.transport.names();
    assert_eq!(names.last(), Some(&(BLACK_PEER, "playerLeft")));
}
