//! Stub collaborators for driving a coordinator without chess.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    dead_code
)]

use std::sync::Arc;

use parking_lot::Mutex;
use rook_relay::prelude::*;
use rook_relay::telemetry::CollectingObserver;
use rook_relay::OutboundEvent;

pub const WHITE_PEER: u32 = 1;
pub const BLACK_PEER: u32 = 2;

/// Take 1 to 3 stones from a pile; whoever takes the last stone mates.
///
/// A move of `0` passes without giving up the turn, which exercises moves that
/// do not switch the side to move. Landing exactly on `stalemate_at` is a
/// stalemate.
#[derive(Debug, Clone)]
pub struct PileRules {
    pub start: u32,
    pub stalemate_at: Option<u32>,
}

impl PileRules {
    pub fn new(start: u32) -> Self {
        Self {
            start,
            stalemate_at: None,
        }
    }

    pub fn with_stalemate_at(mut self, pile: u32) -> Self {
        self.stalemate_at = Some(pile);
        self
    }
}

impl Default for PileRules {
    fn default() -> Self {
        Self::new(21)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pile {
    pub stones: u32,
    pub to_move: Side,
}

impl RulesOracle for PileRules {
    type State = Pile;
    type Move = u32;
    type MoveDetail = u32;

    fn new_game(&self) -> Pile {
        Pile {
            stones: self.start,
            to_move: Side::White,
        }
    }

    fn serialize(&self, state: &Pile) -> String {
        let side = match state.to_move {
            Side::White => 'w',
            Side::Black => 'b',
        };
        format!("{}{}", state.stones, side)
    }

    fn apply_move(&self, state: &Pile, mv: &u32) -> Result<(Pile, u32), IllegalMove> {
        match *mv {
            0 => Ok((*state, 0)),
            take @ 1..=3 if take <= state.stones => Ok((
                Pile {
                    stones: state.stones - take,
                    to_move: state.to_move.opposite(),
                },
                take,
            )),
            take => Err(IllegalMove::new(format!(
                "cannot take {take} from {}",
                state.stones
            ))),
        }
    }

    fn side_to_move(&self, state: &Pile) -> Side {
        state.to_move
    }

    fn terminal_status(&self, state: &Pile) -> TerminalStatus {
        if state.stones == 0 {
            TerminalStatus::Checkmate
        } else if self.stalemate_at == Some(state.stones) {
            TerminalStatus::Stalemate
        } else {
            TerminalStatus::Ongoing
        }
    }
}

#[derive(Debug)]
pub struct StubConfig;

impl Config for StubConfig {
    type Peer = u32;
    type Rules = PileRules;
}

/// Records every outbound event in send order.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(u32, OutboundEvent<StubConfig>)>>,
}

impl Transport<StubConfig> for RecordingTransport {
    fn send(&self, peer: &u32, event: OutboundEvent<StubConfig>) {
        self.sent.lock().push((*peer, event));
    }
}

impl RecordingTransport {
    /// Drains everything recorded so far.
    pub fn take(&self) -> Vec<(u32, OutboundEvent<StubConfig>)> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Drains and keeps only the events addressed to `peer`.
    pub fn take_for(&self, peer: u32) -> Vec<OutboundEvent<StubConfig>> {
        self.take()
            .into_iter()
            .filter(|(to, _)| *to == peer)
            .map(|(_, event)| event)
            .collect()
    }

    /// Wire names of everything recorded so far, without draining.
    pub fn names(&self) -> Vec<(u32, &'static str)> {
        self.sent
            .lock()
            .iter()
            .map(|(peer, event)| (*peer, event.name()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.lock().is_empty()
    }
}

pub struct Harness {
    pub coordinator: MatchCoordinator<StubConfig>,
    pub transport: Arc<RecordingTransport>,
    pub observer: Arc<CollectingObserver>,
}

pub fn coordinator(rules: PileRules) -> Harness {
    let transport = Arc::new(RecordingTransport::default());
    let observer = Arc::new(CollectingObserver::new());
    let coordinator = CoordinatorBuilder::<StubConfig>::new()
        .with_config(CoordinatorConfig::testing())
        .with_violation_observer(observer.clone())
        .build(rules, transport.clone())
        .expect("testing config is valid");
    Harness {
        coordinator,
        transport,
        observer,
    }
}

/// Creates a session for [`WHITE_PEER`], seats [`BLACK_PEER`] and clears the
/// recorded events.
pub fn active_session(harness: &Harness, minutes: u32) -> SessionCode {
    let code = harness
        .coordinator
        .create_game(
            &WHITE_PEER,
            CreateGame::new(ColorPreference::White, "pile", minutes),
        )
        .unwrap();
    assert_eq!(
        harness.coordinator.join_game(&BLACK_PEER, &code),
        Ok(Side::Black)
    );
    harness.transport.take();
    code
}

/// Routes coordinator logs to the test harness's captured output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}
