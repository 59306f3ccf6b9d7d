//! A single match: board, seats, clock, and lifecycle status.

use std::fmt;

use smallvec::SmallVec;
use tokio::time::Instant;

use crate::clock::{MatchClock, TimeLeft};
use crate::rules::{DrawReason, RulesOracle};
use crate::telemetry::{InvariantChecker, InvariantViolation};
use crate::{Config, SessionCode, Side, TimeControl};

/// Board state type of a deployment.
pub type BoardState<T> = <<T as Config>::Rules as RulesOracle>::State;

/// Lifecycle of a session. `Finished` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    /// One seat is empty.
    WaitingForOpponent,
    /// Both seats are filled and the clock is running.
    Active,
    /// The match is over.
    Finished(FinishReason),
}

impl SessionStatus {
    /// Whether the session is in its terminal state.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

/// How a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FinishReason {
    /// The loser's clock reached zero.
    Timeout {
        /// The side with time remaining.
        winner: Side,
    },
    /// The side that just moved delivered mate.
    Checkmate {
        /// The mating side.
        winner: Side,
    },
    /// The side to move had no legal move.
    Stalemate,
    /// Drawn by rule.
    Draw(DrawReason),
    /// The other player disconnected mid-match.
    Forfeit {
        /// The player who stayed.
        winner: Side,
    },
    /// The only seated player left before anyone joined.
    Abandoned,
}

impl FinishReason {
    /// The winning side, or `None` for draws and abandoned sessions.
    #[must_use]
    pub const fn winner(&self) -> Option<Side> {
        match self {
            Self::Timeout { winner } | Self::Checkmate { winner } | Self::Forfeit { winner } => {
                Some(*winner)
            },
            Self::Stalemate | Self::Draw(_) | Self::Abandoned => None,
        }
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { winner } => write!(f, "{winner} wins on time"),
            Self::Checkmate { winner } => write!(f, "Checkmate: {winner} wins"),
            Self::Stalemate => write!(f, "Draw by stalemate"),
            Self::Draw(reason) => write!(f, "Draw by {reason}"),
            Self::Forfeit { winner } => write!(f, "{winner} wins by forfeit"),
            Self::Abandoned => write!(f, "Abandoned"),
        }
    }
}

/// The white and black seats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seats<P> {
    /// Occupant of the white seat.
    pub white: Option<P>,
    /// Occupant of the black seat.
    pub black: Option<P>,
}

impl<P: PartialEq + Clone> Seats<P> {
    /// Both seats empty.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            white: None,
            black: None,
        }
    }

    /// Occupant of `side`.
    #[must_use]
    pub const fn get(&self, side: Side) -> Option<&P> {
        match side {
            Side::White => self.white.as_ref(),
            Side::Black => self.black.as_ref(),
        }
    }

    fn slot_mut(&mut self, side: Side) -> &mut Option<P> {
        match side {
            Side::White => &mut self.white,
            Side::Black => &mut self.black,
        }
    }

    /// The side `peer` occupies, if any.
    #[must_use]
    pub fn side_of(&self, peer: &P) -> Option<Side> {
        Side::ALL
            .into_iter()
            .find(|side| self.get(*side) == Some(peer))
    }

    /// The first empty seat, white before black.
    #[must_use]
    pub fn first_empty(&self) -> Option<Side> {
        Side::ALL.into_iter().find(|side| self.get(*side).is_none())
    }

    /// Whether both seats are taken.
    #[must_use]
    pub const fn is_full(&self) -> bool {
        self.white.is_some() && self.black.is_some()
    }

    /// Every occupant, white first.
    #[must_use]
    pub fn occupants(&self) -> SmallVec<[P; 2]> {
        self.white.iter().chain(self.black.iter()).cloned().collect()
    }
}

/// One match between (up to) two peers.
///
/// A session is always accessed through its mutex in the registry; every method
/// here assumes the caller holds that lock.
pub struct Session<T: Config> {
    code: SessionCode,
    board: BoardState<T>,
    seats: Seats<T::Peer>,
    game_type: String,
    time_control: TimeControl,
    clock: MatchClock,
    status: SessionStatus,
}

impl<T: Config> Session<T> {
    /// A session waiting for both players, clock stopped.
    #[must_use]
    pub fn new(
        code: SessionCode,
        board: BoardState<T>,
        game_type: String,
        time_control: TimeControl,
    ) -> Self {
        Self {
            code,
            board,
            seats: Seats::empty(),
            game_type,
            time_control,
            clock: MatchClock::new(time_control.per_side()),
            status: SessionStatus::WaitingForOpponent,
        }
    }

    /// Join code.
    #[must_use]
    pub fn code(&self) -> &SessionCode {
        &self.code
    }

    /// Current position.
    #[must_use]
    pub fn board(&self) -> &BoardState<T> {
        &self.board
    }

    /// Replaces the position after the rules oracle accepted a move.
    pub fn set_board(&mut self, board: BoardState<T>) {
        self.board = board;
    }

    /// Who holds each seat.
    #[must_use]
    pub fn seats(&self) -> &Seats<T::Peer> {
        &self.seats
    }

    /// Free-form game type label chosen by the creator.
    #[must_use]
    pub fn game_type(&self) -> &str {
        &self.game_type
    }

    /// Minutes per side.
    #[must_use]
    pub const fn time_control(&self) -> TimeControl {
        self.time_control
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        self.status
    }

    /// The match clock.
    #[must_use]
    pub const fn clock(&self) -> &MatchClock {
        &self.clock
    }

    /// Mutable access to the match clock.
    pub fn clock_mut(&mut self) -> &mut MatchClock {
        &mut self.clock
    }

    /// Puts `peer` into `side`. Returns `false` if the seat is taken.
    pub fn seat(&mut self, side: Side, peer: T::Peer) -> bool {
        let slot = self.seats.slot_mut(side);
        if slot.is_some() {
            return false;
        }
        *slot = Some(peer);
        true
    }

    /// Empties `side`, returning its former occupant.
    pub fn vacate(&mut self, side: Side) -> Option<T::Peer> {
        self.seats.slot_mut(side).take()
    }

    /// Moves from `WaitingForOpponent` to `Active` and starts the clock, if
    /// both seats are filled. Returns whether the transition happened.
    pub fn activate(&mut self, now: Instant) -> bool {
        if self.status != SessionStatus::WaitingForOpponent || !self.seats.is_full() {
            return false;
        }
        self.status = SessionStatus::Active;
        self.clock.start(now);
        true
    }

    /// Enters `Finished` and stops the clock. Returns `false` if the session
    /// had already finished, in which case the first reason is kept.
    pub fn finish(&mut self, reason: FinishReason) -> bool {
        if self.status.is_finished() {
            return false;
        }
        self.clock.stop();
        self.status = SessionStatus::Finished(reason);
        true
    }

    /// Peers that should receive session-wide notifications.
    #[must_use]
    pub fn recipients(&self) -> SmallVec<[T::Peer; 2]> {
        self.seats.occupants()
    }

    /// Point-in-time copy of the session for diagnostics.
    #[must_use]
    pub fn snapshot(&self, rules: &T::Rules) -> SessionSnapshot<T::Peer> {
        SessionSnapshot {
            code: self.code.clone(),
            status: self.status,
            white: self.seats.white.clone(),
            black: self.seats.black.clone(),
            time_left: self.clock.time_left(),
            clock_running: self.clock.is_running(),
            board: rules.serialize(&self.board),
            side_to_move: rules.side_to_move(&self.board),
            game_type: self.game_type.clone(),
            time_control: self.time_control,
        }
    }
}

impl<T: Config> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("code", &self.code)
            .field("seats", &self.seats)
            .field("status", &self.status)
            .field("clock", &self.clock)
            .field("game_type", &self.game_type)
            .field("time_control", &self.time_control)
            .finish_non_exhaustive()
    }
}

impl<T: Config> InvariantChecker for Session<T> {
    /// # Invariants
    ///
    /// 1. An `Active` session has both seats filled
    /// 2. The clock runs exactly while the session is `Active`
    /// 3. The clock's own invariants hold
    fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let active = self.status == SessionStatus::Active;
        if active && !self.seats.is_full() {
            return Err(
                InvariantViolation::new("Session", "active session has an empty seat")
                    .with_details(format!("code={}", self.code)),
            );
        }
        if active != self.clock.is_running() {
            return Err(
                InvariantViolation::new("Session", "clock running state disagrees with status")
                    .with_details(format!(
                        "code={}, status={:?}, running={}",
                        self.code,
                        self.status,
                        self.clock.is_running()
                    )),
            );
        }
        self.clock.check_invariants()
    }
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot<P> {
    /// Join code.
    pub code: SessionCode,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Occupant of the white seat.
    pub white: Option<P>,
    /// Occupant of the black seat.
    pub black: Option<P>,
    /// Remaining time as of the last clock observation.
    pub time_left: TimeLeft,
    /// Whether the clock is accruing time.
    pub clock_running: bool,
    /// Serialized position.
    pub board: String,
    /// Side on the move.
    pub side_to_move: Side,
    /// Label chosen by the creator.
    pub game_type: String,
    /// Minutes per side.
    pub time_control: TimeControl,
}
