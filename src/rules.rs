//! The rules oracle seam.
//!
//! The coordinator never interprets a board itself. It hands the current state
//! and a proposed move to a [`RulesOracle`] and acts on what comes back. The
//! oracle must be pure: the same state and move always produce the same result,
//! and the input state is never modified.

use std::error::Error;
use std::fmt;
use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::Side;

/// Validates moves and reports terminal positions for one game family.
pub trait RulesOracle: Send + Sync + 'static {
    /// A complete position, owned exclusively by one session.
    type State: Clone + Debug + Send + Sync;
    /// A proposed move, as submitted by a peer.
    type Move: Serialize + DeserializeOwned + Clone + Debug + Send + Sync;
    /// Description of an accepted move, broadcast to both seats.
    type MoveDetail: Serialize + DeserializeOwned + Clone + Debug + PartialEq + Send + Sync;

    /// The initial position.
    fn new_game(&self) -> Self::State;

    /// A portable encoding of the position, sent to peers as `board`.
    fn serialize(&self, state: &Self::State) -> String;

    /// Applies `mv` to `state`, returning the successor position.
    fn apply_move(
        &self,
        state: &Self::State,
        mv: &Self::Move,
    ) -> Result<(Self::State, Self::MoveDetail), IllegalMove>;

    /// The side whose turn it is in `state`.
    fn side_to_move(&self, state: &Self::State) -> Side;

    /// Whether `state` ends the game.
    fn terminal_status(&self, state: &Self::State) -> TerminalStatus;
}

/// A move the oracle refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalMove {
    /// Why the move was refused. Logged, never sent to peers.
    pub reason: String,
}

impl IllegalMove {
    /// Creates a new refusal.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for IllegalMove {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "illegal move: {}", self.reason)
    }
}

impl Error for IllegalMove {}

/// Terminal classification of a position.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TerminalStatus {
    /// Play continues.
    Ongoing,
    /// The side to move is mated; the side that just moved wins.
    Checkmate,
    /// The side to move has no legal move and is not in check.
    Stalemate,
    /// The game is drawn for a reason other than stalemate.
    Draw(DrawReason),
}

impl TerminalStatus {
    /// Whether the game is over.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Ongoing)
    }
}

/// Why a game was drawn.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DrawReason {
    /// Neither side can deliver mate.
    InsufficientMaterial,
    /// The same position occurred for the third time.
    ThreefoldRepetition,
    /// Fifty moves by each side without a capture or pawn move.
    FiftyMoveRule,
}

impl fmt::Display for DrawReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientMaterial => write!(f, "insufficient material"),
            Self::ThreefoldRepetition => write!(f, "threefold repetition"),
            Self::FiftyMoveRule => write!(f, "fifty-move rule"),
        }
    }
}
