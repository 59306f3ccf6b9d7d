//! Library errors and the reasons reported back to refused peers.

use std::error::Error;
use std::fmt;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::network::codec::CodecError;

/// Errors returned by the library itself, as opposed to the per-request rejections
/// that are reported back to peers ([`CreateErrorKind`], [`JoinErrorKind`], [`MoveErrorKind`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// A configuration value was rejected while building a coordinator.
    InvalidConfig {
        /// Which setting was rejected.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
    /// Encoding or decoding a wire frame failed.
    Codec(CodecError),
}

impl Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::InvalidConfig { field, reason } => {
                write!(f, "Invalid configuration for `{}`: {}", field, reason)
            },
            RelayError::Codec(err) => write!(f, "Codec error: {}", err),
        }
    }
}

impl Error for RelayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RelayError::Codec(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CodecError> for RelayError {
    fn from(err: CodecError) -> Self {
        RelayError::Codec(err)
    }
}

/// Why a `createGame` request was refused.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CreateErrorKind {
    /// The peer is already seated in another session.
    AlreadySeated,
    /// The requested minutes per side are zero or above the configured maximum.
    InvalidTimeControl,
}

/// Why a `joinGame` request was refused.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinErrorKind {
    /// No session is registered under the code (bad or expired code).
    NotFound,
    /// Both seats are already taken.
    Full,
    /// The peer already occupies a seat, in this session or another one.
    AlreadySeated,
}

/// Why a `makeMove` request was refused.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveErrorKind {
    /// No session is registered under the code.
    NotFound,
    /// The session reached a terminal state before the move was processed.
    GameFinished,
    /// The second seat is still empty.
    WaitingForOpponent,
    /// The peer does not hold the seat whose side is on the move.
    NotYourTurn,
    /// The rules oracle rejected the move.
    InvalidMove,
}

impl Display for CreateErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadySeated => write!(f, "You are already seated in a game"),
            Self::InvalidTimeControl => write!(f, "Time control is out of range"),
        }
    }
}

impl Display for JoinErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "Game not found"),
            Self::Full => write!(f, "Game is full"),
            Self::AlreadySeated => write!(f, "You are already seated in a game"),
        }
    }
}

impl Display for MoveErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "Game not found"),
            Self::GameFinished => write!(f, "Game is already over"),
            Self::WaitingForOpponent => write!(f, "Waiting for an opponent to join"),
            Self::NotYourTurn => write!(f, "Not your turn"),
            Self::InvalidMove => write!(f, "Invalid move"),
        }
    }
}

impl Error for CreateErrorKind {}
impl Error for JoinErrorKind {}
impl Error for MoveErrorKind {}
