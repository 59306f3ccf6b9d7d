//! # Rook Relay
//!
//! Rook Relay coordinates real-time, two-player, turn-based matches between
//! peers on persistent connections. A peer creates a session and shares its
//! join code; a second peer joins with that code; the coordinator then enforces
//! turn order, runs both players' clocks, asks a rules oracle whether each move
//! is legal and whether the game is over, and resolves disconnects as forfeits.
//!
//! The crate does not own a socket. Hosts feed it inbound events (or raw JSON
//! frames) per peer through [`MatchCoordinator`], and receive outbound events
//! through their own [`Transport`](network::transport::Transport)
//! implementation, or through the bundled
//! [`ChannelTransport`](network::transport::ChannelTransport).
//!
//! ```
//! use rook_relay::prelude::*;
//! # #[cfg(feature = "chess")]
//! # {
//! use rook_relay::chess::{ChessMove, ChessRules};
//! use std::sync::Arc;
//!
//! struct Lobby;
//! impl Config for Lobby {
//!     type Peer = u64;
//!     type Rules = ChessRules;
//! }
//!
//! let transport = Arc::new(ChannelTransport::<Lobby>::new());
//! let mut white_rx = transport.connect(1);
//! let coordinator = CoordinatorBuilder::<Lobby>::new()
//!     .with_config(CoordinatorConfig::testing())
//!     .build(ChessRules::new(), transport.clone())
//!     .unwrap();
//!
//! let code = coordinator
//!     .create_game(&1, CreateGame::new(ColorPreference::White, "blitz", 5))
//!     .unwrap();
//! assert!(matches!(
//!     white_rx.try_recv(),
//!     Ok(ServerEvent::GameCreated(_))
//! ));
//! assert_eq!(coordinator.session_of(&1), Some(code));
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use error::{CreateErrorKind, JoinErrorKind, MoveErrorKind, RelayError};
pub use network::codec::{decode_frame, encode_frame, CodecError};
pub use network::transport::{ChannelTransport, PeerSignal, Transport};
pub use protocol::{ClientEvent, CreateGame, JoinGame, MakeMove, ServerEvent};
pub use rules::{DrawReason, IllegalMove, RulesOracle, TerminalStatus};
pub use sessions::builder::CoordinatorBuilder;
pub use sessions::config::CoordinatorConfig;
pub use sessions::coordinator::MatchCoordinator;
pub use sessions::session::{FinishReason, SessionSnapshot, SessionStatus};

#[cfg(feature = "chess")]
pub mod chess;
pub mod clock;
pub mod error;
pub mod prelude;
pub mod protocol;
pub mod rng;
pub mod rules;
pub mod telemetry;

pub mod sessions {
    //! Sessions, the registry that stores them, and the coordinator that drives them.
    pub mod builder;
    pub mod config;
    pub mod coordinator;
    pub mod registry;
    pub mod session;
}

pub mod network {
    //! Wire codec and the transport seam.
    pub mod codec;
    pub mod transport;
}

/// Outbound event type for a deployment.
pub type OutboundEvent<T> = ServerEvent<<<T as Config>::Rules as RulesOracle>::MoveDetail>;

/// Inbound event type for a deployment.
pub type InboundEvent<T> = ClientEvent<<<T as Config>::Rules as RulesOracle>::Move>;

/// One of the two seats in a session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Moves first.
    White,
    /// Moves second.
    Black,
}

impl Side {
    /// Both sides, white first. Seat-filling and flag checks iterate in this order.
    pub const ALL: [Side; 2] = [Side::White, Side::Black];

    /// The other side.
    #[inline]
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    /// Lowercase name, as used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Black => "black",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-shareable identifier of a session.
///
/// Codes are case-insensitive: they are normalized to uppercase on
/// construction and when decoded from the wire.
///
/// ```
/// use rook_relay::SessionCode;
///
/// let code: SessionCode = " ab12cd ".parse().unwrap();
/// assert_eq!(code.as_str(), "AB12CD");
/// assert_eq!(code, SessionCode::new("AB12CD"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct SessionCode(String);

impl SessionCode {
    /// Creates a code, normalizing it to uppercase.
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        let mut code = code.into();
        code.make_ascii_uppercase();
        Self(code)
    }

    /// The code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionCode {
    fn from(code: String) -> Self {
        Self::new(code)
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A string that cannot be a session code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSessionCodeError(String);

impl fmt::Display for ParseSessionCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` is not a session code", self.0)
    }
}

impl std::error::Error for ParseSessionCodeError {}

impl FromStr for SessionCode {
    type Err = ParseSessionCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ParseSessionCodeError(s.to_owned()));
        }
        Ok(Self::new(trimmed))
    }
}

/// Seat requested by the creator of a session.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorPreference {
    /// Play white.
    White,
    /// Play black.
    Black,
    /// Let a coin flip decide.
    Random,
}

impl ColorPreference {
    /// The requested side, or `None` for [`ColorPreference::Random`].
    #[must_use]
    pub const fn fixed(self) -> Option<Side> {
        match self {
            Self::White => Some(Side::White),
            Self::Black => Some(Side::Black),
            Self::Random => None,
        }
    }
}

/// Whole minutes on each side's clock, fixed at session creation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeControl(u32);

impl TimeControl {
    /// Creates a time control. Range checks happen where sessions are created.
    #[must_use]
    pub const fn from_minutes(minutes: u32) -> Self {
        Self(minutes)
    }

    /// Minutes per side.
    #[must_use]
    pub const fn minutes(self) -> u32 {
        self.0
    }

    /// Initial clock budget per side.
    #[must_use]
    pub const fn per_side(self) -> Duration {
        Duration::from_secs(self.0 as u64 * 60)
    }
}

/// Compile time parameterization for a coordinator.
///
/// ```
/// # #[cfg(feature = "chess")]
/// # {
/// use rook_relay::Config;
/// use rook_relay::chess::ChessRules;
///
/// struct Server;
/// impl Config for Server {
///     type Peer = String;
///     type Rules = ChessRules;
/// }
/// # }
/// ```
pub trait Config: 'static + Send + Sync {
    /// Transport-level identity of a connected peer.
    type Peer: Clone + PartialEq + Eq + Hash + Debug + Send + Sync;

    /// The rules oracle for the game being played.
    type Rules: RulesOracle;
}

// ###################
// # UNIT TESTS      #
// ###################
