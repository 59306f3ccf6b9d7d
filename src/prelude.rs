//! Convenient re-exports for common usage.
//!
//! ```rust
//! use rook_relay::prelude::*;
//! ```
//!
//! # What's Included
//!
//! - **Coordinator**: [`MatchCoordinator`], [`CoordinatorBuilder`], [`CoordinatorConfig`]
//! - **Core traits**: [`Config`], [`RulesOracle`], [`Transport`]
//! - **Transport**: [`ChannelTransport`], [`PeerSignal`]
//! - **Protocol**: [`ClientEvent`], [`ServerEvent`], [`CreateGame`], [`JoinGame`], [`MakeMove`]
//! - **Fundamental types**: [`Side`], [`SessionCode`], [`ColorPreference`], [`TimeControl`], [`TimeLeft`]
//! - **Session state**: [`SessionStatus`], [`FinishReason`], [`SessionSnapshot`]
//! - **Error handling**: [`RelayError`], [`CreateErrorKind`], [`JoinErrorKind`], [`MoveErrorKind`]

// Coordinator
pub use crate::sessions::builder::CoordinatorBuilder;
pub use crate::sessions::config::CoordinatorConfig;
pub use crate::sessions::coordinator::MatchCoordinator;

// Core traits
pub use crate::network::transport::Transport;
pub use crate::rules::{IllegalMove, RulesOracle, TerminalStatus};
pub use crate::Config;

// Transport
pub use crate::network::transport::{ChannelTransport, PeerSignal};

// Protocol
pub use crate::protocol::{ClientEvent, CreateGame, JoinGame, MakeMove, ServerEvent};

// Fundamental types
pub use crate::clock::TimeLeft;
pub use crate::{ColorPreference, SessionCode, Side, TimeControl};

// Session state
pub use crate::sessions::session::{FinishReason, SessionSnapshot, SessionStatus};

// Error handling
pub use crate::error::{CreateErrorKind, JoinErrorKind, MoveErrorKind, RelayError};
