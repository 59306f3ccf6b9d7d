//! Events exchanged between peers and the coordinator.
//!
//! On the wire every event is a JSON object with the event name under
//! `"event"` and its payload under `"payload"`:
//!
//! ```
//! use rook_relay::protocol::{ClientEvent, JoinGame};
//! use rook_relay::SessionCode;
//!
//! let frame = r#"{"event":"joinGame","payload":{"code":"q7x2mz"}}"#;
//! let event: ClientEvent<String> = serde_json::from_str(frame).unwrap();
//! assert_eq!(
//!     event,
//!     ClientEvent::JoinGame(JoinGame { code: SessionCode::new("Q7X2MZ") })
//! );
//! ```

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::clock::TimeLeft;
use crate::error::{CreateErrorKind, JoinErrorKind, MoveErrorKind};
use crate::{ColorPreference, SessionCode, Side, TimeControl};

/// Placeholder sent as the opponent's display name. Peers are anonymous.
pub const OPPONENT_NAME: &str = "Opponent";

/// Events a peer sends to the coordinator. `M` is the rules oracle's move type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum ClientEvent<M> {
    /// Open a new session and take a seat in it.
    CreateGame(CreateGame),
    /// Take the free seat of an existing session.
    JoinGame(JoinGame),
    /// Submit a move in a session the peer is seated in.
    MakeMove(MakeMove<M>),
}

/// Payload of [`ClientEvent::CreateGame`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGame {
    /// Requested seat.
    pub color_preference: ColorPreference,
    /// Free-form label (e.g. "blitz"), echoed back to both peers.
    pub game_type: String,
    /// Minutes on each clock.
    pub time_control_minutes: u32,
}

impl CreateGame {
    /// Convenience constructor.
    #[must_use]
    pub fn new(
        color_preference: ColorPreference,
        game_type: impl Into<String>,
        time_control_minutes: u32,
    ) -> Self {
        Self {
            color_preference,
            game_type: game_type.into(),
            time_control_minutes,
        }
    }
}

/// Payload of [`ClientEvent::JoinGame`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinGame {
    /// Code shared by the session's creator.
    pub code: SessionCode,
}

/// Payload of [`ClientEvent::MakeMove`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MakeMove<M> {
    /// Session the move belongs to.
    pub code: SessionCode,
    /// The proposed move, in whatever form the rules oracle accepts.
    #[serde(rename = "move")]
    pub mv: M,
}

/// Events the coordinator sends to peers. `D` is the rules oracle's move detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum ServerEvent<D> {
    /// Reply to the creator of a session.
    GameCreated(GameCreated),
    /// A `createGame` request was refused.
    CreateError(Rejection<CreateErrorKind>),
    /// Reply to the peer that took the second seat.
    GameJoined(GameJoined),
    /// Sent to the seated peer when the other seat is filled.
    OpponentJoined(OpponentJoined),
    /// A `joinGame` request was refused.
    JoinError(Rejection<JoinErrorKind>),
    /// A move was accepted. Sent to both seats.
    MoveMade(MoveMade<D>),
    /// A `makeMove` request was refused.
    MoveError(Rejection<MoveErrorKind>),
    /// Ambient clock refresh. Sent to both seats.
    TimeUpdate(TimeUpdate),
    /// The session has ended. Sent to both seats.
    GameOver(GameOver),
    /// The other seat disconnected.
    PlayerLeft(PlayerLeft),
}

impl<D> ServerEvent<D> {
    /// The event name used on the wire.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GameCreated(_) => "gameCreated",
            Self::CreateError(_) => "createError",
            Self::GameJoined(_) => "gameJoined",
            Self::OpponentJoined(_) => "opponentJoined",
            Self::JoinError(_) => "joinError",
            Self::MoveMade(_) => "moveMade",
            Self::MoveError(_) => "moveError",
            Self::TimeUpdate(_) => "timeUpdate",
            Self::GameOver(_) => "gameOver",
            Self::PlayerLeft(_) => "playerLeft",
        }
    }
}

/// Sent to the creator of a new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameCreated {
    /// Join code to share with the opponent.
    pub code: SessionCode,
    /// Seat the creator was given.
    pub color: Side,
    /// Starting position.
    pub board: String,
    /// Game type label from the request.
    pub game_type: String,
    /// Minutes per side.
    pub time_control_minutes: TimeControl,
}

/// Sent to a peer that took the remaining seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameJoined {
    /// Code of the joined session.
    pub code: SessionCode,
    /// Seat the joiner was given.
    pub color: Side,
    /// Current position.
    pub board: String,
    /// Display name of the opponent, always [`OPPONENT_NAME`].
    pub opponent_name: String,
    /// Game type label chosen by the creator.
    pub game_type: String,
    /// Both clocks at the moment of joining.
    pub time_left: TimeLeft,
    /// Minutes per side.
    pub time_control_minutes: TimeControl,
}

/// Sent to the seated peer when an opponent joins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpponentJoined {
    /// Current position.
    pub board: String,
    /// Display name of the opponent, always [`OPPONENT_NAME`].
    pub opponent_name: String,
    /// Both clocks at the moment of joining.
    pub time_left: TimeLeft,
    /// Minutes per side.
    pub time_control_minutes: TimeControl,
}

/// Broadcast after an accepted move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveMade<D> {
    /// Position after the move.
    pub board: String,
    /// What the rules oracle reported about the move.
    pub move_detail: D,
    /// Side whose turn it now is.
    pub side_to_move: Side,
    /// Both clocks after the move was charged.
    pub time_left: TimeLeft,
}

/// Broadcast on every ambient tick of an active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeUpdate {
    /// Both clocks after the tick was charged.
    pub time_left: TimeLeft,
}

/// Final position and a human-readable reason, e.g. "white wins on time".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOver {
    /// Final position.
    pub board: String,
    /// How the game ended.
    pub reason: String,
}

/// Sent to the remaining peer when its opponent disconnects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLeft {
    /// Forfeit or "game already over" notice.
    pub message: String,
}

/// A refused request: machine-readable reason plus its rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection<K> {
    /// Why the request was refused.
    pub reason: K,
    /// Human-readable rendering of `reason`.
    pub message: String,
}

impl<K: Display> Rejection<K> {
    /// Builds a rejection from its reason.
    #[must_use]
    pub fn new(reason: K) -> Self {
        let message = reason.to_string();
        Self { reason, message }
    }
}
