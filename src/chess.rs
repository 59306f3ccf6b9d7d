//! Standard chess rules oracle backed by `shakmaty`.
//!
//! Positions are exchanged as FEN. Peers may submit a move as UCI (`"e2e4"`,
//! `"e7e8q"`), as SAN (`"Nf3"`, `"exd5"`, `"O-O"`), or as an object naming the
//! squares (`{"from": "e7", "to": "e8", "promotion": "q"}`).
//!
//! ```
//! use rook_relay::chess::{ChessMove, ChessRules};
//! use rook_relay::{RulesOracle, Side, TerminalStatus};
//!
//! let rules = ChessRules::new();
//! let start = rules.new_game();
//! let (next, detail) = rules.apply_move(&start, &ChessMove::notation("e4")).unwrap();
//! assert_eq!(detail.uci, "e2e4");
//! assert_eq!(rules.side_to_move(&next), Side::Black);
//! assert_eq!(rules.terminal_status(&next), TerminalStatus::Ongoing);
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::san::{San, SanPlus};
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Position};

use crate::rules::{DrawReason, IllegalMove, RulesOracle, TerminalStatus};
use crate::Side;

/// A move as submitted by a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChessMove {
    /// UCI or SAN text.
    Notation(String),
    /// Origin and target squares, with an optional promotion piece letter.
    Squares {
        /// Origin square, e.g. `"e7"`.
        from: String,
        /// Target square, e.g. `"e8"`.
        to: String,
        /// Promotion piece letter (`q`, `r`, `b`, `n`).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        promotion: Option<String>,
    },
}

impl ChessMove {
    /// A move in UCI or SAN notation.
    #[must_use]
    pub fn notation(text: impl Into<String>) -> Self {
        Self::Notation(text.into())
    }
}

/// What an accepted move did, broadcast to both seats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChessMoveDetail {
    /// Side that made the move.
    pub side: Side,
    /// Origin square.
    pub from: String,
    /// Target square.
    pub to: String,
    /// Standard algebraic notation, with `+`/`#` suffix.
    pub san: String,
    /// UCI notation.
    pub uci: String,
    /// Promotion piece letter, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<String>,
    /// Whether a piece was captured.
    pub capture: bool,
    /// Whether the move gives check.
    pub check: bool,
}

/// A position plus the repetition history needed for draw detection.
#[derive(Debug, Clone)]
pub struct ChessState {
    position: Chess,
    repetitions: HashMap<String, u8>,
}

impl ChessState {
    fn new(position: Chess) -> Self {
        let mut state = Self {
            position,
            repetitions: HashMap::new(),
        };
        state.record_position();
        state
    }

    /// Parses a position from FEN.
    pub fn from_fen(fen: &str) -> Result<Self, InvalidFen> {
        let parsed: Fen = fen.parse().map_err(|e| InvalidFen(format!("{e}")))?;
        let position: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| InvalidFen(format!("{e}")))?;
        Ok(Self::new(position))
    }

    /// The underlying position.
    #[must_use]
    pub fn position(&self) -> &Chess {
        &self.position
    }

    /// The position as FEN.
    #[must_use]
    pub fn fen(&self) -> String {
        Fen::from_position(self.position.clone(), EnPassantMode::Legal).to_string()
    }

    /// How many times the current position has occurred.
    #[must_use]
    pub fn occurrences(&self) -> u8 {
        self.repetitions
            .get(&self.repetition_key())
            .copied()
            .unwrap_or(0)
    }

    // Placement, side to move, castling rights, en passant square. The move
    // counters are left out so that repeated positions compare equal.
    fn repetition_key(&self) -> String {
        let fen = self.fen();
        let mut fields = fen.split(' ').take(4);
        let mut key = String::with_capacity(fen.len());
        if let Some(first) = fields.next() {
            key.push_str(first);
        }
        for field in fields {
            key.push(' ');
            key.push_str(field);
        }
        key
    }

    fn record_position(&mut self) {
        // A capture or pawn move makes every earlier position unreachable.
        if self.position.halfmoves() == 0 {
            self.repetitions.clear();
        }
        let count = self.repetitions.entry(self.repetition_key()).or_insert(0);
        *count = count.saturating_add(1);
    }
}

/// A FEN string that does not describe a legal chess position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidFen(String);

impl fmt::Display for InvalidFen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid FEN: {}", self.0)
    }
}

impl std::error::Error for InvalidFen {}

/// Standard chess.
#[derive(Debug, Clone)]
pub struct ChessRules {
    start: ChessState,
}

impl ChessRules {
    /// Games start from the standard initial position.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: ChessState::new(Chess::default()),
        }
    }

    /// Games start from the given position instead.
    pub fn from_fen(fen: &str) -> Result<Self, InvalidFen> {
        Ok(Self {
            start: ChessState::from_fen(fen)?,
        })
    }

    fn resolve(&self, position: &Chess, mv: &ChessMove) -> Result<Move, IllegalMove> {
        match mv {
            ChessMove::Notation(text) => {
                let text = text.trim();
                if let Ok(uci) = text.parse::<UciMove>() {
                    if let Ok(m) = uci.to_move(position) {
                        return Ok(m);
                    }
                }
                let san: SanPlus = text
                    .parse()
                    .map_err(|_| IllegalMove::new(format!("unreadable move `{text}`")))?;
                san.san
                    .to_move(position)
                    .map_err(|e| IllegalMove::new(format!("`{text}`: {e}")))
            },
            ChessMove::Squares {
                from,
                to,
                promotion,
            } => {
                let text = format!(
                    "{}{}{}",
                    from.trim().to_ascii_lowercase(),
                    to.trim().to_ascii_lowercase(),
                    promotion
                        .as_deref()
                        .map(|p| p.trim().to_ascii_lowercase())
                        .unwrap_or_default()
                );
                let uci: UciMove = text
                    .parse()
                    .map_err(|_| IllegalMove::new(format!("unreadable squares `{text}`")))?;
                uci.to_move(position)
                    .map_err(|e| IllegalMove::new(format!("`{text}`: {e}")))
            },
        }
    }
}

impl Default for ChessRules {
    fn default() -> Self {
        Self::new()
    }
}

const fn side_of(color: Color) -> Side {
    match color {
        Color::White => Side::White,
        Color::Black => Side::Black,
    }
}

impl RulesOracle for ChessRules {
    type State = ChessState;
    type Move = ChessMove;
    type MoveDetail = ChessMoveDetail;

    fn new_game(&self) -> ChessState {
        self.start.clone()
    }

    fn serialize(&self, state: &ChessState) -> String {
        state.fen()
    }

    fn apply_move(
        &self,
        state: &ChessState,
        mv: &ChessMove,
    ) -> Result<(ChessState, ChessMoveDetail), IllegalMove> {
        let before = &state.position;
        let m = self.resolve(before, mv)?;

        let san = San::from_move(before, &m);
        let uci = UciMove::from_move(&m, CastlingMode::Standard);
        let mut next = state.clone();
        next.position.play_unchecked(&m);
        next.record_position();

        let after = &next.position;
        let mut san_text = san.to_string();
        if after.is_checkmate() {
            san_text.push('#');
        } else if after.is_check() {
            san_text.push('+');
        }

        let detail = ChessMoveDetail {
            side: side_of(before.turn()),
            from: m.from().map_or_else(String::new, |sq| sq.to_string()),
            to: m.to().to_string(),
            san: san_text,
            uci: uci.to_string(),
            promotion: m.promotion().map(|role| role.char().to_string()),
            capture: m.is_capture(),
            check: after.is_check(),
        };
        Ok((next, detail))
    }

    fn side_to_move(&self, state: &ChessState) -> Side {
        side_of(state.position.turn())
    }

    fn terminal_status(&self, state: &ChessState) -> TerminalStatus {
        let position = &state.position;
        if position.is_checkmate() {
            TerminalStatus::Checkmate
        } else if position.is_stalemate() {
            TerminalStatus::Stalemate
        } else if position.is_insufficient_material() {
            TerminalStatus::Draw(DrawReason::InsufficientMaterial)
        } else if state.occurrences() >= 3 {
            TerminalStatus::Draw(DrawReason::ThreefoldRepetition)
        } else if position.halfmoves() >= 100 {
            TerminalStatus::Draw(DrawReason::FiftyMoveRule)
        } else {
            TerminalStatus::Ongoing
        }
    }
}
