//! The match coordinator: create, join, move, tick and disconnect.
//!
//! Every operation that reads and then writes a session runs entirely under
//! that session's mutex, including the notifications it sends, so peers see
//! events in the order the state changed. Operations on different sessions
//! never contend beyond the registry's short critical sections.

use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::clock::Ticker;
use crate::error::{CreateErrorKind, JoinErrorKind, MoveErrorKind, RelayError};
use crate::network::codec::decode_frame;
use crate::network::transport::{PeerSignal, Transport};
use crate::protocol::{
    ClientEvent, CreateGame, GameCreated, GameJoined, GameOver, MoveMade, OpponentJoined,
    PlayerLeft, Rejection, ServerEvent, TimeUpdate, OPPONENT_NAME,
};
use crate::rng::{Pcg32, SeedableRng};
use crate::rules::{RulesOracle, TerminalStatus};
use crate::sessions::config::CoordinatorConfig;
use crate::sessions::registry::{SessionHandle, SessionRegistry};
use crate::sessions::session::{FinishReason, Session, SessionSnapshot, SessionStatus};
use crate::telemetry::{ViolationKind, ViolationObserver, ViolationSeverity};
use crate::{
    debug_check_invariants, report_violation_to, Config, InboundEvent, OutboundEvent,
    SessionCode, Side, TimeControl,
};

/// Move type of a deployment.
pub type MoveOf<T> = <<T as Config>::Rules as RulesOracle>::Move;
/// Move detail type of a deployment.
pub type MoveDetailOf<T> = <<T as Config>::Rules as RulesOracle>::MoveDetail;

/// Message sent to the remaining player when the other one disconnects mid-match.
pub const FORFEIT_MESSAGE: &str = "Your opponent disconnected. You win by forfeit.";
/// Message sent to the remaining player when the other one disconnects after the match ended.
pub const ALREADY_OVER_MESSAGE: &str = "Your opponent disconnected. The game was already over.";

/// Drives every session of one deployment.
///
/// Cheap to clone: clones share the same sessions, registry and transport.
/// Build one with [`CoordinatorBuilder`](crate::CoordinatorBuilder).
pub struct MatchCoordinator<T: Config> {
    shared: Arc<Shared<T>>,
}

impl<T: Config> Clone for MatchCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Config> std::fmt::Debug for MatchCoordinator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchCoordinator")
            .field("registry", &self.shared.registry)
            .field("config", &self.shared.config)
            .field("has_violation_observer", &self.shared.observer.is_some())
            .finish_non_exhaustive()
    }
}

struct Shared<T: Config> {
    rules: T::Rules,
    transport: Arc<dyn Transport<T>>,
    registry: SessionRegistry<T>,
    config: CoordinatorConfig,
    observer: Option<Arc<dyn ViolationObserver>>,
}

impl<T: Config> MatchCoordinator<T> {
    pub(crate) fn new(
        rules: T::Rules,
        transport: Arc<dyn Transport<T>>,
        config: CoordinatorConfig,
        observer: Option<Arc<dyn ViolationObserver>>,
    ) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => Pcg32::seed_from_u64(seed),
            None => Pcg32::from_entropy(),
        };
        let registry = SessionRegistry::new(
            config.code_length,
            config.collision_warning_threshold,
            rng,
            observer.clone(),
        );
        Self {
            shared: Arc::new(Shared {
                rules,
                transport,
                registry,
                config,
                observer,
            }),
        }
    }

    /// Opens a session with `peer` seated according to its color preference.
    ///
    /// On success the creator receives `gameCreated`; on failure it receives
    /// `createError`.
    pub fn create_game(
        &self,
        peer: &T::Peer,
        request: CreateGame,
    ) -> Result<SessionCode, CreateErrorKind> {
        let result = self.shared.create_game(peer, request);
        if let Err(reason) = result {
            debug!(peer = ?peer, %reason, "create refused");
            self.shared
                .transport
                .send(peer, ServerEvent::CreateError(Rejection::new(reason)));
        }
        result
    }

    /// Seats `peer` in the first empty seat of `code`, white before black.
    ///
    /// On success the joiner receives `gameJoined` and the seated peer receives
    /// `opponentJoined`; once both seats are filled the session becomes active
    /// and its clock starts. On failure only the joiner receives `joinError`.
    pub fn join_game(&self, peer: &T::Peer, code: &SessionCode) -> Result<Side, JoinErrorKind> {
        let result = self.shared.join_game(peer, code);
        if let Err(reason) = result {
            debug!(peer = ?peer, %code, %reason, "join refused");
            self.shared
                .transport
                .send(peer, ServerEvent::JoinError(Rejection::new(reason)));
        }
        result
    }

    /// Submits `mv` on behalf of `peer`.
    ///
    /// An accepted move is broadcast as `moveMade` and may end the session. A
    /// refused move changes nothing and is reported to `peer` alone as
    /// `moveError`.
    pub fn make_move(
        &self,
        peer: &T::Peer,
        code: &SessionCode,
        mv: MoveOf<T>,
    ) -> Result<MoveDetailOf<T>, MoveErrorKind> {
        let result = self.shared.make_move(peer, code, &mv);
        if let Err(reason) = &result {
            debug!(peer = ?peer, %code, %reason, ?mv, "move refused");
            self.shared
                .transport
                .send(peer, ServerEvent::MoveError(Rejection::new(*reason)));
        }
        result
    }

    /// Resolves `peer`'s connection closing.
    ///
    /// With an opponent present the opponent wins by forfeit and the session is
    /// removed; a lone peer's session is simply removed. Returns `false`, doing
    /// nothing, if `peer` was not seated anywhere, so repeated signals are
    /// harmless.
    pub fn disconnect(&self, peer: &T::Peer) -> bool {
        self.shared.disconnect(peer)
    }

    /// Performs one ambient clock observation for `code`, as the ticker does.
    ///
    /// Returns `false` when the session is gone or no longer active.
    pub fn tick(&self, code: &SessionCode) -> bool {
        self.shared.tick_session(code)
    }

    /// Dispatches a decoded inbound event.
    pub fn handle(&self, peer: &T::Peer, event: InboundEvent<T>) {
        trace!(peer = ?peer, ?event, "inbound event");
        match event {
            ClientEvent::CreateGame(request) => {
                let _ = self.create_game(peer, request);
            },
            ClientEvent::JoinGame(request) => {
                let _ = self.join_game(peer, &request.code);
            },
            ClientEvent::MakeMove(request) => {
                let _ = self.make_move(peer, &request.code, request.mv);
            },
        }
    }

    /// Decodes a raw text frame and dispatches it.
    ///
    /// Undecodable frames are reported as a codec violation and dropped; the
    /// peer receives nothing.
    pub fn handle_frame(&self, peer: &T::Peer, frame: &str) -> Result<(), RelayError> {
        match decode_frame::<MoveOf<T>>(frame) {
            Ok(event) => {
                self.handle(peer, event);
                Ok(())
            },
            Err(err) => {
                let violation = crate::telemetry::Violation::new(
                    ViolationSeverity::Warning,
                    ViolationKind::Codec,
                    format!("dropped undecodable frame from {peer:?}: {err}"),
                    concat!(file!(), ":", line!()),
                )
                .with_context("frame_len", frame.len().to_string());
                crate::telemetry::report_to_observer(self.shared.observer.as_ref(), &violation);
                Err(err.into())
            },
        }
    }

    /// Pumps peer signals until every sender is dropped.
    ///
    /// ```no_run
    /// # #[cfg(feature = "chess")]
    /// # {
    /// use rook_relay::chess::ChessRules;
    /// use rook_relay::prelude::*;
    /// use std::sync::Arc;
    ///
    /// struct Server;
    /// impl Config for Server {
    ///     type Peer = u64;
    ///     type Rules = ChessRules;
    /// }
    ///
    /// # async fn serve() -> Result<(), RelayError> {
    /// let transport = Arc::new(ChannelTransport::<Server>::new());
    /// let coordinator = CoordinatorBuilder::<Server>::new().build(ChessRules::new(), transport)?;
    /// let (signals, receiver) = tokio::sync::mpsc::channel(1024);
    /// tokio::spawn(coordinator.run(receiver));
    /// // Socket tasks now send PeerSignal::{Connected, Frame, Disconnected} on `signals`.
    /// # drop(signals);
    /// # Ok(())
    /// # }
    /// # }
    /// ```
    pub async fn run(self, mut signals: mpsc::Receiver<PeerSignal<T>>) {
        while let Some(signal) = signals.recv().await {
            match signal {
                PeerSignal::Connected(peer) => debug!(peer = ?peer, "peer connected"),
                PeerSignal::Event(peer, event) => self.handle(&peer, event),
                PeerSignal::Frame(peer, frame) => {
                    let _ = self.handle_frame(&peer, &frame);
                },
                PeerSignal::Disconnected(peer) => {
                    self.disconnect(&peer);
                },
            }
        }
        debug!("signal channel closed, coordinator loop exiting");
    }

    /// Point-in-time view of a live session.
    #[must_use]
    pub fn snapshot(&self, code: &SessionCode) -> Option<SessionSnapshot<T::Peer>> {
        let handle = self.shared.registry.get(code)?;
        let session = handle.lock();
        Some(session.snapshot(&self.shared.rules))
    }

    /// The session `peer` is seated in.
    #[must_use]
    pub fn session_of(&self, peer: &T::Peer) -> Option<SessionCode> {
        self.shared.registry.session_of(peer)
    }

    /// Number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.shared.registry.len()
    }

    /// The configuration this coordinator was built with.
    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.shared.config
    }

    /// The rules oracle.
    #[must_use]
    pub fn rules(&self) -> &T::Rules {
        &self.shared.rules
    }
}

impl<T: Config> Shared<T> {
    fn create_game(
        &self,
        peer: &T::Peer,
        request: CreateGame,
    ) -> Result<SessionCode, CreateErrorKind> {
        let minutes = request.time_control_minutes;
        if minutes == 0 || minutes > self.config.max_time_control_minutes {
            return Err(CreateErrorKind::InvalidTimeControl);
        }
        if self.registry.session_of(peer).is_some() {
            return Err(CreateErrorKind::AlreadySeated);
        }

        let time_control = TimeControl::from_minutes(minutes);
        let side = request.color_preference.fixed().unwrap_or_else(|| {
            if self.registry.coin_flip() {
                Side::White
            } else {
                Side::Black
            }
        });
        let board = self.rules.new_game();
        let game_type = request.game_type;

        let (code, handle) = self
            .registry
            .create_for(peer, |code| {
                let mut session = Session::new(code, board, game_type, time_control);
                session.seat(side, peer.clone());
                session
            })
            .ok_or(CreateErrorKind::AlreadySeated)?;

        let session = handle.lock();
        self.transport.send(
            peer,
            ServerEvent::GameCreated(GameCreated {
                code: code.clone(),
                color: side,
                board: self.rules.serialize(session.board()),
                game_type: session.game_type().to_owned(),
                time_control_minutes: time_control,
            }),
        );
        info!(
            %code,
            peer = ?peer,
            %side,
            game_type = session.game_type(),
            minutes,
            "session created"
        );
        debug_check_invariants!(session, "create_game");
        Ok(code)
    }

    fn join_game(
        self: &Arc<Self>,
        peer: &T::Peer,
        code: &SessionCode,
    ) -> Result<Side, JoinErrorKind> {
        let handle = self.registry.get(code).ok_or(JoinErrorKind::NotFound)?;
        let mut session = handle.lock();

        // Lost a race with teardown: the session is no longer resolvable.
        if session.status().is_finished() {
            return Err(JoinErrorKind::NotFound);
        }
        if session.seats().side_of(peer).is_some() {
            return Err(JoinErrorKind::AlreadySeated);
        }
        let side = session.seats().first_empty().ok_or(JoinErrorKind::Full)?;
        if !self.registry.bind(peer.clone(), code.clone()) {
            return Err(JoinErrorKind::AlreadySeated);
        }
        session.seat(side, peer.clone());

        let board = self.rules.serialize(session.board());
        let time_left = session.clock().time_left();
        let time_control = session.time_control();
        self.transport.send(
            peer,
            ServerEvent::GameJoined(GameJoined {
                code: code.clone(),
                color: side,
                board: board.clone(),
                opponent_name: OPPONENT_NAME.to_owned(),
                game_type: session.game_type().to_owned(),
                time_left,
                time_control_minutes: time_control,
            }),
        );
        if let Some(opponent) = session.seats().get(side.opposite()) {
            self.transport.send(
                opponent,
                ServerEvent::OpponentJoined(OpponentJoined {
                    board,
                    opponent_name: OPPONENT_NAME.to_owned(),
                    time_left,
                    time_control_minutes: time_control,
                }),
            );
        }
        info!(%code, peer = ?peer, %side, "peer joined");

        if session.activate(Instant::now()) {
            self.spawn_ticker(&mut session);
            info!(%code, "session active, clock started");
        }
        debug_check_invariants!(session, "join_game");
        Ok(side)
    }

    fn make_move(
        &self,
        peer: &T::Peer,
        code: &SessionCode,
        mv: &MoveOf<T>,
    ) -> Result<MoveDetailOf<T>, MoveErrorKind> {
        let handle = self.registry.get(code).ok_or(MoveErrorKind::NotFound)?;
        let mut session = handle.lock();

        if session.status().is_finished() {
            return Err(MoveErrorKind::GameFinished);
        }
        let mover = self.rules.side_to_move(session.board());
        if session.seats().get(mover) != Some(peer) {
            return Err(MoveErrorKind::NotYourTurn);
        }
        if session.status() == SessionStatus::WaitingForOpponent {
            return Err(MoveErrorKind::WaitingForOpponent);
        }

        let (next, detail) = self.rules.apply_move(session.board(), mv).map_err(|illegal| {
            debug!(%code, %illegal, "rules oracle refused move");
            MoveErrorKind::InvalidMove
        })?;
        session.set_board(next);

        // Charge the interval to the mover whether or not the turn passed.
        let side_to_move = self.rules.side_to_move(session.board());
        let reading =
            session
                .clock_mut()
                .tick(Instant::now(), side_to_move, side_to_move != mover);

        self.broadcast(
            &session,
            ServerEvent::MoveMade(MoveMade {
                board: self.rules.serialize(session.board()),
                move_detail: detail.clone(),
                side_to_move,
                time_left: reading.time_left,
            }),
        );
        debug!(%code, %mover, ?detail, "move accepted");

        if let Some(reason) = self.termination(&session, reading.flagged) {
            self.finish(&handle, &mut session, reason);
        }
        debug_check_invariants!(session, "make_move");
        Ok(detail)
    }

    fn tick_session(&self, code: &SessionCode) -> bool {
        let Some(handle) = self.registry.get(code) else {
            trace!(%code, "tick for removed session");
            return false;
        };
        let mut session = handle.lock();
        if session.status() != SessionStatus::Active {
            return false;
        }

        let side_to_move = self.rules.side_to_move(session.board());
        let reading = session
            .clock_mut()
            .tick(Instant::now(), side_to_move, false);
        self.broadcast(
            &session,
            ServerEvent::TimeUpdate(TimeUpdate {
                time_left: reading.time_left,
            }),
        );

        if let Some(reason) = self.termination(&session, reading.flagged) {
            self.finish(&handle, &mut session, reason);
            return false;
        }
        debug_check_invariants!(session, "tick_session");
        true
    }

    fn disconnect(&self, peer: &T::Peer) -> bool {
        let Some(code) = self.registry.session_of(peer) else {
            return false;
        };
        let Some(handle) = self.registry.get(&code) else {
            // The session ended between the two lookups.
            trace!(%code, peer = ?peer, "disconnect raced session teardown");
            self.registry.unbind_from(peer, &code);
            return false;
        };
        let mut session = handle.lock();
        if !self.registry.holds(&code, &handle) {
            trace!(%code, peer = ?peer, "disconnect raced session teardown");
            return false;
        }
        let Some(side) = session.seats().side_of(peer) else {
            report_violation_to!(
                &self.observer,
                &code,
                ViolationSeverity::Error,
                ViolationKind::Coordinator,
                "{:?} is bound to a session without holding a seat",
                peer
            );
            self.registry.unbind_from(peer, &code);
            return false;
        };

        session.clock_mut().stop();
        let already_over = session.status().is_finished();
        session.vacate(side);
        self.registry.unbind_from(peer, &code);
        debug!(%code, peer = ?peer, %side, "peer disconnected");

        let opponent = session
            .seats()
            .get(side.opposite())
            .filter(|opponent| self.registry.session_of(opponent).as_ref() == Some(&code))
            .cloned();
        match opponent {
            Some(opponent) => {
                let message = if already_over {
                    ALREADY_OVER_MESSAGE
                } else {
                    session.finish(FinishReason::Forfeit {
                        winner: side.opposite(),
                    });
                    FORFEIT_MESSAGE
                };
                self.transport.send(
                    &opponent,
                    ServerEvent::PlayerLeft(PlayerLeft {
                        message: message.to_owned(),
                    }),
                );
                self.registry.teardown(&code, &handle, [&opponent]);
                info!(%code, winner = %side.opposite(), "session ended by disconnect");
            },
            None => {
                session.finish(FinishReason::Abandoned);
                self.registry.teardown(&code, &handle, std::iter::empty());
                info!(%code, "session abandoned");
            },
        }
        debug_check_invariants!(session, "disconnect");
        true
    }

    /// Time-out first, then checkmate, then the draw conditions.
    fn termination(&self, session: &Session<T>, flagged: Option<Side>) -> Option<FinishReason> {
        if let Some(loser) = flagged {
            return Some(FinishReason::Timeout {
                winner: loser.opposite(),
            });
        }
        match self.rules.terminal_status(session.board()) {
            TerminalStatus::Ongoing => None,
            TerminalStatus::Checkmate => Some(FinishReason::Checkmate {
                winner: self.rules.side_to_move(session.board()).opposite(),
            }),
            TerminalStatus::Stalemate => Some(FinishReason::Stalemate),
            TerminalStatus::Draw(reason) => Some(FinishReason::Draw(reason)),
        }
    }

    /// Single exit path for every session that ends on the board or the clock.
    fn finish(&self, handle: &SessionHandle<T>, session: &mut Session<T>, reason: FinishReason) {
        if !session.finish(reason) {
            return;
        }
        self.broadcast(
            session,
            ServerEvent::GameOver(GameOver {
                board: self.rules.serialize(session.board()),
                reason: reason.to_string(),
            }),
        );
        let recipients = session.recipients();
        if !self.registry.teardown(session.code(), handle, recipients.iter()) {
            report_violation_to!(
                &self.observer,
                session.code(),
                ViolationSeverity::Error,
                ViolationKind::Coordinator,
                "finished session was no longer registered"
            );
        }
        info!(code = %session.code(), %reason, "session finished");
    }

    /// Sends `event` to every occupied seat.
    fn broadcast(&self, session: &Session<T>, event: OutboundEvent<T>) {
        let recipients = session.recipients();
        let Some((last, rest)) = recipients.split_last() else {
            return;
        };
        for peer in rest {
            self.transport.send(peer, event.clone());
        }
        self.transport.send(last, event);
    }

    fn spawn_ticker(self: &Arc<Self>, session: &mut Session<T>) {
        let weak = Arc::downgrade(self);
        let code = session.code().clone();
        let ticker = Ticker::spawn(self.config.tick_interval, move || match weak.upgrade() {
            Some(shared) if shared.tick_session(&code) => ControlFlow::Continue(()),
            _ => ControlFlow::Break(()),
        });
        match ticker {
            Some(ticker) => session.clock_mut().attach_ticker(ticker),
            None => report_violation_to!(
                &self.observer,
                session.code(),
                ViolationSeverity::Warning,
                ViolationKind::Clock,
                "no tokio runtime; clock only advances when a move is made"
            ),
        }
    }
}
