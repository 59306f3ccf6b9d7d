//! The transport seam.
//!
//! The coordinator addresses every outbound event to one peer at a time;
//! "broadcast" is just sending the same event to each occupied seat. Delivery
//! must not block, since sends happen while a session's lock is held so that
//! peers observe notifications in the same order as the state changes they
//! describe.
//!
//! [`ChannelTransport`] is an in-process implementation backed by tokio
//! unbounded channels: the host task owning a peer's socket holds the receiving
//! end and writes whatever arrives (typically after
//! [`encode_frame`](crate::network::codec::encode_frame)).
//!
//! ```
//! # #[cfg(feature = "chess")]
//! # {
//! use rook_relay::chess::ChessRules;
//! use rook_relay::network::transport::{ChannelTransport, Transport};
//! use rook_relay::protocol::{PlayerLeft, ServerEvent};
//! use rook_relay::Config;
//!
//! struct Server;
//! impl Config for Server {
//!     type Peer = u32;
//!     type Rules = ChessRules;
//! }
//!
//! let transport = ChannelTransport::<Server>::new();
//! let mut rx = transport.connect(7);
//! transport.send(&7, ServerEvent::PlayerLeft(PlayerLeft { message: "bye".into() }));
//! assert!(rx.try_recv().is_ok());
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::telemetry::{
    report_to_observer, Violation, ViolationKind, ViolationObserver, ViolationSeverity,
};
use crate::{Config, InboundEvent, OutboundEvent};

/// Delivers outbound events to individual peers.
pub trait Transport<T: Config>: Send + Sync {
    /// Queues `event` for `peer`. Must not block; undeliverable events are dropped.
    fn send(&self, peer: &T::Peer, event: OutboundEvent<T>);
}

/// Lifecycle and traffic signals fed into
/// [`MatchCoordinator::run`](crate::MatchCoordinator::run).
pub enum PeerSignal<T: Config> {
    /// A peer opened a connection.
    Connected(T::Peer),
    /// A peer sent an already-decoded event.
    Event(T::Peer, InboundEvent<T>),
    /// A peer sent a raw text frame, to be decoded by the coordinator.
    Frame(T::Peer, String),
    /// A peer's connection closed.
    Disconnected(T::Peer),
}

impl<T: Config> fmt::Debug for PeerSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected(peer) => f.debug_tuple("Connected").field(peer).finish(),
            Self::Event(peer, event) => f.debug_tuple("Event").field(peer).field(event).finish(),
            Self::Frame(peer, frame) => f.debug_tuple("Frame").field(peer).field(frame).finish(),
            Self::Disconnected(peer) => f.debug_tuple("Disconnected").field(peer).finish(),
        }
    }
}

/// In-process [`Transport`] with one unbounded channel per connected peer.
pub struct ChannelTransport<T: Config> {
    peers: Mutex<HashMap<T::Peer, UnboundedSender<OutboundEvent<T>>>>,
    observer: Option<Arc<dyn ViolationObserver>>,
}

impl<T: Config> ChannelTransport<T> {
    /// Creates a transport with no connected peers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            peers: Mutex::new(HashMap::new()),
            observer: None,
        }
    }

    /// Reports dropped deliveries to `observer` instead of the log.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ViolationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Opens a channel for `peer` and returns its receiving end. A previous
    /// channel for the same peer is replaced.
    pub fn connect(&self, peer: T::Peer) -> UnboundedReceiver<OutboundEvent<T>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers.lock().insert(peer, tx);
        rx
    }

    /// Closes `peer`'s channel. Returns `false` if it was not connected.
    pub fn disconnect(&self, peer: &T::Peer) -> bool {
        self.peers.lock().remove(peer).is_some()
    }

    /// Whether `peer` has an open channel.
    #[must_use]
    pub fn is_connected(&self, peer: &T::Peer) -> bool {
        self.peers.lock().contains_key(peer)
    }

    /// Number of open channels.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.peers.lock().len()
    }

    fn report_drop(&self, peer: &T::Peer, event: &'static str, why: &str) {
        let violation = Violation::new(
            ViolationSeverity::Warning,
            ViolationKind::Transport,
            format!("dropped {event} for peer {peer:?}: {why}"),
            concat!(file!(), ":", line!()),
        )
        .with_context("event", event);
        report_to_observer(self.observer.as_ref(), &violation);
    }
}

impl<T: Config> Default for ChannelTransport<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Config> Transport<T> for ChannelTransport<T> {
    fn send(&self, peer: &T::Peer, event: OutboundEvent<T>) {
        let name = event.name();
        let mut peers = self.peers.lock();
        let Some(sender) = peers.get(peer) else {
            drop(peers);
            self.report_drop(peer, name, "not connected");
            return;
        };
        if sender.send(event).is_err() {
            // Receiver dropped without an explicit disconnect.
            peers.remove(peer);
            drop(peers);
            self.report_drop(peer, name, "receiver closed");
        }
    }
}

impl<T: Config> fmt::Debug for ChannelTransport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelTransport")
            .field("peers", &self.peer_count())
            .field("has_observer", &self.observer.is_some())
            .finish()
    }
}
