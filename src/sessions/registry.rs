//! Session registry: code → session, and peer → code.
//!
//! Both maps live behind one mutex so that a binding can never outlive the
//! session it points to: [`SessionRegistry::teardown`] unbinds and removes in
//! a single critical section. Each session has its own mutex, and the registry
//! lock is only ever taken *inside* a session lock (never the other way
//! around), so the two cannot deadlock.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::report_violation_to;
use crate::rng::{Pcg32, Rng};
use crate::sessions::session::Session;
use crate::telemetry::{ViolationKind, ViolationObserver, ViolationSeverity};
use crate::{Config, SessionCode};

/// Characters a join code is drawn from.
pub const CODE_ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Shared handle to one session. Lock it to read or mutate the session.
pub type SessionHandle<T> = Arc<Mutex<Session<T>>>;

struct RegistryInner<T: Config> {
    sessions: HashMap<SessionCode, SessionHandle<T>>,
    peers: HashMap<T::Peer, SessionCode>,
    rng: Pcg32,
}

impl<T: Config> RegistryInner<T> {
    fn fresh_code(&mut self, length: usize) -> SessionCode {
        let mut code = String::with_capacity(length);
        for _ in 0..length {
            let index = self.rng.gen_range(0..CODE_ALPHABET.len() as u32) as usize;
            code.push(char::from(CODE_ALPHABET[index]));
        }
        SessionCode::new(code)
    }
}

/// Concurrent store of live sessions.
pub struct SessionRegistry<T: Config> {
    inner: Mutex<RegistryInner<T>>,
    code_length: usize,
    collision_warning_threshold: u32,
    observer: Option<Arc<dyn ViolationObserver>>,
}

impl<T: Config> SessionRegistry<T> {
    /// Creates an empty registry issuing codes of `code_length` characters.
    #[must_use]
    pub fn new(
        code_length: usize,
        collision_warning_threshold: u32,
        rng: Pcg32,
        observer: Option<Arc<dyn ViolationObserver>>,
    ) -> Self {
        Self {
            inner: Mutex::new(RegistryInner {
                sessions: HashMap::new(),
                peers: HashMap::new(),
                rng,
            }),
            code_length,
            collision_warning_threshold,
            observer,
        }
    }

    /// Allocates a code that no live session uses, builds the session with
    /// `make`, and inserts it.
    ///
    /// Uniqueness is checked against the map under the lock before insertion,
    /// so two sessions can never share a code. `make` runs inside the registry
    /// lock and must not touch the registry.
    pub fn create<F>(&self, make: F) -> (SessionCode, SessionHandle<T>)
    where
        F: FnOnce(SessionCode) -> Session<T>,
    {
        let mut inner = self.inner.lock();
        self.insert_fresh(&mut inner, make)
    }

    /// Like [`create`](Self::create), but also binds `peer` to the new code in
    /// the same critical section. Returns `None`, creating nothing, if `peer`
    /// is already bound.
    pub fn create_for<F>(&self, peer: &T::Peer, make: F) -> Option<(SessionCode, SessionHandle<T>)>
    where
        F: FnOnce(SessionCode) -> Session<T>,
    {
        let mut inner = self.inner.lock();
        if inner.peers.contains_key(peer) {
            return None;
        }
        let (code, handle) = self.insert_fresh(&mut inner, make);
        inner.peers.insert(peer.clone(), code.clone());
        Some((code, handle))
    }

    fn insert_fresh<F>(&self, inner: &mut RegistryInner<T>, make: F) -> (SessionCode, SessionHandle<T>)
    where
        F: FnOnce(SessionCode) -> Session<T>,
    {
        let mut collisions = 0_u32;
        let code = loop {
            let candidate = inner.fresh_code(self.code_length);
            if !inner.sessions.contains_key(&candidate) {
                break candidate;
            }
            collisions += 1;
            if collisions == self.collision_warning_threshold {
                report_violation_to!(
                    &self.observer,
                    &candidate,
                    ViolationSeverity::Warning,
                    ViolationKind::Registry,
                    "{} consecutive code collisions with {} live sessions",
                    collisions,
                    inner.sessions.len()
                );
            }
        };
        let handle = Arc::new(Mutex::new(make(code.clone())));
        inner.sessions.insert(code.clone(), Arc::clone(&handle));
        (code, handle)
    }

    /// Looks up a live session.
    #[must_use]
    pub fn get(&self, code: &SessionCode) -> Option<SessionHandle<T>> {
        self.inner.lock().sessions.get(code).cloned()
    }

    /// Records that `peer` is seated in `code`.
    ///
    /// Returns `false`, leaving the existing binding untouched, if the peer is
    /// already bound to a different session. Binding again to the same code
    /// succeeds.
    pub fn bind(&self, peer: T::Peer, code: SessionCode) -> bool {
        let mut inner = self.inner.lock();
        match inner.peers.get(&peer) {
            Some(existing) => *existing == code,
            None => {
                inner.peers.insert(peer, code);
                true
            },
        }
    }

    /// Forgets `peer`'s binding, returning the code it pointed to.
    pub fn unbind(&self, peer: &T::Peer) -> Option<SessionCode> {
        self.inner.lock().peers.remove(peer)
    }

    /// Forgets `peer`'s binding only if it points at `code`.
    pub fn unbind_from(&self, peer: &T::Peer, code: &SessionCode) -> bool {
        let mut inner = self.inner.lock();
        if inner.peers.get(peer) == Some(code) {
            inner.peers.remove(peer);
            true
        } else {
            false
        }
    }

    /// The session `peer` is seated in.
    #[must_use]
    pub fn session_of(&self, peer: &T::Peer) -> Option<SessionCode> {
        self.inner.lock().peers.get(peer).cloned()
    }

    /// Deletes the session entry. Callers unbind its peers themselves; prefer
    /// [`teardown`](Self::teardown), which does both atomically.
    pub fn remove(&self, code: &SessionCode) -> Option<SessionHandle<T>> {
        self.inner.lock().sessions.remove(code)
    }

    /// Whether `code` still resolves to `handle`.
    #[must_use]
    pub fn holds(&self, code: &SessionCode, handle: &SessionHandle<T>) -> bool {
        self.inner
            .lock()
            .sessions
            .get(code)
            .is_some_and(|live| Arc::ptr_eq(live, handle))
    }

    /// Unbinds each of `peers` that is still bound to `code` and removes the
    /// session, in one critical section. A peer already bound elsewhere is left
    /// alone.
    ///
    /// Nothing happens unless `code` still resolves to `handle`, so a late
    /// teardown never touches a session that was issued the same code after
    /// the original one ended. Returns whether the session was removed.
    pub fn teardown<'a, I>(&self, code: &SessionCode, handle: &SessionHandle<T>, peers: I) -> bool
    where
        I: IntoIterator<Item = &'a T::Peer>,
    {
        let mut inner = self.inner.lock();
        if !inner
            .sessions
            .get(code)
            .is_some_and(|live| Arc::ptr_eq(live, handle))
        {
            return false;
        }
        for peer in peers {
            if inner.peers.get(peer) == Some(code) {
                inner.peers.remove(peer);
            }
        }
        inner.sessions.remove(code).is_some()
    }

    /// A fair coin flip from the registry's generator.
    pub fn coin_flip(&self) -> bool {
        self.inner.lock().rng.coin_flip()
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    /// Whether no session is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().sessions.is_empty()
    }

    /// Number of bound peers.
    #[must_use]
    pub fn bound_peers(&self) -> usize {
        self.inner.lock().peers.len()
    }

    /// Bindings that point at a code with no live session. Empty whenever the
    /// registry is used through the coordinator.
    #[must_use]
    pub fn dangling_bindings(&self) -> Vec<(T::Peer, SessionCode)> {
        let inner = self.inner.lock();
        inner
            .peers
            .iter()
            .filter(|(_, code)| !inner.sessions.contains_key(*code))
            .map(|(peer, code)| (peer.clone(), code.clone()))
            .collect()
    }
}

impl<T: Config> fmt::Debug for SessionRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("SessionRegistry")
            .field("sessions", &inner.sessions.len())
            .field("peers", &inner.peers.len())
            .field("code_length", &self.code_length)
            .finish_non_exhaustive()
    }
}
