//! Session Store - session lifecycle and bounded event history
//!
//! The store owns every captured session. Recording calls come from many
//! call sites, so all tables live behind one lock; observers are notified
//! after the lock is released.
//!
//! Nothing here returns an error or panics on bad input: an event that
//! cannot be attributed to a session is dropped and logged at debug level.

mod ingest;
mod observer;
mod retention;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::config::LensConfig;
use crate::types::{RuntimeSnapshot, Session, SessionId};
use crate::utils::now_ms;

pub use observer::{StoreChange, StoreObserver};

/// Mutable tables guarded by the store lock
#[derive(Debug, Default)]
pub(crate) struct StoreState {
    pub(crate) sessions: VecDeque<Session>,
    pub(crate) active: Option<SessionId>,
    pub(crate) last_updated: f64,
}

impl StoreState {
    pub(crate) fn session_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| &s.id == id)
    }
}

/// In-memory session store with bounded history
pub struct SessionStore {
    pub(crate) max_sessions: usize,
    pub(crate) state: RwLock<StoreState>,
    observers: Vec<Arc<dyn StoreObserver>>,
    next_session_id: AtomicU64,
    pub(crate) next_event_id: AtomicU64,
}

impl SessionStore {
    /// Create a store keeping at most `max_sessions` sessions
    pub fn new(max_sessions: usize) -> Self {
        Self::with_observers(max_sessions, Vec::new())
    }

    /// Create a store from configuration
    pub fn with_config(config: &LensConfig) -> Self {
        Self::new(config.max_sessions)
    }

    /// Create a store that notifies `observers` after every mutation
    pub fn with_observers(max_sessions: usize, observers: Vec<Arc<dyn StoreObserver>>) -> Self {
        Self {
            max_sessions: max_sessions.max(1),
            state: RwLock::new(StoreState::default()),
            observers,
            next_session_id: AtomicU64::new(1),
            next_event_id: AtomicU64::new(1),
        }
    }

    /// Configured history cap
    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Start a new session and make it the active one.
    ///
    /// A previously active session that was never ended stays in history,
    /// unfinished and no longer active.
    pub fn begin_session(&self, route: &str) -> SessionId {
        let seq = self.next_session_id.fetch_add(1, Ordering::SeqCst);
        let id = SessionId(format!("session-{}", seq));
        let now = now_ms();

        let evicted = {
            let mut state = self.state.write();
            if let Some(previous) = state.active.take() {
                debug!(session = %previous, "session superseded before it ended");
            }
            state.sessions.push_back(Session::new(id.clone(), route, now));
            state.active = Some(id.clone());
            state.last_updated = now;

            let StoreState {
                sessions, active, ..
            } = &mut *state;
            retention::enforce_cap(sessions, active.as_ref(), self.max_sessions)
        };

        self.notify(&StoreChange::SessionBegun {
            session_id: id.clone(),
            route: route.to_string(),
        });
        if !evicted.is_empty() {
            debug!(count = evicted.len(), "evicted sessions over retention cap");
            self.notify(&StoreChange::SessionsEvicted {
                session_ids: evicted,
            });
        }
        id
    }

    /// Finish the active session and clear the active pointer.
    ///
    /// No-op when no session is active.
    pub fn end_session(&self) -> Option<SessionId> {
        let now = now_ms();
        let ended = {
            let mut state = self.state.write();
            let id = state.active.take()?;
            if let Some(session) = state.session_mut(&id) {
                session.finish(now);
            }
            state.last_updated = now;
            id
        };
        self.notify(&StoreChange::SessionEnded {
            session_id: ended.clone(),
        });
        Some(ended)
    }

    /// Finish a specific session. Returns false if it is unknown or was
    /// already finished.
    pub fn end_session_by_id(&self, id: &SessionId) -> bool {
        let now = now_ms();
        {
            let mut state = self.state.write();
            let finished = match state.session_mut(id) {
                Some(session) => session.finish(now),
                None => false,
            };
            if !finished {
                return false;
            }
            if state.active.as_ref() == Some(id) {
                state.active = None;
            }
            state.last_updated = now;
        }
        self.notify(&StoreChange::SessionEnded {
            session_id: id.clone(),
        });
        true
    }

    /// An independent copy of the whole store
    pub fn get_snapshot(&self) -> RuntimeSnapshot {
        let state = self.state.read();
        RuntimeSnapshot {
            sessions: state.sessions.iter().cloned().collect(),
            active_session_id: state.active.clone(),
            last_updated: state.last_updated,
        }
    }

    /// Copy of one session
    pub fn get_session(&self, id: &SessionId) -> Option<Session> {
        self.state.read().sessions.iter().find(|s| &s.id == id).cloned()
    }

    pub fn active_session_id(&self) -> Option<SessionId> {
        self.state.read().active.clone()
    }

    pub fn session_count(&self) -> usize {
        self.state.read().sessions.len()
    }

    /// Timestamp of the most recent mutation
    pub fn last_updated(&self) -> f64 {
        self.state.read().last_updated
    }

    /// Drop all history and the active pointer
    pub fn clear(&self) {
        {
            let mut state = self.state.write();
            state.sessions.clear();
            state.active = None;
            state.last_updated = now_ms();
        }
        self.notify(&StoreChange::Cleared);
    }

    pub(crate) fn notify(&self, change: &StoreChange) {
        for observer in &self.observers {
            observer.on_change(change);
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_config(&LensConfig::default())
    }
}
