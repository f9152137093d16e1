//! Store change notifications
//!
//! Observers are handed to the store at construction and called after every
//! mutation, once the store lock has been released.

use crate::types::{EventKind, SessionId};

/// A mutation that just happened in the store
#[derive(Debug, Clone, PartialEq)]
pub enum StoreChange {
    SessionBegun {
        session_id: SessionId,
        route: String,
    },
    SessionEnded {
        session_id: SessionId,
    },
    EventRecorded {
        session_id: SessionId,
        kind: EventKind,
        event_id: String,
    },
    SessionsEvicted {
        session_ids: Vec<SessionId>,
    },
    Cleared,
}

impl StoreChange {
    /// The session this change concerns, if it is about exactly one
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            StoreChange::SessionBegun { session_id, .. }
            | StoreChange::SessionEnded { session_id }
            | StoreChange::EventRecorded { session_id, .. } => Some(session_id),
            StoreChange::SessionsEvicted { .. } | StoreChange::Cleared => None,
        }
    }
}

/// Receives store mutations
pub trait StoreObserver: Send + Sync {
    fn on_change(&self, change: &StoreChange);
}

impl<F> StoreObserver for F
where
    F: Fn(&StoreChange) + Send + Sync,
{
    fn on_change(&self, change: &StoreChange) {
        self(change)
    }
}
