//! Bounded session history
//!
//! When history grows past the cap, the oldest inactive sessions go first.
//! The active session is never evicted, even when it is the oldest.

use std::collections::VecDeque;

use crate::types::{Session, SessionId};

/// Evict sessions until `sessions.len() <= max`, skipping `active`.
///
/// Returns the ids of evicted sessions, oldest first.
pub(crate) fn enforce_cap(
    sessions: &mut VecDeque<Session>,
    active: Option<&SessionId>,
    max: usize,
) -> Vec<SessionId> {
    let mut evicted = Vec::new();
    while sessions.len() > max {
        let Some(pos) = sessions.iter().position(|s| Some(&s.id) != active) else {
            break;
        };
        if let Some(session) = sessions.remove(pos) {
            evicted.push(session.id);
        }
    }
    evicted
}
