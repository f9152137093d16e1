//! Chronological merge of a session's event lists

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::store::{StoreChange, StoreObserver};
use crate::types::{EventKind, Session, SessionId, TimelineEntry, Timing};

fn span_entry(kind: EventKind, id: &str, timing: &Timing) -> TimelineEntry {
    TimelineEntry {
        kind,
        timestamp: timing.start(),
        duration_ms: timing.duration_ms,
        ref_id: id.to_string(),
    }
}

/// Merge every event of `session` into one list, ascending by timestamp.
///
/// Ties are broken by kind (network, action, render, suspense, stream
/// phase), then by insertion order, so identical input gives identical
/// output.
pub fn build_timeline(session: &Session) -> Vec<TimelineEntry> {
    let mut entries = Vec::with_capacity(session.event_count());

    entries.extend(
        session
            .fetches
            .iter()
            .map(|e| span_entry(EventKind::Network, &e.id, &e.timing)),
    );
    entries.extend(
        session
            .actions
            .iter()
            .map(|e| span_entry(EventKind::Action, &e.id, &e.timing)),
    );
    entries.extend(
        session
            .renders
            .iter()
            .map(|e| span_entry(EventKind::Render, &e.id, &e.timing)),
    );
    entries.extend(
        session
            .suspenses
            .iter()
            .map(|e| span_entry(EventKind::Suspense, &e.id, &e.timing)),
    );
    entries.extend(session.stream_phases.iter().map(|e| TimelineEntry {
        kind: EventKind::StreamPhase,
        timestamp: e.time(),
        duration_ms: None,
        ref_id: e.id.clone(),
    }));

    // stable: equal (timestamp, kind) keep insertion order
    entries.sort_by(|a, b| {
        a.timestamp
            .total_cmp(&b.timestamp)
            .then_with(|| a.kind.cmp(&b.kind))
    });
    entries
}

/// A built timeline and the event count of the session it came from
struct CachedTimeline {
    event_count: usize,
    timeline: Arc<Vec<TimelineEntry>>,
}

/// Memoized timelines, invalidated through the store observer hook.
///
/// Entries are tagged with the event count they were built from, so a
/// timeline built from an outdated session copy never shadows a newer one.
#[derive(Default)]
pub struct TimelineCache {
    entries: Mutex<HashMap<SessionId, CachedTimeline>>,
}

impl TimelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached timeline for `session`, building it on a miss
    pub fn get_or_build(&self, session: &Session) -> Arc<Vec<TimelineEntry>> {
        let event_count = session.event_count();
        if let Some(hit) = self.entries.lock().get(&session.id) {
            if hit.event_count == event_count {
                return hit.timeline.clone();
            }
        }

        let built = Arc::new(build_timeline(session));
        let mut entries = self.entries.lock();
        // event lists are append-only: a larger count is always the newer copy
        let newer_cached = entries
            .get(&session.id)
            .is_some_and(|cached| cached.event_count > event_count);
        if !newer_cached {
            entries.insert(
                session.id.clone(),
                CachedTimeline {
                    event_count,
                    timeline: built.clone(),
                },
            );
        }
        built
    }

    pub fn invalidate(&self, id: &SessionId) {
        self.entries.lock().remove(id);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StoreObserver for TimelineCache {
    fn on_change(&self, change: &StoreChange) {
        match change {
            StoreChange::EventRecorded { session_id, .. } => self.invalidate(session_id),
            StoreChange::SessionsEvicted { session_ids } => {
                let mut entries = self.entries.lock();
                for id in session_ids {
                    entries.remove(id);
                }
            }
            StoreChange::Cleared => self.entries.lock().clear(),
            StoreChange::SessionBegun { .. } | StoreChange::SessionEnded { .. } => {}
        }
    }
}
