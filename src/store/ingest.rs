//! Recording API
//!
//! Every call stamps the event (generated id, session route, default
//! timestamps) and appends it to one session. Calls without a resolvable
//! session drop the event; they never fail.

use std::sync::atomic::Ordering;

use tracing::debug;

use super::{SessionStore, StoreChange};
use crate::types::{
    ActionEvent, FetchEvent, RecordedEvent, RenderEvent, SessionId, StreamEvent, SuspenseEvent,
};
use crate::utils::now_ms;

impl SessionStore {
    /// Record a network call on the active session
    pub fn record_fetch_event(&self, event: FetchEvent) -> Option<String> {
        self.record_event(event)
    }

    /// Record a background action on the active session
    pub fn record_action_event(&self, event: ActionEvent) -> Option<String> {
        self.record_event(event)
    }

    /// Record a render phase on the active session
    pub fn record_render_event(&self, event: RenderEvent) -> Option<String> {
        self.record_event(event)
    }

    /// Record a deferred-content resolution on the active session
    pub fn record_suspense_event(&self, event: SuspenseEvent) -> Option<String> {
        self.record_event(event)
    }

    /// Record a delivery phase on the active session
    pub fn record_stream_event(&self, event: StreamEvent) -> Option<String> {
        self.record_event(event)
    }

    /// Record any event on the active session.
    ///
    /// Returns the stored event id, or `None` if no session is active.
    pub fn record_event(&self, event: impl Into<RecordedEvent>) -> Option<String> {
        self.record(None, event.into())
    }

    /// Record an event on an explicit session.
    ///
    /// The session does not need to be active; unknown or evicted ids drop
    /// the event.
    pub fn record_in(&self, session: &SessionId, event: impl Into<RecordedEvent>) -> Option<String> {
        self.record(Some(session), event.into())
    }

    fn record(&self, target: Option<&SessionId>, mut event: RecordedEvent) -> Option<String> {
        let now = now_ms();
        let generated = format!("evt-{}", self.next_event_id.fetch_add(1, Ordering::Relaxed));
        let kind = event.kind();

        let (session_id, event_id) = {
            let mut state = self.state.write();
            let session_id = match target.or(state.active.as_ref()) {
                Some(id) => id.clone(),
                None => {
                    debug!(%kind, "no active session, dropping event");
                    return None;
                }
            };
            let Some(session) = state.session_mut(&session_id) else {
                debug!(%kind, session = %session_id, "unknown session, dropping event");
                return None;
            };

            event.stamp(generated, &session.route, now);
            let event_id = event.id().to_string();
            session.push(event);
            state.last_updated = now;
            (session_id, event_id)
        };

        self.notify(&StoreChange::EventRecorded {
            session_id,
            kind,
            event_id: event_id.clone(),
        });
        Some(event_id)
    }
}

#[cfg(test)]
mod tests {
    use crate::store::SessionStore;
    use crate::types::*;

    #[test]
    fn test_record_without_session_is_dropped() {
        let store = SessionStore::new(10);
        assert!(store.record_fetch_event(FetchEvent::new("/api", "GET")).is_none());
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn test_record_after_end_is_dropped() {
        let store = SessionStore::new(10);
        let id = store.begin_session("/a");
        store.end_session();

        assert!(store.record_render_event(RenderEvent::new("Page", false)).is_none());
        assert_eq!(store.get_session(&id).unwrap().event_count(), 0);
    }

    #[test]
    fn test_record_stamps_event() {
        let store = SessionStore::new(10);
        let id = store.begin_session("/a");

        let event_id = store
            .record_fetch_event(FetchEvent::new("/api/users", "GET"))
            .unwrap();

        let session = store.get_session(&id).unwrap();
        let fetch = &session.fetches[0];
        assert_eq!(fetch.id, event_id);
        assert!(event_id.starts_with("evt-"));
        assert_eq!(fetch.route, "/a");
        assert!(fetch.timing.started_at.is_some());
    }

    #[test]
    fn test_record_routes_each_kind() {
        let store = SessionStore::new(10);
        let id = store.begin_session("/a");

        store.record_fetch_event(FetchEvent::new("/api", "GET"));
        store.record_action_event(ActionEvent::new("save", ActionOutcome::Success));
        store.record_render_event(RenderEvent::new("Page", true));
        store.record_suspense_event(SuspenseEvent::new("Comments"));
        store.record_stream_event(StreamEvent::new("shell"));

        let session = store.get_session(&id).unwrap();
        for kind in [
            EventKind::Network,
            EventKind::Action,
            EventKind::Render,
            EventKind::Suspense,
            EventKind::StreamPhase,
        ] {
            assert_eq!(session.count(kind), 1, "kind {}", kind);
        }
    }

    #[test]
    fn test_record_in_targets_inactive_session() {
        let store = SessionStore::new(10);
        let first = store.begin_session("/a");
        let second = store.begin_session("/b");

        assert!(store
            .record_in(&first, StreamEvent::new("chunk").at(5.0))
            .is_some());

        assert_eq!(store.get_session(&first).unwrap().stream_phases.len(), 1);
        assert_eq!(store.get_session(&second).unwrap().event_count(), 0);
        assert!(store
            .record_in(&SessionId::from("gone"), StreamEvent::new("chunk"))
            .is_none());
    }

    #[test]
    fn test_record_preserves_insertion_order() {
        let store = SessionStore::new(10);
        let id = store.begin_session("/a");
        for t in [30.0, 10.0, 20.0] {
            store.record_stream_event(StreamEvent::new("chunk").at(t));
        }
        let times: Vec<f64> = store
            .get_session(&id)
            .unwrap()
            .stream_phases
            .iter()
            .map(|e| e.time())
            .collect();
        assert_eq!(times, vec![30.0, 10.0, 20.0]);
    }

    #[test]
    fn test_concurrent_recording() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(SessionStore::new(10));
        let id = store.begin_session("/a");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        store.record_fetch_event(FetchEvent::new("/api", "GET"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get_session(&id).unwrap().fetches.len(), 400);
    }
}
