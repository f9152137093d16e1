//! Snapshot sources polled by the change detector

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::analysis::{compute_metrics, detect_waterfalls};
use crate::store::SessionStore;
use crate::types::{ActionOutcome, RuntimeSnapshot};

/// Latest state of one topic, as pushed in an `update` event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSnapshot {
    pub topic: String,
    pub last_updated: f64,
    /// Structural counts folded into the fingerprint
    pub counts: BTreeMap<String, usize>,
    pub payload: Value,
}

impl TopicSnapshot {
    pub fn new(topic: impl Into<String>, last_updated: f64, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            last_updated,
            counts: BTreeMap::new(),
            payload,
        }
    }

    pub fn with_count(mut self, name: &str, count: usize) -> Self {
        self.counts.insert(name.to_string(), count);
        self
    }

    /// Cheap change marker: last-updated time plus the structural counts.
    /// Proportional to the number of counts, not to the payload size.
    pub fn fingerprint(&self) -> String {
        let mut fp = format!("{}", self.last_updated);
        for (name, count) in &self.counts {
            fp.push_str(&format!("|{}={}", name, count));
        }
        fp
    }
}

/// Supplies the latest snapshot for a topic; `None` means unavailable
pub trait SnapshotSource: Send + Sync + 'static {
    fn fetch(&self, topic: &str) -> BoxFuture<'static, Option<TopicSnapshot>>;
}

impl<F> SnapshotSource for F
where
    F: Fn(&str) -> BoxFuture<'static, Option<TopicSnapshot>> + Send + Sync + 'static,
{
    fn fetch(&self, topic: &str) -> BoxFuture<'static, Option<TopicSnapshot>> {
        self(topic)
    }
}

/// Topic served with the whole store snapshot
pub const TOPIC_RUNTIME: &str = "runtime";
/// Topic served with metrics and waterfalls of the latest session
pub const TOPIC_PERFORMANCE: &str = "performance";
/// Topic served with failed actions and error responses
pub const TOPIC_ERRORS: &str = "errors";

/// In-process source reading straight from a [`SessionStore`]
#[derive(Clone)]
pub struct StoreSource {
    store: Arc<SessionStore>,
}

impl StoreSource {
    pub fn new(store: Arc<SessionStore>) -> Self {
        Self { store }
    }

    /// Build the snapshot for `topic`, `None` for unknown topics
    pub fn snapshot(&self, topic: &str) -> Option<TopicSnapshot> {
        let runtime = self.store.get_snapshot();
        let result = match topic {
            TOPIC_RUNTIME => runtime_topic(&runtime),
            TOPIC_PERFORMANCE => performance_topic(&runtime),
            TOPIC_ERRORS => errors_topic(&runtime),
            _ => return None,
        };
        match result {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(topic, error = %e, "failed to build topic snapshot");
                None
            }
        }
    }
}

impl SnapshotSource for StoreSource {
    fn fetch(&self, topic: &str) -> BoxFuture<'static, Option<TopicSnapshot>> {
        let snapshot = self.snapshot(topic);
        Box::pin(async move { snapshot })
    }
}

fn runtime_topic(runtime: &RuntimeSnapshot) -> serde_json::Result<TopicSnapshot> {
    let events: usize = runtime.sessions.iter().map(|s| s.event_count()).sum();
    let finished = runtime.sessions.iter().filter(|s| s.is_finished()).count();
    Ok(
        TopicSnapshot::new(TOPIC_RUNTIME, runtime.last_updated, serde_json::to_value(runtime)?)
            .with_count("sessions", runtime.sessions.len())
            .with_count("events", events)
            .with_count("finished", finished)
            .with_count("active", runtime.active_session_id.is_some() as usize),
    )
}

fn performance_topic(runtime: &RuntimeSnapshot) -> serde_json::Result<TopicSnapshot> {
    let payload = match runtime.latest_session() {
        Some(session) => {
            let metrics = serde_json::to_value(compute_metrics(session))?;
            let waterfalls = serde_json::to_value(detect_waterfalls(session))?;
            json!({
                "sessionId": session.id,
                "route": session.route,
                "metrics": metrics,
                "waterfalls": waterfalls,
            })
        }
        None => Value::Null,
    };
    // the payload only depends on the latest session, whose event lists are
    // append-only: its start time and event count identify it
    let (started_at, events) = runtime
        .latest_session()
        .map_or((0.0, 0), |s| (s.started_at, s.event_count()));
    Ok(TopicSnapshot::new(TOPIC_PERFORMANCE, started_at, payload).with_count("latestEvents", events))
}

fn errors_topic(runtime: &RuntimeSnapshot) -> serde_json::Result<TopicSnapshot> {
    let mut failed_actions = Vec::new();
    let mut failed_fetches = Vec::new();
    for session in &runtime.sessions {
        failed_actions.extend(
            session
                .actions
                .iter()
                .filter(|a| a.outcome == ActionOutcome::Error),
        );
        failed_fetches.extend(
            session
                .fetches
                .iter()
                .filter(|f| f.status.is_some_and(|s| s >= 400)),
        );
    }
    let counts = (failed_actions.len(), failed_fetches.len());
    // unrelated store mutations must not look like a change here
    let latest = failed_actions
        .iter()
        .map(|a| a.timing.finish())
        .chain(failed_fetches.iter().map(|f| f.timing.finish()))
        .fold(0.0, f64::max);
    let actions = serde_json::to_value(&failed_actions)?;
    let fetches = serde_json::to_value(&failed_fetches)?;
    let payload = json!({ "actions": actions, "fetches": fetches });
    Ok(TopicSnapshot::new(TOPIC_ERRORS, latest, payload)
        .with_count("actions", counts.0)
        .with_count("fetches", counts.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;

    #[test]
    fn test_fingerprint_ignores_payload() {
        let a = TopicSnapshot::new("runtime", 5.0, json!({"big": [1, 2, 3]})).with_count("n", 1);
        let b = TopicSnapshot::new("runtime", 5.0, json!({"big": [4]})).with_count("n", 1);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_fingerprint_tracks_counts_and_time() {
        let base = TopicSnapshot::new("runtime", 5.0, Value::Null).with_count("n", 1);
        let more = TopicSnapshot::new("runtime", 5.0, Value::Null).with_count("n", 2);
        let later = TopicSnapshot::new("runtime", 6.0, Value::Null).with_count("n", 1);
        assert_ne!(base.fingerprint(), more.fingerprint());
        assert_ne!(base.fingerprint(), later.fingerprint());
    }

    #[test]
    fn test_store_source_runtime_counts() {
        let store = Arc::new(SessionStore::new(10));
        store.begin_session("/a");
        store.record_fetch_event(FetchEvent::new("/api", "GET"));
        let source = StoreSource::new(store);

        let snapshot = source.snapshot(TOPIC_RUNTIME).unwrap();
        assert_eq!(snapshot.counts["sessions"], 1);
        assert_eq!(snapshot.counts["events"], 1);
        assert_eq!(snapshot.counts["active"], 1);
        assert!(snapshot.payload["sessions"].is_array());
    }

    #[test]
    fn test_store_source_errors_topic() {
        let store = Arc::new(SessionStore::new(10));
        store.begin_session("/a");
        store.record_fetch_event(FetchEvent::new("/api", "GET").with_status(500));
        store.record_fetch_event(FetchEvent::new("/api", "GET").with_status(200));
        store.record_action_event(ActionEvent::new("save", ActionOutcome::Error));
        let source = StoreSource::new(store);

        let snapshot = source.snapshot(TOPIC_ERRORS).unwrap();
        assert_eq!(snapshot.counts["fetches"], 1);
        assert_eq!(snapshot.counts["actions"], 1);
    }

    #[test]
    fn test_errors_fingerprint_ignores_unrelated_mutations() {
        let store = Arc::new(SessionStore::new(10));
        store.begin_session("/a");
        store.record_action_event(ActionEvent::new("save", ActionOutcome::Error));
        let source = StoreSource::new(store.clone());
        let before = source.snapshot(TOPIC_ERRORS).unwrap().fingerprint();

        store.record_fetch_event(FetchEvent::new("/api", "GET").with_status(200));
        store.record_render_event(RenderEvent::new("Page", false));
        store.end_session();
        store.begin_session("/b");
        assert_eq!(source.snapshot(TOPIC_ERRORS).unwrap().fingerprint(), before);

        store.record_fetch_event(FetchEvent::new("/api", "GET").with_status(503));
        assert_ne!(source.snapshot(TOPIC_ERRORS).unwrap().fingerprint(), before);
    }

    #[test]
    fn test_performance_fingerprint_follows_latest_session() {
        let store = Arc::new(SessionStore::new(10));
        let first = store.begin_session("/a");
        store.record_fetch_event(FetchEvent::new("/api", "GET"));
        let source = StoreSource::new(store.clone());
        let before = source.snapshot(TOPIC_PERFORMANCE).unwrap().fingerprint();

        // finishing or recording on an older session leaves the payload alone
        store.end_session();
        assert_eq!(source.snapshot(TOPIC_PERFORMANCE).unwrap().fingerprint(), before);

        store.record_fetch_event(FetchEvent::new("/api", "GET"));
        store.begin_session("/b");
        store.record_in(&first, FetchEvent::new("/late", "GET"));
        let after_begin = source.snapshot(TOPIC_PERFORMANCE).unwrap();
        assert_ne!(after_begin.fingerprint(), before);

        store.record_fetch_event(FetchEvent::new("/api", "GET"));
        assert_ne!(
            source.snapshot(TOPIC_PERFORMANCE).unwrap().fingerprint(),
            after_begin.fingerprint()
        );
    }

    #[test]
    fn test_store_source_performance_empty() {
        let source = StoreSource::new(Arc::new(SessionStore::new(10)));
        let snapshot = source.snapshot(TOPIC_PERFORMANCE).unwrap();
        assert!(snapshot.payload.is_null());
    }

    #[test]
    fn test_store_source_unknown_topic() {
        let source = StoreSource::new(Arc::new(SessionStore::new(10)));
        assert!(source.snapshot("nope").is_none());
    }
}
