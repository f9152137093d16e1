//! Runtime event types captured by instrumentation
//!
//! Every event shares an id, the route it was observed on and a timing block.
//! Timestamps are milliseconds; the store only requires that a single session
//! uses one consistent clock.

use serde::{Deserialize, Serialize};

/// Kinds of runtime events, in timeline tie-break priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// An outgoing network call
    Network,
    /// A background (server) action
    Action,
    /// A component render phase
    Render,
    /// Deferred content (suspense boundary) resolution
    Suspense,
    /// A progressive-delivery (streaming) phase
    StreamPhase,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Network => write!(f, "network"),
            EventKind::Action => write!(f, "action"),
            EventKind::Render => write!(f, "render"),
            EventKind::Suspense => write!(f, "suspense"),
            EventKind::StreamPhase => write!(f, "stream_phase"),
        }
    }
}

/// Timing shared by all span-like events
///
/// Instrumentation may leave any field empty; [`Timing::stamp`] fills in
/// what can be derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
}

impl Timing {
    /// A span with both ends known
    pub fn span(started_at: f64, finished_at: f64) -> Self {
        Self {
            started_at: Some(started_at),
            finished_at: Some(finished_at),
            duration_ms: Some(finished_at - started_at),
        }
    }

    /// Fill in missing fields: start defaults to `now`, then whichever of
    /// finish/duration is missing is derived from the other.
    pub fn stamp(&mut self, now: f64) {
        let start = *self.started_at.get_or_insert(now);
        match (self.finished_at, self.duration_ms) {
            (Some(finish), None) => self.duration_ms = Some(finish - start),
            (None, Some(duration)) => self.finished_at = Some(start + duration),
            _ => {}
        }
    }

    /// Start time, `0.0` if never stamped
    pub fn start(&self) -> f64 {
        self.started_at.unwrap_or(0.0)
    }

    /// Finish time; an unfinished event is treated as instantaneous
    pub fn finish(&self) -> f64 {
        self.finished_at
            .or_else(|| self.duration_ms.map(|d| self.start() + d))
            .unwrap_or_else(|| self.start())
    }
}

/// A network call (fetch)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub route: String,
    #[serde(flatten)]
    pub timing: Timing,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Cache disposition reported by the host (e.g. "hit", "miss")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl FetchEvent {
    pub fn new(url: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            ..Default::default()
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Outcome of a background action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionOutcome {
    #[default]
    Pending,
    Success,
    Error,
}

/// A background (server) action invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub route: String,
    #[serde(flatten)]
    pub timing: Timing,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub outcome: ActionOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionEvent {
    pub fn new(name: impl Into<String>, outcome: ActionOutcome) -> Self {
        Self {
            name: name.into(),
            outcome,
            ..Default::default()
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }
}

/// A component render phase
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub route: String,
    #[serde(flatten)]
    pub timing: Timing,
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub is_async: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
}

impl RenderEvent {
    pub fn new(component: impl Into<String>, is_async: bool) -> Self {
        Self {
            component: component.into(),
            is_async,
            ..Default::default()
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }
}

/// A deferred-content (suspense boundary) resolution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspenseEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub route: String,
    #[serde(flatten)]
    pub timing: Timing,
    #[serde(default)]
    pub boundary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_shown: Option<bool>,
}

impl SuspenseEvent {
    pub fn new(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            ..Default::default()
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }
}

/// A progressive-delivery phase marker (shell flushed, chunk sent, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub route: String,
    #[serde(default)]
    pub phase: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_bytes: Option<u64>,
}

impl StreamEvent {
    pub fn new(phase: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            ..Default::default()
        }
    }

    pub fn at(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Point in time of the phase, `0.0` if never stamped
    pub fn time(&self) -> f64 {
        self.timestamp.unwrap_or(0.0)
    }
}

/// Any event accepted by the recording API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordedEvent {
    Network(FetchEvent),
    Action(ActionEvent),
    Render(RenderEvent),
    Suspense(SuspenseEvent),
    StreamPhase(StreamEvent),
}

impl RecordedEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RecordedEvent::Network(_) => EventKind::Network,
            RecordedEvent::Action(_) => EventKind::Action,
            RecordedEvent::Render(_) => EventKind::Render,
            RecordedEvent::Suspense(_) => EventKind::Suspense,
            RecordedEvent::StreamPhase(_) => EventKind::StreamPhase,
        }
    }

    /// Assign an id, default the route and fill in timestamps
    pub(crate) fn stamp(&mut self, id: String, route: &str, now: f64) {
        let (event_id, event_route) = match self {
            RecordedEvent::Network(e) => {
                e.timing.stamp(now);
                (&mut e.id, &mut e.route)
            }
            RecordedEvent::Action(e) => {
                e.timing.stamp(now);
                (&mut e.id, &mut e.route)
            }
            RecordedEvent::Render(e) => {
                e.timing.stamp(now);
                (&mut e.id, &mut e.route)
            }
            RecordedEvent::Suspense(e) => {
                e.timing.stamp(now);
                (&mut e.id, &mut e.route)
            }
            RecordedEvent::StreamPhase(e) => {
                e.timestamp.get_or_insert(now);
                (&mut e.id, &mut e.route)
            }
        };
        if event_id.is_empty() {
            *event_id = id;
        }
        if event_route.is_empty() {
            *event_route = route.to_string();
        }
    }

    pub fn id(&self) -> &str {
        match self {
            RecordedEvent::Network(e) => &e.id,
            RecordedEvent::Action(e) => &e.id,
            RecordedEvent::Render(e) => &e.id,
            RecordedEvent::Suspense(e) => &e.id,
            RecordedEvent::StreamPhase(e) => &e.id,
        }
    }
}

impl From<FetchEvent> for RecordedEvent {
    fn from(e: FetchEvent) -> Self {
        RecordedEvent::Network(e)
    }
}

impl From<ActionEvent> for RecordedEvent {
    fn from(e: ActionEvent) -> Self {
        RecordedEvent::Action(e)
    }
}

impl From<RenderEvent> for RecordedEvent {
    fn from(e: RenderEvent) -> Self {
        RecordedEvent::Render(e)
    }
}

impl From<SuspenseEvent> for RecordedEvent {
    fn from(e: SuspenseEvent) -> Self {
        RecordedEvent::Suspense(e)
    }
}

impl From<StreamEvent> for RecordedEvent {
    fn from(e: StreamEvent) -> Self {
        RecordedEvent::StreamPhase(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_stamp_defaults_start() {
        let mut timing = Timing::default();
        timing.stamp(42.0);
        assert_eq!(timing.started_at, Some(42.0));
        assert_eq!(timing.finished_at, None);
        assert_eq!(timing.finish(), 42.0);
    }

    #[test]
    fn test_timing_stamp_derives_missing_end() {
        let mut from_duration = Timing {
            started_at: Some(10.0),
            duration_ms: Some(5.0),
            ..Default::default()
        };
        from_duration.stamp(0.0);
        assert_eq!(from_duration.finished_at, Some(15.0));

        let mut from_finish = Timing {
            started_at: Some(10.0),
            finished_at: Some(30.0),
            ..Default::default()
        };
        from_finish.stamp(0.0);
        assert_eq!(from_finish.duration_ms, Some(20.0));
    }

    #[test]
    fn test_stamp_keeps_caller_id_and_route() {
        let mut event = RecordedEvent::from(FetchEvent {
            id: "custom".to_string(),
            route: "/other".to_string(),
            ..FetchEvent::new("/api", "GET")
        });
        event.stamp("evt-1".to_string(), "/a", 5.0);
        assert_eq!(event.id(), "custom");
        match event {
            RecordedEvent::Network(e) => assert_eq!(e.route, "/other"),
            _ => panic!("wrong kind"),
        }
    }

    #[test]
    fn test_fetch_event_deserializes_flattened_timing() {
        let json = r#"{"url":"/api/users","startedAt":1.5,"finishedAt":4.5,"status":200}"#;
        let event: FetchEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.method, "GET");
        assert_eq!(event.timing.start(), 1.5);
        assert_eq!(event.timing.finish(), 4.5);
        assert_eq!(event.status, Some(200));
    }

    #[test]
    fn test_kind_priority_order() {
        assert!(EventKind::Network < EventKind::Action);
        assert!(EventKind::Action < EventKind::Render);
        assert!(EventKind::Render < EventKind::Suspense);
        assert!(EventKind::Suspense < EventKind::StreamPhase);
    }
}
