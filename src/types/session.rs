//! Session and runtime snapshot types

use serde::{Deserialize, Serialize};

use super::event::{
    ActionEvent, EventKind, FetchEvent, RecordedEvent, RenderEvent, StreamEvent, SuspenseEvent,
};

/// Identifier of a session, returned by `begin_session`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        SessionId(s.to_string())
    }
}

/// One logical visit/request episode and everything observed during it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub route: String,
    pub started_at: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<f64>,
    #[serde(default)]
    pub fetches: Vec<FetchEvent>,
    #[serde(default)]
    pub actions: Vec<ActionEvent>,
    #[serde(default)]
    pub renders: Vec<RenderEvent>,
    #[serde(default)]
    pub suspenses: Vec<SuspenseEvent>,
    #[serde(default)]
    pub stream_phases: Vec<StreamEvent>,
}

impl Session {
    /// Create an empty, unfinished session
    pub fn new(id: SessionId, route: impl Into<String>, started_at: f64) -> Self {
        Self {
            id,
            route: route.into(),
            started_at,
            finished_at: None,
            fetches: Vec::new(),
            actions: Vec::new(),
            renders: Vec::new(),
            suspenses: Vec::new(),
            stream_phases: Vec::new(),
        }
    }

    /// Mark the session finished. Returns false if it already was.
    pub fn finish(&mut self, at: f64) -> bool {
        if self.finished_at.is_some() {
            return false;
        }
        self.finished_at = Some(at);
        true
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Append an already-stamped event to the list for its kind
    pub(crate) fn push(&mut self, event: RecordedEvent) {
        match event {
            RecordedEvent::Network(e) => self.fetches.push(e),
            RecordedEvent::Action(e) => self.actions.push(e),
            RecordedEvent::Render(e) => self.renders.push(e),
            RecordedEvent::Suspense(e) => self.suspenses.push(e),
            RecordedEvent::StreamPhase(e) => self.stream_phases.push(e),
        }
    }

    /// Number of events of one kind
    pub fn count(&self, kind: EventKind) -> usize {
        match kind {
            EventKind::Network => self.fetches.len(),
            EventKind::Action => self.actions.len(),
            EventKind::Render => self.renders.len(),
            EventKind::Suspense => self.suspenses.len(),
            EventKind::StreamPhase => self.stream_phases.len(),
        }
    }

    /// Total number of events across all kinds
    pub fn event_count(&self) -> usize {
        self.fetches.len()
            + self.actions.len()
            + self.renders.len()
            + self.suspenses.len()
            + self.stream_phases.len()
    }
}

/// Point-in-time copy of the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSnapshot {
    pub sessions: Vec<Session>,
    pub active_session_id: Option<SessionId>,
    pub last_updated: f64,
}

impl RuntimeSnapshot {
    pub fn active_session(&self) -> Option<&Session> {
        let id = self.active_session_id.as_ref()?;
        self.sessions.iter().find(|s| &s.id == id)
    }

    /// The most recently begun session, active or not
    pub fn latest_session(&self) -> Option<&Session> {
        self.sessions.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_only_once() {
        let mut session = Session::new(SessionId::from("s1"), "/a", 0.0);
        assert!(session.finish(10.0));
        assert!(!session.finish(20.0));
        assert_eq!(session.finished_at, Some(10.0));
    }

    #[test]
    fn test_push_routes_by_kind() {
        let mut session = Session::new(SessionId::from("s1"), "/a", 0.0);
        session.push(FetchEvent::new("/api", "GET").into());
        session.push(StreamEvent::new("shell").into());
        session.push(StreamEvent::new("complete").into());

        assert_eq!(session.count(EventKind::Network), 1);
        assert_eq!(session.count(EventKind::StreamPhase), 2);
        assert_eq!(session.event_count(), 3);
    }

    #[test]
    fn test_session_serializes_camel_case() {
        let session = Session::new(SessionId::from("s1"), "/a", 1.0);
        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"startedAt\":1.0"));
        assert!(json.contains("\"streamPhases\":[]"));
        assert!(!json.contains("finishedAt"));
    }
}
