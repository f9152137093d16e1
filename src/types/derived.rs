//! Derived, read-only views computed from a session

use serde::{Deserialize, Serialize};

use super::event::{EventKind, FetchEvent, RenderEvent};

/// One row of a session timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub kind: EventKind,
    pub timestamp: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
    /// Id of the event this entry was built from
    pub ref_id: String,
}

/// An event taking part in a waterfall
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterfallMember {
    pub id: String,
    /// URL for network calls, component name for renders
    pub label: String,
    pub start: f64,
    pub finish: f64,
}

/// A chain of three or more serial same-kind operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waterfall {
    pub kind: EventKind,
    pub members: Vec<WaterfallMember>,
    pub start: f64,
    pub end: f64,
    pub total_duration: f64,
}

/// Summary statistics for one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub total_render_span: f64,
    pub total_stream_span: f64,
    pub slowest_render: Option<RenderEvent>,
    pub deferred_content_count: usize,
    pub waterfall_count: usize,
    pub fetch_count: usize,
    pub failed_action_count: usize,
    pub slowest_fetch: Option<FetchEvent>,
}
