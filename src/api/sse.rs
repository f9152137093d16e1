//! SSE bridge between HTTP clients and the stream hub

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
};
use serde::Deserialize;
use tracing::debug;

use super::http::ApiState;
use crate::stream::{ChannelSink, TOPIC_RUNTIME};

/// Query parameters for a stream connection
#[derive(Debug, Deserialize)]
pub struct StreamParams {
    /// Comma-separated topic list, e.g. `runtime,errors`
    pub topics: Option<String>,
}

/// Split a comma-separated topic list; empty input means `runtime`
pub fn parse_topics(raw: Option<&str>) -> BTreeSet<String> {
    let topics: BTreeSet<String> = raw
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    if topics.is_empty() {
        BTreeSet::from([TOPIC_RUNTIME.to_string()])
    } else {
        topics
    }
}

/// GET /stream - register a hub client and relay its frames as SSE
pub async fn stream_handler(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<StreamParams>,
) -> impl IntoResponse {
    let topics = parse_topics(params.topics.as_deref());
    let (sink, mut rx) = ChannelSink::channel(state.client_buffer);
    match state.hub.add_client(Arc::new(sink), topics) {
        Some(client_id) => debug!(client = %client_id, "stream connection opened"),
        // the sink is already closed, so the stream below ends at once
        None => debug!("stream connection refused"),
    }

    // ends when the hub closes the sink; dropping it on disconnect lets the
    // hub deregister the client
    let stream = async_stream::stream! {
        while let Some(frame) = rx.recv().await {
            yield Ok::<_, Infallible>(Event::default().event(frame.event).data(frame.data));
        }
    };

    Sse::new(stream)
}
