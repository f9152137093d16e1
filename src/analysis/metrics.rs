//! Summary statistics for a session

use crate::types::{ActionOutcome, Metrics, RenderEvent, Session, Timing};

use super::waterfall::detect_waterfalls;

/// Compute summary metrics for one session
pub fn compute_metrics(session: &Session) -> Metrics {
    Metrics {
        total_render_span: render_span(&session.renders),
        total_stream_span: stream_span(session),
        slowest_render: slowest(&session.renders, |e| &e.timing).cloned(),
        deferred_content_count: session.suspenses.len(),
        waterfall_count: detect_waterfalls(session).len(),
        fetch_count: session.fetches.len(),
        failed_action_count: session
            .actions
            .iter()
            .filter(|a| a.outcome == ActionOutcome::Error)
            .count(),
        slowest_fetch: slowest(&session.fetches, |e| &e.timing).cloned(),
    }
}

fn render_span(renders: &[RenderEvent]) -> f64 {
    if renders.is_empty() {
        return 0.0;
    }
    let first_start = renders
        .iter()
        .map(|e| e.timing.start())
        .fold(f64::INFINITY, f64::min);
    let last_finish = renders
        .iter()
        .map(|e| e.timing.finish())
        .fold(f64::NEG_INFINITY, f64::max);
    last_finish - first_start
}

fn stream_span(session: &Session) -> f64 {
    if session.stream_phases.len() < 2 {
        return 0.0;
    }
    let times = session.stream_phases.iter().map(|e| e.time());
    let min = times.clone().fold(f64::INFINITY, f64::min);
    let max = times.fold(f64::NEG_INFINITY, f64::max);
    max - min
}

/// Event with the largest duration; first one wins ties
fn slowest<T>(events: &[T], timing: impl Fn(&T) -> &Timing) -> Option<&T> {
    let duration = |e: &T| {
        let t = timing(e);
        t.duration_ms.unwrap_or_else(|| t.finish() - t.start())
    };
    let mut best: Option<&T> = None;
    for event in events {
        if best.map_or(true, |b| duration(event) > duration(b)) {
            best = Some(event);
        }
    }
    best
}
