//! Data types for the diagnostics core
//!
//! This module contains the session, event and derived-view structures
//! shared by the store, the analysis functions and the stream layer.

mod derived;
mod event;
mod session;

pub use derived::{Metrics, TimelineEntry, Waterfall, WaterfallMember};
pub use event::{
    ActionEvent, ActionOutcome, EventKind, FetchEvent, RecordedEvent, RenderEvent, StreamEvent,
    SuspenseEvent, Timing,
};
pub use session::{RuntimeSnapshot, Session, SessionId};
