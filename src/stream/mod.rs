//! Real-time distribution to dashboard clients
//!
//! - `hub`: client registry, topic fan-out, keepalive and shutdown
//! - `change_detector`: fingerprint polling that triggers `update` broadcasts
//! - `source`: snapshot sources, including one backed by the session store
//! - `sink`: the connection abstraction the hub writes to
//! - `frame`: wire framing (`event: <name>\ndata: <json>\n\n`)

pub mod change_detector;
pub mod frame;
pub mod hub;
pub mod sink;
pub mod source;

pub use change_detector::ChangeDetector;
pub use frame::{Frame, EVENT_CONNECTED, EVENT_PING, EVENT_SHUTDOWN, EVENT_UPDATE};
pub use hub::{ClientId, StreamClient, StreamHub};
pub use sink::{ChannelSink, EventSink};
pub use source::{
    SnapshotSource, StoreSource, TopicSnapshot, TOPIC_ERRORS, TOPIC_PERFORMANCE, TOPIC_RUNTIME,
};
