//! HTTP surface for dashboard clients
//!
//! Only the distribution side is exposed here: a text/event-stream endpoint
//! bridged onto the [`StreamHub`](crate::stream::StreamHub) and a health check.

pub mod http;
pub mod sse;

pub use http::{create_router, ApiState};
