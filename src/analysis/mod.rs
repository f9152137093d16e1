//! Read-only views derived from a session
//!
//! All functions here are pure: they take a `&Session` (usually a copy
//! obtained from the store) and never touch shared state.

mod metrics;
mod timeline;
mod waterfall;

pub use metrics::compute_metrics;
pub use timeline::{build_timeline, TimelineCache};
pub use waterfall::{detect_chains, detect_waterfalls, MIN_WATERFALL_LEN};
