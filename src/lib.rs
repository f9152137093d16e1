//! Render Lens
//!
//! An in-process diagnostics core for web applications: it captures runtime
//! events into per-visit sessions, derives timelines, waterfalls and metrics
//! from them, and pushes live updates to connected dashboards.
//!
//! # Modules
//!
//! - `types`: Sessions, events and derived views
//! - `store`: Session lifecycle, bounded history and the recording API
//! - `analysis`: Timeline merge, waterfall detection, metrics
//! - `stream`: Stream hub, change detector and snapshot sources
//! - `api`: Axum router exposing the event stream
//! - `config`: Environment-driven configuration
//! - `error`: Error types
//! - `utils`: Time helpers
//!
//! # Example
//!
//! ```
//! use render_lens::{build_timeline, detect_waterfalls, FetchEvent, SessionStore, Timing};
//!
//! let store = SessionStore::new(50);
//! let id = store.begin_session("/a");
//! for (start, finish) in [(0.0, 100.0), (100.0, 250.0), (250.0, 400.0)] {
//!     store.record_fetch_event(
//!         FetchEvent::new("/api/data", "GET").with_timing(Timing::span(start, finish)),
//!     );
//! }
//! store.end_session();
//!
//! let session = store.get_session(&id).unwrap();
//! assert_eq!(build_timeline(&session).len(), 3);
//! assert_eq!(detect_waterfalls(&session)[0].total_duration, 400.0);
//! ```

pub mod analysis;
pub mod api;
pub mod config;
pub mod error;
pub mod store;
pub mod stream;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use analysis::{build_timeline, compute_metrics, detect_waterfalls, TimelineCache};
pub use config::LensConfig;
pub use error::{LensError, LensResult, SinkError};
pub use store::{SessionStore, StoreChange, StoreObserver};
pub use stream::{ChangeDetector, StoreSource, StreamHub};
pub use types::{
    ActionEvent, ActionOutcome, EventKind, FetchEvent, Metrics, RecordedEvent, RenderEvent,
    RuntimeSnapshot, Session, SessionId, StreamEvent, SuspenseEvent, TimelineEntry, Timing,
    Waterfall,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
