//! Time and timestamp utilities

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_ms() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1000.0
}
