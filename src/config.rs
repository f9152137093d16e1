//! Runtime configuration
//!
//! Values come from `LENS_*` environment variables, falling back to
//! [`LensConfig::default`] for anything unset.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{LensError, LensResult};

/// Configuration for the store, hub and change detector
#[derive(Debug, Clone)]
pub struct LensConfig {
    /// Maximum number of sessions kept in history
    pub max_sessions: usize,
    /// Interval between keepalive pings
    pub ping_interval: Duration,
    /// Clients unreachable for longer than this are evicted
    pub client_timeout: Duration,
    /// Change detector poll interval
    pub poll_interval: Duration,
    /// Upper bound on a single snapshot fetch
    pub fetch_timeout: Duration,
    /// Per-client frame buffer (bounded channel capacity)
    pub client_buffer: usize,
    /// Address the HTTP surface binds to
    pub bind_addr: String,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            max_sessions: 50,
            ping_interval: Duration::from_secs(15),
            client_timeout: Duration::from_secs(45),
            poll_interval: Duration::from_secs(1),
            fetch_timeout: Duration::from_secs(2),
            client_buffer: 256,
            bind_addr: "127.0.0.1:4780".to_string(),
        }
    }
}

impl LensConfig {
    /// Build a config from the process environment
    pub fn from_env() -> LensResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> LensResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            max_sessions: parse_or(&lookup, "LENS_MAX_SESSIONS", defaults.max_sessions)?.max(1),
            ping_interval: millis_or(&lookup, "LENS_PING_INTERVAL_MS", defaults.ping_interval)?,
            client_timeout: millis_or(&lookup, "LENS_CLIENT_TIMEOUT_MS", defaults.client_timeout)?,
            poll_interval: millis_or(&lookup, "LENS_POLL_INTERVAL_MS", defaults.poll_interval)?,
            fetch_timeout: millis_or(&lookup, "LENS_FETCH_TIMEOUT_MS", defaults.fetch_timeout)?,
            client_buffer: parse_or(&lookup, "LENS_CLIENT_BUFFER", defaults.client_buffer)?.max(1),
            bind_addr: lookup("LENS_BIND_ADDR").unwrap_or(defaults.bind_addr),
        })
    }

    /// Override the session cap
    pub fn with_max_sessions(mut self, max_sessions: usize) -> Self {
        self.max_sessions = max_sessions.max(1);
        self
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> LensResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| LensError::Config {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

fn millis_or<F>(lookup: &F, key: &str, default: Duration) -> LensResult<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let default_ms = default.as_millis() as u64;
    let ms = parse_or(lookup, key, default_ms)?;
    if ms == 0 {
        return Err(LensError::Config {
            key: key.to_string(),
            value: "0".to_string(),
        });
    }
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = LensConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.max_sessions, 50);
        assert_eq!(config.ping_interval, Duration::from_secs(15));
        assert_eq!(config.bind_addr, "127.0.0.1:4780");
    }

    #[test]
    fn test_overrides_from_lookup() {
        let config = LensConfig::from_lookup(lookup_from(&[
            ("LENS_MAX_SESSIONS", "5"),
            ("LENS_POLL_INTERVAL_MS", "250"),
            ("LENS_BIND_ADDR", "0.0.0.0:9000"),
        ]))
        .unwrap();
        assert_eq!(config.max_sessions, 5);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
    }

    #[test]
    fn test_invalid_value_is_config_error() {
        let err = LensConfig::from_lookup(lookup_from(&[("LENS_MAX_SESSIONS", "many")]))
            .unwrap_err();
        assert!(matches!(err, LensError::Config { ref key, .. } if key == "LENS_MAX_SESSIONS"));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = LensConfig::from_lookup(lookup_from(&[("LENS_PING_INTERVAL_MS", "0")]));
        assert!(result.is_err());
    }
}
