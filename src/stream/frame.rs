//! Wire framing for pushed events
//!
//! Each message is `event: <name>\ndata: <json>\n\n`, the text/event-stream
//! format understood by browser `EventSource`.

use serde::Serialize;

/// Sent once to a new client, carrying its id
pub const EVENT_CONNECTED: &str = "connected";
/// A topic snapshot changed
pub const EVENT_UPDATE: &str = "update";
/// Keepalive
pub const EVENT_PING: &str = "ping";
/// The hub is going away
pub const EVENT_SHUTDOWN: &str = "shutdown";

/// One pushed message: an event name and its JSON payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub event: String,
    pub data: String,
}

impl Frame {
    /// Build a frame by serializing `payload` to JSON
    pub fn new<T: Serialize + ?Sized>(event: &str, payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            event: event.to_string(),
            data: serde_json::to_string(payload)?,
        })
    }

    /// Text form written to the wire
    pub fn encode(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_format() {
        let frame = Frame::new(EVENT_CONNECTED, &json!({"clientId": "client-1"})).unwrap();
        assert_eq!(
            frame.encode(),
            "event: connected\ndata: {\"clientId\":\"client-1\"}\n\n"
        );
    }

    #[test]
    fn test_data_is_single_line() {
        let frame = Frame::new(EVENT_UPDATE, &json!({"text": "a\nb"})).unwrap();
        assert!(!frame.data.contains('\n'));
    }
}
