//! Client connections as seen by the hub
//!
//! The hub only needs three things from a connection: a non-blocking write,
//! a way to close it, and a future that resolves once the peer is gone.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::frame::Frame;
use crate::error::SinkError;

/// A long-lived, one-directional connection to a dashboard client
pub trait EventSink: Send + Sync + 'static {
    /// Queue a frame without waiting
    fn try_send(&self, frame: Frame) -> Result<(), SinkError>;

    /// Close the connection; later writes fail with [`SinkError::Closed`]
    fn close(&self);

    /// Resolves when the peer has gone away
    fn closed(&self) -> BoxFuture<'static, ()>;
}

/// Sink backed by a bounded tokio channel.
///
/// The receiving half is handed to the transport (see the SSE handler);
/// dropping it is how a disconnect is observed.
pub struct ChannelSink {
    tx: Mutex<Option<mpsc::Sender<Frame>>>,
}

impl ChannelSink {
    /// Create a sink and the receiver its frames are delivered to
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }
}

impl EventSink for ChannelSink {
    fn try_send(&self, frame: Frame) -> Result<(), SinkError> {
        let guard = self.tx.lock();
        let tx = guard.as_ref().ok_or(SinkError::Closed)?;
        tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Full,
            TrySendError::Closed(_) => SinkError::Closed,
        })
    }

    fn close(&self) {
        self.tx.lock().take();
    }

    fn closed(&self) -> BoxFuture<'static, ()> {
        let tx = self.tx.lock().clone();
        Box::pin(async move {
            if let Some(tx) = tx {
                tx.closed().await;
            }
        })
    }
}
