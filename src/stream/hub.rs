//! Stream hub - push connections, topic subscriptions and keepalive
//!
//! Writes never happen while the client table is locked: each broadcast
//! takes a snapshot of the subscribed clients and writes to them outside
//! the lock, so one broken or slow client cannot stall the others.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::frame::{Frame, EVENT_CONNECTED, EVENT_PING, EVENT_SHUTDOWN};
use super::sink::EventSink;
use crate::config::LensConfig;
use crate::error::SinkError;
use crate::utils::now_ms;

/// Identifier assigned to a connected client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub u64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Public view of a registered client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamClient {
    pub id: ClientId,
    pub topics: BTreeSet<String>,
    pub connected_at: f64,
    pub last_ping_at: Option<f64>,
}

struct ClientEntry {
    info: StreamClient,
    sink: Arc<dyn EventSink>,
    last_reachable: Instant,
    // dropping this stops the disconnect watcher
    _watcher: Option<oneshot::Sender<()>>,
}

struct HubInner {
    clients: Mutex<HashMap<ClientId, ClientEntry>>,
    next_client_id: AtomicU64,
    shut_down: AtomicBool,
    keepalive: Mutex<Option<JoinHandle<()>>>,
    ping_interval: Duration,
    client_timeout: Duration,
}

/// Fan-out of framed events to subscribed clients
#[derive(Clone)]
pub struct StreamHub {
    inner: Arc<HubInner>,
}

impl StreamHub {
    /// Create a hub pinging every `ping_interval` and evicting clients not
    /// reachable for `client_timeout`
    pub fn new(ping_interval: Duration, client_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(HubInner {
                clients: Mutex::new(HashMap::new()),
                next_client_id: AtomicU64::new(1),
                shut_down: AtomicBool::new(false),
                keepalive: Mutex::new(None),
                ping_interval,
                client_timeout,
            }),
        }
    }

    pub fn with_config(config: &LensConfig) -> Self {
        Self::new(config.ping_interval, config.client_timeout)
    }

    /// Register a client subscribed to `topics`.
    ///
    /// The client immediately receives a `connected` event carrying its id,
    /// and is removed automatically once its sink reports closed.
    ///
    /// Returns `None` when the client was never registered: after
    /// [`shutdown`](Self::shutdown) (the sink is closed straight away), or
    /// when the sink was already closed.
    pub fn add_client<I, S>(&self, sink: Arc<dyn EventSink>, topics: I) -> Option<ClientId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let id = ClientId(self.inner.next_client_id.fetch_add(1, Ordering::SeqCst));
        let topics: BTreeSet<String> = topics.into_iter().map(Into::into).collect();

        if self.is_shut_down() {
            debug!(client = %id, "hub shut down, refusing client");
            sink.close();
            return None;
        }

        match Frame::new(EVENT_CONNECTED, &json!({ "clientId": id.to_string(), "topics": &topics })) {
            Ok(frame) => {
                if sink.try_send(frame) == Err(SinkError::Closed) {
                    debug!(client = %id, "client gone before registration");
                    return None;
                }
            }
            Err(e) => warn!(error = %e, "failed to encode connected event"),
        }

        let (watch_tx, watch_rx) = oneshot::channel();
        let entry = ClientEntry {
            info: StreamClient {
                id,
                topics,
                connected_at: now_ms(),
                last_ping_at: None,
            },
            sink: sink.clone(),
            last_reachable: Instant::now(),
            _watcher: Some(watch_tx),
        };

        {
            let mut clients = self.inner.clients.lock();
            // checked under the lock so shutdown cannot miss this client
            if self.inner.shut_down.load(Ordering::SeqCst) {
                drop(clients);
                sink.close();
                return None;
            }
            clients.insert(id, entry);
        }

        self.watch_disconnect(id, sink, watch_rx);
        debug!(client = %id, "client connected");
        Some(id)
    }

    fn watch_disconnect(&self, id: ClientId, sink: Arc<dyn EventSink>, stop: oneshot::Receiver<()>) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            // without a runtime, disconnects are noticed on the next failed write
            return;
        };
        let closed = sink.closed();
        let hub: Weak<HubInner> = Arc::downgrade(&self.inner);
        runtime.spawn(async move {
            tokio::select! {
                _ = closed => {
                    if let Some(inner) = hub.upgrade() {
                        StreamHub { inner }.remove_client(id);
                    }
                }
                _ = stop => {}
            }
        });
    }

    /// Write `event` with `payload` to every client subscribed to `topic`.
    ///
    /// Returns the number of clients the frame was queued for. Clients whose
    /// connection is closed are dropped silently.
    pub fn broadcast<T: Serialize + ?Sized>(&self, topic: &str, event: &str, payload: &T) -> usize {
        let frame = match Frame::new(event, payload) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(topic, event, error = %e, "failed to encode broadcast payload");
                return 0;
            }
        };

        let targets: Vec<(ClientId, Arc<dyn EventSink>)> = self
            .inner
            .clients
            .lock()
            .values()
            .filter(|c| c.info.topics.contains(topic))
            .map(|c| (c.info.id, c.sink.clone()))
            .collect();

        let mut reached = Vec::with_capacity(targets.len());
        for (id, sink) in targets {
            match sink.try_send(frame.clone()) {
                Ok(()) => reached.push(id),
                Err(SinkError::Closed) => {
                    debug!(client = %id, topic, "write failed, dropping client");
                    self.remove_client(id);
                }
                Err(SinkError::Full) => debug!(client = %id, topic, "client buffer full, frame dropped"),
            }
        }

        if !reached.is_empty() {
            let now = Instant::now();
            let mut clients = self.inner.clients.lock();
            for id in &reached {
                if let Some(entry) = clients.get_mut(id) {
                    entry.last_reachable = now;
                }
            }
        }
        reached.len()
    }

    /// Deregister and close a client. Returns false if it was already gone.
    pub fn remove_client(&self, id: ClientId) -> bool {
        let removed = self.inner.clients.lock().remove(&id);
        match removed {
            Some(entry) => {
                entry.sink.close();
                debug!(client = %id, "client removed");
                true
            }
            None => false,
        }
    }

    /// Send a `ping` to every client and evict the unreachable ones.
    ///
    /// Returns the number of clients evicted.
    pub fn ping_clients(&self) -> usize {
        let frame = match Frame::new(EVENT_PING, &json!({ "timestamp": now_ms() })) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "failed to encode ping");
                return 0;
            }
        };

        let targets: Vec<(ClientId, Arc<dyn EventSink>)> = self
            .inner
            .clients
            .lock()
            .values()
            .map(|c| (c.info.id, c.sink.clone()))
            .collect();

        let mut results = Vec::with_capacity(targets.len());
        for (id, sink) in targets {
            results.push((id, sink.try_send(frame.clone())));
        }

        let now = Instant::now();
        let ping_at = now_ms();
        let mut stale = Vec::new();
        {
            let mut clients = self.inner.clients.lock();
            for (id, result) in results {
                let Some(entry) = clients.get_mut(&id) else {
                    continue;
                };
                match result {
                    Ok(()) => {
                        entry.info.last_ping_at = Some(ping_at);
                        entry.last_reachable = now;
                    }
                    Err(SinkError::Closed) => stale.push(id),
                    Err(SinkError::Full) => {
                        if now.duration_since(entry.last_reachable) > self.inner.client_timeout {
                            stale.push(id);
                        }
                    }
                }
            }
        }

        for id in &stale {
            debug!(client = %id, "evicting unreachable client");
            self.remove_client(*id);
        }
        stale.len()
    }

    /// Start the periodic keepalive task. No-op if already running, after
    /// shutdown, or outside a tokio runtime.
    pub fn start_keepalive(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime, keepalive not started");
            return;
        };
        let mut slot = self.inner.keepalive.lock();
        // checked under the slot lock so a concurrent shutdown cannot miss
        // the task
        if slot.is_some() || self.is_shut_down() {
            return;
        }

        let period = self.inner.ping_interval;
        let hub = Arc::downgrade(&self.inner);
        *slot = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(inner) = hub.upgrade() else {
                    break;
                };
                StreamHub { inner }.ping_clients();
            }
        }));
    }

    /// Cancel the keepalive task if running
    pub fn stop_keepalive(&self) {
        if let Some(handle) = self.inner.keepalive.lock().take() {
            handle.abort();
        }
    }

    /// Send `shutdown` to every client, close all connections and stop the
    /// keepalive. Safe to call more than once.
    pub fn shutdown(&self) {
        let (drained, keepalive) = {
            let mut keepalive = self.inner.keepalive.lock();
            let mut clients = self.inner.clients.lock();
            self.inner.shut_down.store(true, Ordering::SeqCst);
            let drained: Vec<ClientEntry> = clients.drain().map(|(_, entry)| entry).collect();
            (drained, keepalive.take())
        };
        if let Some(handle) = keepalive {
            handle.abort();
        }

        if drained.is_empty() {
            return;
        }
        let frame = Frame::new(EVENT_SHUTDOWN, &json!({ "reason": "server shutting down" })).ok();
        let count = drained.len();
        for entry in drained {
            if let Some(frame) = &frame {
                let _ = entry.sink.try_send(frame.clone());
            }
            entry.sink.close();
        }
        info!(clients = count, "stream hub shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    pub fn client_count(&self) -> usize {
        self.inner.clients.lock().len()
    }

    /// Topics with at least one subscribed client
    pub fn active_topics(&self) -> BTreeSet<String> {
        self.inner
            .clients
            .lock()
            .values()
            .flat_map(|c| c.info.topics.iter().cloned())
            .collect()
    }

    /// Snapshot of registered clients, ordered by id
    pub fn clients(&self) -> Vec<StreamClient> {
        let mut clients: Vec<StreamClient> = self
            .inner
            .clients
            .lock()
            .values()
            .map(|c| c.info.clone())
            .collect();
        clients.sort_by_key(|c| c.id);
        clients
    }
}

impl Default for StreamHub {
    fn default() -> Self {
        Self::with_config(&LensConfig::default())
    }
}
