//! Change detector - polls topic snapshots and broadcasts only on change
//!
//! Each tick fetches the snapshot of every topic that has a subscriber,
//! compares its fingerprint with the last one seen and pushes an `update`
//! when they differ. An unavailable or slow source skips that topic for the
//! tick; nothing is retried out of cycle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::frame::EVENT_UPDATE;
use super::hub::StreamHub;
use super::source::SnapshotSource;
use crate::config::LensConfig;

struct PollTask {
    handle: JoinHandle<()>,
    // dropping this ends the poll loop at its next tick
    _stop: oneshot::Sender<()>,
}

struct DetectorInner {
    hub: StreamHub,
    source: Box<dyn SnapshotSource>,
    fetch_timeout: Duration,
    fingerprints: Mutex<HashMap<String, String>>,
    /// Bumped on every start/stop; a tick that sees a newer value discards
    /// whatever it fetched
    generation: AtomicU64,
}

impl DetectorInner {
    async fn poll(&self, generation: u64) -> usize {
        let mut broadcasts = 0;
        for topic in self.hub.active_topics() {
            let fetched = tokio::time::timeout(self.fetch_timeout, self.source.fetch(&topic)).await;

            if self.generation.load(Ordering::SeqCst) != generation {
                debug!(topic = %topic, "detector stopped during fetch, discarding");
                return broadcasts;
            }

            let snapshot = match fetched {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => {
                    debug!(topic = %topic, "snapshot unavailable, skipping");
                    continue;
                }
                Err(_) => {
                    debug!(topic = %topic, "snapshot fetch timed out, skipping");
                    continue;
                }
            };

            let fingerprint = snapshot.fingerprint();
            {
                let mut fingerprints = self.fingerprints.lock();
                if fingerprints.get(&topic) == Some(&fingerprint) {
                    continue;
                }
                fingerprints.insert(topic.clone(), fingerprint);
            }

            let delivered = self.hub.broadcast(&topic, EVENT_UPDATE, &snapshot);
            debug!(topic = %topic, delivered, "topic changed, update broadcast");
            broadcasts += 1;
        }
        broadcasts
    }
}

/// Periodic fingerprint poller feeding a [`StreamHub`]
pub struct ChangeDetector {
    inner: Arc<DetectorInner>,
    task: Mutex<Option<PollTask>>,
}

impl ChangeDetector {
    pub fn new<S: SnapshotSource>(hub: StreamHub, source: S, fetch_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(DetectorInner {
                hub,
                source: Box::new(source),
                fetch_timeout,
                fingerprints: Mutex::new(HashMap::new()),
                generation: AtomicU64::new(0),
            }),
            task: Mutex::new(None),
        }
    }

    pub fn with_config<S: SnapshotSource>(hub: StreamHub, source: S, config: &LensConfig) -> Self {
        Self::new(hub, source, config.fetch_timeout)
    }

    /// Start polling every `poll_interval`, replacing any running loop.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, poll_interval: Duration) {
        self.stop();
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let inner = self.inner.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = &mut stop_rx => break,
                }
                inner.poll(generation).await;
            }
        });

        *self.task.lock() = Some(PollTask {
            handle,
            _stop: stop_tx,
        });
        info!(interval_ms = poll_interval.as_millis() as u64, "change detector started");
    }

    /// Stop polling. A fetch already in flight is allowed to finish but its
    /// result is dropped. Safe to call more than once.
    pub fn stop(&self) {
        let Some(task) = self.task.lock().take() else {
            return;
        };
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        // the loop exits on its own once the stop sender is dropped
        drop(task);
        debug!("change detector stopped");
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Run a single tick inline. Returns the number of topics broadcast.
    pub async fn poll_once(&self) -> usize {
        let generation = self.inner.generation.load(Ordering::SeqCst);
        self.inner.poll(generation).await
    }

    /// Forget stored fingerprints so the next tick re-broadcasts every topic
    pub fn reset(&self) {
        self.inner.fingerprints.lock().clear();
    }
}

impl Drop for ChangeDetector {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::stream::frame::Frame;
    use crate::stream::sink::EventSink;
    use crate::stream::source::TopicSnapshot;
    use futures::future::BoxFuture;
    use serde_json::Value;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct RecordingSink {
        frames: Mutex<Vec<Frame>>,
    }

    impl RecordingSink {
        fn updates(&self) -> usize {
            self.frames
                .lock()
                .iter()
                .filter(|f| f.event == EVENT_UPDATE)
                .count()
        }
    }

    impl EventSink for RecordingSink {
        fn try_send(&self, frame: Frame) -> Result<(), SinkError> {
            self.frames.lock().push(frame);
            Ok(())
        }

        fn close(&self) {}

        fn closed(&self) -> BoxFuture<'static, ()> {
            Box::pin(futures::future::pending())
        }
    }

    fn hub_with_client(topic: &str) -> (StreamHub, Arc<RecordingSink>) {
        let hub = StreamHub::new(Duration::from_secs(60), Duration::from_secs(120));
        let sink = Arc::new(RecordingSink::default());
        hub.add_client(sink.clone(), [topic]);
        (hub, sink)
    }

    /// Source whose fingerprint is driven by a shared counter
    fn counter_source(
        version: Arc<AtomicU64>,
        calls: Arc<AtomicUsize>,
    ) -> impl Fn(&str) -> BoxFuture<'static, Option<TopicSnapshot>> + Send + Sync + 'static {
        move |topic: &str| -> BoxFuture<'static, Option<TopicSnapshot>> {
            calls.fetch_add(1, Ordering::SeqCst);
            let snapshot = TopicSnapshot::new(
                topic,
                version.load(Ordering::SeqCst) as f64,
                Value::Null,
            );
            Box::pin(async move { Some(snapshot) })
        }
    }

    #[tokio::test]
    async fn test_identical_fingerprints_broadcast_once() {
        let (hub, sink) = hub_with_client("runtime");
        let version = Arc::new(AtomicU64::new(1));
        let calls = Arc::new(AtomicUsize::new(0));
        let detector = ChangeDetector::new(
            hub,
            counter_source(version, calls.clone()),
            Duration::from_secs(1),
        );

        assert_eq!(detector.poll_once().await, 1);
        assert_eq!(detector.poll_once().await, 0);
        assert_eq!(sink.updates(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_changed_fingerprint_broadcasts_again() {
        let (hub, sink) = hub_with_client("runtime");
        let version = Arc::new(AtomicU64::new(1));
        let detector = ChangeDetector::new(
            hub,
            counter_source(version.clone(), Arc::new(AtomicUsize::new(0))),
            Duration::from_secs(1),
        );

        detector.poll_once().await;
        version.store(2, Ordering::SeqCst);
        detector.poll_once().await;
        assert_eq!(sink.updates(), 2);
    }

    #[tokio::test]
    async fn test_unsubscribed_topics_not_fetched() {
        let hub = StreamHub::new(Duration::from_secs(60), Duration::from_secs(120));
        let calls = Arc::new(AtomicUsize::new(0));
        let detector = ChangeDetector::new(
            hub,
            counter_source(Arc::new(AtomicU64::new(1)), calls.clone()),
            Duration::from_secs(1),
        );

        assert_eq!(detector.poll_once().await, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unavailable_source_skips_tick() {
        let (hub, sink) = hub_with_client("runtime");
        let source = |_: &str| -> BoxFuture<'static, Option<TopicSnapshot>> {
            Box::pin(async { None })
        };
        let detector = ChangeDetector::new(hub, source, Duration::from_secs(1));

        assert_eq!(detector.poll_once().await, 0);
        assert_eq!(sink.updates(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_times_out() {
        let (hub, sink) = hub_with_client("runtime");
        let source = |topic: &str| -> BoxFuture<'static, Option<TopicSnapshot>> {
            let snapshot = TopicSnapshot::new(topic, 1.0, Value::Null);
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Some(snapshot)
            })
        };
        let detector = ChangeDetector::new(hub, source, Duration::from_millis(50));

        assert_eq!(detector.poll_once().await, 0);
        assert_eq!(sink.updates(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_discards_in_flight_fetch() {
        let (hub, sink) = hub_with_client("runtime");
        let source = |topic: &str| -> BoxFuture<'static, Option<TopicSnapshot>> {
            let snapshot = TopicSnapshot::new(topic, 1.0, Value::Null);
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Some(snapshot)
            })
        };
        let detector = Arc::new(ChangeDetector::new(hub, source, Duration::from_secs(5)));
        detector.start(Duration::from_secs(30));

        // first tick fires immediately and is now waiting on the source
        tokio::time::sleep(Duration::from_millis(10)).await;
        detector.stop();
        detector.stop();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(sink.updates(), 0);
        assert!(!detector.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_drives_polls() {
        let (hub, sink) = hub_with_client("runtime");
        let version = Arc::new(AtomicU64::new(1));
        let detector = ChangeDetector::new(
            hub,
            counter_source(version.clone(), Arc::new(AtomicUsize::new(0))),
            Duration::from_secs(1),
        );
        detector.start(Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.updates(), 1);

        version.store(2, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(sink.updates(), 2);

        detector.stop();
        version.store(3, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(sink.updates(), 2);
    }
}
