//! Fire-and-forget alert delivery.
//!
//! [`AlertDispatcher::dispatch`] may be called from any thread, including the
//! ingestion worker, which is not a runtime thread. Each alert becomes a task
//! on the runtime handle given at construction; at most `max_in_flight`
//! deliveries run at once and the rest wait for a permit. Failures are logged
//! and counted, never returned.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::sink::AlertSink;

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    failed: AtomicU64,
}

pub struct AlertDispatcher {
    sink: Arc<dyn AlertSink>,
    channel_id: Arc<str>,
    permits: Arc<Semaphore>,
    handle: Handle,
    counters: Arc<Counters>,
}

impl AlertDispatcher {
    pub fn new(sink: Arc<dyn AlertSink>, channel_id: impl Into<String>, max_in_flight: usize, handle: Handle) -> Self {
        Self {
            sink,
            channel_id: Arc::from(channel_id.into()),
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
            handle,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }

    /// Queue `text` for the default channel and return immediately.
    pub fn dispatch(&self, text: String) {
        self.dispatch_to(self.channel_id.clone(), text);
    }

    /// Queue `text` for `channel_id` and return immediately.
    pub fn dispatch_to(&self, channel_id: impl Into<Arc<str>>, text: String) {
        let channel_id: Arc<str> = channel_id.into();
        let sink = self.sink.clone();
        let permits = self.permits.clone();
        let counters = self.counters.clone();

        self.handle.spawn(async move {
            // Closed only if the semaphore is dropped, which never happens here.
            let Ok(_permit) = permits.acquire_owned().await else { return };
            match sink.deliver(&channel_id, &text).await {
                Ok(reply) if reply.ok => {
                    counters.delivered.fetch_add(1, Ordering::Relaxed);
                    debug!("[alert] delivered via {}", sink.name());
                }
                Ok(reply) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        "[alert] {} rejected message: {}",
                        sink.name(),
                        reply.description.as_deref().unwrap_or("no description")
                    );
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!("[alert] {} delivery failed: {e:#}", sink.name());
                }
            }
        });
    }

    /// Alerts the sink accepted so far.
    pub fn delivered(&self) -> u64 {
        self.counters.delivered.load(Ordering::Relaxed)
    }

    /// Alerts rejected or lost in transport so far.
    pub fn failed(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }
}
