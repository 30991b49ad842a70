//! Priority event queue with adaptive backpressure
//!
//! Buffers events in descending-priority order (FIFO among equals),
//! deduplicates against in-flight and already-processed ids, applies the
//! size/compression policy, optionally persists critical events, and drives
//! bounded-concurrency batch processing with per-event fault isolation.
//!
//! Backpressure never blocks producers: `enqueue` always completes, and
//! resource pressure only shrinks the processing chunk size. The decision
//! function has no hysteresis; flapping at the threshold affects throughput,
//! never correctness.

use crate::config::{ConfigError, EventQueueConfig};
use crate::events::{Event, QueueItem};
use crate::persistence::{EventStore, Persistor, ReplayOptions, Snapshot};
use crate::queue::compression::{CompressionStrategy, NoopCompression};
use crate::queue::dedup::ProcessedEvents;
use crate::reliability::FlowSemaphore;
use crate::resources::ResourceSampler;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use futures::stream::BoxStream;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Used when an event fails to serialize for size estimation.
const FALLBACK_EVENT_SIZE: usize = 1024;
/// Maximum per-chunk fan-out when backpressure is inactive.
const MAX_CHUNK_FANOUT: usize = 5;
/// Yield between batches so a long drain cannot starve the runtime.
const INTER_BATCH_YIELD: Duration = Duration::from_millis(1);

/// Read-only diagnostic snapshot, no side effects.
#[derive(Debug, Clone, Default)]
pub struct QueueStats {
    pub queue_size: usize,
    pub backpressure_active: bool,
    pub available_permits: usize,
    pub waiting_acquires: usize,
    pub processed_events: usize,
    pub total_enqueued: u64,
    pub total_processed: u64,
    pub total_failed: u64,
    pub rejected_duplicates: u64,
    pub rejected_queue_full: u64,
    pub rejected_huge: u64,
    pub large_events: u64,
    pub huge_events: u64,
    pub compressed_events: u64,
    pub persisted_events: u64,
}

#[derive(Debug, Default)]
struct QueueCounters {
    enqueued: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    rejected_duplicates: AtomicU64,
    rejected_queue_full: AtomicU64,
    rejected_huge: AtomicU64,
    large_events: AtomicU64,
    huge_events: AtomicU64,
    compressed_events: AtomicU64,
    persisted_events: AtomicU64,
}

/// Queue and dedup set share one lock so dedup checks and inserts stay atomic.
#[derive(Debug)]
struct QueueState {
    items: VecDeque<QueueItem>,
    processed: ProcessedEvents,
}

pub struct EventQueue {
    config: EventQueueConfig,
    execution_id: String,
    state: Mutex<QueueState>,
    sampler: Mutex<ResourceSampler>,
    semaphore: Arc<FlowSemaphore>,
    draining: AtomicBool,
    counters: QueueCounters,
    persistor: Option<Arc<dyn Persistor>>,
    event_store: Option<Arc<dyn EventStore>>,
    compression: Arc<dyn CompressionStrategy>,
}

impl EventQueue {
    pub fn new(config: EventQueueConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let execution_id = config
            .execution_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let sampler = ResourceSampler::new(config.resource_refresh_interval);
        let semaphore = Arc::new(FlowSemaphore::new(config.max_concurrent));
        let max_processed = config.max_processed_events;

        Ok(Self {
            config,
            execution_id,
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                processed: ProcessedEvents::new(max_processed),
            }),
            sampler: Mutex::new(sampler),
            semaphore,
            draining: AtomicBool::new(false),
            counters: QueueCounters::default(),
            persistor: None,
            event_store: None,
            compression: Arc::new(NoopCompression),
        })
    }

    pub fn with_persistor(mut self, persistor: Arc<dyn Persistor>) -> Self {
        self.persistor = Some(persistor);
        self
    }

    pub fn with_event_store(mut self, event_store: Arc<dyn EventStore>) -> Self {
        self.event_store = Some(event_store);
        self
    }

    pub fn with_compression(mut self, compression: Arc<dyn CompressionStrategy>) -> Self {
        self.compression = compression;
        self
    }

    /// Enqueue an event. Returns `false` on duplicate, size-policy or
    /// queue-full rejection; never fails otherwise. Persistence and
    /// event-store forwarding are best-effort and cannot fail the enqueue.
    pub async fn enqueue(&self, event: Event, priority: i32) -> bool {
        {
            let state = self.state.lock();
            if Self::is_duplicate(&state, &event.id) {
                self.counters.rejected_duplicates.fetch_add(1, Ordering::SeqCst);
                debug!(event_id = %event.id, "duplicate event rejected");
                return false;
            }
        }

        let size = estimated_size(&event);
        if size > self.config.max_event_size
            || (size >= self.config.huge_event_threshold && self.config.drop_huge_events)
        {
            self.counters.rejected_huge.fetch_add(1, Ordering::SeqCst);
            warn!(event_id = %event.id, size, "oversized event dropped");
            return false;
        }

        if let Some(depth) = self.config.max_queue_depth {
            // Drop-new policy: the queue never evicts old items to make room.
            if self.state.lock().items.len() >= depth {
                self.counters.rejected_queue_full.fetch_add(1, Ordering::SeqCst);
                debug!(event_id = %event.id, depth, "queue full, event dropped");
                return false;
            }
        }

        if self.config.enable_observability && self.backpressure_active() {
            debug!(queue_size = self.len(), "backpressure active at enqueue");
        }

        let is_large = size >= self.config.large_event_threshold;
        let is_huge = size >= self.config.huge_event_threshold;
        if is_large {
            self.counters.large_events.fetch_add(1, Ordering::SeqCst);
        }
        if is_huge {
            self.counters.huge_events.fetch_add(1, Ordering::SeqCst);
        }

        let mut event = event;
        let compressed = is_large && self.config.enable_compression;
        if compressed {
            // The strategy owns byte-level work; the queue only annotates.
            event.metadata.compressed = true;
            event.metadata.original_size = Some(size);
            event.metadata.compressed_at = Some(Utc::now());
            self.counters.compressed_events.fetch_add(1, Ordering::SeqCst);
            debug!(
                event_id = %event.id,
                size,
                strategy = self.compression.name(),
                "compression policy applied"
            );
        }

        let mut item = QueueItem::new(event, priority, size);
        item.is_large = is_large;
        item.is_huge = is_huge;
        item.compressed = compressed;
        item.original_size = compressed.then_some(size);

        if self.config.enable_persistence && self.config.is_critical_event(&item.event.event_type)
        {
            if let Some(persistor) = &self.persistor {
                let snapshot = Snapshot::new(
                    self.execution_id.clone(),
                    vec![item.event.clone()],
                    "enqueued",
                );
                match persistor.append(snapshot).await {
                    Ok(()) => {
                        item.persisted_at = Some(Utc::now());
                        self.counters.persisted_events.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(error) => {
                        warn!(event_id = %item.event.id, %error, "persist failed, continuing")
                    }
                }
            }
        }

        let forwarded = {
            let mut state = self.state.lock();
            // The lock was released across the persistence await; recheck
            // both admission conditions.
            if Self::is_duplicate(&state, &item.event.id) {
                self.counters.rejected_duplicates.fetch_add(1, Ordering::SeqCst);
                return false;
            }
            if let Some(depth) = self.config.max_queue_depth {
                if state.items.len() >= depth {
                    self.counters.rejected_queue_full.fetch_add(1, Ordering::SeqCst);
                    debug!(event_id = %item.event.id, depth, "queue full, event dropped");
                    return false;
                }
            }
            let position = state
                .items
                .iter()
                .position(|existing| existing.priority < item.priority)
                .unwrap_or(state.items.len());
            let event = item.event.clone();
            state.items.insert(position, item);
            event
        };
        self.counters.enqueued.fetch_add(1, Ordering::SeqCst);

        if self.config.enable_event_store {
            if let Some(store) = &self.event_store {
                if let Err(error) = store.append_events(std::slice::from_ref(&forwarded)).await {
                    warn!(event_id = %forwarded.id, %error, "event store append failed, continuing");
                }
            }
        }

        true
    }

    fn is_duplicate(state: &QueueState, id: &str) -> bool {
        state.processed.contains(id) || state.items.iter().any(|item| item.event.id == id)
    }

    /// Remove and return the head item: highest priority, oldest among ties.
    pub fn dequeue_item(&self) -> Option<QueueItem> {
        self.state.lock().items.pop_front()
    }

    pub fn dequeue(&self) -> Option<Event> {
        self.dequeue_item().map(|item| item.event)
    }

    pub fn peek(&self) -> Option<Event> {
        self.state.lock().items.front().map(|item| item.event.clone())
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// True iff memory or CPU exceed their limits, or the configured depth
    /// limit is reached. Pure function of current samples and depth.
    pub fn backpressure_active(&self) -> bool {
        if let Some(depth) = self.config.max_queue_depth {
            if self.state.lock().items.len() >= depth {
                return true;
            }
        }
        let mut sampler = self.sampler.lock();
        sampler.memory_usage() > self.config.max_memory_usage
            || sampler.cpu_usage() > self.config.max_cpu_usage
    }

    /// Process up to `batch_size` events; returns how many completed
    /// successfully. Failures are isolated per event: a failing processor
    /// never aborts chunk siblings and never propagates to the caller.
    pub async fn process_batch<F, Fut>(&self, processor: F) -> usize
    where
        F: Fn(Event) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let processor = &processor;
        let mut remaining: VecDeque<QueueItem> = {
            let mut state = self.state.lock();
            let take = self.config.batch_size.min(state.items.len());
            state.items.drain(..take).collect()
        };
        if remaining.is_empty() {
            return 0;
        }

        let mut succeeded = 0usize;
        while !remaining.is_empty() {
            // Serialize everything under load, limited fan-out otherwise.
            let chunk_size = if self.backpressure_active() {
                1
            } else {
                MAX_CHUNK_FANOUT.min(remaining.len())
            };
            let chunk: Vec<QueueItem> = remaining.drain(..chunk_size).collect();

            let results = join_all(chunk.into_iter().map(|item| async move {
                let _permit = if self.config.enable_global_concurrency {
                    Some(self.semaphore.acquire().await)
                } else {
                    None
                };
                let event_id = item.event.id.clone();
                match processor(item.event).await {
                    Ok(()) => Ok(event_id),
                    Err(error) => {
                        warn!(event_id = %event_id, %error, "processor failed, event not marked processed");
                        Err(())
                    }
                }
            }))
            .await;

            for result in results {
                match result {
                    Ok(event_id) => {
                        // Marked strictly after successful completion, so a
                        // crash mid-processing cannot mark unfinished work.
                        self.state.lock().processed.insert(event_id);
                        self.counters.processed.fetch_add(1, Ordering::SeqCst);
                        succeeded += 1;
                    }
                    Err(()) => {
                        self.counters.failed.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
        }
        succeeded
    }

    /// Drain the queue in `batch_size` slices, strictly serializing batch to
    /// batch. Single-flight: a call while another drain is running is a
    /// logged no-op.
    pub async fn process_all<F, Fut>(&self, processor: F)
    where
        F: Fn(Event) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("process_all already running, ignoring re-entrant call");
            return;
        }
        let _guard = DrainGuard(&self.draining);

        while !self.is_empty() {
            self.process_batch(&processor).await;
            tokio::time::sleep(INTER_BATCH_YIELD).await;
        }
    }

    /// Stream stored events from the configured event store; empty stream if
    /// none is configured.
    pub fn replay_events(
        &self,
        from: DateTime<Utc>,
        options: ReplayOptions,
    ) -> BoxStream<'static, Vec<Event>> {
        match &self.event_store {
            Some(store) if self.config.enable_event_store => {
                store.replay_from_timestamp(from, options)
            }
            _ => {
                warn!("replay requested without an event store configured");
                Box::pin(futures::stream::empty())
            }
        }
    }

    pub fn get_stats(&self) -> QueueStats {
        let (queue_size, processed_events) = {
            let state = self.state.lock();
            (state.items.len(), state.processed.len())
        };
        QueueStats {
            queue_size,
            backpressure_active: self.backpressure_active(),
            available_permits: self.semaphore.available_permits(),
            waiting_acquires: self.semaphore.waiting_acquires(),
            processed_events,
            total_enqueued: self.counters.enqueued.load(Ordering::SeqCst),
            total_processed: self.counters.processed.load(Ordering::SeqCst),
            total_failed: self.counters.failed.load(Ordering::SeqCst),
            rejected_duplicates: self.counters.rejected_duplicates.load(Ordering::SeqCst),
            rejected_queue_full: self.counters.rejected_queue_full.load(Ordering::SeqCst),
            rejected_huge: self.counters.rejected_huge.load(Ordering::SeqCst),
            large_events: self.counters.large_events.load(Ordering::SeqCst),
            huge_events: self.counters.huge_events.load(Ordering::SeqCst),
            compressed_events: self.counters.compressed_events.load(Ordering::SeqCst),
            persisted_events: self.counters.persisted_events.load(Ordering::SeqCst),
        }
    }

    /// Reset in-memory state. Does not interrupt an in-flight drain.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.items.clear();
        state.processed.clear();
        info!("queue cleared");
    }

    /// Log final stats and reset. In-flight processing is not interrupted.
    pub fn destroy(&self) {
        let stats = self.get_stats();
        info!(
            total_enqueued = stats.total_enqueued,
            total_processed = stats.total_processed,
            total_failed = stats.total_failed,
            "queue destroyed"
        );
        self.clear();
    }

    pub fn config(&self) -> &EventQueueConfig {
        &self.config
    }

    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }
}

struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn estimated_size(event: &Event) -> usize {
    serde_json::to_vec(event)
        .map(|bytes| bytes.len())
        .unwrap_or(FALLBACK_EVENT_SIZE)
}
