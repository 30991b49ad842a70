//! Event queue and flow-control core for agent runtimes
//!
//! This crate provides the in-process event plumbing an agent runtime sits
//! on: a priority queue with adaptive backpressure and bounded-concurrency
//! batch processing, plus the reliability and observation primitives around
//! it.
//!
//! # Architecture
//!
//! - **EventQueue**: priority-ordered buffering with deduplication,
//!   size/compression policy, optional persistence hooks, and chunked
//!   concurrent processing with per-event fault isolation
//! - **CircuitBreaker**: CLOSED/OPEN/HALF_OPEN protection for any async
//!   operation, with a never-throw result envelope
//! - **FlowSemaphore**: FIFO concurrency gate shared across batches
//! - **ResourceSampler / MemoryMonitor**: cached OS sampling for backpressure
//!   decisions and advisory leak/threshold alerts
//! - **StreamManager / EventStream**: lazy composable stream combinators
//!   (filter, map, debounce, throttle, batch, merge, combine_latest) with
//!   lifecycle tracking
//!
//! # Usage
//!
//! ```no_run
//! use eventflow::{Event, EventQueue, EventQueueConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let queue = EventQueue::new(EventQueueConfig::default())?;
//!
//!     queue
//!         .enqueue(Event::new("agent.started", serde_json::json!({"agent": "planner"})), 10)
//!         .await;
//!
//!     queue
//!         .process_all(|event| async move {
//!             tracing::info!(event_type = %event.event_type, "handling event");
//!             Ok(())
//!         })
//!         .await;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod events;
pub mod persistence;
pub mod queue;
pub mod reliability;
pub mod resources;
pub mod streams;

pub use config::{ConfigError, EventQueueConfig};
pub use events::{Event, EventMetadata, QueueItem};
pub use persistence::{EventStore, Persistor, ReplayOptions, Snapshot};
pub use queue::{CompressionStrategy, EventQueue, NoopCompression, QueueStats};
pub use reliability::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState, ExecutionOutcome,
    FlowSemaphore,
};
pub use resources::{
    MemoryAlert, MemoryAlertKind, MemoryMonitor, MemoryMonitorConfig, ResourceSampler,
};
pub use streams::{EventStream, StreamManager, StreamManagerStats};
