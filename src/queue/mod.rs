//! Event queue and flow-control core

pub mod compression;
pub mod dedup;
pub mod event_queue;

pub use compression::{CompressionStrategy, NoopCompression};
pub use dedup::ProcessedEvents;
pub use event_queue::{EventQueue, QueueStats};
