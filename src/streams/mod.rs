//! Lazy asynchronous event streams and their lifecycle manager

pub mod event_stream;
pub mod manager;
pub mod operators;

pub use event_stream::EventStream;
pub use manager::{StreamHandle, StreamInfo, StreamManager, StreamManagerStats};
pub use operators::{CombineLatest, Debounce};
