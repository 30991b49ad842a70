//! Resource sampling and advisory monitoring

pub mod memory_monitor;
pub mod sampler;

pub use memory_monitor::{
    AlertCallback, MemoryAlert, MemoryAlertKind, MemoryMonitor, MemoryMonitorConfig, MemorySample,
};
pub use sampler::ResourceSampler;
