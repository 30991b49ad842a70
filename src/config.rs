//! Queue configuration
//!
//! All knobs are optional with the defaults below; `validate()` catches
//! out-of-range combinations before a queue is built.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const KIB: usize = 1024;
pub const MIB: usize = 1024 * 1024;

/// Configuration errors raised by [`EventQueueConfig::validate`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be within (0.0, 1.0], got {value}")]
    RatioOutOfRange { field: &'static str, value: f64 },

    #[error("{field} must be greater than zero")]
    ZeroNotAllowed { field: &'static str },

    #[error("size thresholds must be ordered: large ({large}) < huge ({huge}) <= max ({max})")]
    ThresholdsUnordered { large: usize, huge: usize, max: usize },
}

/// Configuration for [`EventQueue`](crate::queue::EventQueue).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventQueueConfig {
    /// Memory utilization ratio above which backpressure activates.
    pub max_memory_usage: f64,
    /// CPU utilization ratio above which backpressure activates.
    pub max_cpu_usage: f64,
    /// Queue depth limit; `None` means unbounded. Enqueue beyond the limit is
    /// drop-new, never evict-old.
    pub max_queue_depth: Option<usize>,
    pub enable_observability: bool,
    /// Events drained per processing batch.
    pub batch_size: usize,
    /// Permits on the shared semaphore when global concurrency gating is on.
    pub max_concurrent: usize,
    /// At or above this serialized size the compression policy applies.
    pub large_event_threshold: usize,
    /// At or above this serialized size an event counts as huge.
    pub huge_event_threshold: usize,
    pub enable_compression: bool,
    /// Hard ceiling; events above this are always rejected.
    pub max_event_size: usize,
    /// Reject events at or above `huge_event_threshold` instead of enqueuing.
    pub drop_huge_events: bool,
    pub enable_persistence: bool,
    /// Execution id stamped into persisted snapshots.
    pub execution_id: Option<String>,
    pub persist_critical_events: bool,
    pub persist_all_events: bool,
    /// Exact-match event types that qualify as critical.
    pub critical_event_types: Vec<String>,
    /// Prefix-match event types that qualify as critical.
    pub critical_event_prefixes: Vec<String>,
    pub enable_event_store: bool,
    /// Gate every processed event through the shared semaphore.
    pub enable_global_concurrency: bool,
    /// Bound on the processed-id dedup set.
    pub max_processed_events: usize,
    /// Minimum interval between OS resource refreshes.
    #[serde(with = "duration_millis")]
    pub resource_refresh_interval: Duration,
}

impl Default for EventQueueConfig {
    fn default() -> Self {
        Self {
            max_memory_usage: 0.8,
            max_cpu_usage: 0.85,
            max_queue_depth: None,
            enable_observability: true,
            batch_size: 20,
            max_concurrent: 25,
            large_event_threshold: MIB,
            huge_event_threshold: 10 * MIB,
            enable_compression: true,
            max_event_size: 100 * MIB,
            drop_huge_events: false,
            enable_persistence: false,
            execution_id: None,
            persist_critical_events: true,
            persist_all_events: false,
            critical_event_types: Vec::new(),
            critical_event_prefixes: vec!["agent.".to_string(), "workflow.".to_string()],
            enable_event_store: false,
            enable_global_concurrency: false,
            max_processed_events: 1000,
            resource_refresh_interval: Duration::from_secs(1),
        }
    }
}

impl EventQueueConfig {
    /// Tuned for sustained high-throughput workloads.
    pub fn production() -> Self {
        Self {
            batch_size: 100,
            max_concurrent: 50,
            max_queue_depth: Some(50_000),
            enable_global_concurrency: true,
            max_processed_events: 10_000,
            ..Self::default()
        }
    }

    /// Small bounds for constrained or embedded use.
    pub fn minimal() -> Self {
        Self {
            batch_size: 5,
            max_concurrent: 2,
            max_queue_depth: Some(500),
            enable_compression: false,
            max_processed_events: 100,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("max_memory_usage", self.max_memory_usage),
            ("max_cpu_usage", self.max_cpu_usage),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::RatioOutOfRange { field, value });
            }
        }

        for (field, value) in [
            ("batch_size", self.batch_size),
            ("max_concurrent", self.max_concurrent),
            ("max_processed_events", self.max_processed_events),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroNotAllowed { field });
            }
        }

        if self.large_event_threshold >= self.huge_event_threshold
            || self.huge_event_threshold > self.max_event_size
        {
            return Err(ConfigError::ThresholdsUnordered {
                large: self.large_event_threshold,
                huge: self.huge_event_threshold,
                max: self.max_event_size,
            });
        }

        Ok(())
    }

    /// Whether an event type qualifies for durable persistence.
    pub fn is_critical_event(&self, event_type: &str) -> bool {
        if self.persist_all_events {
            return true;
        }
        if !self.persist_critical_events {
            return false;
        }
        self.critical_event_types.iter().any(|t| t == event_type)
            || self
                .critical_event_prefixes
                .iter()
                .any(|p| event_type.starts_with(p.as_str()))
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EventQueueConfig::default().validate().is_ok());
        assert!(EventQueueConfig::production().validate().is_ok());
        assert!(EventQueueConfig::minimal().validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_ratio() {
        let config = EventQueueConfig {
            max_memory_usage: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RatioOutOfRange { field: "max_memory_usage", .. })
        ));
    }

    #[test]
    fn rejects_unordered_thresholds() {
        let config = EventQueueConfig {
            large_event_threshold: 10 * MIB,
            huge_event_threshold: MIB,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ThresholdsUnordered { .. })
        ));
    }

    #[test]
    fn critical_matching_uses_exact_types_and_prefixes() {
        let config = EventQueueConfig {
            critical_event_types: vec!["kernel.shutdown".to_string()],
            ..Default::default()
        };
        assert!(config.is_critical_event("agent.started"));
        assert!(config.is_critical_event("workflow.step.completed"));
        assert!(config.is_critical_event("kernel.shutdown"));
        assert!(!config.is_critical_event("kernel.tick"));
        assert!(!config.is_critical_event("telemetry.sample"));
    }

    #[test]
    fn persist_all_overrides_critical_matching() {
        let config = EventQueueConfig {
            persist_all_events: true,
            ..Default::default()
        };
        assert!(config.is_critical_event("telemetry.sample"));
    }
}
