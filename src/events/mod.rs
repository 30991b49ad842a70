//! Event model for the flow-control core
//!
//! Events are opaque to the queue: `data` is an arbitrary JSON payload and the
//! queue only inspects `id` (dedup), `event_type` (persistence criticality) and
//! the serialized size. An event is immutable once enqueued except for
//! non-semantic metadata annotations such as compression markers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A single event flowing through the queue.
///
/// `event_type` is dot-namespaced (`agent.started`, `workflow.step.completed`);
/// prefix matching against it decides persistence criticality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique per logical occurrence; duplicates are rejected at enqueue.
    pub id: String,
    pub event_type: String,
    pub data: serde_json::Value,
    pub ts: DateTime<Utc>,
    #[serde(default)]
    pub metadata: EventMetadata,
}

/// Non-semantic annotations attached to an event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    /// Set by the queue when the compression policy applied to this event.
    #[serde(default)]
    pub compressed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_at: Option<DateTime<Utc>>,
    /// Free-form extras the queue never interprets.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Event {
    /// Create an event with a generated id and the current timestamp.
    pub fn new(event_type: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            data,
            ts: Utc::now(),
            metadata: EventMetadata::default(),
        }
    }

    /// Create an event with a caller-supplied id.
    pub fn with_id(
        id: impl Into<String>,
        event_type: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            event_type: event_type.into(),
            data,
            ts: Utc::now(),
            metadata: EventMetadata::default(),
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.metadata.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.metadata.tenant_id = Some(tenant_id.into());
        self
    }
}

/// Queue-local bookkeeping around an enqueued event.
///
/// Created at enqueue, consumed at dequeue or batch processing; never mutated
/// after it leaves the queue.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub event: Event,
    pub enqueued_at: DateTime<Utc>,
    /// Higher is served first; FIFO among equals.
    pub priority: i32,
    pub retry_count: u32,
    /// Best-effort serialized byte length.
    pub size: usize,
    pub is_large: bool,
    pub is_huge: bool,
    pub compressed: bool,
    pub original_size: Option<usize>,
    /// Set only if the item was durably appended via the persistor.
    pub persisted_at: Option<DateTime<Utc>>,
}

impl QueueItem {
    pub fn new(event: Event, priority: i32, size: usize) -> Self {
        Self {
            event,
            enqueued_at: Utc::now(),
            priority,
            retry_count: 0,
            size,
            is_large: false,
            is_huge: false,
            compressed: false,
            original_size: None,
            persisted_at: None,
        }
    }
}
