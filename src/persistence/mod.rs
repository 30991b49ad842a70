//! Collaborator contracts for durable storage
//!
//! The queue never owns storage. Critical events are handed to a [`Persistor`]
//! as point-in-time [`Snapshot`]s and optionally forwarded raw to an
//! [`EventStore`]; both are best-effort from the queue's point of view —
//! failures are logged by the caller and never propagate into enqueue results.

use crate::events::Event;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Point-in-time durable record appended to external storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub execution_id: String,
    pub timestamp: DateTime<Utc>,
    pub events: Vec<Event>,
    /// Queue-side state label at snapshot time (e.g. `"enqueued"`).
    pub state: String,
    /// Hex sha256 over the serialized events.
    pub hash: String,
}

impl Snapshot {
    pub fn new(execution_id: impl Into<String>, events: Vec<Event>, state: impl Into<String>) -> Self {
        let hash = integrity_hash(&events);
        Self {
            execution_id: execution_id.into(),
            timestamp: Utc::now(),
            events,
            state: state.into(),
            hash,
        }
    }
}

fn integrity_hash(events: &[Event]) -> String {
    let mut hasher = Sha256::new();
    for event in events {
        // Serialization of an already-serializable event cannot fail; fall
        // back to the id so the hash stays stable either way.
        match serde_json::to_vec(event) {
            Ok(bytes) => hasher.update(&bytes),
            Err(_) => hasher.update(event.id.as_bytes()),
        }
    }
    format!("{:x}", hasher.finalize())
}

/// External durable store for critical-event snapshots.
#[async_trait]
pub trait Persistor: Send + Sync {
    async fn append(&self, snapshot: Snapshot) -> Result<()>;
}

/// Options for [`EventStore::replay_from_timestamp`].
#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// Events per replayed batch.
    pub batch_size: usize,
    /// Restrict replay to these event types; `None` replays everything.
    pub event_types: Option<Vec<String>>,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            event_types: None,
        }
    }
}

/// External append-only event log with timestamp replay.
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append_events(&self, events: &[Event]) -> Result<()>;

    /// Stream stored events in batches, oldest first, starting at `from`.
    fn replay_from_timestamp(
        &self,
        from: DateTime<Utc>,
        options: ReplayOptions,
    ) -> BoxStream<'static, Vec<Event>>;
}
