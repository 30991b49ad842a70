//! Stream lifecycle tracking
//!
//! The manager registers every stream it creates and records liveness
//! (`created_at` / `last_access` / `is_active`) for diagnostics and bulk
//! cleanup. Tracking is passive: it never affects what a stream yields.

use super::event_stream::EventStream;
use futures::stream::Stream;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
pub struct StreamInfo {
    pub created_at: Instant,
    pub last_access: Instant,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StreamManagerStats {
    /// Registry entries, active or not.
    pub tracked: usize,
    pub active: usize,
    pub total_created: u64,
}

type Registry = Arc<RwLock<HashMap<Uuid, StreamInfo>>>;

#[derive(Default)]
pub struct StreamManager {
    registry: Registry,
    total_created: AtomicU64,
}

impl StreamManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a source stream and track its lifecycle until it is dropped or
    /// runs to completion.
    pub fn create_stream<T, S>(&self, source: S) -> EventStream<T>
    where
        T: Send + 'static,
        S: Stream<Item = T> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let now = Instant::now();
        self.registry.write().insert(
            id,
            StreamInfo {
                created_at: now,
                last_access: now,
                is_active: true,
            },
        );
        self.total_created.fetch_add(1, Ordering::SeqCst);
        debug!(stream_id = %id, "stream registered");

        EventStream::with_handle(
            source,
            StreamHandle {
                id,
                registry: Arc::clone(&self.registry),
            },
        )
    }

    /// Drop registry entries that are inactive or idle beyond `max_idle`.
    /// Returns how many were removed.
    pub fn cleanup(&self, max_idle: Duration) -> usize {
        let mut registry = self.registry.write();
        let before = registry.len();
        registry.retain(|_, info| info.is_active && info.last_access.elapsed() <= max_idle);
        let removed = before - registry.len();
        if removed > 0 {
            info!(removed, "cleaned up stream registrations");
        }
        removed
    }

    pub fn get_stats(&self) -> StreamManagerStats {
        let registry = self.registry.read();
        StreamManagerStats {
            tracked: registry.len(),
            active: registry.values().filter(|info| info.is_active).count(),
            total_created: self.total_created.load(Ordering::SeqCst),
        }
    }
}

/// Carried inside manager-created streams; updates the registry on yields and
/// marks the entry inactive when the stream chain is dropped.
pub struct StreamHandle {
    id: Uuid,
    registry: Registry,
}

impl StreamHandle {
    pub(crate) fn touch(&self) {
        if let Some(info) = self.registry.write().get_mut(&self.id) {
            info.last_access = Instant::now();
        }
    }

    pub(crate) fn complete(&self) {
        if let Some(info) = self.registry.write().get_mut(&self.id) {
            info.is_active = false;
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        if let Some(info) = self.registry.write().get_mut(&self.id) {
            info.is_active = false;
        }
        debug!(stream_id = %self.id, "stream released");
    }
}
