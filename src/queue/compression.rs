//! Pluggable compression for large events
//!
//! The default strategy is a deliberate no-op: it leaves payload bytes
//! untouched and the queue only annotates metadata (`compressed`,
//! `original_size`, `compressed_at`). Real codecs plug in through
//! [`EventQueue::with_compression`](crate::queue::EventQueue::with_compression).

pub trait CompressionStrategy: Send + Sync {
    fn compress(&self, bytes: &[u8]) -> Vec<u8>;
    fn decompress(&self, bytes: &[u8]) -> Vec<u8>;
    fn name(&self) -> &'static str;
}

/// Placeholder strategy: annotate-only, bytes pass through unchanged.
#[derive(Debug, Default)]
pub struct NoopCompression;

impl CompressionStrategy for NoopCompression {
    fn compress(&self, bytes: &[u8]) -> Vec<u8> {
        bytes.to_vec()
    }

    fn decompress(&self, bytes: &[u8]) -> Vec<u8> {
        bytes.to_vec()
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_round_trips_bytes_unchanged() {
        let strategy = NoopCompression;
        let payload = b"large event payload".to_vec();
        let compressed = strategy.compress(&payload);
        assert_eq!(compressed, payload);
        assert_eq!(strategy.decompress(&compressed), payload);
    }
}
