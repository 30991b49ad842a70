//! Stream pipeline integration tests
//!
//! Builds manager-tracked combinator chains end to end and checks laziness,
//! grouping, merging, pairing, and registry cleanup.

use eventflow::{EventStream, StreamManager};
use futures::stream::{self, Stream, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn counting_source(pulled: Arc<AtomicUsize>) -> impl Stream<Item = u64> + Send {
    stream::unfold(0u64, move |n| {
        let pulled = Arc::clone(&pulled);
        async move {
            pulled.fetch_add(1, Ordering::SeqCst);
            Some((n, n + 1))
        }
    })
}

#[tokio::test]
async fn managed_pipeline_is_lazy() {
    init_tracing();
    let manager = StreamManager::new();
    let pulled = Arc::new(AtomicUsize::new(0));
    let mut pipeline = manager
        .create_stream(counting_source(Arc::clone(&pulled)))
        .map(|n| n * 3)
        .filter(|n| n % 2 == 0);

    assert_eq!(pulled.load(Ordering::SeqCst), 0);
    assert_eq!(pipeline.next().await, Some(0));
    assert_eq!(pipeline.next().await, Some(6));
    // 0, (1 filtered), 2: three pulls from an infinite source, no more.
    assert_eq!(pulled.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn batch_then_map_aggregates_groups() {
    init_tracing();
    let sums: Vec<u32> = EventStream::new(stream::iter(1..=7u32))
        .batch(3, Duration::from_secs(1))
        .map(|group| group.into_iter().sum::<u32>())
        .collect()
        .await;
    assert_eq!(sums, vec![6, 15, 7]);
}

#[tokio::test]
async fn merge_feeds_downstream_combinators() {
    init_tracing();
    let left = EventStream::new(stream::iter(vec![1, 3, 5]));
    let right = EventStream::new(stream::iter(vec![2, 4, 6]));
    let mut items: Vec<u32> = left
        .merge(right)
        .filter(|n| *n != 4)
        .collect()
        .await;
    items.sort_unstable();
    assert_eq!(items, vec![1, 2, 3, 5, 6]);
}

#[tokio::test]
async fn combine_latest_pairs_live_updates() {
    init_tracing();
    let (tx_a, rx_a) = mpsc::channel::<u32>(8);
    let (tx_b, rx_b) = mpsc::channel::<&str>(8);

    let combined = EventStream::new(ReceiverStream::new(rx_a))
        .combine_latest(EventStream::new(ReceiverStream::new(rx_b)));
    let collector = tokio::spawn(combined.collect::<Vec<(u32, &str)>>());

    tx_a.send(1).await.unwrap();
    tokio::task::yield_now().await;
    tx_b.send("a").await.unwrap();
    tokio::task::yield_now().await;
    tx_a.send(2).await.unwrap();
    tokio::task::yield_now().await;
    tx_b.send("b").await.unwrap();
    drop(tx_a);
    drop(tx_b);

    let pairs = collector.await.unwrap();
    assert_eq!(pairs.first(), Some(&(1, "a")));
    assert_eq!(pairs.last(), Some(&(2, "b")));
    assert!(pairs.len() >= 2);
}

#[tokio::test(start_paused = true)]
async fn debounce_emits_only_the_settled_value() {
    init_tracing();
    let (tx, rx) = mpsc::channel::<u32>(8);
    let debounced = EventStream::new(ReceiverStream::new(rx)).debounce(Duration::from_millis(50));
    let collector = tokio::spawn(debounced.collect::<Vec<u32>>());

    for n in [1, 2, 3] {
        tx.send(n).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    tx.send(9).await.unwrap();
    drop(tx);

    let items = collector.await.unwrap();
    assert_eq!(items, vec![3, 9]);
}

#[tokio::test]
async fn registry_reflects_consumption_and_cleanup() {
    init_tracing();
    let manager = StreamManager::new();

    let finished = manager.create_stream(stream::iter(vec![1, 2, 3]));
    let consumed: Vec<i32> = finished.collect().await;
    assert_eq!(consumed, vec![1, 2, 3]);

    let _live = manager.create_stream(stream::iter(vec![4, 5]));

    let stats = manager.get_stats();
    assert_eq!(stats.total_created, 2);
    assert_eq!(stats.tracked, 2);
    assert_eq!(stats.active, 1);

    // Only the consumed stream's entry is removable.
    assert_eq!(manager.cleanup(Duration::from_secs(3600)), 1);
    assert_eq!(manager.get_stats().tracked, 1);
}
