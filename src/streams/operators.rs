//! Poll-driven stream operators
//!
//! `Debounce` and `CombineLatest` have no ecosystem equivalent, so they are
//! implemented as explicit state machines: a struct holding the source
//! stream(s), the latest-value cache, and the pending timer, driven by
//! `poll_next`. Operators the ecosystem already ships (throttle, chunking,
//! merge) are pulled from `tokio-stream`/`futures` instead.

use futures::stream::{BoxStream, Stream};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{sleep, Sleep};

/// Emits the most recent item once the source has been quiet for `duration`.
///
/// Holds at most one pending item; a newer item replaces it and restarts the
/// timer. When the source ends, any pending item is flushed immediately. At
/// most one source item is consumed per poll; after consuming one the task is
/// rescheduled rather than re-polled, so a synchronously always-ready source
/// cannot monopolize the executor.
pub struct Debounce<T> {
    source: BoxStream<'static, T>,
    pending: Option<T>,
    delay: Option<Pin<Box<Sleep>>>,
    duration: Duration,
    source_done: bool,
}

impl<T> Debounce<T> {
    pub fn new(source: BoxStream<'static, T>, duration: Duration) -> Self {
        Self {
            source,
            pending: None,
            delay: None,
            duration,
            source_done: false,
        }
    }
}

// Every field is either boxed or plain data; the struct is never structurally
// pinned, so moving it is fine.
impl<T> Unpin for Debounce<T> {}

impl<T> Stream for Debounce<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        let mut consumed = false;

        if !this.source_done {
            match this.source.as_mut().poll_next(cx) {
                Poll::Ready(Some(item)) => {
                    // Newest wins; every arrival restarts the quiet timer.
                    this.pending = Some(item);
                    this.delay = Some(Box::pin(sleep(this.duration)));
                    consumed = true;
                }
                Poll::Ready(None) => this.source_done = true,
                Poll::Pending => {}
            }
        }

        if this.source_done {
            this.delay = None;
            return Poll::Ready(this.pending.take());
        }

        if let Some(delay) = this.delay.as_mut() {
            if delay.as_mut().poll(cx).is_ready() {
                this.delay = None;
                return Poll::Ready(this.pending.take());
            }
        }

        if consumed {
            // Reschedule instead of re-polling the source in place.
            cx.waker().wake_by_ref();
        }
        Poll::Pending
    }
}

/// Tracks the most recent value per source, emitting a combined pair once
/// both sources have produced at least one value and on every update after.
///
/// Ends when both sources end, or as soon as either ends without ever
/// yielding (the pair can then never be completed). Each poll visits both
/// sources at most once, so an always-ready source cannot starve its sibling.
pub struct CombineLatest<A, B> {
    left: BoxStream<'static, A>,
    right: BoxStream<'static, B>,
    latest_left: Option<A>,
    latest_right: Option<B>,
    left_done: bool,
    right_done: bool,
}

impl<A, B> CombineLatest<A, B> {
    pub fn new(left: BoxStream<'static, A>, right: BoxStream<'static, B>) -> Self {
        Self {
            left,
            right,
            latest_left: None,
            latest_right: None,
            left_done: false,
            right_done: false,
        }
    }
}

impl<A, B> Unpin for CombineLatest<A, B> {}

impl<A: Clone, B: Clone> Stream for CombineLatest<A, B> {
    type Item = (A, B);

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<(A, B)>> {
        let this = self.get_mut();
        let mut consumed = false;

        if !this.left_done {
            match this.left.as_mut().poll_next(cx) {
                Poll::Ready(Some(value)) => {
                    this.latest_left = Some(value);
                    consumed = true;
                    if let (Some(a), Some(b)) = (&this.latest_left, &this.latest_right) {
                        return Poll::Ready(Some((a.clone(), b.clone())));
                    }
                }
                Poll::Ready(None) => this.left_done = true,
                Poll::Pending => {}
            }
        }

        if !this.right_done {
            match this.right.as_mut().poll_next(cx) {
                Poll::Ready(Some(value)) => {
                    this.latest_right = Some(value);
                    consumed = true;
                    if let (Some(a), Some(b)) = (&this.latest_left, &this.latest_right) {
                        return Poll::Ready(Some((a.clone(), b.clone())));
                    }
                }
                Poll::Ready(None) => this.right_done = true,
                Poll::Pending => {}
            }
        }

        let unreachable_pair = (this.left_done && this.latest_left.is_none())
            || (this.right_done && this.latest_right.is_none());
        if (this.left_done && this.right_done) || unreachable_pair {
            return Poll::Ready(None);
        }
        if consumed {
            // A value arrived without completing a pair; reschedule instead
            // of re-polling in place.
            cx.waker().wake_by_ref();
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream::{self, StreamExt};

    #[tokio::test]
    async fn debounce_keeps_newest_and_flushes_on_end() {
        let source = stream::iter(vec![1, 2, 3]).boxed();
        let collected: Vec<i32> = Debounce::new(source, Duration::from_millis(50))
            .collect()
            .await;
        assert_eq!(collected, vec![3]);
    }

    #[tokio::test(start_paused = true)]
    async fn debounce_emits_after_quiet_period() {
        let source = stream::iter(vec![7]).chain(stream::pending()).boxed();
        let mut debounced = Debounce::new(source, Duration::from_millis(50));
        assert_eq!(debounced.next().await, Some(7));
    }

    #[tokio::test]
    async fn combine_latest_waits_for_both_sources() {
        let (left_tx, left_rx) = tokio::sync::mpsc::channel(8);
        let (right_tx, right_rx) = tokio::sync::mpsc::channel(8);
        let mut combined = CombineLatest::new(
            tokio_stream::wrappers::ReceiverStream::new(left_rx).boxed(),
            tokio_stream::wrappers::ReceiverStream::new(right_rx).boxed(),
        );

        left_tx.send(1).await.expect("send");
        right_tx.send(10).await.expect("send");
        assert_eq!(combined.next().await, Some((1, 10)));

        left_tx.send(2).await.expect("send");
        assert_eq!(combined.next().await, Some((2, 10)));

        right_tx.send(20).await.expect("send");
        assert_eq!(combined.next().await, Some((2, 20)));

        drop(left_tx);
        drop(right_tx);
        assert_eq!(combined.next().await, None);
    }

    #[tokio::test]
    async fn combine_latest_pairs_despite_an_always_ready_side() {
        let left = stream::repeat(1).boxed();
        let right = stream::iter(vec![2]).boxed();
        let mut combined = CombineLatest::new(left, right);

        let pair = tokio::time::timeout(Duration::from_secs(2), combined.next())
            .await
            .expect("pair within deadline");
        assert_eq!(pair, Some((1, 2)));
    }

    #[tokio::test]
    async fn debounce_of_a_never_quiet_source_stays_cancellable() {
        let source = stream::repeat(1).boxed();
        let mut debounced = Debounce::new(source, Duration::from_secs(60));

        // The source is never quiet, so nothing is emitted; the poll loop
        // must still yield so the surrounding timeout can fire.
        let result = tokio::time::timeout(Duration::from_millis(50), debounced.next()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn combine_latest_ends_when_a_source_never_yields() {
        let left = stream::iter(vec![1, 2]).boxed();
        let right = stream::empty::<i32>().boxed();
        let collected: Vec<(i32, i32)> = CombineLatest::new(left, right).collect().await;
        assert!(collected.is_empty());
    }
}
