//! Composable lazy event streams
//!
//! `EventStream<T>` wraps one underlying stream plus chainable combinators
//! that each consume the parent and return a new stream — nothing is pulled
//! from the source until the final consumer iterates. Streams are
//! single-pass: combinators take `self` by value and re-iteration is not
//! supported.

use super::manager::StreamHandle;
use super::operators::{CombineLatest, Debounce};
use futures::future;
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

pub struct EventStream<T> {
    inner: futures::stream::BoxStream<'static, T>,
    /// Present on manager-created streams; keeps the registry entry live
    /// through the whole combinator chain.
    handle: Option<StreamHandle>,
}

impl<T: Send + 'static> EventStream<T> {
    /// Wrap a raw stream without lifecycle tracking.
    pub fn new(source: impl Stream<Item = T> + Send + 'static) -> Self {
        Self {
            inner: source.boxed(),
            handle: None,
        }
    }

    pub(crate) fn with_handle(
        source: impl Stream<Item = T> + Send + 'static,
        handle: StreamHandle,
    ) -> Self {
        Self {
            inner: source.boxed(),
            handle: Some(handle),
        }
    }

    /// Keep items for which the predicate returns true.
    pub fn filter<P>(self, mut predicate: P) -> EventStream<T>
    where
        P: FnMut(&T) -> bool + Send + 'static,
    {
        derived(StreamExt::filter(self, move |item| {
            future::ready(predicate(item))
        }))
    }

    pub fn map<U, F>(self, f: F) -> EventStream<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> U + Send + 'static,
    {
        derived(StreamExt::map(self, f))
    }

    /// Yield items while the predicate is false; the first matching item is
    /// not emitted.
    pub fn until<P>(self, mut predicate: P) -> EventStream<T>
    where
        P: FnMut(&T) -> bool + Send + 'static,
    {
        derived(StreamExt::take_while(self, move |item| {
            future::ready(!predicate(item))
        }))
    }

    /// Yield items until the trigger future completes.
    pub fn take_until<F>(self, trigger: F) -> EventStream<T>
    where
        F: std::future::Future + Send + 'static,
        F::Output: Send,
    {
        derived(StreamExt::take_until(self, trigger))
    }

    /// Emit only the newest item after `duration` of source silence.
    pub fn debounce(self, duration: Duration) -> EventStream<T> {
        derived(Debounce::new(self.boxed(), duration))
    }

    /// Space consecutive items at least `duration` apart.
    pub fn throttle(self, duration: Duration) -> EventStream<T> {
        derived(tokio_stream::StreamExt::throttle(self, duration))
    }

    /// Group items into vectors of up to `size`, flushing a partial group
    /// when `timeout` elapses or the source ends.
    pub fn batch(self, size: usize, timeout: Duration) -> EventStream<Vec<T>> {
        derived(tokio_stream::StreamExt::chunks_timeout(self, size, timeout))
    }

    /// Interleave two streams of the same item type as items become ready.
    pub fn merge(self, other: EventStream<T>) -> EventStream<T> {
        derived(futures::stream::select(self, other))
    }

    /// Pair the latest values of both streams, emitting once both have
    /// yielded and on every update after.
    pub fn combine_latest<U>(self, other: EventStream<U>) -> EventStream<(T, U)>
    where
        T: Clone,
        U: Clone + Send + 'static,
    {
        derived(CombineLatest::new(self.boxed(), other.boxed()))
    }
}

fn derived<U: Send + 'static>(stream: impl Stream<Item = U> + Send + 'static) -> EventStream<U> {
    EventStream {
        inner: stream.boxed(),
        handle: None,
    }
}

impl<T> Stream for EventStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.get_mut();
        let poll = this.inner.as_mut().poll_next(cx);
        if let Some(handle) = &this.handle {
            match &poll {
                Poll::Ready(Some(_)) => handle.touch(),
                Poll::Ready(None) => handle.complete(),
                Poll::Pending => {}
            }
        }
        poll
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
