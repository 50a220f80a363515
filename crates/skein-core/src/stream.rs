// ── State subscriptions ──
//
// Subscription types for observing a collection's state over time.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::state::CollectionState;

/// A subscription to one collection's state.
///
/// Provides both point-in-time snapshot access and change notification
/// via [`changed()`](Self::changed) or by converting into a `Stream`.
pub struct CollectionStream<T: Clone + Send + Sync + 'static> {
    current: CollectionState<T>,
    receiver: watch::Receiver<CollectionState<T>>,
}

impl<T: Clone + Send + Sync + 'static> CollectionStream<T> {
    pub(crate) fn new(receiver: watch::Receiver<CollectionState<T>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The state captured at creation time or at the last `changed()`.
    pub fn current(&self) -> &CollectionState<T> {
        &self.current
    }

    /// The latest state (may have moved on since `current`).
    pub fn latest(&self) -> CollectionState<T> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new state.
    /// Returns `None` once every handle to the collection has been dropped.
    pub async fn changed(&mut self) -> Option<CollectionState<T>> {
        self.receiver.changed().await.ok()?;
        let state = self.receiver.borrow_and_update().clone();
        self.current = state.clone();
        Some(state)
    }

    /// Wait until `predicate` holds for the latest state.
    pub async fn wait_for(
        &mut self,
        mut predicate: impl FnMut(&CollectionState<T>) -> bool,
    ) -> Option<CollectionState<T>> {
        let state = self.receiver.wait_for(|s| predicate(s)).await.ok()?.clone();
        self.current = state.clone();
        Some(state)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> CollectionWatchStream<T> {
        CollectionWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
///
/// Yields the full state each time the collection changes, starting with
/// the state at conversion time.
pub struct CollectionWatchStream<T: Clone + Send + Sync + 'static> {
    inner: WatchStream<CollectionState<T>>,
}

impl<T: Clone + Send + Sync + 'static> Stream for CollectionWatchStream<T> {
    type Item = CollectionState<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
