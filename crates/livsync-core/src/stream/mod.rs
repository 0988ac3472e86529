// ── Reactive streams ──
//
// Subscription types for consuming device state changes and node
// snapshots.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tracing::warn;

use crate::model::DeviceState;
use crate::store::ChangeOrigin;

/// One published device state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub node_id: String,
    pub device_name: String,
    pub state: DeviceState,
    pub origin: ChangeOrigin,
}

// ── Device changes ───────────────────────────────────────────────────

/// A subscription to every device state change.
///
/// Changes for one device arrive in write order. A subscriber that falls
/// more than the channel capacity behind skips the oldest changes; the
/// next change for each device still carries its full state.
/// Dropping the subscription (or calling [`unsubscribe`](Self::unsubscribe))
/// ends delivery.
pub struct Subscription {
    receiver: broadcast::Receiver<Arc<StateChange>>,
}

impl Subscription {
    pub(crate) fn new(receiver: broadcast::Receiver<Arc<StateChange>>) -> Self {
        Self { receiver }
    }

    /// Wait for the next change. Returns `None` once the store is gone.
    pub async fn recv(&mut self) -> Option<Arc<StateChange>> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "state subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// The next change if one is already queued.
    pub fn try_recv(&mut self) -> Option<Arc<StateChange>> {
        loop {
            match self.receiver.try_recv() {
                Ok(change) => return Some(change),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "state subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }

    /// Stop receiving changes.
    pub fn unsubscribe(self) {}

    /// Convert into a `Stream`, dropping lag notifications.
    pub fn into_stream(self) -> impl Stream<Item = Arc<StateChange>> + Send + Unpin {
        BroadcastStream::new(self.receiver).filter_map(|item| async move {
            match item {
                Ok(change) => Some(change),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "state subscriber lagged");
                    None
                }
            }
        })
        .boxed()
    }
}

// ── Node snapshots ───────────────────────────────────────────────────

/// A subscription to a collection of entities.
///
/// Holds the snapshot taken at subscription time; later snapshots arrive
/// by converting to a `Stream`.
pub struct EntityStream<T: Clone + Send + Sync + 'static> {
    current: Arc<Vec<Arc<T>>>,
    receiver: watch::Receiver<Arc<Vec<Arc<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> EntityStream<T> {
    pub(crate) fn new(receiver: watch::Receiver<Arc<Vec<Arc<T>>>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation time.
    pub fn current(&self) -> &Arc<Vec<Arc<T>>> {
        &self.current
    }

    /// Convert into a `Stream` of snapshots. The first item is the
    /// snapshot current at conversion time.
    pub fn into_stream(self) -> EntityWatchStream<T> {
        EntityWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct EntityWatchStream<T: Clone + Send + Sync + 'static> {
    inner: WatchStream<Arc<Vec<Arc<T>>>>,
}

impl<T: Clone + Send + Sync + 'static> Stream for EntityWatchStream<T> {
    type Item = Arc<Vec<Arc<T>>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
