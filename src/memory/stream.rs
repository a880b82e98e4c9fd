//! Bounded notification queue.

use std::cell::Cell;
use std::fmt;

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::config::WatchConfig;
use crate::host::Notifier;
use crate::watch::Notification;

/// A notifier that queues notifications for later inspection.
///
/// The queue is bounded; when it is full new notifications are dropped and
/// counted instead of blocking the dispatcher.
pub struct NotificationStream<T, N> {
    tx: Sender<Notification<T, N>>,
    rx: Receiver<Notification<T, N>>,
    dropped: Cell<u64>,
}

impl<T, N> fmt::Debug for NotificationStream<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationStream")
            .field("queued", &self.rx.len())
            .field("dropped", &self.dropped.get())
            .finish()
    }
}

impl<T, N> NotificationStream<T, N> {
    /// A stream holding at most `capacity` notifications.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
        Self {
            tx,
            rx,
            dropped: Cell::new(0),
        }
    }

    /// A stream sized by `notification_capacity`.
    #[must_use]
    pub fn from_config(config: &WatchConfig) -> Self {
        Self::new(config.notification_capacity)
    }

    /// Next queued notification, if any.
    pub fn try_recv(&self) -> Option<Notification<T, N>> {
        self.rx.try_recv().ok()
    }

    /// Takes every queued notification.
    pub fn drain(&self) -> Vec<Notification<T, N>> {
        self.rx.try_iter().collect()
    }

    /// Number of queued notifications.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Returns true when nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Notifications dropped because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.get()
    }
}

impl<T: fmt::Debug, N: fmt::Debug> Notifier<T, N> for NotificationStream<T, N> {
    fn notify(&self, notification: Notification<T, N>) {
        match self.tx.try_send(notification) {
            Ok(()) => {}
            Err(TrySendError::Full(n)) => {
                self.dropped.set(self.dropped.get() + 1);
                tracing::warn!(
                    watch_id = %n.watch_id,
                    event = n.kind.event_name(),
                    dropped = self.dropped.get(),
                    "notification stream full; dropping"
                );
            }
            // Both ends live in `self`.
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}
