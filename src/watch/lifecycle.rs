//! Subscription lifecycle.
//!
//! A [`LiveSubscription`] is Active from `open` until `cancel`, then Destroyed
//! for good. Cancelling unsubscribes from the host exactly once; dropping an
//! active subscription cancels it as well.

use std::cell::Cell;
use std::rc::Rc;

use crate::error::{LifecycleError, WatchResult};
use crate::host::{Delivery, Host, MutationFeed};
use crate::mutation::MutationBatch;

use super::dispatcher::Dispatch;
use super::WatchId;

/// Host subscription owned by one observer instance.
pub struct LiveSubscription<F: MutationFeed> {
    watch_id: WatchId,
    feed: Rc<F>,
    handle: Option<F::Subscription>,
    live: Rc<Cell<bool>>,
}

impl<F: MutationFeed> LiveSubscription<F> {
    /// Subscribes `dispatcher` to `target` with the host's observe config.
    pub fn open<D>(
        watch_id: WatchId,
        host: &Host<F>,
        target: &F::Target,
        dispatcher: D,
    ) -> WatchResult<Self>
    where
        D: Dispatch<F::Node> + 'static,
    {
        let config = host.config.observe;
        config.validate()?;

        let live = Rc::new(Cell::new(true));
        let flag = Rc::clone(&live);
        let feed = Rc::downgrade(&host.feed);

        let delivery: Delivery<F::Node> = Box::new(move |batch: MutationBatch<F::Node>| {
            // A host may still hand over a batch it queued before unsubscribe.
            if !flag.get() {
                tracing::warn!(%watch_id, records = batch.len(), "dropping batch delivered after destroy");
                return;
            }
            let report = dispatcher.dispatch(&batch);
            if report.is_clean() {
                return;
            }
            if let Some(feed) = feed.upgrade() {
                for failure in &report.failures {
                    feed.report_failure(failure);
                }
            }
        });

        let handle = host.feed.subscribe(target, &config, delivery)?;
        tracing::debug!(%watch_id, ?target, ?config, "subscribed");

        Ok(Self {
            watch_id,
            feed: Rc::clone(&host.feed),
            handle: Some(handle),
            live,
        })
    }

    /// Returns true until the subscription is cancelled.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    /// Fails with [`LifecycleError::Destroyed`] once cancelled.
    pub fn ensure_active(&self) -> WatchResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(LifecycleError::Destroyed {
                watch_id: self.watch_id,
            }
            .into())
        }
    }

    /// Unsubscribes from the host. A second call fails without touching the host.
    pub fn cancel(&mut self) -> WatchResult<()> {
        let Some(handle) = self.handle.take() else {
            return Err(LifecycleError::Destroyed {
                watch_id: self.watch_id,
            }
            .into());
        };
        self.live.set(false);
        self.feed.unsubscribe(handle);
        tracing::debug!(watch_id = %self.watch_id, "unsubscribed");
        Ok(())
    }
}

impl<F: MutationFeed> Drop for LiveSubscription<F> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.live.set(false);
            self.feed.unsubscribe(handle);
            tracing::debug!(watch_id = %self.watch_id, "unsubscribed on drop");
        }
    }
}
