//! Mutation dispatcher.
//!
//! Consumes one batch against the current trigger state and produces
//! reactions. Per `childList` record, added nodes are handled before removed
//! nodes; within a direction, nodes fire in batch order and selectors in
//! registry order. Every other record kind is ignored.
//!
//! The registry is read through a short borrow per node and released before
//! any reaction runs, so a reaction may add or remove triggers on its own
//! observer. Changes apply from the next node on.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{MatchError, ReactionError};
use crate::host::{Matcher, Notifier};
use crate::mutation::{Direction, MutationBatch};
use crate::selector::Selector;

use super::events::{Notification, NotificationKind};
use super::registry::{CallbackTriggers, SelectorSet, TriggerRegistry};
use super::WatchId;

/// A reaction that returned an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionFailure {
    /// Observer that ran the reaction.
    pub watch_id: WatchId,
    /// Side of the change the node was on.
    pub direction: Direction,
    /// Selector whose reaction failed.
    pub selector: Selector,
    /// The failure.
    pub error: ReactionError,
}

/// What one batch produced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// `childList` records processed.
    pub records_seen: usize,
    /// Records of other kinds, skipped.
    pub records_ignored: usize,
    /// Reactions invoked or notifications raised.
    pub reactions: usize,
    /// Reactions that returned an error.
    pub failures: Vec<ReactionFailure>,
}

impl DispatchReport {
    /// Returns true when every reaction succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Something that turns a batch into reactions.
pub trait Dispatch<N> {
    /// Processes one batch.
    fn dispatch(&self, batch: &MutationBatch<N>) -> DispatchReport;
}

/// Entries of `registry` that `node` matches, in registry order.
///
/// Matcher errors count as a miss. Selectors are validated at registration,
/// so a selector error here means the host changed its mind and is logged
/// loudly; an unknown node is routine for detached nodes.
fn matching<N, V: Clone>(
    watch_id: WatchId,
    registry: &TriggerRegistry<V>,
    matcher: &dyn Matcher<N>,
    node: &N,
) -> Vec<(Selector, V)> {
    registry
        .iter()
        .filter(|(selector, _)| match matcher.matches(node, selector) {
            Ok(hit) => hit,
            Err(err @ MatchError::UnknownNode { .. }) => {
                tracing::trace!(%watch_id, %selector, error = %err, "unknown node treated as miss");
                false
            }
            Err(err) => {
                tracing::warn!(%watch_id, %selector, error = %err, "selector rejected by matcher");
                false
            }
        })
        .map(|(selector, value)| (selector.clone(), value.clone()))
        .collect()
}

/// Dispatch context of a callback observer.
///
/// Owns shared handles to the observer's registries; moved into the host
/// subscription.
pub struct CallbackDispatcher<N> {
    watch_id: WatchId,
    insert_triggers: Rc<RefCell<CallbackTriggers<N>>>,
    remove_triggers: Rc<RefCell<CallbackTriggers<N>>>,
    matcher: Rc<dyn Matcher<N>>,
}

impl<N> CallbackDispatcher<N> {
    /// Builds a dispatcher over shared registries.
    pub fn new(
        watch_id: WatchId,
        insert_triggers: Rc<RefCell<CallbackTriggers<N>>>,
        remove_triggers: Rc<RefCell<CallbackTriggers<N>>>,
        matcher: Rc<dyn Matcher<N>>,
    ) -> Self {
        Self {
            watch_id,
            insert_triggers,
            remove_triggers,
            matcher,
        }
    }

    fn triggers(&self, direction: Direction) -> &RefCell<CallbackTriggers<N>> {
        match direction {
            Direction::Inserted => &self.insert_triggers,
            Direction::Removed => &self.remove_triggers,
        }
    }
}

impl<N> Dispatch<N> for CallbackDispatcher<N> {
    fn dispatch(&self, batch: &MutationBatch<N>) -> DispatchReport {
        let mut report = DispatchReport::default();

        for record in batch {
            if !record.is_child_list() {
                report.records_ignored += 1;
                continue;
            }
            report.records_seen += 1;

            for direction in [Direction::Inserted, Direction::Removed] {
                for node in record.nodes(direction) {
                    let fired = matching(
                        self.watch_id,
                        &self.triggers(direction).borrow(),
                        self.matcher.as_ref(),
                        node,
                    );

                    for (selector, reaction) in fired {
                        report.reactions += 1;
                        if let Err(error) = reaction.call(node) {
                            report.failures.push(ReactionFailure {
                                watch_id: self.watch_id,
                                direction,
                                selector,
                                error,
                            });
                        }
                    }
                }
            }
        }

        tracing::trace!(
            watch_id = %self.watch_id,
            records = report.records_seen,
            ignored = report.records_ignored,
            reactions = report.reactions,
            failures = report.failures.len(),
            "callback batch dispatched"
        );
        report
    }
}

/// Dispatch context of an event observer.
pub struct EventDispatcher<T, N> {
    watch_id: WatchId,
    target: T,
    selectors: Rc<RefCell<SelectorSet>>,
    matcher: Rc<dyn Matcher<N>>,
    notifier: Rc<dyn Notifier<T, N>>,
}

impl<T: Clone, N: Clone> EventDispatcher<T, N> {
    /// Builds a dispatcher raising notifications against `target`.
    pub fn new(
        watch_id: WatchId,
        target: T,
        selectors: Rc<RefCell<SelectorSet>>,
        matcher: Rc<dyn Matcher<N>>,
        notifier: Rc<dyn Notifier<T, N>>,
    ) -> Self {
        Self {
            watch_id,
            target,
            selectors,
            matcher,
            notifier,
        }
    }

    fn emit(&self, kind: NotificationKind, node: &N, selector: Option<Selector>) {
        self.notifier.notify(Notification {
            watch_id: self.watch_id,
            kind,
            target: self.target.clone(),
            node: node.clone(),
            selector,
        });
    }
}

impl<T: Clone, N: Clone> Dispatch<N> for EventDispatcher<T, N> {
    fn dispatch(&self, batch: &MutationBatch<N>) -> DispatchReport {
        let mut report = DispatchReport::default();

        for record in batch {
            if !record.is_child_list() {
                report.records_ignored += 1;
                continue;
            }
            report.records_seen += 1;

            for direction in [Direction::Inserted, Direction::Removed] {
                let kind = NotificationKind::from(direction);
                for node in record.nodes(direction) {
                    // None: empty set, every node fires once.
                    let hits = {
                        let selectors = self.selectors.borrow();
                        if selectors.is_empty() {
                            None
                        } else {
                            Some(matching(self.watch_id, &selectors, self.matcher.as_ref(), node))
                        }
                    };

                    match hits {
                        None => {
                            report.reactions += 1;
                            self.emit(kind, node, None);
                        }
                        Some(hits) => {
                            // One notification per matching selector, not per node.
                            for (selector, ()) in hits {
                                report.reactions += 1;
                                self.emit(kind, node, Some(selector));
                            }
                        }
                    }
                }
            }
        }

        tracing::trace!(
            watch_id = %self.watch_id,
            records = report.records_seen,
            ignored = report.records_ignored,
            notifications = report.reactions,
            "event batch dispatched"
        );
        report
    }
}
