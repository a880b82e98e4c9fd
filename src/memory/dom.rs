//! In-memory document tree with mutation observation.
//!
//! Tree edits queue mutation records for every subscription on the edited
//! node, the way a browser queues records for its observers. Nothing is
//! delivered until [`MemoryDom::flush`], which plays the part of the
//! microtask checkpoint: each subscription with pending records receives one
//! batch, and flushing repeats until reactions stop producing new records.
//!
//! Subscriptions are not subtree-wide: a `childList` record is queued on the
//! parent whose children changed, attribute records on the element whose
//! attribute changed, character data records on the text node itself.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::ObserveConfig;
use crate::error::{ConfigError, DomError, MatchError};
use crate::host::{Delivery, Host, Matcher, MutationFeed};
use crate::mutation::{MutationBatch, MutationRecord};
use crate::selector::Selector;
use crate::watch::dispatcher::ReactionFailure;

use super::query::SelectorList;

/// Identity of a node in a [`MemoryDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Identity of a subscription on a [`MemoryDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Tag and attributes of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementData {
    tag: String,
    attributes: IndexMap<String, String>,
}

impl ElementData {
    /// A bare element; the tag is lowercased.
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: IndexMap::new(),
        }
    }

    /// Lowercased tag name.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Attribute value by (case-insensitive) name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Sets an attribute; the name is lowercased.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        self.attributes
            .insert(name.to_ascii_lowercase(), value.to_string());
    }

    /// The `id` attribute.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.attribute("id")
    }

    /// Classes from the `class` attribute.
    pub fn classes(&self) -> impl Iterator<Item = &str> + '_ {
        self.attribute("class").unwrap_or_default().split_whitespace()
    }

    /// Returns true if `class` is in the class list.
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }
}

/// Content of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    /// An element.
    Element(ElementData),
    /// A text node.
    Text(String),
    /// A comment node.
    Comment(String),
}

#[derive(Debug)]
struct NodeEntry {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

struct Subscriber {
    target: NodeId,
    config: ObserveConfig,
    pending: Vec<MutationRecord<NodeId>>,
    delivery: Rc<RefCell<Delivery<NodeId>>>,
}

#[derive(Default)]
struct DomState {
    nodes: HashMap<NodeId, NodeEntry>,
    next_node: u64,
    next_subscription: u64,
    subscribers: IndexMap<SubscriptionId, Subscriber>,
    cancellations: HashMap<SubscriptionId, usize>,
    failures: Vec<ReactionFailure>,
    observation_unavailable: bool,
}

impl DomState {
    fn entry(&self, id: NodeId) -> Result<&NodeEntry, DomError> {
        self.nodes
            .get(&id)
            .ok_or_else(|| DomError::UnknownNode(id.to_string()))
    }

    fn entry_mut(&mut self, id: NodeId) -> Result<&mut NodeEntry, DomError> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| DomError::UnknownNode(id.to_string()))
    }

    fn create(&mut self, data: NodeData) -> NodeId {
        self.next_node += 1;
        let id = NodeId(self.next_node);
        self.nodes.insert(
            id,
            NodeEntry {
                data,
                parent: None,
                children: Vec::new(),
            },
        );
        id
    }

    fn ensure_element(&self, id: NodeId) -> Result<(), DomError> {
        match self.entry(id)?.data {
            NodeData::Element(_) => Ok(()),
            _ => Err(DomError::NotAnElement(id.to_string())),
        }
    }

    /// Returns true if `ancestor` is `node` or one of its ancestors.
    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|e| e.parent);
        }
        false
    }

    /// Checks that `child` may be inserted under `parent`.
    fn check_insert(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.entry(child)?;
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest {
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }
        Ok(())
    }

    /// Removes `child` from its current parent, queueing the removal there.
    fn detach(&mut self, child: NodeId) -> Result<(), DomError> {
        let Some(old_parent) = self.entry(child)?.parent else {
            return Ok(());
        };
        self.entry_mut(old_parent)?.children.retain(|c| *c != child);
        self.entry_mut(child)?.parent = None;
        self.queue(old_parent, MutationRecord::child_list(Vec::new(), vec![child]));
        Ok(())
    }

    fn queue(&mut self, target: NodeId, record: MutationRecord<NodeId>) {
        for sub in self.subscribers.values_mut() {
            if sub.target == target && sub.config.observes(record.kind) {
                sub.pending.push(record.clone());
            }
        }
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes.get(&node)?.parent?;
        let siblings = &self.nodes.get(&parent)?.children;
        let pos = siblings.iter().position(|c| *c == node)?;
        siblings.get(pos + 1).copied()
    }
}

type ReadyBatch = (SubscriptionId, Rc<RefCell<Delivery<NodeId>>>, MutationBatch<NodeId>);

/// Clears the flush flag when a flush ends, including by unwinding, and
/// requeues the batches it did not get to.
struct FlushRound<'a> {
    dom: &'a MemoryDom,
    remaining: VecDeque<ReadyBatch>,
}

impl Drop for FlushRound<'_> {
    fn drop(&mut self) {
        self.dom.flushing.set(false);
        if self.remaining.is_empty() {
            return;
        }
        let leftovers: Vec<_> = self.remaining.drain(..).collect();
        let Ok(mut state) = self.dom.state.try_borrow_mut() else {
            tracing::warn!(batches = leftovers.len(), "document busy; undelivered batches dropped");
            return;
        };
        let mut requeued = 0;
        for (id, _, batch) in &leftovers {
            if let Some(sub) = state.subscribers.get_mut(id) {
                let mut records = batch.records().to_vec();
                records.append(&mut sub.pending);
                sub.pending = records;
                requeued += 1;
            }
        }
        drop(state);
        tracing::warn!(requeued, "flush interrupted; undelivered batches requeued");
    }
}

/// An in-memory document acting as mutation feed and matcher.
#[derive(Default)]
pub struct MemoryDom {
    state: RefCell<DomState>,
    flushing: Cell<bool>,
    compiled: RefCell<HashMap<Selector, SelectorList>>,
}

impl fmt::Debug for MemoryDom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("MemoryDom")
            .field("nodes", &state.nodes.len())
            .field("subscriptions", &state.subscribers.len())
            .finish()
    }
}

impl MemoryDom {
    /// An empty document.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// A document whose feed refuses every subscription.
    #[must_use]
    pub fn without_observation() -> Rc<Self> {
        let dom = Self::default();
        dom.state.borrow_mut().observation_unavailable = true;
        Rc::new(dom)
    }

    /// Host using this document as feed and matcher.
    #[must_use]
    pub fn host(self: &Rc<Self>) -> Host<Self> {
        Host::new(Rc::clone(self), Rc::clone(self) as Rc<dyn Matcher<NodeId>>)
    }

    /// Creates a detached element.
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.state
            .borrow_mut()
            .create(NodeData::Element(ElementData::new(tag)))
    }

    /// Creates a detached text node.
    pub fn create_text(&self, text: &str) -> NodeId {
        self.state.borrow_mut().create(NodeData::Text(text.to_string()))
    }

    /// Creates a detached comment node.
    pub fn create_comment(&self, text: &str) -> NodeId {
        self.state
            .borrow_mut()
            .create(NodeData::Comment(text.to_string()))
    }

    /// Sets an attribute on an element.
    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let mut state = self.state.borrow_mut();
        match &mut state.entry_mut(node)?.data {
            NodeData::Element(el) => el.set_attribute(name, value),
            _ => return Err(DomError::NotAnElement(node.to_string())),
        }
        state.queue(node, MutationRecord::attributes());
        Ok(())
    }

    /// Adds a class to an element's class list.
    pub fn add_class(&self, node: NodeId, class: &str) -> Result<(), DomError> {
        let current = match self.data(node)? {
            NodeData::Element(el) => {
                if el.has_class(class) {
                    return Ok(());
                }
                el.attribute("class").unwrap_or_default().to_string()
            }
            _ => return Err(DomError::NotAnElement(node.to_string())),
        };
        let joined = if current.trim().is_empty() {
            class.to_string()
        } else {
            format!("{} {class}", current.trim())
        };
        self.set_attribute(node, "class", &joined)
    }

    /// Replaces the content of a text or comment node.
    pub fn set_text(&self, node: NodeId, text: &str) -> Result<(), DomError> {
        let mut state = self.state.borrow_mut();
        match &mut state.entry_mut(node)?.data {
            NodeData::Text(t) | NodeData::Comment(t) => *t = text.to_string(),
            NodeData::Element(_) => return Err(DomError::NotCharacterData(node.to_string())),
        }
        state.queue(node, MutationRecord::character_data());
        Ok(())
    }

    /// Appends `child` to `parent`, moving it if it already has a parent.
    pub fn append_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Inserts `child` before `reference`, or last when `reference` is `None`.
    pub fn insert_before(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        let mut state = self.state.borrow_mut();
        state.ensure_element(parent)?;
        state.check_insert(parent, child)?;
        if let Some(r) = reference {
            if state.entry(r)?.parent != Some(parent) {
                return Err(DomError::NotAChild {
                    parent: parent.to_string(),
                    child: r.to_string(),
                });
            }
        }
        let reference = if reference == Some(child) {
            state.next_sibling(child)
        } else {
            reference
        };

        state.detach(child)?;
        let children = &mut state.entry_mut(parent)?.children;
        let at = reference
            .and_then(|r| children.iter().position(|c| *c == r))
            .unwrap_or(children.len());
        children.insert(at, child);
        state.entry_mut(child)?.parent = Some(parent);
        state.queue(parent, MutationRecord::child_list(vec![child], Vec::new()));
        Ok(())
    }

    /// Appends several children as a single record, like inserting a fragment.
    pub fn append_all(&self, parent: NodeId, children: &[NodeId]) -> Result<(), DomError> {
        let mut state = self.state.borrow_mut();
        state.ensure_element(parent)?;
        for child in children {
            state.check_insert(parent, *child)?;
        }

        let mut added = Vec::with_capacity(children.len());
        for child in children {
            if added.contains(child) {
                continue;
            }
            state.detach(*child)?;
            state.entry_mut(parent)?.children.push(*child);
            state.entry_mut(*child)?.parent = Some(parent);
            added.push(*child);
        }
        state.queue(parent, MutationRecord::child_list(added, Vec::new()));
        Ok(())
    }

    /// Removes `child` from `parent`.
    pub fn remove_child(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        let mut state = self.state.borrow_mut();
        if state.entry(child)?.parent != Some(parent) {
            return Err(DomError::NotAChild {
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }
        state.detach(child)
    }

    /// Replaces all children of `parent` in one record.
    pub fn replace_children(&self, parent: NodeId, children: &[NodeId]) -> Result<(), DomError> {
        let mut state = self.state.borrow_mut();
        state.ensure_element(parent)?;
        for child in children {
            state.check_insert(parent, *child)?;
        }

        let removed = std::mem::take(&mut state.entry_mut(parent)?.children);
        for old in &removed {
            state.entry_mut(*old)?.parent = None;
        }

        let mut added = Vec::with_capacity(children.len());
        for child in children {
            if added.contains(child) {
                continue;
            }
            state.detach(*child)?;
            state.entry_mut(*child)?.parent = Some(parent);
            added.push(*child);
        }
        state.entry_mut(parent)?.children.clone_from(&added);
        state.queue(parent, MutationRecord::child_list(added, removed));
        Ok(())
    }

    /// Content of a node.
    pub fn data(&self, node: NodeId) -> Result<NodeData, DomError> {
        Ok(self.state.borrow().entry(node)?.data.clone())
    }

    /// Parent of a node.
    pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>, DomError> {
        Ok(self.state.borrow().entry(node)?.parent)
    }

    /// Children of a node, in order.
    pub fn children(&self, node: NodeId) -> Result<Vec<NodeId>, DomError> {
        Ok(self.state.borrow().entry(node)?.children.clone())
    }

    /// Delivers pending records until no subscription has any left.
    ///
    /// Returns the number of batches delivered. A nested call from inside a
    /// reaction returns 0; its records are picked up by the outer flush.
    ///
    /// If a delivery panics, batches not yet handed to other subscriptions go
    /// back to their queues and the next `flush` delivers them.
    pub fn flush(&self) -> usize {
        if self.flushing.replace(true) {
            return 0;
        }
        let mut round = FlushRound {
            dom: self,
            remaining: VecDeque::new(),
        };

        let mut delivered = 0;
        loop {
            round.remaining = self.take_ready();
            if round.remaining.is_empty() {
                break;
            }

            while let Some((id, delivery, batch)) = round.remaining.pop_front() {
                // An earlier delivery in this round may have cancelled it.
                if !self.state.borrow().subscribers.contains_key(&id) {
                    continue;
                }
                tracing::trace!(subscription = %id, records = batch.len(), "delivering batch");
                let mut deliver = delivery.borrow_mut();
                (*deliver)(batch);
                delivered += 1;
            }
        }
        delivered
    }

    fn take_ready(&self) -> VecDeque<ReadyBatch> {
        let mut state = self.state.borrow_mut();
        state
            .subscribers
            .iter_mut()
            .filter(|(_, sub)| !sub.pending.is_empty())
            .map(|(id, sub)| {
                let batch = MutationBatch::new(std::mem::take(&mut sub.pending));
                (*id, Rc::clone(&sub.delivery), batch)
            })
            .collect()
    }

    /// Runs `f` on the parsed form of `selector`, parsing it once per document.
    fn with_compiled<R>(
        &self,
        selector: &Selector,
        f: impl FnOnce(&SelectorList) -> R,
    ) -> Result<R, MatchError> {
        if let Some(list) = self.compiled.borrow().get(selector) {
            return Ok(f(list));
        }
        let list = SelectorList::parse(selector.as_str())?;
        let out = f(&list);
        self.compiled.borrow_mut().insert(selector.clone(), list);
        Ok(out)
    }

    /// Live subscriptions on `target`.
    #[must_use]
    pub fn subscriptions_for(&self, target: NodeId) -> Vec<SubscriptionId> {
        self.state
            .borrow()
            .subscribers
            .iter()
            .filter(|(_, sub)| sub.target == target)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.state.borrow().subscribers.len()
    }

    /// How many times `subscription` was cancelled.
    #[must_use]
    pub fn cancellations(&self, subscription: SubscriptionId) -> usize {
        self.state
            .borrow()
            .cancellations
            .get(&subscription)
            .copied()
            .unwrap_or(0)
    }

    /// Reaction failures reported to this host so far.
    #[must_use]
    pub fn uncaught_failures(&self) -> Vec<ReactionFailure> {
        self.state.borrow().failures.clone()
    }
}

impl MutationFeed for MemoryDom {
    type Node = NodeId;
    type Target = NodeId;
    type Subscription = SubscriptionId;

    fn subscribe(
        &self,
        target: &NodeId,
        config: &ObserveConfig,
        delivery: Delivery<NodeId>,
    ) -> Result<SubscriptionId, ConfigError> {
        let mut state = self.state.borrow_mut();
        if state.observation_unavailable {
            return Err(ConfigError::Unsupported {
                reason: "mutation observation disabled on this document".to_string(),
            });
        }
        if !state.nodes.contains_key(target) {
            return Err(ConfigError::InvalidTarget {
                reason: format!("{target} does not exist"),
            });
        }
        config.validate()?;

        state.next_subscription += 1;
        let id = SubscriptionId(state.next_subscription);
        state.subscribers.insert(
            id,
            Subscriber {
                target: *target,
                config: *config,
                pending: Vec::new(),
                delivery: Rc::new(RefCell::new(delivery)),
            },
        );
        Ok(id)
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        let removed = {
            let mut state = self.state.borrow_mut();
            *state.cancellations.entry(subscription).or_insert(0) += 1;
            state.subscribers.shift_remove(&subscription)
        };
        // Dropped outside the borrow: the delivery may own handles into this document.
        drop(removed);
    }

    fn report_failure(&self, failure: &ReactionFailure) {
        tracing::error!(
            watch_id = %failure.watch_id,
            selector = %failure.selector,
            direction = %failure.direction,
            error = %failure.error,
            "uncaught reaction failure"
        );
        self.state.borrow_mut().failures.push(failure.clone());
    }
}

impl Matcher<NodeId> for MemoryDom {
    fn matches(&self, node: &NodeId, selector: &Selector) -> Result<bool, MatchError> {
        self.with_compiled(selector, |list| {
            let state = self.state.borrow();
            let entry = state.nodes.get(node).ok_or_else(|| MatchError::UnknownNode {
                node: node.to_string(),
            })?;
            match &entry.data {
                NodeData::Element(el) => Ok(list.matches(el)),
                NodeData::Text(_) | NodeData::Comment(_) => Ok(false),
            }
        })?
    }

    fn validate(&self, selector: &Selector) -> Result<(), MatchError> {
        self.with_compiled(selector, |_| ())
    }
}
