//! In-memory host.
//!
//! A small document tree that implements [`MutationFeed`](crate::host::MutationFeed)
//! and [`Matcher`](crate::host::Matcher), plus a queueing
//! [`Notifier`](crate::host::Notifier). Used by the test suite and by
//! embedders without a browser.

mod dom;
mod query;
mod stream;

pub use dom::{ElementData, MemoryDom, NodeData, NodeId, SubscriptionId};
pub use query::SelectorList;
pub use stream::NotificationStream;
