//! Mutation records as delivered by a host feed.
//!
//! A [`MutationBatch`] is transient: the host hands one to the delivery
//! callback and nobody keeps it afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of a mutation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationKind {
    /// Children were added to or removed from the target.
    ChildList,
    /// An attribute of the target changed.
    Attributes,
    /// Text content of a character data node changed.
    CharacterData,
}

impl MutationKind {
    /// The host-facing name (`childList`, `attributes`, `characterData`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ChildList => "childList",
            Self::Attributes => "attributes",
            Self::CharacterData => "characterData",
        }
    }

    /// Parses a host-facing name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "childList" => Some(Self::ChildList),
            "attributes" => Some(Self::Attributes),
            "characterData" => Some(Self::CharacterData),
            _ => None,
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of a child list change a node is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The node was added.
    Inserted,
    /// The node was removed.
    Removed,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inserted => f.write_str("inserted"),
            Self::Removed => f.write_str("removed"),
        }
    }
}

/// One reported change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord<N> {
    /// Record kind.
    pub kind: MutationKind,
    /// Added nodes, in host order.
    pub added_nodes: Vec<N>,
    /// Removed nodes, in host order.
    pub removed_nodes: Vec<N>,
}

impl<N> MutationRecord<N> {
    /// A child list record.
    #[must_use]
    pub fn child_list(added_nodes: Vec<N>, removed_nodes: Vec<N>) -> Self {
        Self {
            kind: MutationKind::ChildList,
            added_nodes,
            removed_nodes,
        }
    }

    /// An attribute change record.
    #[must_use]
    pub fn attributes() -> Self {
        Self {
            kind: MutationKind::Attributes,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
        }
    }

    /// A character data change record.
    #[must_use]
    pub fn character_data() -> Self {
        Self {
            kind: MutationKind::CharacterData,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
        }
    }

    /// Returns true for `childList` records.
    #[must_use]
    pub fn is_child_list(&self) -> bool {
        self.kind == MutationKind::ChildList
    }

    /// Nodes on the given side of the change.
    #[must_use]
    pub fn nodes(&self, direction: Direction) -> &[N] {
        match direction {
            Direction::Inserted => &self.added_nodes,
            Direction::Removed => &self.removed_nodes,
        }
    }
}

/// An ordered group of records delivered together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationBatch<N> {
    records: Vec<MutationRecord<N>>,
}

impl<N> Default for MutationBatch<N> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<N> MutationBatch<N> {
    /// Wraps records in delivery order.
    #[must_use]
    pub fn new(records: Vec<MutationRecord<N>>) -> Self {
        Self { records }
    }

    /// Appends a record.
    pub fn push(&mut self, record: MutationRecord<N>) {
        self.records.push(record);
    }

    /// Records in delivery order.
    #[must_use]
    pub fn records(&self) -> &[MutationRecord<N>] {
        &self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true when the batch has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<N> FromIterator<MutationRecord<N>> for MutationBatch<N> {
    fn from_iter<I: IntoIterator<Item = MutationRecord<N>>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl<N> IntoIterator for MutationBatch<N> {
    type Item = MutationRecord<N>;
    type IntoIter = std::vec::IntoIter<MutationRecord<N>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a, N> IntoIterator for &'a MutationBatch<N> {
    type Item = &'a MutationRecord<N>;
    type IntoIter = std::slice::Iter<'a, MutationRecord<N>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
