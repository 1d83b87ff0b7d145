//! Record field tree and offset index
//!
//! The tree mirrors a record's [`PvStructure`]: every structure field becomes
//! a structure node that owns its children, every other field becomes a leaf.
//! Nodes live in one arena in preorder, so a [`NodeId`] is stable for the
//! record's lifetime and parent links are plain ids rather than counted
//! pointers. Every id also carries the owning record's sequence number, so
//! an id from one record is rejected by every other record.
//!
//! Construction is two-phase:
//! 1. `build` mirrors the value tree top-down, copying each field's
//!    `[offset, next_offset)` interval.
//! 2. `init` assigns fully-qualified names. Preorder guarantees a parent's
//!    name is materialized before any of its children are visited.
//!
//! A third step, `bind`, hands every node a weak handle to the owning record
//! once the record has a stable address.

use super::Record;
use pvdatabase_core::{PvField, PvStructure};
use std::fmt;
use std::sync::{Arc, Weak};

/// Handle to a node in a record's field tree
///
/// The index is the node's preorder position, so a record's root is always
/// index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    record: u64,
    index: usize,
}

impl NodeId {
    /// Arena index of this node
    pub fn index(self) -> usize {
        self.index
    }

    /// Sequence number of the record this node belongs to
    pub fn record_sequence(self) -> u64 {
        self.record
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {} of record #{}", self.index, self.record)
    }
}

#[derive(Debug)]
enum NodeKind {
    Leaf,
    Structure { children: Vec<NodeId> },
}

/// One node of a record's field tree
///
/// Holds the node's identity and position; the value itself stays in the
/// record's [`PvStructure`] and is reached through the record lock.
pub struct RecordField {
    id: NodeId,
    name: String,
    full_field_name: String,
    full_name: String,
    offset: usize,
    next_offset: usize,
    parent: Option<NodeId>,
    kind: NodeKind,
    record: Weak<Record>,
}

impl RecordField {
    /// Id of this node
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Name relative to the parent structure (empty for the root)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dotted path from the root, without the record name
    pub fn full_field_name(&self) -> &str {
        &self.full_field_name
    }

    /// Record name followed by the dotted path from the root
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Preorder offset of the underlying field
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// One past the offset of the last descendant
    pub fn next_offset(&self) -> usize {
        self.next_offset
    }

    /// Parent structure, `None` for the root
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Whether this node mirrors a structure field
    pub fn is_structure(&self) -> bool {
        matches!(self.kind, NodeKind::Structure { .. })
    }

    /// Child nodes in offset order; empty for leaves
    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Structure { children } => children,
            NodeKind::Leaf => &[],
        }
    }

    /// Owning record, if it is still alive
    pub fn record(&self) -> Option<Arc<Record>> {
        self.record.upgrade()
    }
}

impl fmt::Debug for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordField")
            .field("id", &self.id)
            .field("full_name", &self.full_name)
            .field("offset", &self.offset)
            .field("next_offset", &self.next_offset)
            .field("parent", &self.parent)
            .field("children", &self.children())
            .finish()
    }
}

/// Arena of [`RecordField`]s in preorder
pub(crate) struct FieldTree {
    record: u64,
    nodes: Vec<RecordField>,
}

impl FieldTree {
    /// Mirror `data` into a tree of unnamed nodes owned by record `record`
    pub(crate) fn build(data: &PvStructure, record: u64) -> Self {
        let mut tree = FieldTree {
            record,
            nodes: Vec::with_capacity(data.field_count()),
        };
        tree.build_node(data.as_field(), None);
        tree
    }

    fn build_node(&mut self, field: &PvField, parent: Option<NodeId>) -> NodeId {
        let id = NodeId {
            record: self.record,
            index: self.nodes.len(),
        };
        let kind = if field.is_structure() {
            NodeKind::Structure {
                children: Vec::with_capacity(field.children().len()),
            }
        } else {
            NodeKind::Leaf
        };
        self.nodes.push(RecordField {
            id,
            name: field.name().to_string(),
            full_field_name: String::new(),
            full_name: String::new(),
            offset: field.offset(),
            next_offset: field.next_offset(),
            parent,
            kind,
            record: Weak::new(),
        });
        for child in field.children() {
            let child_id = self.build_node(child, Some(id));
            if let NodeKind::Structure { children } = &mut self.nodes[id.index].kind {
                children.push(child_id);
            }
        }
        id
    }

    /// Assign full field names and full names
    pub(crate) fn init(&mut self, record_name: &str) {
        for i in 0..self.nodes.len() {
            let full_field_name = match self.nodes[i].parent {
                Some(parent) => {
                    let parent_name = &self.nodes[parent.index].full_field_name;
                    if parent_name.is_empty() {
                        self.nodes[i].name.clone()
                    } else {
                        format!("{}.{}", parent_name, self.nodes[i].name)
                    }
                }
                None => self.nodes[i].name.clone(),
            };
            let full_name = if full_field_name.is_empty() {
                record_name.to_string()
            } else {
                format!("{}.{}", record_name, full_field_name)
            };
            let node = &mut self.nodes[i];
            node.full_field_name = full_field_name;
            node.full_name = full_name;
        }
    }

    /// Give every node a handle to its owning record
    pub(crate) fn bind(&mut self, record: &Weak<Record>) {
        for node in &mut self.nodes {
            node.record = record.clone();
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn root(&self) -> &RecordField {
        &self.nodes[0]
    }

    /// Node by id; `None` for ids minted by another record
    pub(crate) fn get(&self, id: NodeId) -> Option<&RecordField> {
        if id.record != self.record {
            return None;
        }
        self.nodes.get(id.index)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &RecordField> {
        self.nodes.iter()
    }

    /// Locate the node whose offset is exactly `target`
    ///
    /// Starts at the root and, at each structure, scans children in offset
    /// order: an exact match is returned, a child whose interval contains the
    /// target is descended into. `None` means the offset does not belong to
    /// this tree.
    pub(crate) fn find_node(&self, target: usize) -> Option<&RecordField> {
        let mut current = self.root();
        if current.offset == target {
            return Some(current);
        }
        loop {
            let mut next = None;
            for &child in current.children() {
                let node = &self.nodes[child.index];
                if node.offset == target {
                    return Some(node);
                }
                if node.next_offset <= target {
                    continue;
                }
                next = Some(node);
                break;
            }
            match next {
                Some(node) if node.is_structure() && node.offset < target => current = node,
                _ => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pvdatabase_core::{ScalarType, StructureType};

    fn sample() -> PvStructure {
        let a = StructureType::builder("")
            .add_scalar("b", ScalarType::Int)
            .build()
            .unwrap();
        PvStructure::new(
            &StructureType::builder("")
                .add("a", a)
                .add_scalar("b", ScalarType::Double)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_full_names() {
        let mut tree = FieldTree::build(&sample(), 7);
        tree.init("rec");

        let names: Vec<&str> = tree.iter().map(RecordField::full_name).collect();
        assert_eq!(names, vec!["rec", "rec.a", "rec.a.b", "rec.b"]);
        let field_names: Vec<&str> = tree.iter().map(RecordField::full_field_name).collect();
        assert_eq!(field_names, vec!["", "a", "a.b", "b"]);
    }

    #[test]
    fn test_children_and_parents() {
        let tree = FieldTree::build(&sample(), 7);
        let root = tree.root();
        assert!(root.is_structure());
        let children: Vec<usize> = root.children().iter().map(|c| c.index()).collect();
        assert_eq!(children, vec![1, 3]);
        let a = tree.get(root.children()[0]).unwrap();
        let a_b = tree.get(a.children()[0]).unwrap();
        assert_eq!(a_b.parent(), Some(a.id()));
        assert!(!tree.get(root.children()[1]).unwrap().is_structure());
    }

    #[test]
    fn test_ids_from_other_tree_rejected() {
        let tree = FieldTree::build(&sample(), 7);
        let other = FieldTree::build(&sample(), 8);
        let foreign = other.iter().nth(2).unwrap().id();
        assert_eq!(foreign.index(), 2);
        assert_eq!(foreign.record_sequence(), 8);
        assert!(tree.get(foreign).is_none());
        assert!(tree.iter().all(|n| n.id().record_sequence() == 7));
    }

    #[test]
    fn test_find_node_each_offset() {
        let tree = FieldTree::build(&sample(), 7);
        for node in tree.iter() {
            assert_eq!(tree.find_node(node.offset()).map(RecordField::id), Some(node.id()));
        }
        assert!(tree.find_node(4).is_none());
        assert!(tree.find_node(usize::MAX).is_none());
    }

    #[test]
    fn test_unbound_node_has_no_record() {
        let tree = FieldTree::build(&sample(), 7);
        assert!(tree.root().record().is_none());
    }
}
