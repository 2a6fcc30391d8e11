//! Shared node storage behind value handles

use std::collections::{HashMap, HashSet};
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;

use super::ValueKind;

/// Default nesting limit for converted host data and render contexts.
pub(crate) const DEFAULT_MAX_DEPTH: usize = 128;

/// Deepest nesting that the recursive consumers of a tree (`Debug`,
/// `Serialize` and the engine conversion) will descend into.
pub(crate) const NESTING_LIMIT: usize = 512;

/// One share of a value node.
pub(crate) type Node = Arc<NodeData>;

/// A value node. Containers store shares of their children.
pub(crate) struct NodeData {
    /// Set once the node is reachable from a render context.
    /// A sealed node never becomes unsealed, and all of its
    /// descendants are sealed with it.
    sealed: AtomicBool,
    pub(crate) payload: Payload,
}

pub(crate) enum Payload {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(RwLock<Vec<Node>>),
    Object(RwLock<IndexMap<String, Node>>),
}

impl NodeData {
    pub(crate) fn new(payload: Payload) -> Node {
        Arc::new(NodeData {
            sealed: AtomicBool::new(false),
            payload,
        })
    }

    pub(crate) fn kind(&self) -> ValueKind {
        match &self.payload {
            Payload::Null => ValueKind::Null,
            Payload::Bool(_) => ValueKind::Bool,
            Payload::Int(_) => ValueKind::Int,
            Payload::Float(_) => ValueKind::Float,
            Payload::String(_) => ValueKind::String,
            Payload::Array(_) => ValueKind::Array,
            Payload::Object(_) => ValueKind::Object,
        }
    }

    pub(crate) fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Shares of the direct children, in order.
    pub(crate) fn children(&self) -> Vec<Node> {
        match &self.payload {
            Payload::Array(items) => read(items).clone(),
            Payload::Object(entries) => read(entries).values().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Seal this node and everything below it.
    ///
    /// Walks with an explicit stack. A node that is already sealed has
    /// sealed descendants, so its subtree is skipped.
    pub(crate) fn seal(&self) {
        if self.sealed.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut pending = self.children();
        while let Some(node) = pending.pop() {
            if !node.sealed.swap(true, Ordering::AcqRel) {
                pending.extend(node.children());
            }
        }
    }

    /// Whether `target` is this node or one of its descendants.
    pub(crate) fn reaches(&self, target: &NodeData) -> bool {
        if std::ptr::eq(self, target) {
            return true;
        }
        let mut visited: HashSet<*const NodeData> = HashSet::new();
        let mut pending = self.children();
        while let Some(node) = pending.pop() {
            if std::ptr::eq(&*node, target) {
                return true;
            }
            if visited.insert(Arc::as_ptr(&node)) {
                pending.extend(node.children());
            }
        }
        false
    }

    /// Whether some path from this node passes through more than `limit`
    /// containers. Scalars nest zero levels deep.
    pub(crate) fn nests_deeper_than(&self, limit: usize) -> bool {
        // deepest level each container has been entered at so far
        let mut entered: HashMap<*const NodeData, usize> = HashMap::new();
        let mut pending: Vec<(Node, usize)> = Vec::new();

        if !self.is_container() {
            return false;
        }
        if limit == 0 {
            return true;
        }
        pending.extend(self.children().into_iter().map(|child| (child, 2)));
        while let Some((node, level)) = pending.pop() {
            if !node.is_container() {
                continue;
            }
            if level > limit {
                return true;
            }
            let seen = entered.entry(Arc::as_ptr(&node)).or_insert(0);
            if *seen >= level {
                continue;
            }
            *seen = level;
            pending.extend(node.children().into_iter().map(|child| (child, level + 1)));
        }
        false
    }

    fn is_container(&self) -> bool {
        matches!(self.payload, Payload::Array(_) | Payload::Object(_))
    }

    /// Move the children out, leaving an empty container.
    fn take_children(&mut self) -> Vec<Node> {
        match &mut self.payload {
            Payload::Array(items) => {
                mem::take(items.get_mut().unwrap_or_else(PoisonError::into_inner))
            }
            Payload::Object(entries) => {
                mem::take(entries.get_mut().unwrap_or_else(PoisonError::into_inner))
                    .into_values()
                    .collect()
            }
            _ => Vec::new(),
        }
    }
}

// Dropping a long chain through the default glue would recurse once per
// level. Children whose last share is ours are emptied onto a work list
// before they drop, so each node is released with no children left.
impl Drop for NodeData {
    fn drop(&mut self) {
        let mut pending = self.take_children();
        while let Some(node) = pending.pop() {
            if let Ok(mut data) = Arc::try_unwrap(node) {
                pending.append(&mut data.take_children());
            }
        }
    }
}

// A panic while a lock is held cannot leave a Vec or IndexMap half-updated
// (push and insert are the only writes), so poisoning is ignored.

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array_of(children: Vec<Node>) -> Node {
        NodeData::new(Payload::Array(RwLock::new(children)))
    }

    fn chain(levels: usize) -> Node {
        let mut node = NodeData::new(Payload::Null);
        for _ in 0..levels {
            node = array_of(vec![node]);
        }
        node
    }

    #[test]
    fn test_nesting_counts_containers() {
        let scalar = NodeData::new(Payload::Int(1));
        assert!(!scalar.nests_deeper_than(0));

        let three = chain(3);
        assert!(three.nests_deeper_than(2));
        assert!(!three.nests_deeper_than(3));
    }

    #[test]
    fn test_nesting_follows_the_deepest_shared_path() {
        let shared = chain(2);
        // reached once directly and once through an extra level
        let root = array_of(vec![Arc::clone(&shared), array_of(vec![shared])]);
        assert!(root.nests_deeper_than(3));
        assert!(!root.nests_deeper_than(4));
    }

    #[test]
    fn test_deep_chain_walks_without_recursion() {
        let root = chain(200_000);
        let leaf = {
            let mut node = Arc::clone(&root);
            while let Some(child) = node.children().pop() {
                node = child;
            }
            node
        };

        assert!(root.reaches(&leaf));
        assert!(!leaf.reaches(&root));
        assert!(root.nests_deeper_than(NESTING_LIMIT));

        root.seal();
        assert!(leaf.is_sealed());
        drop(leaf);
        drop(root);
    }
}
