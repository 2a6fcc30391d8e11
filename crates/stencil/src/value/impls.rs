//! Value trait implementations: constructors, mutation, extractors, From traits, PartialEq

use std::sync::Arc;

use indexmap::IndexMap;
use std::sync::RwLock;

use super::node::{read, write, NodeData, Payload, NESTING_LIMIT};
use super::*;
use crate::error::{HandleKind, Result, StencilError};

// ═══════════════════════════════════════════════════════════════════
// Constructors
// ═══════════════════════════════════════════════════════════════════

impl Value {
    /// Create a null value
    pub fn null() -> Self {
        Value::from_node(NodeData::new(Payload::Null))
    }

    /// Create a boolean value
    pub fn bool(b: bool) -> Self {
        Value::from_node(NodeData::new(Payload::Bool(b)))
    }

    /// Create an integer value
    pub fn int(i: i64) -> Self {
        Value::from_node(NodeData::new(Payload::Int(i)))
    }

    /// Create a float value
    pub fn float(d: f64) -> Self {
        Value::from_node(NodeData::new(Payload::Float(d)))
    }

    /// Create a string value
    pub fn string(s: impl Into<String>) -> Self {
        Value::from_node(NodeData::new(Payload::String(s.into())))
    }

    /// Create an empty array value
    pub fn array() -> Self {
        Value::from_node(NodeData::new(Payload::Array(RwLock::new(Vec::new()))))
    }

    /// Create an empty object value
    pub fn object() -> Self {
        Value::from_node(NodeData::new(Payload::Object(RwLock::new(IndexMap::new()))))
    }

    // ═══════════════════════════════════════════════════════════════════
    // Handle Lifecycle
    // ═══════════════════════════════════════════════════════════════════

    pub(crate) fn live(&self) -> Result<&Node> {
        self.node().ok_or(StencilError::Disposed {
            handle: HandleKind::Value,
        })
    }

    /// Release this handle's share of the node.
    ///
    /// Idempotent. Containers holding the node keep it alive; the node is
    /// destroyed only when its last share goes away.
    pub fn dispose(&mut self) {
        if let Some(node) = self.node.take() {
            tracing::trace!(
                kind = %node.kind(),
                remaining = Arc::strong_count(&node) - 1,
                "released value handle"
            );
        }
    }

    /// Check if this handle has been disposed
    pub fn is_disposed(&self) -> bool {
        self.node.is_none()
    }

    /// Take another share of the same node as a new handle.
    pub fn share(&self) -> Result<Value> {
        self.live().map(|node| Value::from_node(Arc::clone(node)))
    }

    /// Number of live shares of this node (handles plus containers).
    pub fn share_count(&self) -> Result<usize> {
        self.live().map(Arc::strong_count)
    }

    /// The variant of this value
    pub fn kind(&self) -> Result<ValueKind> {
        self.live().map(|node| node.kind())
    }

    /// Whether the node has been sealed by a render context.
    ///
    /// Disposed handles report `false`.
    pub fn is_sealed(&self) -> bool {
        self.node().is_some_and(|node| node.is_sealed())
    }

    pub(crate) fn seal(&self) -> Result<()> {
        self.live().map(|node| node.seal())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Mutation
    // ═══════════════════════════════════════════════════════════════════

    /// Append `element` to this array.
    ///
    /// The array stores a share of `element`'s node; `element` itself stays
    /// valid and may be disposed right away.
    pub fn add(&self, element: &Value) -> Result<()> {
        const OP: &str = "Adding element to array";

        let array = self.live()?;
        let child = element.live()?;
        let Payload::Array(items) = &array.payload else {
            return Err(StencilError::operation(
                OP,
                format!("ERROR: expected an array, found {}", array.kind()),
            ));
        };
        if array.is_sealed() {
            return Err(StencilError::operation(
                OP,
                "ERROR: array is sealed by a render context",
            ));
        }
        if would_cycle(array, child) {
            return Err(StencilError::operation(
                OP,
                "ERROR: inserting the element would create a cycle",
            ));
        }

        write(items).push(Arc::clone(child));
        Ok(())
    }

    /// Insert or overwrite `key` in this object.
    ///
    /// An overwritten key keeps its original position. The object stores a
    /// share of `value`'s node; `value` itself stays valid.
    pub fn set(&self, key: impl Into<String>, value: &Value) -> Result<()> {
        const OP: &str = "Setting object property";

        let object = self.live()?;
        let child = value.live()?;
        let key = key.into();
        let Payload::Object(entries) = &object.payload else {
            return Err(StencilError::operation(
                OP,
                format!(
                    "ERROR: cannot set '{}': expected an object, found {}",
                    key,
                    object.kind()
                ),
            ));
        };
        if object.is_sealed() {
            return Err(StencilError::operation(
                OP,
                format!("ERROR: cannot set '{}': object is sealed by a render context", key),
            ));
        }
        if would_cycle(object, child) {
            return Err(StencilError::operation(
                OP,
                format!("ERROR: cannot set '{}': value would create a cycle", key),
            ));
        }

        write(entries).insert(key, Arc::clone(child));
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════
    // Type Predicates
    //
    // Predicates and extractors never fail: a disposed handle answers
    // `false`, `None` or an empty list, the same as a value of another
    // variant. Use `kind()` to tell the two apart.
    // ═══════════════════════════════════════════════════════════════════

    /// Check if value is null (`false` when disposed)
    pub fn is_null(&self) -> bool {
        self.kind().ok() == Some(ValueKind::Null)
    }

    /// Check if value is an array (`false` when disposed)
    pub fn is_array(&self) -> bool {
        self.kind().ok() == Some(ValueKind::Array)
    }

    /// Check if value is an object (`false` when disposed)
    pub fn is_object(&self) -> bool {
        self.kind().ok() == Some(ValueKind::Object)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Extractors (return Option for safe access)
    // ═══════════════════════════════════════════════════════════════════

    /// Extract boolean value (`None` when disposed)
    pub fn as_bool(&self) -> Option<bool> {
        match self.node().map(|node| &node.payload) {
            Some(Payload::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// Extract integer value (`None` when disposed)
    pub fn as_i64(&self) -> Option<i64> {
        match self.node().map(|node| &node.payload) {
            Some(Payload::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// Extract float value; integers are not converted (`None` when disposed)
    pub fn as_f64(&self) -> Option<f64> {
        match self.node().map(|node| &node.payload) {
            Some(Payload::Float(d)) => Some(*d),
            _ => None,
        }
    }

    /// Extract string slice (`None` when disposed)
    pub fn as_str(&self) -> Option<&str> {
        match self.node().map(|node| &node.payload) {
            Some(Payload::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Number of elements of an array or entries of an object
    ///
    /// `None` for scalars and for a disposed handle.
    pub fn len(&self) -> Option<usize> {
        match self.node().map(|node| &node.payload) {
            Some(Payload::Array(items)) => Some(read(items).len()),
            Some(Payload::Object(entries)) => Some(read(entries).len()),
            _ => None,
        }
    }

    /// Check if an array or object has no children (`false` when disposed)
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Get a new handle to the value stored under `key`
    ///
    /// `None` when the key is absent, when this is not an object, or when
    /// the handle has been disposed.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self.node().map(|node| &node.payload) {
            Some(Payload::Object(entries)) => read(entries)
                .get(key)
                .map(|child| Value::from_node(Arc::clone(child))),
            _ => None,
        }
    }

    /// Get a new handle to the array element at `index` (`None` when disposed)
    pub fn get_index(&self, index: usize) -> Option<Value> {
        match self.node().map(|node| &node.payload) {
            Some(Payload::Array(items)) => read(items)
                .get(index)
                .map(|child| Value::from_node(Arc::clone(child))),
            _ => None,
        }
    }

    /// Keys of an object in insertion order
    ///
    /// Empty for anything else, including a disposed handle.
    pub fn keys(&self) -> Vec<String> {
        match self.node().map(|node| &node.payload) {
            Some(Payload::Object(entries)) => read(entries).keys().cloned().collect(),
            _ => Vec::new(),
        }
    }

    /// Serialize the tree as JSON text
    ///
    /// Trees nesting deeper than 512 containers fail with
    /// [`StencilError::DepthExceeded`].
    pub fn to_json(&self) -> Result<String> {
        if self.live()?.nests_deeper_than(NESTING_LIMIT) {
            return Err(StencilError::DepthExceeded {
                limit: NESTING_LIMIT,
            });
        }
        serde_json::to_string(self).map_err(|e| StencilError::Generic {
            operation: "Serializing value",
            message: e.to_string(),
        })
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::null()
    }
}

// ═══════════════════════════════════════════════════════════════════
// PartialEq Implementation
// ═══════════════════════════════════════════════════════════════════

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self.node(), other.node()) {
            (Some(a), Some(b)) => nodes_equal(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

fn nodes_equal(a: &NodeData, b: &NodeData) -> bool {
    let mut pending = Vec::new();
    if !shallow_equal(a, b, &mut pending) {
        return false;
    }
    while let Some((l, r)) = pending.pop() {
        if !shallow_equal(&l, &r, &mut pending) {
            return false;
        }
    }
    true
}

/// Compare two nodes one level deep, queueing child pairs on `pending`.
fn shallow_equal(a: &NodeData, b: &NodeData, pending: &mut Vec<(Node, Node)>) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }
    match (&a.payload, &b.payload) {
        (Payload::Null, Payload::Null) => true,
        (Payload::Bool(x), Payload::Bool(y)) => x == y,
        (Payload::Int(x), Payload::Int(y)) => x == y,
        (Payload::Float(x), Payload::Float(y)) => x == y,
        (Payload::String(x), Payload::String(y)) => x == y,
        (Payload::Array(x), Payload::Array(y)) => {
            let (x, y) = (read(x), read(y));
            if x.len() != y.len() {
                return false;
            }
            pending.extend(x.iter().cloned().zip(y.iter().cloned()));
            true
        }
        (Payload::Object(x), Payload::Object(y)) => {
            let (x, y) = (read(x), read(y));
            if x.len() != y.len() {
                return false;
            }
            for (key, l) in x.iter() {
                match y.get(key) {
                    Some(r) => pending.push((Arc::clone(l), Arc::clone(r))),
                    None => return false,
                }
            }
            true
        }
        _ => false,
    }
}

/// Whether storing `child` inside `parent` would make `parent` reach itself.
///
/// A parent held by a single share is not stored in any container, so only
/// the child itself can be the parent.
fn would_cycle(parent: &Node, child: &Node) -> bool {
    if Arc::strong_count(parent) == 1 {
        return Arc::ptr_eq(parent, child);
    }
    child.reaches(parent)
}

// ═══════════════════════════════════════════════════════════════════
// From Implementations
// ═══════════════════════════════════════════════════════════════════

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::int(i)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::float(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_overwrite_keeps_position() {
        let obj = Value::object();
        obj.set("a", &Value::int(1)).unwrap();
        obj.set("b", &Value::int(2)).unwrap();
        obj.set("a", &Value::int(3)).unwrap();

        assert_eq!(obj.keys(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(obj.get("a").unwrap().as_i64(), Some(3));
    }

    #[test]
    fn test_share_count_tracks_containers() {
        let child = Value::string("x");
        assert_eq!(child.share_count().unwrap(), 1);

        let arr = Value::array();
        arr.add(&child).unwrap();
        arr.add(&child).unwrap();
        assert_eq!(child.share_count().unwrap(), 3);

        drop(arr);
        assert_eq!(child.share_count().unwrap(), 1);
    }

    #[test]
    fn test_self_insert_is_rejected() {
        let arr = Value::array();
        let err = arr.add(&arr).unwrap_err();
        assert!(matches!(err, StencilError::Operation { .. }));
        assert!(err.message().contains("cycle"));
    }

    #[test]
    fn test_seal_propagates_to_children() {
        let child = Value::object();
        let root = Value::object();
        root.set("child", &child).unwrap();

        root.seal().unwrap();
        assert!(root.is_sealed());
        assert!(child.is_sealed());
    }
}
