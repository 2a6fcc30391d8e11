//! `serde::Serialize` for value trees
//!
//! This is how a tree reaches the template engine and how it is written
//! out as JSON. A disposed handle serializes as unit (`null`). A tree
//! nesting deeper than `NESTING_LIMIT` containers fails with a custom
//! serializer error instead of recursing further.

use serde::ser::{Error, Serialize, SerializeMap, SerializeSeq, Serializer};

use super::node::{read, NodeData, Payload, NESTING_LIMIT};
use super::Value;

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.node() {
            Some(node) => SerializeNode {
                node,
                depth: 0,
            }
            .serialize(serializer),
            None => serializer.serialize_unit(),
        }
    }
}

struct SerializeNode<'a> {
    node: &'a NodeData,
    depth: usize,
}

impl<'a> SerializeNode<'a> {
    fn child(&self, node: &'a NodeData) -> Self {
        Self {
            node,
            depth: self.depth + 1,
        }
    }
}

impl Serialize for SerializeNode<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.node.payload {
            Payload::Array(_) | Payload::Object(_) if self.depth >= NESTING_LIMIT => Err(
                S::Error::custom(format!("value nests deeper than {NESTING_LIMIT} levels")),
            ),
            Payload::Null => serializer.serialize_unit(),
            Payload::Bool(b) => serializer.serialize_bool(*b),
            Payload::Int(n) => serializer.serialize_i64(*n),
            Payload::Float(n) => serializer.serialize_f64(*n),
            Payload::String(s) => serializer.serialize_str(s),
            Payload::Array(items) => {
                let items = read(items);
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(&self.child(item))?;
                }
                seq.end()
            }
            Payload::Object(entries) => {
                let entries = read(entries);
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, child) in entries.iter() {
                    map.serialize_entry(key, &self.child(child))?;
                }
                map.end()
            }
        }
    }
}
