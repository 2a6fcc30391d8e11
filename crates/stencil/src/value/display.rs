//! Display and Debug implementations for Value

use std::fmt;

use super::node::{read, NodeData, Payload, NESTING_LIMIT};
use super::*;

/// Containers below `NESTING_LIMIT` levels print as `...`.
fn write_node(f: &mut fmt::Formatter<'_>, node: &NodeData, depth: usize) -> fmt::Result {
    match &node.payload {
        Payload::Array(_) | Payload::Object(_) if depth >= NESTING_LIMIT => write!(f, "..."),
        Payload::Null => write!(f, "null"),
        Payload::Bool(b) => write!(f, "{}", b),
        Payload::Int(n) => write!(f, "{}", n),
        Payload::Float(n) => write!(f, "{:?}", n),
        Payload::String(s) => write!(f, "{:?}", s),

        Payload::Array(items) => {
            write!(f, "[")?;
            for (i, item) in read(items).iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_node(f, item, depth + 1)?;
            }
            write!(f, "]")
        }

        Payload::Object(entries) => {
            write!(f, "{{")?;
            for (i, (k, v)) in read(entries).iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{:?}: ", k)?;
                write_node(f, v, depth + 1)?;
            }
            write!(f, "}}")
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            Some(node) => write_node(f, node, 0),
            None => write!(f, "<disposed>"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Display is more user-friendly, Debug is more detailed
        match self.as_str() {
            Some(s) => write!(f, "{}", s), // No quotes for Display
            None => fmt::Debug::fmt(self, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_nested() {
        let arr = Value::array();
        arr.add(&Value::int(1)).unwrap();
        arr.add(&Value::float(2.5)).unwrap();
        arr.add(&Value::null()).unwrap();

        let obj = Value::object();
        obj.set("xs", &arr).unwrap();
        obj.set("name", &Value::string("a")).unwrap();

        assert_eq!(format!("{:?}", obj), r#"{"xs": [1, 2.5, null], "name": "a"}"#);
    }

    #[test]
    fn test_display_unquotes_strings() {
        assert_eq!(Value::string("hi").to_string(), "hi");
        assert_eq!(Value::bool(true).to_string(), "true");

        let mut v = Value::int(1);
        v.dispose();
        assert_eq!(v.to_string(), "<disposed>");
    }

    #[test]
    fn test_debug_elides_deep_nesting() {
        let mut root = Value::array();
        for _ in 0..NESTING_LIMIT + 10 {
            let parent = Value::array();
            parent.add(&root).unwrap();
            root = parent;
        }

        let text = format!("{:?}", root);
        assert!(text.starts_with("[[[["));
        assert!(text.contains("[...]"));
        assert_eq!(text.matches('[').count(), NESTING_LIMIT);
    }
}
