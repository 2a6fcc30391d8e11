//! Tests for value handles, shares and sealing

use pretty_assertions::assert_eq;
use stencil::*;

fn every_kind() -> Vec<Value> {
    vec![
        Value::null(),
        Value::bool(true),
        Value::int(42),
        Value::float(2.5),
        Value::string("text"),
        Value::array(),
        Value::object(),
    ]
}

#[test]
fn test_dispose_is_idempotent_for_every_kind() {
    for mut value in every_kind() {
        value.dispose();
        value.dispose();
        assert!(value.is_disposed());
    }
}

#[test]
fn test_disposed_handle_rejects_operations() {
    for mut value in every_kind() {
        value.dispose();

        assert!(value.share().unwrap_err().is_disposed());
        assert!(value.kind().unwrap_err().is_disposed());
        assert!(value.share_count().unwrap_err().is_disposed());
        assert!(value.to_json().unwrap_err().is_disposed());
        assert!(value.add(&Value::int(1)).unwrap_err().is_disposed());
        assert!(value.set("k", &Value::int(1)).unwrap_err().is_disposed());
        assert!(RenderContext::new(&value).is_err());
    }
}

#[test]
fn test_disposed_element_is_rejected() {
    let array = Value::array();
    let mut element = Value::int(1);
    element.dispose();

    let err = array.add(&element).unwrap_err();
    assert!(err.is_disposed());
    assert_eq!(err.status(), Status::InvalidArgument);
    assert_eq!(array.len(), Some(0));
}

#[test]
fn test_inserted_child_outlives_its_handle() {
    let root = Value::object();
    let items = Value::array();
    {
        let mut first = Value::string("first");
        items.add(&first).unwrap();
        first.dispose();
    }
    items.add(&Value::string("second")).unwrap();
    root.set("items", &items).unwrap();
    drop(items);

    let template = Template::parse("{{ items | join(',') }}").unwrap();
    let context = RenderContext::new(&root).unwrap();
    assert_eq!(template.render(&context).unwrap(), "first,second");
}

#[test]
fn test_share_counts() {
    let child = Value::int(7);
    assert_eq!(child.share_count().unwrap(), 1);

    let a = Value::array();
    let b = Value::array();
    a.add(&child).unwrap();
    b.add(&child).unwrap();
    assert_eq!(child.share_count().unwrap(), 3);

    drop(a);
    assert_eq!(child.share_count().unwrap(), 2);

    let clone = child.clone();
    assert_eq!(child.share_count().unwrap(), 3);
    drop(clone);
    drop(b);
    assert_eq!(child.share_count().unwrap(), 1);
}

#[test]
fn test_wrong_container_is_operation_error() {
    let err = Value::object().add(&Value::int(1)).unwrap_err();
    assert_eq!(err.status(), Status::OperationFailed);
    assert!(err.to_string().starts_with("Adding element to array failed. Code: 6."));

    let err = Value::array().set("k", &Value::int(1)).unwrap_err();
    assert_eq!(err.status(), Status::OperationFailed);
    assert!(err.message().contains("expected an object"));
}

#[test]
fn test_inserting_into_itself_is_rejected() {
    let outer = Value::array();
    let inner = Value::array();
    outer.add(&inner).unwrap();

    assert!(inner.add(&outer).is_err());
    assert!(outer.add(&outer).is_err());

    let object = Value::object();
    assert!(object.set("me", &object).is_err());
}

#[test]
fn test_set_overwrites_in_place() {
    let object = Value::object();
    object.set("a", &Value::int(1)).unwrap();
    object.set("b", &Value::int(2)).unwrap();
    object.set("a", &Value::int(3)).unwrap();

    assert_eq!(object.keys(), vec!["a".to_string(), "b".to_string()]);
    assert_eq!(object.to_json().unwrap(), r#"{"a":3,"b":2}"#);
}

#[test]
fn test_context_seals_shared_subtrees() {
    let shared = Value::object();
    let root = Value::object();
    root.set("shared", &shared).unwrap();

    let context = RenderContext::new(&root).unwrap();
    let err = shared.set("late", &Value::null()).unwrap_err();
    assert_eq!(err.status(), Status::OperationFailed);
    assert!(err.message().contains("sealed"));

    // sealing outlives the context
    drop(context);
    assert!(shared.is_sealed());
}

#[test]
fn test_structural_equality() {
    let a = Value::object();
    a.set("x", &Value::int(1)).unwrap();
    a.set("y", &Value::string("z")).unwrap();

    let b = Value::object();
    b.set("y", &Value::string("z")).unwrap();
    b.set("x", &Value::int(1)).unwrap();

    assert_eq!(a, b);
    assert_ne!(Value::int(1), Value::float(1.0));
}

#[test]
fn test_display_and_debug() {
    let array = Value::array();
    array.add(&Value::string("a")).unwrap();
    array.add(&Value::float(2.5)).unwrap();

    assert_eq!(format!("{:?}", array), r#"["a", 2.5]"#);
    assert_eq!(Value::string("plain").to_string(), "plain");
}

#[test]
fn test_values_move_across_threads() {
    let root = Value::object();
    let items = Value::array();
    root.set("items", &items).unwrap();

    std::thread::scope(|scope| {
        for i in 0..4 {
            let items = items.share().unwrap();
            scope.spawn(move || {
                // Add serializes on the node lock
                items.add(&Value::int(i)).unwrap();
            });
        }
    });

    assert_eq!(items.len(), Some(4));
}

#[test]
fn test_accessors_on_disposed_handle_are_empty() {
    let mut value = Value::object();
    value.set("k", &Value::int(1)).unwrap();
    value.dispose();

    assert!(!value.is_null());
    assert!(!value.is_object());
    assert!(!value.is_empty());
    assert_eq!(value.len(), None);
    assert_eq!(value.get("k"), None);
    assert_eq!(value.get_index(0), None);
    assert_eq!(value.keys(), Vec::<String>::new());
    assert_eq!(value.as_str(), None);
    // kind() is the accessor that tells disposal apart
    assert!(value.kind().unwrap_err().is_disposed());
}

/// An array chain `levels` containers deep, built leaf first.
fn chain(levels: usize) -> Value {
    let mut root = Value::array();
    for _ in 1..levels {
        let parent = Value::array();
        parent.add(&root).unwrap();
        root = parent;
    }
    root
}

#[test]
fn test_dropping_a_very_deep_chain() {
    // built root first, so every add goes through a shared parent
    let root = Value::array();
    let mut tail = root.share().unwrap();
    for _ in 0..200_000 {
        let next = Value::array();
        tail.add(&next).unwrap();
        tail = next;
    }
    drop(tail);
    drop(root);

    drop(chain(200_000));
}

#[test]
fn test_deep_tree_context_is_rejected() {
    let root = chain(5_000);
    let err = RenderContext::new(&root).unwrap_err();

    assert!(matches!(err, StencilError::DepthExceeded { limit: 128 }));
    assert!(!root.is_sealed());
}

#[test]
fn test_deep_tree_operations_do_not_recurse() {
    let deep = chain(100_000);
    let twin = chain(100_000);
    assert_eq!(deep, twin);

    // a parent with a second share makes `add` walk the whole child
    let holder = Value::array();
    let outer = Value::array();
    holder.add(&outer).unwrap();
    outer.add(&deep).unwrap();
    assert!(deep.add(&outer).is_err());

    let err = deep.to_json().unwrap_err();
    assert!(matches!(err, StencilError::DepthExceeded { limit: 512 }));
    assert!(format!("{:?}", deep).contains("..."));
}
