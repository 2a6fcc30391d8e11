//! ToValue implementations for standard library and serde_json types

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::BuildHasher;
use std::rc::{self, Rc};
use std::sync::{self as arc, Arc};

use indexmap::IndexMap;

use super::{Converter, ToValue};
use crate::error::{Result, StencilError};
use crate::value::Value;

// ═══════════════════════════════════════════════════════════════════
// Absent Values
// ═══════════════════════════════════════════════════════════════════

impl ToValue for () {
    fn to_value(&self, _cx: &mut Converter<'_>) -> Result<Value> {
        Ok(Value::null())
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self, cx: &mut Converter<'_>) -> Result<Value> {
        match self {
            Some(inner) => inner.to_value(cx),
            None => Ok(Value::null()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Text
// ═══════════════════════════════════════════════════════════════════

impl ToValue for str {
    fn to_value(&self, _cx: &mut Converter<'_>) -> Result<Value> {
        Ok(Value::string(self))
    }
}

impl ToValue for String {
    fn to_value(&self, _cx: &mut Converter<'_>) -> Result<Value> {
        Ok(Value::string(self.as_str()))
    }
}

impl ToValue for char {
    fn to_value(&self, _cx: &mut Converter<'_>) -> Result<Value> {
        Ok(Value::string(self.to_string()))
    }
}

impl ToValue for Cow<'_, str> {
    fn to_value(&self, _cx: &mut Converter<'_>) -> Result<Value> {
        Ok(Value::string(self.as_ref()))
    }
}

// ═══════════════════════════════════════════════════════════════════
// Scalars
// ═══════════════════════════════════════════════════════════════════

impl ToValue for bool {
    fn to_value(&self, _cx: &mut Converter<'_>) -> Result<Value> {
        Ok(Value::bool(*self))
    }
}

macro_rules! widen_int {
    ($($ty:ty),*) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self, _cx: &mut Converter<'_>) -> Result<Value> {
                    Ok(Value::int(i64::from(*self)))
                }
            }
        )*
    };
}

widen_int!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! checked_int {
    ($($ty:ty),*) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self, _cx: &mut Converter<'_>) -> Result<Value> {
                    i64::try_from(*self).map(Value::int).map_err(|_| {
                        StencilError::invalid_argument(
                            "Converting integer",
                            format!("{} does not fit in a 64-bit signed integer", self),
                        )
                    })
                }
            }
        )*
    };
}

checked_int!(isize, usize, u64, i128, u128);

impl ToValue for f32 {
    fn to_value(&self, _cx: &mut Converter<'_>) -> Result<Value> {
        Ok(Value::float(f64::from(*self)))
    }
}

impl ToValue for f64 {
    fn to_value(&self, _cx: &mut Converter<'_>) -> Result<Value> {
        Ok(Value::float(*self))
    }
}

// ═══════════════════════════════════════════════════════════════════
// Mappings
// ═══════════════════════════════════════════════════════════════════

impl<K, V, S> ToValue for HashMap<K, V, S>
where
    K: AsRef<str>,
    V: ToValue,
    S: BuildHasher,
{
    fn to_value(&self, cx: &mut Converter<'_>) -> Result<Value> {
        cx.object(self.iter())
    }
}

impl<K: AsRef<str>, V: ToValue> ToValue for BTreeMap<K, V> {
    fn to_value(&self, cx: &mut Converter<'_>) -> Result<Value> {
        cx.object(self.iter())
    }
}

impl<K, V, S> ToValue for IndexMap<K, V, S>
where
    K: AsRef<str>,
    V: ToValue,
    S: BuildHasher,
{
    fn to_value(&self, cx: &mut Converter<'_>) -> Result<Value> {
        cx.object(self.iter())
    }
}

// ═══════════════════════════════════════════════════════════════════
// Sequences
// ═══════════════════════════════════════════════════════════════════

impl<T: ToValue> ToValue for [T] {
    fn to_value(&self, cx: &mut Converter<'_>) -> Result<Value> {
        cx.array(self.iter())
    }
}

impl<T: ToValue, const N: usize> ToValue for [T; N] {
    fn to_value(&self, cx: &mut Converter<'_>) -> Result<Value> {
        cx.array(self.iter())
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self, cx: &mut Converter<'_>) -> Result<Value> {
        cx.array(self.iter())
    }
}

impl<T: ToValue> ToValue for VecDeque<T> {
    fn to_value(&self, cx: &mut Converter<'_>) -> Result<Value> {
        cx.array(self.iter())
    }
}

impl<T: ToValue> ToValue for BTreeSet<T> {
    fn to_value(&self, cx: &mut Converter<'_>) -> Result<Value> {
        cx.array(self.iter())
    }
}

impl<T: ToValue, S: BuildHasher> ToValue for HashSet<T, S> {
    fn to_value(&self, cx: &mut Converter<'_>) -> Result<Value> {
        cx.array(self.iter())
    }
}

// ═══════════════════════════════════════════════════════════════════
// Pointers and Cells
// ═══════════════════════════════════════════════════════════════════

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self, cx: &mut Converter<'_>) -> Result<Value> {
        (**self).to_value(cx)
    }
}

impl<T: ToValue + ?Sized> ToValue for Box<T> {
    fn to_value(&self, cx: &mut Converter<'_>) -> Result<Value> {
        (**self).to_value(cx)
    }
}

impl<T: ToValue + ?Sized> ToValue for Rc<T> {
    fn to_value(&self, cx: &mut Converter<'_>) -> Result<Value> {
        let address = Rc::as_ptr(self) as *const () as usize;
        cx.shared(address, std::any::type_name::<Self>(), &**self)
    }
}

impl<T: ToValue + ?Sized> ToValue for Arc<T> {
    fn to_value(&self, cx: &mut Converter<'_>) -> Result<Value> {
        let address = Arc::as_ptr(self) as *const () as usize;
        cx.shared(address, std::any::type_name::<Self>(), &**self)
    }
}

impl<T: ToValue> ToValue for rc::Weak<T> {
    fn to_value(&self, cx: &mut Converter<'_>) -> Result<Value> {
        match self.upgrade() {
            Some(strong) => strong.to_value(cx),
            None => Ok(Value::null()),
        }
    }
}

impl<T: ToValue> ToValue for arc::Weak<T> {
    fn to_value(&self, cx: &mut Converter<'_>) -> Result<Value> {
        match self.upgrade() {
            Some(strong) => strong.to_value(cx),
            None => Ok(Value::null()),
        }
    }
}

impl<T: ToValue + ?Sized> ToValue for RefCell<T> {
    fn to_value(&self, cx: &mut Converter<'_>) -> Result<Value> {
        let inner = self.try_borrow().map_err(|_| {
            StencilError::operation(
                "Reading host value",
                format!("{} is mutably borrowed", std::any::type_name::<Self>()),
            )
        })?;
        inner.to_value(cx)
    }
}

// ═══════════════════════════════════════════════════════════════════
// Existing Trees
// ═══════════════════════════════════════════════════════════════════

/// An existing value converts to a new share of the same node, so a
/// prebuilt subtree can be placed inside converted host data.
impl ToValue for Value {
    fn to_value(&self, _cx: &mut Converter<'_>) -> Result<Value> {
        self.share()
    }
}

impl ToValue for serde_json::Value {
    fn to_value(&self, cx: &mut Converter<'_>) -> Result<Value> {
        use serde_json::Value as Json;

        match self {
            Json::Null => Ok(Value::null()),
            Json::String(s) => Ok(Value::string(s.as_str())),
            Json::Bool(b) => Ok(Value::bool(*b)),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::int(i))
                } else if n.is_u64() {
                    Err(StencilError::invalid_argument(
                        "Converting integer",
                        format!("{} does not fit in a 64-bit signed integer", n),
                    ))
                } else {
                    Ok(Value::float(n.as_f64().unwrap_or(f64::NAN)))
                }
            }
            Json::Object(map) => cx.object(map.iter()),
            Json::Array(items) => cx.array(items.iter()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BuilderOptions, ValueBuilder};

    #[test]
    fn test_integers_widen() {
        let builder = ValueBuilder::new();
        assert_eq!(builder.build(&7u8).unwrap().as_i64(), Some(7));
        assert_eq!(builder.build(&-3i16).unwrap().as_i64(), Some(-3));
        assert_eq!(builder.build(&i64::MAX).unwrap().as_i64(), Some(i64::MAX));
        assert_eq!(builder.build(&5usize).unwrap().as_i64(), Some(5));
    }

    #[test]
    fn test_out_of_range_integer() {
        let err = ValueBuilder::new().build(&u64::MAX).unwrap_err();
        assert!(matches!(err, StencilError::InvalidArgument { .. }));
    }

    #[test]
    fn test_f32_widens() {
        let v = ValueBuilder::new().build(&1.5f32).unwrap();
        assert_eq!(v.as_f64(), Some(1.5));
    }

    #[test]
    fn test_option_and_unit_are_null() {
        let builder = ValueBuilder::new();
        assert!(builder.build(&None::<i32>).unwrap().is_null());
        assert!(builder.build(&()).unwrap().is_null());
        assert_eq!(builder.build(&Some("x")).unwrap().as_str(), Some("x"));
    }

    #[test]
    fn test_btreemap_order() {
        let mut map = BTreeMap::new();
        map.insert("b".to_string(), 2);
        map.insert("a".to_string(), 1);
        let v = ValueBuilder::new().build(&map).unwrap();
        assert_eq!(v.keys(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_rc_cycle_is_detected() {
        struct Link {
            next: RefCell<Option<Rc<Link>>>,
        }

        impl ToValue for Link {
            fn to_value(&self, cx: &mut Converter<'_>) -> Result<Value> {
                let object = Value::object();
                let next = cx.convert(&self.next)?;
                object.set("next", &next)?;
                Ok(object)
            }
        }

        let link = Rc::new(Link {
            next: RefCell::new(None),
        });
        *link.next.borrow_mut() = Some(Rc::clone(&link));

        let err = ValueBuilder::new().build(&link).unwrap_err();
        assert!(matches!(err, StencilError::Cycle { .. }));

        // break the cycle so the test does not leak
        link.next.borrow_mut().take();
    }

    #[test]
    fn test_shared_rc_without_cycle_is_fine() {
        let shared = Rc::new(vec![1, 2]);
        let pair = vec![Rc::clone(&shared), Rc::clone(&shared)];
        let v = ValueBuilder::with_options(BuilderOptions::default())
            .build(&pair)
            .unwrap();
        assert_eq!(v.to_json().unwrap(), "[[1,2],[1,2]]");
    }

    #[test]
    fn test_json_value() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"a":[1,2.5,"x",null,true]}"#).unwrap();
        let v = ValueBuilder::new().build(&json).unwrap();
        assert_eq!(v.to_json().unwrap(), r#"{"a":[1,2.5,"x",null,true]}"#);
    }
}
