//! Conversion of host data into value trees
//!
//! Conversion is eager and depth-first. Every child is built as its own
//! value, inserted into its parent, and its handle released immediately;
//! the parent's share keeps it alive.
//!
//! Host types opt in through [`ToValue`]. The implementations shipped here
//! follow a fixed precedence: absent values become null, then text, booleans,
//! integers, floats, string-keyed maps, sequences, and finally records
//! described by a [`Record`] field table. Any `serde::Serialize` type can be
//! converted as well, see [`ValueBuilder::build_serialize`].

mod impls;
mod record;
mod serializer;

pub use record::{FieldSpec, FieldTable, Record};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StencilError};
use crate::value::{Value, DEFAULT_MAX_DEPTH};

/// What to do when a record member cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPolicy {
    /// Leave the key out of the object and log the failure at debug level
    #[default]
    Skip,
    /// Abort the conversion with [`StencilError::UnreadableField`]
    Fail,
}

/// Configuration for a [`ValueBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderOptions {
    /// Maximum nesting depth of the produced tree
    pub max_depth: usize,

    /// Policy for record members whose accessor fails
    pub unreadable_fields: FieldPolicy,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            unreadable_fields: FieldPolicy::Skip,
        }
    }
}

impl BuilderOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create options with a custom depth limit.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth,
            ..Default::default()
        }
    }

    /// Set the policy for unreadable record members.
    pub fn with_field_policy(mut self, policy: FieldPolicy) -> Self {
        self.unreadable_fields = policy;
        self
    }
}

/// Host data that can be converted into a [`Value`].
///
/// Implementations build their node through the [`Converter`], which
/// tracks depth and shared-pointer cycles. Nested data must go through
/// [`Converter::convert`] (or the `array`/`object`/`record` helpers), never
/// by calling `to_value` on the child directly, or the depth limit is
/// bypassed.
///
/// A fixed-point decimal type should convert through `f64`; the precision
/// lost in that narrowing is accepted by the value model, which has no
/// decimal variant.
pub trait ToValue {
    /// Build the value node for `self`.
    fn to_value(&self, cx: &mut Converter<'_>) -> Result<Value>;
}

/// Per-conversion state handed to [`ToValue`] implementations.
pub struct Converter<'a> {
    options: &'a BuilderOptions,
    depth: usize,
    /// Addresses of `Rc`/`Arc` allocations currently being converted
    path: Vec<usize>,
}

impl<'a> Converter<'a> {
    pub(crate) fn new(options: &'a BuilderOptions) -> Self {
        Self {
            options,
            depth: 0,
            path: Vec::new(),
        }
    }

    /// The options this conversion runs with.
    pub fn options(&self) -> &BuilderOptions {
        self.options
    }

    /// Current nesting depth (the root is at depth 1).
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn descend<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        if self.depth >= self.options.max_depth {
            return Err(StencilError::DepthExceeded {
                limit: self.options.max_depth,
            });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Convert one level of nested data.
    pub fn convert<T: ToValue + ?Sized>(&mut self, data: &T) -> Result<Value> {
        self.descend(|cx| data.to_value(cx))
    }

    /// Convert data reached through a shared pointer at `address`.
    ///
    /// Revisiting an address that is still being converted means the host
    /// graph is cyclic, which is reported as [`StencilError::Cycle`].
    pub fn shared<T: ToValue + ?Sized>(
        &mut self,
        address: usize,
        type_name: &'static str,
        data: &T,
    ) -> Result<Value> {
        if self.path.contains(&address) {
            return Err(StencilError::Cycle { type_name });
        }
        self.path.push(address);
        let result = data.to_value(self);
        self.path.pop();
        result
    }

    /// Build an array from a sequence, converting elements in order.
    pub fn array<'i, I, T>(&mut self, items: I) -> Result<Value>
    where
        I: IntoIterator<Item = &'i T>,
        T: ToValue + ?Sized + 'i,
    {
        let array = Value::array();
        for item in items {
            let element = self.convert(item)?;
            array.add(&element)?;
        }
        Ok(array)
    }

    /// Build an object from string-keyed entries, in iteration order.
    pub fn object<'i, I, K, T>(&mut self, entries: I) -> Result<Value>
    where
        I: IntoIterator<Item = (&'i K, &'i T)>,
        K: AsRef<str> + ?Sized + 'i,
        T: ToValue + ?Sized + 'i,
    {
        let object = Value::object();
        for (key, item) in entries {
            let child = self.convert(item)?;
            object.set(key.as_ref(), &child)?;
        }
        Ok(object)
    }

    /// Build an object from a record's field table.
    pub fn record<T: Record>(&mut self, record: &T) -> Result<Value> {
        record::build_record(self, record)
    }

    /// Convert any `Serialize` value at the next nesting level.
    pub fn serialize<T: Serialize + ?Sized>(&mut self, data: &T) -> Result<Value> {
        self.descend(|cx| data.serialize(serializer::ValueSerializer::new(cx)))
    }
}

/// Converts host data into value trees.
///
/// ```
/// use std::collections::BTreeMap;
/// use stencil::ValueBuilder;
///
/// let mut data = BTreeMap::new();
/// data.insert("name", vec!["a", "b"]);
///
/// let value = ValueBuilder::new().build(&data).unwrap();
/// assert_eq!(value.to_json().unwrap(), r#"{"name":["a","b"]}"#);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ValueBuilder {
    options: BuilderOptions,
}

impl ValueBuilder {
    /// Create a builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder with the given options.
    pub fn with_options(options: BuilderOptions) -> Self {
        Self { options }
    }

    /// The options this builder runs with.
    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    /// Convert `data` through its [`ToValue`] implementation.
    pub fn build<T: ToValue + ?Sized>(&self, data: &T) -> Result<Value> {
        tracing::trace!(host_type = std::any::type_name::<T>(), "building value tree");
        Converter::new(&self.options).convert(data)
    }

    /// Convert `data` through its `serde::Serialize` implementation.
    ///
    /// Struct keys are the names serde reports, so `#[serde(rename)]` and
    /// `#[serde(rename_all)]` apply and no lowercasing happens. Unit and
    /// `None` become null, unit enum variants become their name, and data
    /// carrying variants become a single-entry object keyed by the variant.
    pub fn build_serialize<T: Serialize + ?Sized>(&self, data: &T) -> Result<Value> {
        tracing::trace!(host_type = std::any::type_name::<T>(), "serializing value tree");
        Converter::new(&self.options).serialize(data)
    }
}

/// Convert `data` with default builder options.
pub fn to_value<T: ToValue + ?Sized>(data: &T) -> Result<Value> {
    ValueBuilder::new().build(data)
}

/// Implement [`ToValue`] for types that implement [`Record`].
///
/// ```
/// use stencil::{record_to_value, FieldTable, Record};
///
/// struct Point {
///     x: i64,
///     y: i64,
/// }
///
/// impl Record for Point {
///     fn describe(fields: &mut FieldTable<Self>) {
///         fields.field("X", |p| &p.x);
///         fields.field("Y", |p| &p.y);
///     }
/// }
///
/// record_to_value!(Point);
///
/// let value = stencil::to_value(&Point { x: 1, y: 2 }).unwrap();
/// assert_eq!(value.to_json().unwrap(), r#"{"x":1,"y":2}"#);
/// ```
#[macro_export]
macro_rules! record_to_value {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::ToValue for $ty {
                fn to_value(
                    &self,
                    cx: &mut $crate::Converter<'_>,
                ) -> $crate::Result<$crate::Value> {
                    cx.record(self)
                }
            }
        )+
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = BuilderOptions::default();
        assert_eq!(options.max_depth, 128);
        assert_eq!(options.unreadable_fields, FieldPolicy::Skip);
    }

    #[test]
    fn test_depth_limit() {
        let builder = ValueBuilder::with_options(BuilderOptions::with_max_depth(2));
        assert!(builder.build(&vec![1, 2]).is_ok());

        let err = builder.build(&vec![vec![1]]).unwrap_err();
        assert!(matches!(err, StencilError::DepthExceeded { limit: 2 }));
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: BuilderOptions =
            serde_json::from_str(r#"{"unreadable_fields":"fail"}"#).unwrap();
        assert_eq!(options.max_depth, 128);
        assert_eq!(options.unreadable_fields, FieldPolicy::Fail);
    }
}
