//! Field descriptor tables for record types
//!
//! A record describes its readable members once; the resulting
//! [`FieldTable`] is cached per type and reused for every conversion.

use std::any::{Any, TypeId};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use super::{Converter, FieldPolicy, ToValue};
use crate::error::{Result, StencilError};
use crate::value::Value;

/// A host type converted to an object through its field table.
///
/// The emitted key of a member is its explicit rename if one was given,
/// otherwise the member name lowercased. When two members end up with the
/// same key the one registered last wins.
///
/// Implement [`ToValue`] for a record with [`record_to_value!`](crate::record_to_value).
pub trait Record: Sized + 'static {
    /// Register the readable members of `Self`, in emission order.
    fn describe(fields: &mut FieldTable<Self>);
}

enum FieldRead {
    Value(Value),
    Unreadable(anyhow::Error),
}

type Reader<T> = Box<dyn Fn(&T, &mut Converter<'_>) -> Result<FieldRead> + Send + Sync>;

struct FieldEntry<T> {
    member: &'static str,
    key: String,
    read: Reader<T>,
}

/// The registered members of a record type.
pub struct FieldTable<T> {
    fields: Vec<FieldEntry<T>>,
}

/// Handle to a freshly registered field, used to attach a rename.
pub struct FieldSpec<'a> {
    key: &'a mut String,
}

impl FieldSpec<'_> {
    /// Emit this field under `name` instead of the lowercased member name.
    pub fn rename(self, name: impl Into<String>) -> Self {
        *self.key = name.into();
        self
    }
}

impl<T: Record> FieldTable<T> {
    fn build() -> Self {
        let mut table = FieldTable { fields: Vec::new() };
        T::describe(&mut table);
        tracing::debug!(
            record = std::any::type_name::<T>(),
            fields = table.fields.len(),
            "built field table"
        );
        table
    }
}

impl<T: 'static> FieldTable<T> {
    fn push(&mut self, member: &'static str, read: Reader<T>) -> FieldSpec<'_> {
        self.fields.push(FieldEntry {
            member,
            key: member.to_lowercase(),
            read,
        });
        let last = self.fields.len() - 1;
        FieldSpec {
            key: &mut self.fields[last].key,
        }
    }

    /// Register a member read by reference.
    pub fn field<V, F>(&mut self, member: &'static str, get: F) -> FieldSpec<'_>
    where
        V: ToValue + ?Sized,
        F: Fn(&T) -> &V + Send + Sync + 'static,
    {
        self.push(
            member,
            Box::new(move |record: &T, cx: &mut Converter<'_>| {
                cx.convert(get(record)).map(FieldRead::Value)
            }),
        )
    }

    /// Register a member whose value is computed on every read.
    pub fn computed<V, F>(&mut self, member: &'static str, get: F) -> FieldSpec<'_>
    where
        V: ToValue,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        self.push(
            member,
            Box::new(move |record: &T, cx: &mut Converter<'_>| {
                cx.convert(&get(record)).map(FieldRead::Value)
            }),
        )
    }

    /// Register a member whose accessor may fail.
    ///
    /// A failing accessor is handled according to
    /// [`BuilderOptions::unreadable_fields`](super::BuilderOptions::unreadable_fields).
    /// Errors while converting a value that was read successfully always
    /// propagate.
    pub fn try_field<V, F>(&mut self, member: &'static str, get: F) -> FieldSpec<'_>
    where
        V: ToValue,
        F: Fn(&T) -> anyhow::Result<V> + Send + Sync + 'static,
    {
        self.push(
            member,
            Box::new(move |record: &T, cx: &mut Converter<'_>| match get(record) {
                Ok(value) => cx.convert(&value).map(FieldRead::Value),
                Err(err) => Ok(FieldRead::Unreadable(err)),
            }),
        )
    }

    /// Number of registered members
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if no members are registered
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Emitted keys in registration order (duplicates included)
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.fields.iter().map(|field| field.key.as_str())
    }
}

type SharedTable = Arc<dyn Any + Send + Sync>;

static TABLES: OnceLock<DashMap<TypeId, SharedTable>> = OnceLock::new();

/// The cached field table of `T`, built on first use.
pub(crate) fn table_for<T: Record>() -> Arc<FieldTable<T>> {
    let tables = TABLES.get_or_init(DashMap::new);
    let shared = Arc::clone(
        tables
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Arc::new(FieldTable::<T>::build()) as SharedTable)
            .value(),
    );
    shared
        .downcast::<FieldTable<T>>()
        .unwrap_or_else(|_| Arc::new(FieldTable::<T>::build()))
}

pub(super) fn build_record<T: Record>(cx: &mut Converter<'_>, record: &T) -> Result<Value> {
    let table = table_for::<T>();
    let object = Value::object();

    for field in &table.fields {
        match (field.read)(record, cx)? {
            FieldRead::Value(child) => object.set(field.key.as_str(), &child)?,
            FieldRead::Unreadable(err) => match cx.options().unreadable_fields {
                FieldPolicy::Skip => {
                    tracing::debug!(
                        record = std::any::type_name::<T>(),
                        member = field.member,
                        error = %err,
                        "skipping unreadable field"
                    );
                }
                FieldPolicy::Fail => {
                    return Err(StencilError::UnreadableField {
                        field: field.key.clone(),
                        reason: format!("{:#}", err),
                    });
                }
            },
        }
    }

    Ok(object)
}
