//! A `serde::Serializer` that produces value trees
//!
//! Every nested element goes through [`Converter::descend`], so the depth
//! limit applies to serde input exactly as it does to [`ToValue`](super::ToValue).

use std::fmt::Display;

use serde::ser::{self, Serialize};

use super::Converter;
use crate::error::{Result, StencilError};
use crate::value::Value;

impl ser::Error for StencilError {
    fn custom<T: Display>(msg: T) -> Self {
        StencilError::Generic {
            operation: "Serializing host value",
            message: msg.to_string(),
        }
    }
}

pub(super) struct ValueSerializer<'a, 'b> {
    cx: &'a mut Converter<'b>,
}

impl<'a, 'b> ValueSerializer<'a, 'b> {
    pub(super) fn new(cx: &'a mut Converter<'b>) -> Self {
        Self { cx }
    }
}

fn nested<T: Serialize + ?Sized>(cx: &mut Converter<'_>, value: &T) -> Result<Value> {
    cx.descend(|cx| value.serialize(ValueSerializer::new(cx)))
}

fn wrap_variant(variant: &'static str, payload: Value) -> Result<Value> {
    let object = Value::object();
    object.set(variant, &payload)?;
    Ok(object)
}

fn out_of_range(n: impl Display) -> StencilError {
    StencilError::invalid_argument(
        "Converting integer",
        format!("{} does not fit in a 64-bit signed integer", n),
    )
}

impl<'a, 'b> ser::Serializer for ValueSerializer<'a, 'b> {
    type Ok = Value;
    type Error = StencilError;

    type SerializeSeq = SeqBuilder<'a, 'b>;
    type SerializeTuple = SeqBuilder<'a, 'b>;
    type SerializeTupleStruct = SeqBuilder<'a, 'b>;
    type SerializeTupleVariant = SeqBuilder<'a, 'b>;
    type SerializeMap = ObjectBuilder<'a, 'b>;
    type SerializeStruct = ObjectBuilder<'a, 'b>;
    type SerializeStructVariant = ObjectBuilder<'a, 'b>;

    fn serialize_bool(self, v: bool) -> Result<Value> {
        Ok(Value::bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value> {
        Ok(Value::int(i64::from(v)))
    }

    fn serialize_i16(self, v: i16) -> Result<Value> {
        Ok(Value::int(i64::from(v)))
    }

    fn serialize_i32(self, v: i32) -> Result<Value> {
        Ok(Value::int(i64::from(v)))
    }

    fn serialize_i64(self, v: i64) -> Result<Value> {
        Ok(Value::int(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Value> {
        i64::try_from(v).map(Value::int).map_err(|_| out_of_range(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Value> {
        Ok(Value::int(i64::from(v)))
    }

    fn serialize_u16(self, v: u16) -> Result<Value> {
        Ok(Value::int(i64::from(v)))
    }

    fn serialize_u32(self, v: u32) -> Result<Value> {
        Ok(Value::int(i64::from(v)))
    }

    fn serialize_u64(self, v: u64) -> Result<Value> {
        i64::try_from(v).map(Value::int).map_err(|_| out_of_range(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Value> {
        i64::try_from(v).map(Value::int).map_err(|_| out_of_range(v))
    }

    fn serialize_f32(self, v: f32) -> Result<Value> {
        Ok(Value::float(f64::from(v)))
    }

    fn serialize_f64(self, v: f64) -> Result<Value> {
        Ok(Value::float(v))
    }

    fn serialize_char(self, v: char) -> Result<Value> {
        Ok(Value::string(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value> {
        Ok(Value::string(v))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value> {
        let array = Value::array();
        for byte in v {
            array.add(&Value::int(i64::from(*byte)))?;
        }
        Ok(array)
    }

    fn serialize_none(self) -> Result<Value> {
        Ok(Value::null())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Value> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value> {
        Ok(Value::null())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value> {
        Ok(Value::null())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value> {
        Ok(Value::string(variant))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value> {
        let payload = nested(self.cx, value)?;
        wrap_variant(variant, payload)
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<SeqBuilder<'a, 'b>> {
        Ok(SeqBuilder::new(self.cx, None))
    }

    fn serialize_tuple(self, _len: usize) -> Result<SeqBuilder<'a, 'b>> {
        Ok(SeqBuilder::new(self.cx, None))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<SeqBuilder<'a, 'b>> {
        Ok(SeqBuilder::new(self.cx, None))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<SeqBuilder<'a, 'b>> {
        Ok(SeqBuilder::new(self.cx, Some(variant)))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<ObjectBuilder<'a, 'b>> {
        Ok(ObjectBuilder::new(self.cx, None))
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<ObjectBuilder<'a, 'b>> {
        Ok(ObjectBuilder::new(self.cx, None))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<ObjectBuilder<'a, 'b>> {
        Ok(ObjectBuilder::new(self.cx, Some(variant)))
    }
}

pub(super) struct SeqBuilder<'a, 'b> {
    cx: &'a mut Converter<'b>,
    array: Value,
    variant: Option<&'static str>,
}

impl<'a, 'b> SeqBuilder<'a, 'b> {
    fn new(cx: &'a mut Converter<'b>, variant: Option<&'static str>) -> Self {
        Self {
            cx,
            array: Value::array(),
            variant,
        }
    }

    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let element = nested(self.cx, value)?;
        self.array.add(&element)
    }

    fn finish(self) -> Result<Value> {
        match self.variant {
            Some(variant) => wrap_variant(variant, self.array),
            None => Ok(self.array),
        }
    }
}

impl ser::SerializeSeq for SeqBuilder<'_, '_> {
    type Ok = Value;
    type Error = StencilError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        self.finish()
    }
}

impl ser::SerializeTuple for SeqBuilder<'_, '_> {
    type Ok = Value;
    type Error = StencilError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        self.finish()
    }
}

impl ser::SerializeTupleStruct for SeqBuilder<'_, '_> {
    type Ok = Value;
    type Error = StencilError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        self.finish()
    }
}

impl ser::SerializeTupleVariant for SeqBuilder<'_, '_> {
    type Ok = Value;
    type Error = StencilError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        self.push(value)
    }

    fn end(self) -> Result<Value> {
        self.finish()
    }
}

pub(super) struct ObjectBuilder<'a, 'b> {
    cx: &'a mut Converter<'b>,
    object: Value,
    variant: Option<&'static str>,
    pending_key: Option<String>,
}

impl<'a, 'b> ObjectBuilder<'a, 'b> {
    fn new(cx: &'a mut Converter<'b>, variant: Option<&'static str>) -> Self {
        Self {
            cx,
            object: Value::object(),
            variant,
            pending_key: None,
        }
    }

    fn insert<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        let child = nested(self.cx, value)?;
        self.object.set(key, &child)
    }

    fn finish(self) -> Result<Value> {
        match self.variant {
            Some(variant) => wrap_variant(variant, self.object),
            None => Ok(self.object),
        }
    }
}

/// Map keys must serialize to text; integers and booleans are stringified.
fn map_key<T: Serialize + ?Sized>(cx: &mut Converter<'_>, key: &T) -> Result<String> {
    let key = key.serialize(ValueSerializer::new(cx))?;
    if let Some(s) = key.as_str() {
        return Ok(s.to_string());
    }
    if let Some(i) = key.as_i64() {
        return Ok(i.to_string());
    }
    if let Some(b) = key.as_bool() {
        return Ok(b.to_string());
    }
    Err(StencilError::invalid_argument(
        "Serializing host value",
        format!("map keys must be strings, found {:?}", key),
    ))
}

impl ser::SerializeMap for ObjectBuilder<'_, '_> {
    type Ok = Value;
    type Error = StencilError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<()> {
        self.pending_key = Some(map_key(self.cx, key)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let key = self.pending_key.take().ok_or_else(|| {
            StencilError::operation("Serializing host value", "map value without a key")
        })?;
        self.insert(&key, value)
    }

    fn end(self) -> Result<Value> {
        self.finish()
    }
}

impl ser::SerializeStruct for ObjectBuilder<'_, '_> {
    type Ok = Value;
    type Error = StencilError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.insert(key, value)
    }

    fn end(self) -> Result<Value> {
        self.finish()
    }
}

impl ser::SerializeStructVariant for ObjectBuilder<'_, '_> {
    type Ok = Value;
    type Error = StencilError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        self.insert(key, value)
    }

    fn end(self) -> Result<Value> {
        self.finish()
    }
}
