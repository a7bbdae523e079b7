use serde::ser::{self, Serialize};

use super::{QueryError, QueryValue};

/// Serializer that captures any `Serialize` value as a [`QueryValue`] tree.
pub struct ValueSerializer;

impl ser::Serializer for ValueSerializer {
    type Ok = QueryValue;
    type Error = QueryError;

    type SerializeSeq = SerializeArray;
    type SerializeTuple = SerializeArray;
    type SerializeTupleStruct = SerializeArray;
    type SerializeTupleVariant = SerializeTupleVariant;
    type SerializeMap = SerializeObject;
    type SerializeStruct = SerializeObject;
    type SerializeStructVariant = SerializeStructVariant;

    fn serialize_bool(self, v: bool) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::Int(i64::from(v)))
    }

    fn serialize_i16(self, v: i16) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::Int(i64::from(v)))
    }

    fn serialize_i32(self, v: i32) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::Int(i64::from(v)))
    }

    fn serialize_i64(self, v: i64) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::Int(v))
    }

    fn serialize_u8(self, v: u8) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::UInt(u64::from(v)))
    }

    fn serialize_u16(self, v: u16) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::UInt(u64::from(v)))
    }

    fn serialize_u32(self, v: u32) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::UInt(u64::from(v)))
    }

    fn serialize_u64(self, v: u64) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::UInt(v))
    }

    fn serialize_f32(self, v: f32) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::Float(v))
    }

    fn serialize_f64(self, v: f64) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::Double(v))
    }

    fn serialize_char(self, v: char) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::Char(v))
    }

    fn serialize_str(self, v: &str) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::Str(v.to_owned()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::Array(
            v.iter().map(|b| QueryValue::UInt(u64::from(*b))).collect(),
        ))
    }

    fn serialize_none(self) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::Null)
    }

    fn serialize_some<T>(self, value: &T) -> Result<QueryValue, QueryError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::Str(variant.to_owned()))
    }

    fn serialize_newtype_struct<T>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<QueryValue, QueryError>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<QueryValue, QueryError>
    where
        T: ?Sized + Serialize,
    {
        Ok(QueryValue::Object(vec![(
            variant.to_owned(),
            value.serialize(ValueSerializer)?,
        )]))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SerializeArray, QueryError> {
        Ok(SerializeArray {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SerializeArray, QueryError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SerializeArray, QueryError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeTupleVariant, QueryError> {
        Ok(SerializeTupleVariant {
            variant,
            items: Vec::with_capacity(len),
        })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<SerializeObject, QueryError> {
        Ok(SerializeObject {
            fields: Vec::with_capacity(len.unwrap_or(0)),
            pending_key: None,
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SerializeObject, QueryError> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeStructVariant, QueryError> {
        Ok(SerializeStructVariant {
            variant,
            fields: Vec::with_capacity(len),
        })
    }
}

pub struct SerializeArray {
    items: Vec<QueryValue>,
}

impl SerializeArray {
    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), QueryError> {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }
}

impl ser::SerializeSeq for SerializeArray {
    type Ok = QueryValue;
    type Error = QueryError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), QueryError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::Array(self.items))
    }
}

impl ser::SerializeTuple for SerializeArray {
    type Ok = QueryValue;
    type Error = QueryError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), QueryError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::Array(self.items))
    }
}

impl ser::SerializeTupleStruct for SerializeArray {
    type Ok = QueryValue;
    type Error = QueryError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), QueryError>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::Array(self.items))
    }
}

pub struct SerializeTupleVariant {
    variant: &'static str,
    items: Vec<QueryValue>,
}

impl ser::SerializeTupleVariant for SerializeTupleVariant {
    type Ok = QueryValue;
    type Error = QueryError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), QueryError>
    where
        T: ?Sized + Serialize,
    {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::Object(vec![(
            self.variant.to_owned(),
            QueryValue::Array(self.items),
        )]))
    }
}

pub struct SerializeObject {
    fields: Vec<(String, QueryValue)>,
    pending_key: Option<String>,
}

impl ser::SerializeMap for SerializeObject {
    type Ok = QueryValue;
    type Error = QueryError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<(), QueryError>
    where
        T: ?Sized + Serialize,
    {
        let key = key.serialize(ValueSerializer)?;
        let kind = key.kind();
        self.pending_key = Some(key.into_key().ok_or(QueryError::InvalidKey(kind))?);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<(), QueryError>
    where
        T: ?Sized + Serialize,
    {
        let key = self.pending_key.take().ok_or_else(|| {
            QueryError::Custom("map value serialized before its key".to_owned())
        })?;
        self.fields.push((key, value.serialize(ValueSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::Object(self.fields))
    }
}

impl ser::SerializeStruct for SerializeObject {
    type Ok = QueryValue;
    type Error = QueryError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), QueryError>
    where
        T: ?Sized + Serialize,
    {
        self.fields
            .push((key.to_owned(), value.serialize(ValueSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::Object(self.fields))
    }
}

pub struct SerializeStructVariant {
    variant: &'static str,
    fields: Vec<(String, QueryValue)>,
}

impl ser::SerializeStructVariant for SerializeStructVariant {
    type Ok = QueryValue;
    type Error = QueryError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), QueryError>
    where
        T: ?Sized + Serialize,
    {
        self.fields
            .push((key.to_owned(), value.serialize(ValueSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<QueryValue, QueryError> {
        Ok(QueryValue::Object(vec![(
            self.variant.to_owned(),
            QueryValue::Object(self.fields),
        )]))
    }
}
