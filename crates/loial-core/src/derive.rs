//! Struct definitions synthesised from Rust types.
//!
//! A recording [`serde::Serializer`] walks an instance and notes, for every
//! field in declaration order, which native type the Rust field maps onto
//! and the value it holds. Nested structs become nested definitions.
//!
//! | Rust | native |
//! |---|---|
//! | `bool` | `_Bool` |
//! | `i8` / `u8` | `signed char` / `unsigned char` |
//! | `i16` / `u16` | `short` / `unsigned short` |
//! | `i32` / `u32` | `int` / `unsigned int` |
//! | `i64` / `u64` | `long long` / `unsigned long long` |
//! | `f32` / `f64` | `float` / `double` |
//! | `char` | `wchar_t` |
//! | `String` / `&str` | `char *` |

use std::sync::Arc;

use serde::ser::{self, Impossible, Serialize};

use crate::error::{CoreError, Result};
use crate::structs::{Field, FieldType, StructDef, StructValue};
use crate::types::NativeType;
use crate::value::Value;

impl StructDef {
    /// Derive a definition from the field layout of `T`.
    pub fn derive<T: Serialize + Default>() -> Result<StructDef> {
        let captured = StructValue::capture(&T::default())?;
        Ok(captured.def().as_ref().clone())
    }
}

impl StructValue {
    /// Record both the definition and the field values of `value`.
    pub fn capture<T: Serialize>(value: &T) -> Result<StructValue> {
        match value.serialize(Capture)? {
            Captured::Record(record) => Ok(record),
            Captured::Scalar(ty, _) => Err(unsupported(&format!(
                "`{ty}` is a scalar, not a struct"
            ))),
        }
    }
}

enum Captured {
    Scalar(NativeType, Value),
    Record(StructValue),
}

fn unsupported(what: &str) -> CoreError {
    CoreError::Derive {
        detail: what.to_string(),
    }
}

struct Capture;

impl ser::Serializer for Capture {
    type Ok = Captured;
    type Error = CoreError;

    type SerializeSeq = Impossible<Captured, CoreError>;
    type SerializeTuple = Impossible<Captured, CoreError>;
    type SerializeTupleStruct = Impossible<Captured, CoreError>;
    type SerializeTupleVariant = Impossible<Captured, CoreError>;
    type SerializeMap = Impossible<Captured, CoreError>;
    type SerializeStruct = RecordCapture;
    type SerializeStructVariant = Impossible<Captured, CoreError>;

    fn serialize_bool(self, v: bool) -> Result<Captured> {
        Ok(Captured::Scalar(NativeType::Bool, Value::Bool(v)))
    }

    fn serialize_i8(self, v: i8) -> Result<Captured> {
        Ok(Captured::Scalar(NativeType::Byte, Value::from(v)))
    }

    fn serialize_i16(self, v: i16) -> Result<Captured> {
        Ok(Captured::Scalar(NativeType::Short, Value::from(v)))
    }

    fn serialize_i32(self, v: i32) -> Result<Captured> {
        Ok(Captured::Scalar(NativeType::Int, Value::from(v)))
    }

    fn serialize_i64(self, v: i64) -> Result<Captured> {
        Ok(Captured::Scalar(NativeType::LongLong, Value::from(v)))
    }

    fn serialize_u8(self, v: u8) -> Result<Captured> {
        Ok(Captured::Scalar(NativeType::UByte, Value::from(v)))
    }

    fn serialize_u16(self, v: u16) -> Result<Captured> {
        Ok(Captured::Scalar(NativeType::UShort, Value::from(v)))
    }

    fn serialize_u32(self, v: u32) -> Result<Captured> {
        Ok(Captured::Scalar(NativeType::UInt, Value::from(v)))
    }

    fn serialize_u64(self, v: u64) -> Result<Captured> {
        Ok(Captured::Scalar(NativeType::ULongLong, Value::from(v)))
    }

    fn serialize_f32(self, v: f32) -> Result<Captured> {
        Ok(Captured::Scalar(NativeType::Float, Value::from(v)))
    }

    fn serialize_f64(self, v: f64) -> Result<Captured> {
        Ok(Captured::Scalar(NativeType::Double, Value::from(v)))
    }

    fn serialize_char(self, v: char) -> Result<Captured> {
        Ok(Captured::Scalar(NativeType::WChar, Value::Str(v.to_string())))
    }

    fn serialize_str(self, v: &str) -> Result<Captured> {
        Ok(Captured::Scalar(
            NativeType::CharPtr,
            Value::Bytes(v.as_bytes().to_vec()),
        ))
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<Captured> {
        Err(unsupported("byte buffers have no fixed native size"))
    }

    fn serialize_none(self) -> Result<Captured> {
        Err(unsupported("optional fields"))
    }

    fn serialize_some<T: ?Sized + Serialize>(self, _value: &T) -> Result<Captured> {
        Err(unsupported("optional fields"))
    }

    fn serialize_unit(self) -> Result<Captured> {
        Err(unsupported("unit fields"))
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<Captured> {
        Err(unsupported(&format!("unit struct `{name}`")))
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
    ) -> Result<Captured> {
        Err(unsupported(&format!("enum `{name}`")))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Captured> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<Captured> {
        Err(unsupported(&format!("enum `{name}`")))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(unsupported("sequences"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(unsupported("tuples"))
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct> {
        Err(unsupported(&format!("tuple struct `{name}` has no field names")))
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant> {
        Err(unsupported(&format!("enum `{name}`")))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(unsupported("maps"))
    }

    fn serialize_struct(self, name: &'static str, len: usize) -> Result<RecordCapture> {
        Ok(RecordCapture {
            name,
            fields: Vec::with_capacity(len),
            values: Vec::with_capacity(len),
        })
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant> {
        Err(unsupported(&format!("enum `{name}`")))
    }
}

struct RecordCapture {
    name: &'static str,
    fields: Vec<Field>,
    values: Vec<Value>,
}

impl ser::SerializeStruct for RecordCapture {
    type Ok = Captured;
    type Error = CoreError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<()> {
        let (ty, value) = match value.serialize(Capture)? {
            Captured::Scalar(ty, value) => (FieldType::Native(ty), value),
            Captured::Record(record) => {
                (FieldType::Struct(record.def().clone()), Value::Struct(record))
            }
        };
        self.fields.push(Field {
            name: key.to_string(),
            ty,
        });
        self.values.push(value);
        Ok(())
    }

    fn end(self) -> Result<Captured> {
        let def = self
            .fields
            .into_iter()
            .fold(StructDef::new(self.name), |def, field| {
                def.field(field.name, field.ty)
            });
        StructValue::from_values(Arc::new(def), self.values).map(Captured::Record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize, Default)]
    struct Inner {
        x: i32,
        y: f64,
    }

    #[derive(Serialize, Default)]
    struct Outer {
        a: i32,
        b: f32,
        multi: Inner,
        tag: char,
        label: String,
    }

    #[derive(Serialize, Default)]
    struct Widths {
        a: i8,
        b: u8,
        c: i16,
        d: u16,
        e: u32,
        f: i64,
        g: u64,
        h: bool,
    }

    #[test]
    fn derive_keeps_field_order_and_types() {
        let def = StructDef::derive::<Outer>().unwrap();
        assert_eq!(def.name(), "Outer");
        let names: Vec<_> = def.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "multi", "tag", "label"]);
        assert_eq!(def.fields()[0].ty, FieldType::Native(NativeType::Int));
        assert_eq!(def.fields()[1].ty, FieldType::Native(NativeType::Float));
        assert_eq!(def.fields()[3].ty, FieldType::Native(NativeType::WChar));
        assert_eq!(def.fields()[4].ty, FieldType::Native(NativeType::CharPtr));
        match &def.fields()[2].ty {
            FieldType::Struct(inner) => {
                assert_eq!(inner.name(), "Inner");
                assert_eq!(inner.fields()[1].ty, FieldType::Native(NativeType::Double));
            }
            other => panic!("expected nested struct, got {other:?}"),
        }
    }

    #[test]
    fn derive_integer_widths() {
        let def = StructDef::derive::<Widths>().unwrap();
        let types: Vec<_> = def.fields().iter().map(|f| f.ty.c_name()).collect();
        assert_eq!(
            types,
            [
                "signed char",
                "unsigned char",
                "short",
                "unsigned short",
                "unsigned int",
                "long long",
                "unsigned long long",
                "_Bool"
            ]
        );
    }

    #[test]
    fn derived_definition_renders_nested_first() {
        let text = StructDef::derive::<Outer>().unwrap().define();
        assert!(text.find("} Inner;").unwrap() < text.find("} Outer;").unwrap());
        assert!(text.contains("\tInner multi;\n"));
    }

    #[test]
    fn capture_records_values() {
        let value = StructValue::capture(&Outer {
            a: 1,
            b: 2.5,
            multi: Inner { x: 3, y: 0.25 },
            tag: 'z',
            label: "hi".to_string(),
        })
        .unwrap();
        assert_eq!(value.get("a"), Some(&Value::Int(1)));
        assert_eq!(value.get("b"), Some(&Value::Float(2.5)));
        assert_eq!(value.get("label"), Some(&Value::bytes(*b"hi")));
        let inner = value.get("multi").and_then(Value::as_struct).unwrap();
        assert_eq!(inner.get("y"), Some(&Value::Float(0.25)));
    }

    #[test]
    fn unsupported_shapes_are_rejected() {
        #[derive(Serialize, Default)]
        struct WithVec {
            items: Vec<i32>,
        }
        #[derive(Serialize, Default)]
        struct WithOption {
            maybe: Option<i32>,
        }

        assert!(matches!(
            StructDef::derive::<WithVec>(),
            Err(CoreError::Derive { .. })
        ));
        assert!(StructDef::derive::<WithOption>().is_err());
        assert!(StructValue::capture(&5i32).is_err());
    }
}
