//! Struct definitions and values.
//!
//! A [`StructDef`] is an ordered field list; declaration order is layout
//! order. [`StructDef::define`] renders the C `typedef` for the struct and
//! every struct nested in it.

use std::sync::Arc;

use crate::error::{CoreError, Result};
use crate::types::NativeType;
use crate::value::Value;

/// Type of a struct field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Native(NativeType),
    Struct(Arc<StructDef>),
}

impl FieldType {
    pub fn c_name(&self) -> &str {
        match self {
            FieldType::Native(ty) => ty.c_name(),
            FieldType::Struct(def) => def.name(),
        }
    }

    /// Value held by a freshly created field of this type.
    pub fn zero(&self) -> Value {
        match self {
            FieldType::Native(ty) => ty.zero(),
            FieldType::Struct(def) => Value::Struct(StructValue::new(def.clone())),
        }
    }
}

impl From<NativeType> for FieldType {
    fn from(ty: NativeType) -> Self {
        FieldType::Native(ty)
    }
}

impl From<StructDef> for FieldType {
    fn from(def: StructDef) -> Self {
        FieldType::Struct(Arc::new(def))
    }
}

impl From<Arc<StructDef>> for FieldType {
    fn from(def: Arc<StructDef>) -> Self {
        FieldType::Struct(def)
    }
}

/// A named field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: FieldType,
}

/// A native struct: a name plus ordered fields.
#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    name: String,
    fields: Vec<Field>,
}

impl StructDef {
    pub fn new(name: impl Into<String>) -> Self {
        StructDef {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field.
    pub fn field(mut self, name: impl Into<String>, ty: impl Into<FieldType>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            ty: ty.into(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// The `typedef struct { ... } Name;` declaration of this struct alone.
    pub fn declaration(&self) -> String {
        let mut out = String::from("typedef struct {\n");
        for field in &self.fields {
            out.push_str(&format!("\t{} {};\n", field.ty.c_name(), field.name));
        }
        out.push_str(&format!("}} {};", self.name));
        out
    }

    /// Declarations of every nested struct (depth-first, each once, before
    /// its first use) followed by this struct's own declaration.
    pub fn define(&self) -> String {
        let mut seen = Vec::new();
        let mut out = String::new();
        self.collect_definitions(&mut seen, &mut out);
        out
    }

    fn collect_definitions(&self, seen: &mut Vec<String>, out: &mut String) {
        if seen.iter().any(|name| *name == self.name) {
            return;
        }
        for field in &self.fields {
            if let FieldType::Struct(def) = &field.ty {
                def.collect_definitions(seen, out);
            }
        }
        seen.push(self.name.clone());
        out.push_str(&self.declaration());
        out.push('\n');
    }
}

/// An instance of a [`StructDef`]: one value per field.
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    def: Arc<StructDef>,
    values: Vec<Value>,
}

impl StructValue {
    /// A zero-initialised instance.
    pub fn new(def: impl Into<Arc<StructDef>>) -> Self {
        let def = def.into();
        let values = def.fields.iter().map(|f| f.ty.zero()).collect();
        StructValue { def, values }
    }

    /// An instance from field values in declaration order.
    pub fn from_values(def: impl Into<Arc<StructDef>>, values: Vec<Value>) -> Result<Self> {
        let def = def.into();
        if values.len() != def.fields.len() {
            return Err(CoreError::FieldCount {
                structure: def.name.clone(),
                expected: def.fields.len(),
                got: values.len(),
            });
        }
        Ok(StructValue { def, values })
    }

    pub fn def(&self) -> &Arc<StructDef> {
        &self.def
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.def.field_index(name).map(|i| &self.values[i])
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let index = self
            .def
            .field_index(name)
            .ok_or_else(|| CoreError::UnknownField {
                structure: self.def.name.clone(),
                field: name.to_string(),
            })?;
        self.values[index] = value.into();
        Ok(())
    }

    /// Builder form of [`StructValue::set`].
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    /// Fields paired with their values.
    pub fn iter(&self) -> impl Iterator<Item = (&Field, &Value)> {
        self.def.fields.iter().zip(self.values.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inner() -> Arc<StructDef> {
        Arc::new(
            StructDef::new("Inner")
                .field("x", NativeType::Int)
                .field("y", NativeType::Double),
        )
    }

    #[test]
    fn declaration_format() {
        let def = StructDef::new("Record")
            .field("first", NativeType::Int)
            .field("name", NativeType::CharPtr);
        assert_eq!(
            def.declaration(),
            "typedef struct {\n\tint first;\n\tchar * name;\n} Record;"
        );
    }

    #[test]
    fn define_emits_nested_first_and_once() {
        let inner = inner();
        let outer = StructDef::new("Outer")
            .field("a", inner.clone())
            .field("b", NativeType::Float)
            .field("c", inner.clone());

        let text = outer.define();
        assert_eq!(text.matches("} Inner;").count(), 1);
        let inner_at = text.find("} Inner;").unwrap();
        let outer_at = text.find("} Outer;").unwrap();
        assert!(inner_at < outer_at);
        assert!(text.contains("\tInner a;\n"));
    }

    #[test]
    fn deep_nesting_is_depth_first() {
        let leaf = Arc::new(StructDef::new("Leaf").field("v", NativeType::Bool));
        let mid = Arc::new(StructDef::new("Mid").field("leaf", leaf.clone()));
        let top = StructDef::new("Top")
            .field("mid", mid)
            .field("leaf", leaf);
        let text = top.define();
        let order: Vec<_> = ["} Leaf;", "} Mid;", "} Top;"]
            .iter()
            .map(|needle| text.find(needle).unwrap())
            .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn values_start_zeroed() {
        let outer = StructDef::new("Outer")
            .field("inner", inner())
            .field("flag", NativeType::Bool);
        let value = StructValue::new(outer);
        assert_eq!(value.get("flag"), Some(&Value::Bool(false)));
        let nested = value.get("inner").and_then(Value::as_struct).unwrap();
        assert_eq!(nested.get("x"), Some(&Value::Int(0)));
        assert_eq!(nested.get("y"), Some(&Value::Float(0.0)));
    }

    #[test]
    fn set_rejects_unknown_fields() {
        let mut value = StructValue::new(inner());
        value.set("x", 4).unwrap();
        assert_eq!(value.get("x"), Some(&Value::Int(4)));
        let err = value.set("z", 1).unwrap_err();
        assert!(matches!(err, CoreError::UnknownField { .. }));
        assert!(StructValue::from_values(inner(), vec![Value::Int(1)]).is_err());
    }
}
