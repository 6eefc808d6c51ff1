//! C ABI layout of struct definitions.
//!
//! Natural alignment: each field starts at the next multiple of its own
//! alignment, the struct is as aligned as its most aligned field, and its
//! size is padded to that alignment.

use std::sync::Arc;

use loial_core::{FieldType, NativeType, StructDef, StructValue, Value};

use crate::buffer::NativeBuffer;
use crate::coerce;
use crate::error::{FfiError, Result};

/// Placement of one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldLayout {
    pub name: String,
    pub offset: usize,
    pub kind: FieldKind,
}

/// What a field holds.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Native(NativeType),
    Struct(StructLayout),
}

impl FieldKind {
    pub fn size(&self) -> usize {
        match self {
            FieldKind::Native(ty) => ty.size(),
            FieldKind::Struct(layout) => layout.size,
        }
    }

    pub fn align(&self) -> usize {
        match self {
            FieldKind::Native(ty) => ty.align(),
            FieldKind::Struct(layout) => layout.align,
        }
    }
}

/// Offsets, size and alignment of a [`StructDef`].
#[derive(Debug, Clone, PartialEq)]
pub struct StructLayout {
    pub def: Arc<StructDef>,
    pub size: usize,
    pub align: usize,
    pub fields: Vec<FieldLayout>,
}

impl StructLayout {
    pub fn of(def: &Arc<StructDef>) -> Self {
        let mut size = 0;
        let mut max_align = 1;
        let mut fields = Vec::with_capacity(def.fields().len());
        for field in def.fields() {
            let kind = match &field.ty {
                FieldType::Native(ty) => FieldKind::Native(*ty),
                FieldType::Struct(nested) => FieldKind::Struct(StructLayout::of(nested)),
            };
            size = align_up(size, kind.align());
            fields.push(FieldLayout {
                name: field.name.clone(),
                offset: size,
                kind: kind.clone(),
            });
            size += kind.size();
            max_align = max_align.max(kind.align());
        }
        StructLayout {
            def: def.clone(),
            size: align_up(size, max_align),
            align: max_align,
            fields,
        }
    }

    /// Write `value` into `out`, which must hold at least `self.size` bytes.
    pub fn encode(
        &self,
        value: &StructValue,
        out: &mut [u8],
        storage: &mut Vec<NativeBuffer>,
    ) -> Result<()> {
        if **value.def() != *self.def {
            return Err(FfiError::Coerce {
                expected: self.def.name().to_string(),
                found: value.def().name().to_string(),
            });
        }
        for (field, value) in self.fields.iter().zip(value.values()) {
            let slot = &mut out[field.offset..field.offset + field.kind.size()];
            match (&field.kind, value) {
                (FieldKind::Native(ty), value) => coerce::encode(*ty, value, slot, storage),
                (FieldKind::Struct(nested), Value::Struct(inner)) => {
                    nested.encode(inner, slot, storage)
                }
                (FieldKind::Struct(nested), other) => {
                    Err(FfiError::coerce(nested.def.name(), other))
                }
            }
            .map_err(|e| e.for_argument(&field.name))?;
        }
        Ok(())
    }

    /// Read a value of this struct out of `bytes`.
    pub fn decode(&self, bytes: &[u8]) -> Result<StructValue> {
        let mut values = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let slot = &bytes[field.offset..field.offset + field.kind.size()];
            values.push(match &field.kind {
                FieldKind::Native(ty) => coerce::decode(*ty, slot)?,
                FieldKind::Struct(nested) => Value::Struct(nested.decode(slot)?),
            });
        }
        Ok(StructValue::from_values(self.def.clone(), values)?)
    }
}

/// Round `offset` up to the next multiple of `align`.
pub(crate) fn align_up(offset: usize, align: usize) -> usize {
    if align == 0 {
        return offset;
    }
    offset.div_ceil(align) * align
}
