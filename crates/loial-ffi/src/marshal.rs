//! Argument binding and marshalling.
//!
//! [`bind`] matches a call's positional and keyword arguments against the
//! declared parameters. [`marshal`] turns the bound arguments into a
//! [`CallFrame`]: one tagged slot per parameter plus the memory that slots
//! point into. After the native call, [`CallFrame::read_back`] copies native
//! memory back into every [`AsPointer`] handle.

use std::collections::BTreeSet;
use std::ffi::{c_int, c_void};

use loial_core::{Arg, AsPointer, CallArgs, DeclaredSignature, NativeType, Param, TypeHint, Value};
use tracing::trace;

use crate::bridge::{TAG_ADDRESS, TAG_RECORD};
use crate::buffer::{NativeBuffer, BUFFER_ALIGN};
use crate::coerce;
use crate::error::{FfiError, Result};
use crate::layout::StructLayout;

/// How an argument crosses the native boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassingMode {
    /// Converted and copied into the slot.
    ByValue,
    /// Contiguous array of the hinted element type; the slot holds its address.
    Array,
    /// Slot holds the address of a converted copy; never read back.
    ByReference,
    /// Slot holds the address of a converted copy; read back after the call.
    ByPointer,
}

/// Select the passing mode for one bound argument.
pub fn passing_mode(arg: &Arg, by_name_reference: bool) -> PassingMode {
    match arg {
        Arg::Pointer(_) => PassingMode::ByPointer,
        Arg::Ref(_) => PassingMode::ByReference,
        Arg::Value(Value::List(_)) => PassingMode::Array,
        Arg::Value(_) if by_name_reference => PassingMode::ByReference,
        Arg::Value(_) => PassingMode::ByValue,
    }
}

/// A parameter and the argument bound to it.
#[derive(Debug, Clone)]
pub struct Binding<'a> {
    pub param: &'a Param,
    pub arg: Arg,
}

/// Arguments bound to every declared parameter, in declaration order.
#[derive(Debug, Clone)]
pub struct BoundArgs<'a> {
    bindings: Vec<Binding<'a>>,
}

impl<'a> BoundArgs<'a> {
    pub fn iter(&self) -> impl Iterator<Item = &Binding<'a>> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arg> {
        self.bindings
            .iter()
            .find(|b| b.param.name == name)
            .map(|b| &b.arg)
    }

    /// Value bound to `name`, read through any wrapper.
    pub fn value(&self, name: &str) -> Option<Value> {
        self.get(name).map(Arg::value)
    }

    /// Integral value bound to `name`.
    pub fn int(&self, name: &str) -> Result<i64> {
        let value = self.value(name).unwrap_or_default();
        value
            .as_i64()
            .ok_or_else(|| FfiError::coerce("int", &value).for_argument(name))
    }

    /// Numeric value bound to `name`, as a float.
    pub fn float(&self, name: &str) -> Result<f64> {
        let value = self.value(name).unwrap_or_default();
        value
            .as_f64()
            .ok_or_else(|| FfiError::coerce("float", &value).for_argument(name))
    }
}

/// Bind `call` against `signature`.
///
/// Positional arguments fill parameters in order; keywords fill the rest;
/// defaults cover whatever is still unbound.
pub fn bind<'a>(call: &CallArgs, signature: &'a DeclaredSignature) -> Result<BoundArgs<'a>> {
    let params = signature.params();
    if call.positional.len() > params.len() {
        return Err(FfiError::TooManyArguments {
            expected: params.len(),
            got: call.positional.len(),
        });
    }

    let mut slots: Vec<Option<Arg>> = call.positional.iter().cloned().map(Some).collect();
    slots.resize(params.len(), None);

    for (name, arg) in &call.keyword {
        let (index, _) = signature
            .find(name)
            .ok_or_else(|| FfiError::UnexpectedKeyword { name: name.clone() })?;
        if slots[index].is_some() {
            return Err(FfiError::DuplicateArgument { name: name.clone() });
        }
        slots[index] = Some(arg.clone());
    }

    let bindings = params
        .iter()
        .zip(slots)
        .map(|(param, slot)| {
            let arg = match (slot, &param.default) {
                (Some(arg), _) => arg,
                (None, Some(default)) => Arg::Value(default.clone()),
                (None, None) => {
                    return Err(FfiError::MissingArgument {
                        name: param.name.clone(),
                    })
                }
            };
            Ok(Binding { param, arg })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(BoundArgs { bindings })
}

/// Native representation chosen for a value.
#[derive(Debug, Clone, PartialEq)]
enum Repr {
    Native(NativeType),
    Struct(StructLayout),
    Array { element: Box<Repr>, len: usize },
}

impl Repr {
    fn resolve(hint: Option<&TypeHint>, value: &Value) -> Result<Repr> {
        if let Value::List(items) = value {
            let element = match hint {
                Some(hint) => Repr::from_hint(hint),
                None => {
                    return Err(FfiError::Unsupported {
                        detail: "list argument without an element type hint".to_string(),
                    })
                }
            };
            return Ok(Repr::Array {
                element: Box::new(element),
                len: items.len(),
            });
        }
        match hint {
            Some(hint) => Ok(Repr::from_hint(hint)),
            None => Ok(Repr::default_for(value)),
        }
    }

    fn from_hint(hint: &TypeHint) -> Repr {
        match hint {
            TypeHint::Native(ty) => Repr::Native(*ty),
            TypeHint::Struct(def) => Repr::Struct(StructLayout::of(def)),
        }
    }

    /// Representation of an unhinted, non-list value.
    fn default_for(value: &Value) -> Repr {
        match value {
            Value::Int(v) if i32::try_from(*v).is_err() => Repr::Native(NativeType::LongLong),
            Value::Int(_) | Value::Bool(_) => Repr::Native(NativeType::Int),
            Value::UInt(_) => Repr::Native(NativeType::ULongLong),
            Value::Float(_) => Repr::Native(NativeType::Double),
            Value::Str(_) => Repr::Native(NativeType::WCharPtr),
            Value::Bytes(_) => Repr::Native(NativeType::CharPtr),
            Value::None | Value::List(_) => Repr::Native(NativeType::VoidPtr),
            Value::Struct(s) => Repr::Struct(StructLayout::of(s.def())),
        }
    }

    fn size(&self) -> usize {
        match self {
            Repr::Native(ty) => ty.size(),
            Repr::Struct(layout) => layout.size,
            Repr::Array { element, len } => element.size() * len,
        }
    }

    fn encode(&self, value: &Value, out: &mut [u8], storage: &mut Vec<NativeBuffer>) -> Result<()> {
        match (self, value) {
            (Repr::Native(ty), value) => coerce::encode(*ty, value, out, storage),
            (Repr::Struct(layout), Value::Struct(s)) => layout.encode(s, out, storage),
            (Repr::Struct(layout), other) => Err(FfiError::coerce(layout.def.name(), other)),
            (Repr::Array { element, .. }, Value::List(items)) => {
                let stride = element.size();
                for (i, item) in items.iter().enumerate() {
                    element.encode(item, &mut out[i * stride..(i + 1) * stride], storage)?;
                }
                Ok(())
            }
            (Repr::Array { .. }, other) => Err(FfiError::coerce("array", other)),
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        match self {
            Repr::Native(ty) => coerce::decode(*ty, bytes),
            Repr::Struct(layout) => layout.decode(bytes).map(Value::Struct),
            Repr::Array { element, len } => {
                let stride = element.size();
                (0..*len)
                    .map(|i| element.decode(&bytes[i * stride..(i + 1) * stride]))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::List)
            }
        }
    }
}

#[derive(Debug)]
struct Readback {
    target: AsPointer,
    repr: Repr,
    storage: usize,
}

/// Marshalled arguments of one native call.
#[derive(Debug, Default)]
pub struct CallFrame {
    slots: Vec<NativeBuffer>,
    tags: Vec<c_int>,
    storage: Vec<NativeBuffer>,
    readback: Vec<Readback>,
}

impl CallFrame {
    /// Number of argument slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn tags(&self) -> &[c_int] {
        &self.tags
    }

    /// Bytes of slot `index`.
    pub fn slot(&self, index: usize) -> Option<&[u8]> {
        self.slots.get(index).map(NativeBuffer::as_bytes)
    }

    /// Slot addresses and tags, as handed to a bridge.
    pub(crate) fn raw(&mut self) -> (Vec<*mut c_void>, &[c_int]) {
        let pointers = self.slots.iter_mut().map(NativeBuffer::as_mut_ptr).collect();
        (pointers, &self.tags)
    }

    fn push(&mut self, binding: &Binding<'_>, by_name_reference: bool) -> Result<()> {
        let value = binding.arg.value();
        let repr = Repr::resolve(binding.param.hint.as_ref(), &value)?;
        let mode = passing_mode(&binding.arg, by_name_reference);
        trace!(param = %binding.param.name, ?mode, "marshalling argument");

        if mode == PassingMode::ByValue && !matches!(repr, Repr::Array { .. }) {
            return self.push_value(&repr, &value);
        }

        let index = self.store(&repr, &value)?;
        let address = self.storage[index].as_mut_ptr() as usize;
        self.push_address(address);
        if let Arg::Pointer(target) = &binding.arg {
            self.readback.push(Readback {
                target: target.clone(),
                repr,
                storage: index,
            });
        }
        Ok(())
    }

    fn push_value(&mut self, repr: &Repr, value: &Value) -> Result<()> {
        let (slot, tag) = match repr {
            Repr::Native(ty) if ty.is_pointer() => {
                let mut slot = NativeBuffer::zeroed(BUFFER_ALIGN);
                coerce::encode(*ty, value, slot.as_bytes_mut(), &mut self.storage)?;
                (slot, TAG_ADDRESS)
            }
            Repr::Native(ty) => {
                let ty = match ty {
                    NativeType::LongDouble => NativeType::Double,
                    ty => *ty,
                };
                let mut slot = NativeBuffer::zeroed(BUFFER_ALIGN);
                coerce::encode(ty, value, slot.as_bytes_mut(), &mut self.storage)?;
                (slot, ty.tag())
            }
            Repr::Struct(_) | Repr::Array { .. } => {
                let mut slot = NativeBuffer::zeroed(repr.size().max(BUFFER_ALIGN));
                repr.encode(value, slot.as_bytes_mut(), &mut self.storage)?;
                (slot, TAG_RECORD)
            }
        };
        self.slots.push(slot);
        self.tags.push(tag);
        Ok(())
    }

    fn push_address(&mut self, address: usize) {
        let mut slot = NativeBuffer::zeroed(BUFFER_ALIGN);
        coerce::write_uint(&mut slot.as_bytes_mut()[..std::mem::size_of::<usize>()], address as u64);
        self.slots.push(slot);
        self.tags.push(TAG_ADDRESS);
    }

    /// Encode `value` into a fresh storage buffer and return its index.
    fn store(&mut self, repr: &Repr, value: &Value) -> Result<usize> {
        let mut buffer = NativeBuffer::zeroed(repr.size());
        repr.encode(value, buffer.as_bytes_mut(), &mut self.storage)?;
        self.storage.push(buffer);
        Ok(self.storage.len() - 1)
    }

    /// Overwrite every by-pointer handle with the native memory it pointed at.
    pub fn read_back(&self) -> Result<()> {
        for entry in &self.readback {
            let value = entry.repr.decode(self.storage[entry.storage].as_bytes())?;
            entry.target.set(value);
        }
        Ok(())
    }
}

/// Build the call frame for `bound`; parameters named in `references` are
/// passed by reference.
pub fn marshal(bound: &BoundArgs<'_>, references: &BTreeSet<String>) -> Result<CallFrame> {
    let mut frame = CallFrame::default();
    for binding in bound.iter() {
        frame
            .push(binding, references.contains(&binding.param.name))
            .map_err(|e| e.for_argument(&binding.param.name))?;
    }
    Ok(frame)
}
