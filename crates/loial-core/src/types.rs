//! The fixed native type table.
//!
//! Each [`NativeType`] carries its C spelling, size, alignment and the
//! [`NativeClass`] the marshaller uses to pick a coercion rule. Sizes come
//! from the target the crate is compiled for, so they always agree with the
//! C compiler producing artifacts on the same machine.

use std::ffi::{c_char, c_double, c_float, c_int, c_long, c_longlong, c_short, c_void};
use std::mem::{align_of, size_of};
use std::sync::Arc;

use crate::structs::StructDef;
use crate::value::Value;

/// How host values are converted into a native type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeClass {
    /// `_Bool`: any value, by truthiness.
    Bool,
    /// A single narrow character.
    Char,
    /// A single wide character.
    WideChar,
    /// Signed integers, truncated to width.
    Signed,
    /// Unsigned integers, truncated to width.
    Unsigned,
    /// Floating point.
    Real,
    /// Untyped address (`void *`).
    Address,
    /// Nul-terminated narrow string (`char *`).
    Text,
    /// Nul-terminated wide string (`wchar_t *`).
    WideText,
}

/// Static facts about one native type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeInfo {
    pub c_name: &'static str,
    pub size: usize,
    pub align: usize,
    pub class: NativeClass,
}

/// A native C type a parameter, field or return value can be hinted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NativeType {
    Bool,
    Char,
    WChar,
    Byte,
    UByte,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    LongLong,
    ULongLong,
    SizeT,
    SSizeT,
    Float,
    Double,
    LongDouble,
    VoidPtr,
    CharPtr,
    WCharPtr,
}

// (size, align) of `long double` for the common C ABIs.
const LONG_DOUBLE: (usize, usize) =
    if cfg!(windows) || cfg!(target_vendor = "apple") || cfg!(target_arch = "arm") {
        (8, 8)
    } else if cfg!(target_arch = "x86") {
        (12, 4)
    } else if cfg!(any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        target_arch = "riscv64",
        target_arch = "powerpc64"
    )) {
        (16, 16)
    } else {
        (8, 8)
    };

impl NativeType {
    /// Every entry of the table, in tag order.
    pub const ALL: [NativeType; 21] = [
        NativeType::Bool,
        NativeType::Char,
        NativeType::WChar,
        NativeType::Byte,
        NativeType::UByte,
        NativeType::Short,
        NativeType::UShort,
        NativeType::Int,
        NativeType::UInt,
        NativeType::Long,
        NativeType::ULong,
        NativeType::LongLong,
        NativeType::ULongLong,
        NativeType::SizeT,
        NativeType::SSizeT,
        NativeType::Float,
        NativeType::Double,
        NativeType::LongDouble,
        NativeType::VoidPtr,
        NativeType::CharPtr,
        NativeType::WCharPtr,
    ];

    /// Look up this type's entry in the table.
    pub fn info(self) -> NativeInfo {
        use NativeClass::*;

        let (c_name, size, align, class) = match self {
            NativeType::Bool => ("_Bool", size_of::<bool>(), align_of::<bool>(), Bool),
            NativeType::Char => ("char", size_of::<c_char>(), align_of::<c_char>(), Char),
            NativeType::WChar => (
                "wchar_t",
                size_of::<libc::wchar_t>(),
                align_of::<libc::wchar_t>(),
                WideChar,
            ),
            NativeType::Byte => ("signed char", 1, 1, Signed),
            NativeType::UByte => ("unsigned char", 1, 1, Unsigned),
            NativeType::Short => ("short", size_of::<c_short>(), align_of::<c_short>(), Signed),
            NativeType::UShort => (
                "unsigned short",
                size_of::<c_short>(),
                align_of::<c_short>(),
                Unsigned,
            ),
            NativeType::Int => ("int", size_of::<c_int>(), align_of::<c_int>(), Signed),
            NativeType::UInt => ("unsigned int", size_of::<c_int>(), align_of::<c_int>(), Unsigned),
            NativeType::Long => ("long", size_of::<c_long>(), align_of::<c_long>(), Signed),
            NativeType::ULong => (
                "unsigned long",
                size_of::<c_long>(),
                align_of::<c_long>(),
                Unsigned,
            ),
            NativeType::LongLong => (
                "long long",
                size_of::<c_longlong>(),
                align_of::<c_longlong>(),
                Signed,
            ),
            NativeType::ULongLong => (
                "unsigned long long",
                size_of::<c_longlong>(),
                align_of::<c_longlong>(),
                Unsigned,
            ),
            NativeType::SizeT => ("size_t", size_of::<usize>(), align_of::<usize>(), Unsigned),
            NativeType::SSizeT => ("ssize_t", size_of::<isize>(), align_of::<isize>(), Signed),
            NativeType::Float => ("float", size_of::<c_float>(), align_of::<c_float>(), Real),
            NativeType::Double => ("double", size_of::<c_double>(), align_of::<c_double>(), Real),
            NativeType::LongDouble => ("long double", LONG_DOUBLE.0, LONG_DOUBLE.1, Real),
            NativeType::VoidPtr => (
                "void *",
                size_of::<*mut c_void>(),
                align_of::<*mut c_void>(),
                Address,
            ),
            NativeType::CharPtr => (
                "char *",
                size_of::<*mut c_char>(),
                align_of::<*mut c_char>(),
                Text,
            ),
            NativeType::WCharPtr => (
                "wchar_t *",
                size_of::<*mut libc::wchar_t>(),
                align_of::<*mut libc::wchar_t>(),
                WideText,
            ),
        };
        NativeInfo {
            c_name,
            size,
            align,
            class,
        }
    }

    pub fn c_name(self) -> &'static str {
        self.info().c_name
    }

    pub fn size(self) -> usize {
        self.info().size
    }

    pub fn align(self) -> usize {
        self.info().align
    }

    pub fn class(self) -> NativeClass {
        self.info().class
    }

    /// Runtime tag identifying a by-value slot holding this type.
    pub fn tag(self) -> i32 {
        self as i32
    }

    /// Inverse of [`NativeType::tag`].
    pub fn from_tag(tag: i32) -> Option<NativeType> {
        usize::try_from(tag)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
    }

    /// Whether values of this type are addresses.
    pub fn is_pointer(self) -> bool {
        matches!(
            self.class(),
            NativeClass::Address | NativeClass::Text | NativeClass::WideText
        )
    }

    /// The value a freshly created struct field of this type holds.
    pub fn zero(self) -> Value {
        match self.class() {
            NativeClass::Bool => Value::Bool(false),
            NativeClass::Char => Value::Bytes(vec![0]),
            NativeClass::WideChar => Value::Str("\0".to_string()),
            NativeClass::Signed | NativeClass::Unsigned => Value::Int(0),
            NativeClass::Real => Value::Float(0.0),
            NativeClass::Address | NativeClass::Text | NativeClass::WideText => Value::None,
        }
    }
}

impl std::fmt::Display for NativeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.c_name())
    }
}

/// A declared parameter or return type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeHint {
    Native(NativeType),
    Struct(Arc<StructDef>),
}

impl TypeHint {
    /// The C spelling of the hinted type.
    pub fn c_name(&self) -> &str {
        match self {
            TypeHint::Native(ty) => ty.c_name(),
            TypeHint::Struct(def) => def.name(),
        }
    }
}

impl From<NativeType> for TypeHint {
    fn from(ty: NativeType) -> Self {
        TypeHint::Native(ty)
    }
}

impl From<StructDef> for TypeHint {
    fn from(def: StructDef) -> Self {
        TypeHint::Struct(Arc::new(def))
    }
}

impl From<Arc<StructDef>> for TypeHint {
    fn from(def: Arc<StructDef>) -> Self {
        TypeHint::Struct(def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_follow_table_order() {
        for (index, ty) in NativeType::ALL.iter().enumerate() {
            assert_eq!(ty.tag(), index as i32);
            assert_eq!(NativeType::from_tag(ty.tag()), Some(*ty));
        }
        assert_eq!(NativeType::from_tag(-1), None);
        assert_eq!(NativeType::from_tag(64), None);
    }

    #[test]
    fn sizes_match_rust_ffi_types() {
        assert_eq!(NativeType::Int.size(), 4);
        assert_eq!(NativeType::Short.size(), 2);
        assert_eq!(NativeType::LongLong.size(), 8);
        assert_eq!(NativeType::Double.size(), 8);
        assert_eq!(NativeType::SizeT.size(), size_of::<usize>());
        assert_eq!(NativeType::VoidPtr.size(), size_of::<usize>());
        assert!(NativeType::LongDouble.size() >= NativeType::Double.size());
    }

    #[test]
    fn byte_is_explicitly_signed() {
        assert_eq!(NativeType::Byte.c_name(), "signed char");
        assert_eq!(NativeType::Char.c_name(), "char");
        assert_eq!(NativeType::Byte.class(), NativeClass::Signed);
    }

    #[test]
    fn pointer_classes() {
        assert!(NativeType::VoidPtr.is_pointer());
        assert!(NativeType::CharPtr.is_pointer());
        assert!(NativeType::WCharPtr.is_pointer());
        assert!(!NativeType::SizeT.is_pointer());
        assert_eq!(NativeType::CharPtr.zero(), Value::None);
    }

    #[test]
    fn hint_names() {
        let def = StructDef::new("Point").field("x", NativeType::Int);
        assert_eq!(TypeHint::from(def).c_name(), "Point");
        assert_eq!(TypeHint::from(NativeType::UInt).c_name(), "unsigned int");
    }
}
