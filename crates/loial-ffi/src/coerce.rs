//! The coercion table: host values to and from native bytes.
//!
//! Conversion is chosen by the [`NativeClass`] of the target type, so every
//! entry of the native type table shares one rule per class. Pointees created
//! on the way (strings) are pushed onto the caller's storage list, which must
//! outlive the native call.

use std::ffi::{c_char, CStr};
use std::mem::size_of;

use loial_core::{NativeClass, NativeType, Value};

use crate::buffer::NativeBuffer;
use crate::error::{FfiError, Result};

/// Write `value` as native `ty` into the first `ty.size()` bytes of `out`.
pub fn encode(
    ty: NativeType,
    value: &Value,
    out: &mut [u8],
    storage: &mut Vec<NativeBuffer>,
) -> Result<()> {
    let info = ty.info();
    let out = &mut out[..info.size];
    match info.class {
        NativeClass::Bool => out[0] = u8::from(value.is_truthy()),
        NativeClass::Char => out[0] = narrow_char(value)?,
        NativeClass::WideChar => {
            let code = wide_char(value)?;
            if info.size == 2 && code > 0xFFFF {
                return Err(FfiError::Unsupported {
                    detail: format!("U+{code:X} does not fit in a 16-bit wchar_t"),
                });
            }
            write_uint(out, u64::from(code));
        }
        NativeClass::Signed | NativeClass::Unsigned => {
            let bits = integer_bits(value).ok_or_else(|| FfiError::coerce(ty.c_name(), value))?;
            write_uint(out, bits);
        }
        NativeClass::Real => {
            let v = real(value).ok_or_else(|| FfiError::coerce(ty.c_name(), value))?;
            match info.size {
                4 => out.copy_from_slice(&(v as f32).to_ne_bytes()),
                8 => out.copy_from_slice(&v.to_ne_bytes()),
                size => {
                    return Err(FfiError::Unsupported {
                        detail: format!("{size}-byte {} in native memory", ty.c_name()),
                    })
                }
            }
        }
        NativeClass::Address => {
            let address = match value {
                Value::None => 0,
                Value::Int(_) | Value::UInt(_) => integer_bits(value).unwrap_or(0) as usize,
                Value::Bytes(bytes) => store(storage, bytes),
                _ => return Err(FfiError::coerce(ty.c_name(), value)),
            };
            write_uint(out, address as u64);
        }
        NativeClass::Text => {
            let address = match value {
                Value::None => 0,
                Value::Int(_) | Value::UInt(_) => integer_bits(value).unwrap_or(0) as usize,
                Value::Bytes(bytes) => store_narrow(storage, bytes),
                Value::Str(s) => store_narrow(storage, s.as_bytes()),
                _ => return Err(FfiError::coerce(ty.c_name(), value)),
            };
            write_uint(out, address as u64);
        }
        NativeClass::WideText => {
            let address = match value {
                Value::None => 0,
                Value::Int(_) | Value::UInt(_) => integer_bits(value).unwrap_or(0) as usize,
                Value::Str(s) => store_wide(storage, s),
                _ => return Err(FfiError::coerce(ty.c_name(), value)),
            };
            write_uint(out, address as u64);
        }
    }
    Ok(())
}

/// Read a native `ty` from the first `ty.size()` bytes of `bytes`.
pub fn decode(ty: NativeType, bytes: &[u8]) -> Result<Value> {
    let info = ty.info();
    let bytes = &bytes[..info.size];
    let value = match info.class {
        NativeClass::Bool => Value::Bool(bytes[0] != 0),
        NativeClass::Char => Value::Bytes(vec![bytes[0]]),
        NativeClass::WideChar => {
            let code = read_uint(bytes) as u32;
            Value::Str(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER).to_string())
        }
        NativeClass::Signed => Value::Int(read_int(bytes)),
        NativeClass::Unsigned => Value::from(read_uint(bytes)),
        NativeClass::Real => match info.size {
            4 => Value::Float(f64::from(f32::from_ne_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3],
            ]))),
            8 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(bytes);
                Value::Float(f64::from_ne_bytes(raw))
            }
            size => {
                return Err(FfiError::Unsupported {
                    detail: format!("{size}-byte {} in native memory", ty.c_name()),
                })
            }
        },
        NativeClass::Address => match read_uint(bytes) {
            0 => Value::None,
            address => Value::from(address),
        },
        NativeClass::Text => match read_uint(bytes) as usize {
            0 => Value::None,
            address => {
                // SAFETY: a non-null `char *` produced by native code is
                // trusted to point at a nul-terminated string.
                let text = unsafe { CStr::from_ptr(address as *const c_char) };
                Value::Bytes(text.to_bytes().to_vec())
            }
        },
        NativeClass::WideText => match read_uint(bytes) as usize {
            0 => Value::None,
            address => Value::Str(read_wide(address)),
        },
    };
    Ok(value)
}

/// Raw two's-complement bits of an integral value.
pub(crate) fn integer_bits(value: &Value) -> Option<u64> {
    match value {
        Value::Int(v) => Some(*v as u64),
        Value::UInt(v) => Some(*v),
        Value::Bool(v) => Some(u64::from(*v)),
        _ => None,
    }
}

fn real(value: &Value) -> Option<f64> {
    match value {
        Value::Float(_) | Value::Int(_) | Value::UInt(_) | Value::Bool(_) => value.as_f64(),
        _ => None,
    }
}

fn narrow_char(value: &Value) -> Result<u8> {
    match value {
        Value::Bytes(b) if b.len() == 1 => Ok(b[0]),
        Value::Str(s) if s.len() == 1 => Ok(s.as_bytes()[0]),
        Value::Int(_) | Value::UInt(_) | Value::Bool(_) => {
            Ok(integer_bits(value).unwrap_or(0) as u8)
        }
        _ => Err(FfiError::coerce("char", value)),
    }
}

fn wide_char(value: &Value) -> Result<u32> {
    match value {
        Value::Str(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(u32::from(c)),
                _ => Err(FfiError::coerce("wchar_t", value)),
            }
        }
        Value::Int(_) | Value::UInt(_) => Ok(integer_bits(value).unwrap_or(0) as u32),
        _ => Err(FfiError::coerce("wchar_t", value)),
    }
}

fn store(storage: &mut Vec<NativeBuffer>, bytes: &[u8]) -> usize {
    let mut buf = NativeBuffer::zeroed(bytes.len());
    buf.as_bytes_mut().copy_from_slice(bytes);
    let address = buf.as_mut_ptr() as usize;
    storage.push(buf);
    address
}

fn store_narrow(storage: &mut Vec<NativeBuffer>, bytes: &[u8]) -> usize {
    let mut buf = NativeBuffer::zeroed(bytes.len() + 1);
    buf.as_bytes_mut()[..bytes.len()].copy_from_slice(bytes);
    let address = buf.as_mut_ptr() as usize;
    storage.push(buf);
    address
}

fn store_wide(storage: &mut Vec<NativeBuffer>, text: &str) -> usize {
    let width = NativeType::WChar.size();
    let units: Vec<u32> = if width == 2 {
        text.encode_utf16().map(u32::from).collect()
    } else {
        text.chars().map(u32::from).collect()
    };
    let mut buf = NativeBuffer::zeroed((units.len() + 1) * width);
    for (chunk, unit) in buf.as_bytes_mut().chunks_exact_mut(width).zip(&units) {
        write_uint(chunk, u64::from(*unit));
    }
    let address = buf.as_mut_ptr() as usize;
    storage.push(buf);
    address
}

fn read_wide(address: usize) -> String {
    let width = NativeType::WChar.size();
    let mut units = Vec::new();
    let mut cursor = address;
    loop {
        // SAFETY: a non-null `wchar_t *` produced by native code is trusted to
        // point at a nul-terminated wide string.
        let unit = unsafe {
            let raw = std::slice::from_raw_parts(cursor as *const u8, width);
            read_uint(raw) as u32
        };
        if unit == 0 {
            break;
        }
        units.push(unit);
        cursor += width;
    }
    if width == 2 {
        let wide: Vec<u16> = units.iter().map(|u| *u as u16).collect();
        String::from_utf16_lossy(&wide)
    } else {
        units
            .iter()
            .map(|u| char::from_u32(*u).unwrap_or(char::REPLACEMENT_CHARACTER))
            .collect()
    }
}

/// Store the low `out.len()` bytes of `v` in native byte order.
pub(crate) fn write_uint(out: &mut [u8], v: u64) {
    let raw = v.to_ne_bytes();
    let width = out.len().min(size_of::<u64>());
    if cfg!(target_endian = "little") {
        out[..width].copy_from_slice(&raw[..width]);
    } else {
        out[..width].copy_from_slice(&raw[size_of::<u64>() - width..]);
    }
}

/// Zero-extend a native unsigned integer of `bytes.len()` bytes.
pub(crate) fn read_uint(bytes: &[u8]) -> u64 {
    let width = bytes.len().min(size_of::<u64>());
    let mut raw = [0u8; 8];
    if cfg!(target_endian = "little") {
        raw[..width].copy_from_slice(&bytes[..width]);
    } else {
        raw[size_of::<u64>() - width..].copy_from_slice(&bytes[..width]);
    }
    u64::from_ne_bytes(raw)
}

/// Sign-extend a native signed integer of `bytes.len()` bytes.
pub(crate) fn read_int(bytes: &[u8]) -> i64 {
    let bits = bytes.len().min(size_of::<u64>()) * 8;
    let raw = read_uint(bytes);
    if bits == 0 || bits == 64 {
        raw as i64
    } else {
        let shift = 64 - bits;
        ((raw << shift) as i64) >> shift
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(ty: NativeType, value: Value) -> Value {
        let mut out = vec![0u8; ty.size()];
        let mut storage = Vec::new();
        encode(ty, &value, &mut out, &mut storage).unwrap();
        decode(ty, &out).unwrap()
    }

    #[test]
    fn integers_truncate_to_width() {
        assert_eq!(roundtrip(NativeType::UByte, Value::Int(300)), Value::Int(44));
        assert_eq!(roundtrip(NativeType::Byte, Value::Int(200)), Value::Int(-56));
        assert_eq!(roundtrip(NativeType::Short, Value::Int(-2)), Value::Int(-2));
        assert_eq!(roundtrip(NativeType::UInt, Value::Int(-1)), Value::Int(u32::MAX as i64));
    }

    #[test]
    fn unsigned_long_long_beyond_i64() {
        assert_eq!(
            roundtrip(NativeType::ULongLong, Value::UInt(u64::MAX)),
            Value::UInt(u64::MAX)
        );
        assert_eq!(roundtrip(NativeType::ULongLong, Value::Int(5)), Value::Int(5));
    }

    #[test]
    fn reals_accept_integers() {
        assert_eq!(roundtrip(NativeType::Float, Value::Int(3)), Value::Float(3.0));
        assert_eq!(roundtrip(NativeType::Double, Value::Float(0.1)), Value::Float(0.1));
    }

    #[test]
    fn integers_reject_floats_and_text() {
        let mut out = [0u8; 4];
        let err = encode(NativeType::Int, &Value::Float(2.5), &mut out, &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, FfiError::Coerce { .. }));
        assert!(encode(NativeType::Int, &Value::from("x"), &mut out, &mut Vec::new()).is_err());
    }

    #[test]
    fn bool_uses_truthiness() {
        assert_eq!(roundtrip(NativeType::Bool, Value::Int(7)), Value::Bool(true));
        assert_eq!(roundtrip(NativeType::Bool, Value::None), Value::Bool(false));
    }

    #[test]
    fn characters() {
        assert_eq!(roundtrip(NativeType::Char, Value::from("a")), Value::bytes(*b"a"));
        assert_eq!(roundtrip(NativeType::WChar, Value::from("é")), Value::from("é"));
        let mut out = [0u8; 1];
        assert!(encode(NativeType::Char, &Value::from("ab"), &mut out, &mut Vec::new()).is_err());
    }

    #[test]
    fn strings_are_kept_alive_in_storage() {
        let mut out = [0u8; size_of::<usize>()];
        let mut storage = Vec::new();
        encode(NativeType::CharPtr, &Value::from("hello"), &mut out, &mut storage).unwrap();
        assert_eq!(storage.len(), 1);
        assert_eq!(decode(NativeType::CharPtr, &out).unwrap(), Value::bytes(*b"hello"));

        encode(NativeType::WCharPtr, &Value::from("wide"), &mut out, &mut storage).unwrap();
        assert_eq!(decode(NativeType::WCharPtr, &out).unwrap(), Value::from("wide"));
    }

    #[test]
    fn null_pointers() {
        assert_eq!(roundtrip(NativeType::VoidPtr, Value::None), Value::None);
        assert_eq!(roundtrip(NativeType::CharPtr, Value::None), Value::None);
        assert_eq!(roundtrip(NativeType::VoidPtr, Value::Int(0x1000)), Value::Int(0x1000));
    }

    #[test]
    fn sign_extension() {
        assert_eq!(read_int(&(-3i16).to_ne_bytes()), -3);
        assert_eq!(read_int(&i64::MIN.to_ne_bytes()), i64::MIN);
        assert_eq!(read_uint(&0xFFFFu16.to_ne_bytes()), 0xFFFF);
    }

    #[test]
    fn long_double_memory_depends_on_width() {
        let mut out = vec![0u8; NativeType::LongDouble.size()];
        let result = encode(NativeType::LongDouble, &Value::Float(1.5), &mut out, &mut Vec::new());
        if NativeType::LongDouble.size() == 8 {
            assert!(result.is_ok());
        } else {
            assert!(matches!(result, Err(FfiError::Unsupported { .. })));
        }
    }
}
