//! Aligned native memory.

use std::ffi::c_void;
use std::fmt;

/// Alignment every buffer satisfies; covers `long double` and pointers.
pub const BUFFER_ALIGN: usize = 16;

#[repr(C, align(16))]
#[derive(Clone, Copy)]
struct Block([u8; BUFFER_ALIGN]);

/// Zero-initialised heap memory aligned for any native scalar or struct.
///
/// The address stays stable for the buffer's lifetime, including when the
/// buffer value itself is moved.
#[derive(Clone)]
pub struct NativeBuffer {
    blocks: Vec<Block>,
    len: usize,
}

impl NativeBuffer {
    pub fn zeroed(len: usize) -> Self {
        let count = len.div_ceil(BUFFER_ALIGN).max(1);
        NativeBuffer {
            blocks: vec![Block([0; BUFFER_ALIGN]); count],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: `blocks` owns at least `len` initialised bytes and `Block`
        // has no padding.
        unsafe { std::slice::from_raw_parts(self.blocks.as_ptr().cast::<u8>(), self.len) }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: as above, with exclusive access through `&mut self`.
        unsafe { std::slice::from_raw_parts_mut(self.blocks.as_mut_ptr().cast::<u8>(), self.len) }
    }

    /// Address handed to native code.
    pub fn as_mut_ptr(&mut self) -> *mut c_void {
        self.blocks.as_mut_ptr().cast()
    }
}

impl fmt::Debug for NativeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBuffer")
            .field("len", &self.len)
            .field("bytes", &self.as_bytes())
            .finish()
    }
}
