//! Guest memory access
//!
//! Pointer arguments arrive as plain machine words. A [`GuestMemory`]
//! resolves them to byte slices, rejecting anything outside the guest's
//! memory with `invalid` instead of faulting.

use crate::abi::{ErrorKind, SysResult};
use std::ffi::{CStr, c_char};

/// A view of the memory pointer words refer to
pub trait GuestMemory {
    /// Read a NUL-terminated string starting at `ptr`, without the NUL
    fn read_cstr(&self, ptr: usize) -> SysResult<&[u8]>;

    /// Borrow `len` bytes starting at `ptr`
    fn slice(&self, ptr: usize, len: usize) -> SysResult<&[u8]>;

    /// Mutably borrow `len` bytes starting at `ptr`
    fn slice_mut(&mut self, ptr: usize, len: usize) -> SysResult<&mut [u8]>;
}

/// A bounds-checked linear memory, laid out like a WASM memory
///
/// Embedders copy a guest's memory in and out of this, and tests use it to
/// drive a gateway without raw pointers.
#[derive(Debug, Clone)]
pub struct LinearMemory {
    data: Vec<u8>,
}

impl LinearMemory {
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0u8; size],
        }
    }

    /// Read bytes; out-of-range reads return an empty vector
    pub fn read(&self, offset: usize, len: usize) -> Vec<u8> {
        self.range(offset, len)
            .map(|r| self.data[r].to_vec())
            .unwrap_or_default()
    }

    /// Write bytes, returning false if they do not fit
    pub fn write(&mut self, offset: usize, data: &[u8]) -> bool {
        match self.range(offset, data.len()) {
            Some(r) => {
                self.data[r].copy_from_slice(data);
                true
            }
            None => false,
        }
    }

    /// Write a string followed by a NUL terminator
    pub fn write_cstr(&mut self, offset: usize, s: &str) -> bool {
        let mut bytes = Vec::with_capacity(s.len() + 1);
        bytes.extend_from_slice(s.as_bytes());
        bytes.push(0);
        self.write(offset, &bytes)
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    fn range(&self, offset: usize, len: usize) -> Option<std::ops::Range<usize>> {
        let end = offset.checked_add(len)?;
        (end <= self.data.len()).then_some(offset..end)
    }
}

impl GuestMemory for LinearMemory {
    fn read_cstr(&self, ptr: usize) -> SysResult<&[u8]> {
        let tail = self.data.get(ptr..).ok_or(ErrorKind::Invalid)?;
        let nul = tail.iter().position(|&b| b == 0).ok_or(ErrorKind::Invalid)?;
        Ok(&tail[..nul])
    }

    fn slice(&self, ptr: usize, len: usize) -> SysResult<&[u8]> {
        let r = self.range(ptr, len).ok_or(ErrorKind::Invalid)?;
        Ok(&self.data[r])
    }

    fn slice_mut(&mut self, ptr: usize, len: usize) -> SysResult<&mut [u8]> {
        let r = self.range(ptr, len).ok_or(ErrorKind::Invalid)?;
        Ok(&mut self.data[r])
    }
}

/// The current process's own address space
///
/// Words are taken as raw addresses. Only null is rejected; everything
/// else is trusted, which is why construction is unsafe.
#[derive(Debug)]
pub struct NativeMemory {
    _private: (),
}

impl NativeMemory {
    /// # Safety
    ///
    /// Every non-null pointer word later passed through this memory must
    /// point to memory that is valid for the requested access and length,
    /// and must not alias a live Rust reference.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl GuestMemory for NativeMemory {
    fn read_cstr(&self, ptr: usize) -> SysResult<&[u8]> {
        if ptr == 0 {
            return Err(ErrorKind::Invalid);
        }
        // SAFETY: non-null, and validity is the contract of `NativeMemory::new`.
        let s = unsafe { CStr::from_ptr(ptr as *const c_char) };
        Ok(s.to_bytes())
    }

    fn slice(&self, ptr: usize, len: usize) -> SysResult<&[u8]> {
        if len == 0 {
            return Ok(&[]);
        }
        if ptr == 0 || len > isize::MAX as usize {
            return Err(ErrorKind::Invalid);
        }
        // SAFETY: see `NativeMemory::new`.
        Ok(unsafe { std::slice::from_raw_parts(ptr as *const u8, len) })
    }

    fn slice_mut(&mut self, ptr: usize, len: usize) -> SysResult<&mut [u8]> {
        if len == 0 {
            return Ok(&mut []);
        }
        if ptr == 0 || len > isize::MAX as usize {
            return Err(ErrorKind::Invalid);
        }
        // SAFETY: see `NativeMemory::new`.
        Ok(unsafe { std::slice::from_raw_parts_mut(ptr as *mut u8, len) })
    }
}
