// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Owned, aligned, zero-initialised byte storage.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

pub(crate) struct AlignedBuf {
    ptr: NonNull<u8>,
    len: usize,
    layout: Layout,
}

// SAFETY: the buffer exclusively owns its allocation; shared access only
// hands out `&[u8]`.
unsafe impl Send for AlignedBuf {}
// SAFETY: see above.
unsafe impl Sync for AlignedBuf {}

impl AlignedBuf {
    /// Zeroed buffer of `len` bytes aligned to `align`.
    ///
    /// Returns `None` when the request is not a valid allocation layout or
    /// the allocator cannot satisfy it.
    pub(crate) fn zeroed(len: usize, align: usize) -> Option<Self> {
        // zero-sized values still get a distinct, aligned allocation
        let layout = Layout::from_size_align(len.max(1), align.max(1)).ok()?;
        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            log::warn!("[value] allocation of {} bytes failed", layout.size());
            return None;
        };
        Some(Self { ptr, len, layout })
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn layout(&self) -> Layout {
        self.layout
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for `len` initialised bytes.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr is valid for `len` bytes and uniquely borrowed.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    pub(crate) fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Copy of the buffer, or `None` when the allocator refuses.
    pub(crate) fn try_clone(&self) -> Option<Self> {
        // SAFETY: same non-zero layout as an allocation that already succeeded.
        let raw = unsafe { alloc::alloc(self.layout) };
        let ptr = NonNull::new(raw)?;
        // SAFETY: both regions are valid for `len` bytes and distinct.
        unsafe { std::ptr::copy_nonoverlapping(self.ptr.as_ptr(), ptr.as_ptr(), self.len) };
        Some(Self {
            ptr,
            len: self.len,
            layout: self.layout,
        })
    }
}

impl Drop for AlignedBuf {
    fn drop(&mut self) {
        // SAFETY: allocated in `zeroed`/`try_clone` with this exact layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_alignment() {
        for align in [1, 2, 4, 8, 16, 32] {
            let buf = AlignedBuf::zeroed(24, align).unwrap();
            assert_eq!(buf.as_ptr() as usize % align, 0);
            assert!(buf.as_slice().iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_zero_length() {
        let buf = AlignedBuf::zeroed(0, 1).unwrap();
        assert_eq!(buf.len(), 0);
        assert!(buf.as_slice().is_empty());
    }

    #[test]
    fn test_invalid_layout() {
        assert!(AlignedBuf::zeroed(16, 3).is_none());
        assert!(AlignedBuf::zeroed(usize::MAX, 8).is_none());
    }

    #[test]
    fn test_allocation_failure_is_reported() {
        // valid layout, but no allocator can satisfy it
        assert!(AlignedBuf::zeroed(isize::MAX as usize - 15, 8).is_none());
    }

    #[test]
    fn test_clone_copies_bytes() {
        let mut buf = AlignedBuf::zeroed(4, 4).unwrap();
        buf.as_mut_slice().copy_from_slice(&[1, 2, 3, 4]);
        let copy = buf.try_clone().unwrap();
        assert_eq!(copy.as_slice(), &[1, 2, 3, 4]);
        assert_ne!(copy.as_ptr(), buf.as_ptr());
    }
}
