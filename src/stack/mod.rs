// The MIT License (MIT)

// Copyright (c) 2026 Routines Developers

//  Permission is hereby granted, free of charge, to any person obtaining a
//  copy of this software and associated documentation files (the "Software"),
//  to deal in the Software without restriction, including without limitation
//  the rights to use, copy, modify, merge, publish, distribute, sublicense,
//  and/or sell copies of the Software, and to permit persons to whom the
//  Software is furnished to do so, subject to the following conditions:
//
//  The above copyright notice and this permission notice shall be included in
//  all copies or substantial portions of the Software.
//
//  THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
//  OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
//  FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
//  AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
//  LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
//  FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
//  DEALINGS IN THE SOFTWARE.

//! Execution stacks for coroutines.

use std::fmt;
use std::io;
use std::ptr;
use std::sync::OnceLock;

pub(crate) use self::pool::StackPool;

mod pool;

// MAP_STACK where the platform has a working one; it is what the mapping is
// for anyway. FreeBSD's implies MAP_FIXED and fails here.
#[cfg(any(target_os = "linux", target_os = "android"))]
const STACK_FLAGS: libc::c_int = libc::MAP_STACK | libc::MAP_PRIVATE | libc::MAP_ANON;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const STACK_FLAGS: libc::c_int = libc::MAP_PRIVATE | libc::MAP_ANON;

pub(crate) fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(|| unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize })
}

/// A coroutine's stack: an anonymous mapping with an inaccessible guard page
/// at the low end, where a stack that grows down runs over first.
pub(crate) struct Stack {
    base: *mut u8,
    total: usize,
    min_size: usize,
}

impl Stack {
    /// Map a new stack of at least `size` usable bytes. Size 0 is a
    /// programming error, out of memory aborts.
    pub(crate) fn new(size: usize) -> Stack {
        assert!(size > 0, "cannot allocate a zero-sized stack");

        let page = page_size();
        let usable = (size + page - 1) & !(page - 1);
        let total = usable + page;

        let base = unsafe {
            libc::mmap(
                ptr::null_mut(),
                total,
                libc::PROT_READ | libc::PROT_WRITE,
                STACK_FLAGS,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            panic!(
                "mmap for stack of size {} failed: {}",
                total,
                io::Error::last_os_error()
            );
        }

        // The start of the mapping is the guard: stacks grow from high
        // addresses toward low ones on every supported architecture.
        if unsafe { libc::mprotect(base, page, libc::PROT_NONE) } != 0 {
            panic!(
                "could not protect stack guard page: {}",
                io::Error::last_os_error()
            );
        }

        Stack {
            base: base.cast(),
            total,
            min_size: size,
        }
    }

    /// Lowest usable address, just above the guard page.
    pub(crate) fn bottom(&self) -> *mut u8 {
        unsafe { self.base.add(page_size()) }
    }

    /// Usable length in bytes.
    pub(crate) fn len(&self) -> usize {
        self.total - page_size()
    }

    /// The size this stack was requested with.
    pub(crate) fn min_size(&self) -> usize {
        self.min_size
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base.cast(), self.total);
        }
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stack {{ base: {:p}, total: {}, min_size: {} }}",
            self.base, self.total, self.min_size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{page_size, Stack};

    #[test]
    fn usable_region_is_writable() {
        let stack = Stack::new(16 * 1024);
        assert!(stack.len() >= 16 * 1024);
        assert_eq!(stack.len() % page_size(), 0);
        unsafe {
            // Touch both ends of the usable region.
            *stack.bottom() = 0xA5;
            *stack.bottom().add(stack.len() - 1) = 0x5A;
        }
    }

    #[test]
    fn rounds_up_to_page_multiple() {
        let stack = Stack::new(1);
        assert_eq!(stack.min_size(), 1);
        assert_eq!(stack.len(), page_size());
    }
}
