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

//! Machine-context save and restore, built on the `ucontext` family.
//!
//! This is the only module that touches execution state directly. Two
//! primitives cover everything the scheduler needs:
//!
//! - [`Context::swap`] saves the caller into one context and resumes another
//!   (the save-and-jump pair). Every activation suspended by the runtime is
//!   parked inside a live `swapcontext` frame, so every saved context is
//!   valid to resume later.
//! - [`Context::prepare`] arranges for the first swap into a context to call
//!   an entry function at the top of a fresh stack (enter-on-stack).
//!
//! [`Context::set`] resumes without saving and is used only on the path out
//! of a completed coroutine, whose own context will never run again.

use std::fmt;
use std::io;
use std::mem;
use std::ptr;

use crate::stack::Stack;

/// A saved machine context. Boxed and never moved once initialized: glibc
/// contexts hold pointers into their own storage.
pub(crate) struct Context {
    inner: Box<libc::ucontext_t>,
}

impl Context {
    pub(crate) fn empty() -> Context {
        Context {
            inner: Box::new(unsafe { mem::zeroed() }),
        }
    }

    /// Arrange for the first swap into this context to run `entry` on
    /// `stack`. `entry` must never return; the context it would return to is
    /// not set up.
    pub(crate) fn prepare(&mut self, stack: &Stack, entry: extern "C" fn()) {
        let ctx: &mut libc::ucontext_t = &mut self.inner;
        unsafe {
            if libc::getcontext(ctx) != 0 {
                panic!("getcontext failed: {}", io::Error::last_os_error());
            }
        }

        ctx.uc_stack.ss_sp = stack.bottom().cast();
        ctx.uc_stack.ss_size = stack.len();
        ctx.uc_stack.ss_flags = 0;
        ctx.uc_link = ptr::null_mut();

        unsafe {
            libc::makecontext(ctx, entry, 0);
        }
    }

    pub(crate) fn ptr(&mut self) -> *mut libc::ucontext_t {
        &mut *self.inner
    }

    /// Save the current activation into `save` and resume `jump`. Returns
    /// when something later swaps or sets back into `save`.
    ///
    /// # Safety
    ///
    /// `jump` must hold a context that is valid to resume: either prepared
    /// with [`Context::prepare`] and not yet entered, or saved by an earlier
    /// swap whose activation is still suspended.
    pub(crate) unsafe fn swap(save: *mut libc::ucontext_t, jump: *mut libc::ucontext_t) {
        if libc::swapcontext(save, jump) != 0 {
            panic!("swapcontext failed: {}", io::Error::last_os_error());
        }
    }

    /// Resume `jump` without saving the current activation.
    ///
    /// # Safety
    ///
    /// Same requirement on `jump` as [`Context::swap`]. The calling
    /// activation is abandoned; nothing may depend on it running again.
    pub(crate) unsafe fn set(jump: *mut libc::ucontext_t) -> ! {
        libc::setcontext(jump);
        panic!("setcontext failed: {}", io::Error::last_os_error());
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Context({:p})", &*self.inner)
    }
}

#[cfg(test)]
mod tests {
    use std::ptr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::Context;
    use crate::stack::Stack;

    static ENTERED: AtomicUsize = AtomicUsize::new(0);
    static mut CALLER: *mut libc::ucontext_t = ptr::null_mut();

    extern "C" fn entry() {
        ENTERED.fetch_add(1, Ordering::SeqCst);
        unsafe { Context::set(CALLER) }
    }

    #[test]
    fn enters_prepared_context_and_returns() {
        let stack = Stack::new(32 * 1024);
        let mut target = Context::empty();
        target.prepare(&stack, entry);

        let mut caller = Context::empty();
        unsafe {
            CALLER = caller.ptr();
            Context::swap(caller.ptr(), target.ptr());
        }
        assert_eq!(ENTERED.load(Ordering::SeqCst), 1);
    }
}
