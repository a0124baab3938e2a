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

use crate::coroutine::{Handle, Options};
use crate::runtime::Runtime;

/// Coroutine configuration. Provides detailed control over the properties
/// and behavior of new coroutines.
///
/// ```
/// let coro = routines::Builder::new()
///     .name(format!("worker #{}", 1))
///     .stack_size(64 * 1024)
///     .spawn(|| println!("Hello world!!"));
///
/// routines::destroy(coro);
/// ```
pub struct Builder {
    opts: Options,
}

impl Builder {
    /// Generate the base configuration for spawning a coroutine, from which
    /// configuration methods can be chained.
    pub fn new() -> Builder {
        Builder {
            opts: Options::default(),
        }
    }

    /// Name the coroutine-to-be. Currently the name is used for
    /// identification only in log and panic messages.
    pub fn name(mut self, name: String) -> Builder {
        self.opts.name = Some(name);
        self
    }

    /// Set the size of the stack for the new coroutine.
    pub fn stack_size(mut self, size: usize) -> Builder {
        self.opts.stack_size = size;
        self
    }

    /// Spawn a new coroutine, and return a handle for it.
    pub fn spawn<F>(self, f: F) -> Handle
    where
        F: FnOnce() + 'static,
    {
        Runtime::current().spawn(Box::new(f), self.opts)
    }
}

impl Default for Builder {
    fn default() -> Builder {
        Builder::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::Builder;

    #[test]
    fn test_builder_basic() {
        let value = Rc::new(Cell::new(0));
        let inner = Rc::clone(&value);
        let coro = Builder::new()
            .name("Test builder".to_string())
            .spawn(move || inner.set(1));
        assert_eq!(value.get(), 1);
        crate::destroy(coro);
    }

    #[test]
    fn test_builder_stack_size() {
        let coro = Builder::new().stack_size(128 * 1024).spawn(|| {
            // Deep enough to need more than one page.
            let buf = [0u8; 64 * 1024];
            assert_eq!(buf[buf.len() - 1], 0);
        });
        crate::destroy(coro);
    }
}
