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

use super::Stack;

/// Free list of recycled stacks. Stacks given back are kept for the life of
/// the runtime and handed out again to later spawns.
#[derive(Debug)]
pub(crate) struct StackPool {
    // Ideally this would be some data structure that preserved ordering on
    // Stack.min_size.
    stacks: Vec<Stack>,
}

impl StackPool {
    pub(crate) fn new() -> StackPool {
        StackPool { stacks: Vec::new() }
    }

    pub(crate) fn take_stack(&mut self, min_size: usize) -> Stack {
        // Ideally this would be a binary search
        match self.stacks.iter().position(|s| min_size <= s.min_size()) {
            Some(idx) => self.stacks.swap_remove(idx),
            None => Stack::new(min_size),
        }
    }

    pub(crate) fn give_stack(&mut self, stack: Stack) {
        self.stacks.push(stack);
    }

    #[cfg(test)]
    pub(crate) fn cached(&self) -> usize {
        self.stacks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::StackPool;

    #[test]
    fn stack_pool_caches() {
        let mut p = StackPool::new();
        let s = p.take_stack(16 * 1024);
        p.give_stack(s);
        let s = p.take_stack(8 * 1024);
        assert_eq!(s.min_size(), 16 * 1024);
        p.give_stack(s);
        let s = p.take_stack(32 * 1024);
        assert_eq!(s.min_size(), 32 * 1024);
        p.give_stack(s);
        assert_eq!(p.cached(), 2);
    }

    #[test]
    fn stack_pool_caches_exact() {
        let mut p = StackPool::new();
        let s = p.take_stack(16 * 1024);
        p.give_stack(s);

        let s = p.take_stack(16 * 1024);
        assert_eq!(s.min_size(), 16 * 1024);
    }
}
