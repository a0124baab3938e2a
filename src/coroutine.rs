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

//! Coroutine records and their lifecycle states.

use std::env;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::sync::OnceLock;

use crate::arena::{Arena, Id};
use crate::context::Context;
use crate::list::CoroList;
use crate::queue::{Message, Queue};
use crate::runtime::Runtime;
use crate::stack::Stack;

/// Default size of a coroutine stack.
pub const DEFAULT_STACK_SIZE: usize = 32 * 1024;

/// Lifecycle state of a coroutine.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum State {
    /// Currently executing, or parked on the ready queue waiting for a turn.
    Running,

    /// Parked nowhere. Only `resume` can make it runnable again.
    Suspended,

    /// Parked on a pending message it sent, until a receiver consumes it.
    BlockedSend,

    /// Parked on a queue's receiver list, until a message arrives.
    BlockedRecv,

    /// Parked on another coroutine's join list, until that coroutine
    /// completes.
    BlockedJoin,

    /// The entrypoint returned. The stack is released; only `destroy` is
    /// left.
    Completed,
}

/// Handle of a coroutine.
///
/// Copyable and cheap; all state lives in the runtime. A handle outliving its
/// coroutine is detected, and using one is a programming error.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Handle(pub(crate) Id<Coroutine>);

impl Handle {
    /// Get the state of the coroutine.
    pub fn state(self) -> State {
        Runtime::current().state(self)
    }

    /// Park the calling coroutine until this one completes.
    pub fn join(self) {
        Runtime::current().join(self)
    }

    /// Forcibly park this coroutine, removing it from whichever queue holds
    /// it.
    pub fn suspend(self) {
        Runtime::current().suspend(self)
    }

    /// Make this coroutine runnable again.
    pub fn resume(self) {
        Runtime::current().resume(self)
    }

    /// Cancel this coroutine, wake its joiners, and release its resources.
    pub fn destroy(self) {
        Runtime::current().destroy(self)
    }
}

/// Spawn options: stack size and a debug name.
#[derive(Debug)]
pub struct Options {
    /// The size of the stack
    pub stack_size: usize,

    /// The name of the coroutine
    pub name: Option<String>,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            stack_size: default_stack_size(),
            name: None,
        }
    }
}

fn default_stack_size() -> usize {
    static SIZE: OnceLock<usize> = OnceLock::new();
    *SIZE.get_or_init(|| {
        env::var("ROUTINES_STACK_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_STACK_SIZE)
    })
}

/// Which list a parked coroutine is on, so that forced removal can find the
/// head and tail to fix up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Park {
    /// The global ready queue.
    Ready,
    /// The join list of the named coroutine.
    Join(Handle),
    /// The receiver list of the named queue.
    Recv(Queue),
}

/// One cooperative task: its entrypoint, stack, saved context, and every
/// piece of bookkeeping the scheduler keeps about it.
pub(crate) struct Coroutine {
    /// Entrypoint; taken exactly once, on first entry.
    pub(crate) task: Option<Box<dyn FnOnce()>>,

    /// Owned stack, `None` once released after completion.
    pub(crate) stack: Option<Stack>,

    /// Saved context; valid whenever this coroutine is not the running one.
    pub(crate) context: Context,

    pub(crate) state: State,

    pub(crate) name: Option<String>,

    /// Links for whichever list `parked` names.
    pub(crate) prev: Option<Handle>,
    pub(crate) next: Option<Handle>,
    pub(crate) parked: Option<Park>,

    /// Coroutines waiting for this one to complete.
    pub(crate) joiners: CoroList,

    /// The pending message this coroutine is blocked sending, while
    /// `BlockedSend`.
    pub(crate) sent: Option<Id<Message>>,
}

impl Coroutine {
    pub(crate) fn new(
        task: Box<dyn FnOnce()>,
        stack: Stack,
        context: Context,
        name: Option<String>,
    ) -> Coroutine {
        Coroutine {
            task: Some(task),
            stack: Some(stack),
            context,
            state: State::Suspended,
            name,
            prev: None,
            next: None,
            parked: None,
            joiners: CoroList::new(),
            sent: None,
        }
    }

    pub(crate) fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    #[cfg(test)]
    pub(crate) fn stub() -> Coroutine {
        Coroutine {
            task: None,
            stack: None,
            context: Context::empty(),
            state: State::Suspended,
            name: None,
            prev: None,
            next: None,
            parked: None,
            joiners: CoroList::new(),
            sent: None,
        }
    }
}

impl fmt::Debug for Coroutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coroutine")
            .field("name", &self.name())
            .field("state", &self.state)
            .field("parked", &self.parked)
            .finish_non_exhaustive()
    }
}

impl Index<Handle> for Arena<Coroutine> {
    type Output = Coroutine;

    fn index(&self, handle: Handle) -> &Coroutine {
        &self[handle.0]
    }
}

impl IndexMut<Handle> for Arena<Coroutine> {
    fn index_mut(&mut self, handle: Handle) -> &mut Coroutine {
        &mut self[handle.0]
    }
}
