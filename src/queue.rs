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

//! Message queues.
//!
//! Payloads are opaque machine words; what they mean is between the sender
//! and the receiver. A queue holds either pending messages or parked
//! receivers, never both: a send that finds a receiver waiting hands its
//! message straight off, and a receive that finds a message pending never
//! parks.

use std::collections::VecDeque;
use std::ops::{Index, IndexMut};

use crate::arena::{Arena, Id};
use crate::coroutine::Handle;
use crate::list::CoroList;
use crate::runtime::Runtime;

/// Handle of a message queue.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Queue(pub(crate) Id<MessageQueue>);

impl Queue {
    /// Send a message, blocking until a receiver consumes it.
    pub fn send(self, message: usize) {
        Runtime::current().send(self, message)
    }

    /// Send a message without blocking.
    pub fn signal(self, message: usize) {
        Runtime::current().signal(self, message)
    }

    /// Send a message without blocking, naming a queue for a later reply.
    pub fn post(self, message: usize, reply_queue: Queue) {
        Runtime::current().post(self, message, reply_queue)
    }

    /// Send a message and block until a reply arrives on `reply_queue`.
    pub fn call(self, message: usize, reply_queue: Queue) -> Option<usize> {
        Runtime::current().call(self, message, reply_queue)
    }

    /// Receive a message, blocking until one is available.
    pub fn wait(self) -> Option<usize> {
        Runtime::current().wait(self)
    }

    /// Receive a message and the sender's reply queue, blocking until a
    /// message is available.
    pub fn recv(self) -> (Option<usize>, Option<Queue>) {
        Runtime::current().recv(self)
    }

    /// Receive a message if one is pending, without blocking.
    pub fn read(self) -> Option<usize> {
        Runtime::current().read(self)
    }

    /// Drop pending messages and resume every coroutine blocked on this
    /// queue.
    pub fn destroy(self) {
        Runtime::current().queue_destroy(self)
    }
}

/// A message pending in a queue.
pub(crate) struct Message {
    pub(crate) payload: usize,

    /// Coroutine blocked until this message is consumed, if the send was a
    /// blocking one.
    pub(crate) sender: Option<Handle>,

    /// Queue the receiver should direct a reply to, if any.
    pub(crate) reply: Option<Queue>,
}

/// Pending messages, or coroutines parked waiting for one.
pub(crate) struct MessageQueue {
    pub(crate) messages: VecDeque<Id<Message>>,
    pub(crate) receivers: CoroList,
}

impl MessageQueue {
    pub(crate) fn new() -> MessageQueue {
        MessageQueue {
            messages: VecDeque::new(),
            receivers: CoroList::new(),
        }
    }
}

impl Index<Queue> for Arena<MessageQueue> {
    type Output = MessageQueue;

    fn index(&self, queue: Queue) -> &MessageQueue {
        &self[queue.0]
    }
}

impl IndexMut<Queue> for Arena<MessageQueue> {
    fn index_mut(&mut self, queue: Queue) -> &mut MessageQueue {
        &mut self[queue.0]
    }
}
