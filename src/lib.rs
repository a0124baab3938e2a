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

//! Cooperative single-threaded coroutines with synchronous message passing.
//!
//! Many lightweight tasks share one OS thread, yield the processor
//! voluntarily, and coordinate through word-sized messages exchanged over
//! queues. A `spawn`ed coroutine runs immediately and keeps running until it
//! yields, blocks on a queue, or completes; nothing is ever preempted.
//! Blocking on something external is expressed by waiting on a queue that an
//! outer poll loop signals from the host thread.
//!
//! ```
//! use routines::{destroy, queue_create, queue_destroy, sched, signal, spawn, state, wait, State};
//!
//! let queue = queue_create();
//! let echo = spawn(move || {
//!     while let Some(msg) = wait(queue) {
//!         println!("got {}", msg);
//!     }
//! });
//!
//! // The coroutine is parked in `wait`; control is back on the host thread.
//! signal(queue, 1);
//! signal(queue, 2);
//!
//! // Destroying the queue wakes the receiver with no message; its loop ends.
//! queue_destroy(queue);
//! sched();
//!
//! assert_eq!(state(echo), State::Completed);
//! destroy(echo);
//! ```
//!
//! Handles are plain copyable ids. Coroutines and queues live until they are
//! explicitly destroyed, and using a handle after destroying its target is a
//! programming error that panics rather than aliasing whatever reused the
//! slot.

pub use crate::builder::Builder;
pub use crate::coroutine::{Handle, State, DEFAULT_STACK_SIZE};
pub use crate::queue::Queue;

use crate::runtime::Runtime;

mod arena;
mod builder;
mod context;
mod coroutine;
mod list;
mod queue;
mod runtime;
mod stack;

#[cfg(test)]
mod tests;

/*
 * Coroutine management
 */

/// Spawn a new coroutine with default options.
///
/// The coroutine starts executing immediately; the caller is preempted until
/// it yields, blocks, or completes. Use [`Builder`] to set a stack size or a
/// name.
pub fn spawn<F>(f: F) -> Handle
where
    F: FnOnce() + 'static,
{
    Builder::new().spawn(f)
}

/// Cancel a coroutine, wake everything joined on it, and release its
/// resources. The handle is invalid afterwards.
pub fn destroy(coroutine: Handle) {
    Runtime::current().destroy(coroutine)
}

/// The calling coroutine, or `None` on the host thread.
pub fn current() -> Option<Handle> {
    Runtime::current().running()
}

/// Observe the lifecycle state of a coroutine.
pub fn state(coroutine: Handle) -> State {
    Runtime::current().state(coroutine)
}

/// Yield the processor: go to the ready-queue tail and run the next ready
/// coroutine. Returns immediately when nothing else is ready. On the host
/// thread this runs ready coroutines until all of them park.
pub fn sched() {
    Runtime::current().sched()
}

/// Park the calling coroutine until `coroutine` completes.
pub fn join(coroutine: Handle) {
    Runtime::current().join(coroutine)
}

/// Forcibly park a coroutine, pulling it out of whichever queue holds it. A
/// coroutine yanked out of a receive observes no message once resumed. A
/// coroutine suspended mid-send leaves its message behind as if by
/// [`signal`].
pub fn suspend(coroutine: Handle) {
    Runtime::current().suspend(coroutine)
}

/// Suspend the calling coroutine.
pub fn suspend_self() {
    let current = current().expect("suspend_self from outside a coroutine");
    suspend(current);
}

/// Make a suspended or blocked coroutine runnable again.
pub fn resume(coroutine: Handle) {
    Runtime::current().resume(coroutine)
}

/*
 * Queues and messaging
 */

/// Create a new message queue.
pub fn queue_create() -> Queue {
    Runtime::current().queue_create()
}

/// Destroy a message queue. Pending messages are dropped and every coroutine
/// blocked on the queue is resumed; parked receivers observe no message.
pub fn queue_destroy(queue: Queue) {
    Runtime::current().queue_destroy(queue)
}

/// Send a message, blocking until a receiver consumes it.
pub fn send(queue: Queue, message: usize) {
    Runtime::current().send(queue, message)
}

/// Send a message without blocking.
pub fn signal(queue: Queue, message: usize) {
    Runtime::current().signal(queue, message)
}

/// Send a message without blocking, naming a queue for a later reply.
pub fn post(queue: Queue, message: usize, reply_queue: Queue) {
    Runtime::current().post(queue, message, reply_queue)
}

/// Send a message and block until a reply arrives on `reply_queue`.
pub fn call(queue: Queue, message: usize, reply_queue: Queue) -> Option<usize> {
    Runtime::current().call(queue, message, reply_queue)
}

/// Receive a message, blocking until one is available. Delivers `None` if
/// the queue is destroyed, or if the caller is suspended and resumed while
/// parked.
pub fn wait(queue: Queue) -> Option<usize> {
    Runtime::current().wait(queue)
}

/// Receive a message along with the queue its sender is waiting on for a
/// reply, blocking until a message is available.
pub fn recv(queue: Queue) -> (Option<usize>, Option<Queue>) {
    Runtime::current().recv(queue)
}

/// Receive a message if one is pending; `None` otherwise. Never blocks.
pub fn read(queue: Queue) -> Option<usize> {
    Runtime::current().read(queue)
}
