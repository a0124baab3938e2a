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

//! The scheduler and the send/receive protocol.
//!
//! All process-wide state lives in one [`Runtime`] behind a thread-local
//! anchor, so each host thread that touches the crate gets its own
//! independent runtime. Every public operation funnels into methods here,
//! and everything that parks, wakes, or switches coroutines goes through the
//! single [`Runtime::transfer`] primitive, so no intermediate state where a
//! coroutine is half-parked is ever observable from another coroutine.

use std::cell::UnsafeCell;
use std::panic::{self, AssertUnwindSafe};

use log::{debug, error, trace};

use crate::arena::Arena;
use crate::context::Context;
use crate::coroutine::{Coroutine, Handle, Options, Park, State};
use crate::list::{self, CoroList};
use crate::queue::{Message, MessageQueue, Queue};
use crate::stack::StackPool;

thread_local!(static RUNTIME: UnsafeCell<Box<Runtime>> = UnsafeCell::new(Box::new(Runtime::new())));

pub(crate) struct Runtime {
    coros: Arena<Coroutine>,
    queues: Arena<MessageQueue>,
    messages: Arena<Message>,

    /// Coroutines eligible to run, in arrival order.
    ready: CoroList,

    /// The running coroutine; `None` while control is in the host thread.
    current: Option<Handle>,

    /// A coroutine whose entrypoint returned but whose stack is still the
    /// one being executed on. Cleared, and the stack recycled, by the next
    /// activation to resume.
    exited: Option<Handle>,

    /// Saved context of the host thread, refreshed every time control leaves
    /// it.
    root_context: Context,

    stack_pool: StackPool,
}

impl Runtime {
    fn new() -> Runtime {
        Runtime {
            coros: Arena::new(),
            queues: Arena::new(),
            messages: Arena::new(),
            ready: CoroList::new(),
            current: None,
            exited: None,
            root_context: Context::empty(),
            stack_pool: StackPool::new(),
        }
    }

    pub(crate) fn current() -> &'static mut Runtime {
        RUNTIME.with(|rt| unsafe { &mut **rt.get() })
    }

    /*
     * Scheduling core
     */

    /// Switch execution to another coroutine, or back to the host thread.
    ///
    /// The caller (if any) gets `state` and is appended to the list `park`
    /// names, the next activation is `target` or the ready-queue head, and
    /// the caller's context is saved so a later transfer can come back here.
    /// Folding park-self, pick-next, switch, and exit cleanup into one place
    /// is what keeps the queue-membership invariants intact at every point
    /// another coroutine could observe them.
    fn transfer(&mut self, park: Option<Park>, state: State, target: Option<Handle>) {
        let prev = self.current;
        if let Some(id) = prev {
            self.coros[id].state = state;
            if let Some(tag) = park {
                self.park(tag, id);
            }
        }

        let next = target.or_else(|| self.ready_pop());
        trace!("transfer: {:?} -> {:?}", prev, next);
        self.current = next;

        let save = match prev {
            Some(id) => self.coros[id].context.ptr(),
            None => self.root_context.ptr(),
        };
        let jump = match next {
            Some(id) => {
                let coro = &mut self.coros[id];
                coro.state = State::Running;
                coro.context.ptr()
            }
            None => self.root_context.ptr(),
        };

        if save != jump {
            unsafe { Context::swap(save, jump) };
        }

        // Resumed. Whoever ran in the meantime may have exited on a stack
        // that only now stopped executing.
        self.reap_exited();
    }

    fn park(&mut self, tag: Park, id: Handle) {
        match tag {
            Park::Ready => {
                let mut ready = self.ready;
                list::push_back(&mut self.coros, &mut ready, tag, id);
                self.ready = ready;
            }
            Park::Join(target) => {
                let mut joiners = self.coros[target].joiners;
                list::push_back(&mut self.coros, &mut joiners, tag, id);
                self.coros[target].joiners = joiners;
            }
            Park::Recv(queue) => {
                let mut receivers = self.queues[queue].receivers;
                list::push_back(&mut self.coros, &mut receivers, tag, id);
                self.queues[queue].receivers = receivers;
            }
        }
    }

    /// Remove a coroutine from whichever list holds it, if any.
    fn unpark(&mut self, id: Handle) {
        let Some(tag) = self.coros[id].parked else {
            return;
        };
        match tag {
            Park::Ready => {
                let mut ready = self.ready;
                list::unlink(&mut self.coros, &mut ready, id);
                self.ready = ready;
            }
            Park::Join(target) => {
                let mut joiners = self.coros[target].joiners;
                list::unlink(&mut self.coros, &mut joiners, id);
                self.coros[target].joiners = joiners;
            }
            Park::Recv(queue) => {
                let mut receivers = self.queues[queue].receivers;
                list::unlink(&mut self.coros, &mut receivers, id);
                self.queues[queue].receivers = receivers;
            }
        }
    }

    fn ready_pop(&mut self) -> Option<Handle> {
        let mut ready = self.ready;
        let head = list::pop_front(&mut self.coros, &mut ready);
        self.ready = ready;
        head
    }

    fn reap_exited(&mut self) {
        if let Some(id) = self.exited.take() {
            let stack = self.coros.get_mut(id.0).and_then(|coro| coro.stack.take());
            if let Some(stack) = stack {
                trace!("recycling stack of {:?}", id);
                self.stack_pool.give_stack(stack);
            }
        }
    }

    /*
     * Coroutine lifecycle
     */

    pub(crate) fn spawn(&mut self, task: Box<dyn FnOnce()>, opts: Options) -> Handle {
        let stack = self.stack_pool.take_stack(opts.stack_size);
        let mut context = Context::empty();
        context.prepare(&stack, routine_entry);

        let id = Handle(self.coros.insert(Coroutine::new(task, stack, context, opts.name)));
        debug!("spawning coroutine {:?} ({})", id, self.coros[id].name());

        // Enter the new coroutine immediately; the spawner waits its turn at
        // the ready tail.
        self.transfer(Some(Park::Ready), State::Running, Some(id));
        id
    }

    pub(crate) fn running(&self) -> Option<Handle> {
        self.current
    }

    pub(crate) fn state(&self, id: Handle) -> State {
        assert!(self.coros.contains(id.0), "state of a destroyed coroutine");
        self.coros[id].state
    }

    pub(crate) fn sched(&mut self) {
        self.transfer(Some(Park::Ready), State::Running, None);
    }

    pub(crate) fn join(&mut self, target: Handle) {
        assert!(self.current.is_some(), "join from outside a coroutine");
        assert!(self.coros.contains(target.0), "join of a destroyed coroutine");
        assert!(Some(target) != self.current, "join of the running coroutine");
        assert!(
            self.coros[target].state != State::Completed,
            "join of a completed coroutine"
        );

        self.transfer(Some(Park::Join(target)), State::BlockedJoin, None);
    }

    pub(crate) fn suspend(&mut self, id: Handle) {
        assert!(self.coros.contains(id.0), "suspend of a destroyed coroutine");

        // A blocked send is cancelled by orphaning its pending message; the
        // message stays behind and is delivered like a signal.
        if let Some(message) = self.coros[id].sent.take() {
            if let Some(message) = self.messages.get_mut(message) {
                message.sender = None;
            }
        }

        if self.coros[id].parked.is_some() {
            self.unpark(id);
        }

        self.coros[id].state = State::Suspended;

        if Some(id) == self.current {
            self.transfer(None, State::Suspended, None);
        }
    }

    pub(crate) fn resume(&mut self, id: Handle) {
        assert!(self.coros.contains(id.0), "resume of a destroyed coroutine");
        assert!(Some(id) != self.current, "resume of the running coroutine");
        assert!(
            self.coros[id].state != State::Completed,
            "resume of a completed coroutine"
        );

        // Strip any residual queue membership first.
        self.suspend(id);

        self.coros[id].state = State::Running;
        self.park(Park::Ready, id);
    }

    pub(crate) fn destroy(&mut self, id: Handle) {
        assert!(self.coros.contains(id.0), "destroy of a destroyed coroutine");
        assert!(Some(id) != self.current, "destroy of the running coroutine");
        debug!("destroying coroutine {:?} ({})", id, self.coros[id].name());

        self.suspend(id);
        self.drain_joiners(id);

        let mut coro = self.coros.remove(id.0);
        if let Some(stack) = coro.stack.take() {
            self.stack_pool.give_stack(stack);
        }
    }

    /// Wake everything joined on `id`; each waiter returns from its `join`.
    fn drain_joiners(&mut self, id: Handle) {
        loop {
            let mut joiners = self.coros[id].joiners;
            let joined = list::pop_front(&mut self.coros, &mut joiners);
            self.coros[id].joiners = joiners;
            match joined {
                Some(joined) => self.resume(joined),
                None => break,
            }
        }
    }

    /*
     * Queues and messaging
     */

    pub(crate) fn queue_create(&mut self) -> Queue {
        let queue = Queue(self.queues.insert(MessageQueue::new()));
        trace!("created queue {:?}", queue);
        queue
    }

    pub(crate) fn queue_destroy(&mut self, queue: Queue) {
        assert!(self.queues.contains(queue.0), "destroy of a destroyed queue");
        debug!("destroying queue {:?}", queue);

        // Pending messages are dropped; senders still blocked on them are
        // resumed and never learn the message was lost.
        while self.pending_messages(queue) {
            self.dequeue_message(queue);
        }

        // Parked receivers resume, find the queue gone, and deliver nothing.
        loop {
            let mut receivers = self.queues[queue].receivers;
            let receiver = list::pop_front(&mut self.coros, &mut receivers);
            self.queues[queue].receivers = receivers;
            match receiver {
                Some(receiver) => self.resume(receiver),
                None => break,
            }
        }

        self.queues.remove(queue.0);
    }

    pub(crate) fn send(&mut self, queue: Queue, message: usize) {
        let sender = self.current.expect("send from outside a coroutine");
        assert!(self.queues.contains(queue.0), "send to a destroyed queue");

        self.send_message(queue, message, Some(sender), None);
    }

    pub(crate) fn signal(&mut self, queue: Queue, message: usize) {
        assert!(self.queues.contains(queue.0), "signal to a destroyed queue");

        self.send_message(queue, message, None, None);
    }

    pub(crate) fn post(&mut self, queue: Queue, message: usize, reply_queue: Queue) {
        assert!(self.queues.contains(queue.0), "post to a destroyed queue");

        self.send_message(queue, message, None, Some(reply_queue));
    }

    pub(crate) fn call(&mut self, queue: Queue, message: usize, reply_queue: Queue) -> Option<usize> {
        assert!(self.current.is_some(), "call from outside a coroutine");
        assert!(self.queues.contains(queue.0), "call to a destroyed queue");
        assert!(
            self.queues.contains(reply_queue.0),
            "call with a destroyed reply queue"
        );

        self.send_message(queue, message, None, Some(reply_queue));
        self.recv_message(reply_queue).0
    }

    pub(crate) fn wait(&mut self, queue: Queue) -> Option<usize> {
        assert!(self.current.is_some(), "wait from outside a coroutine");
        assert!(self.queues.contains(queue.0), "wait on a destroyed queue");

        self.recv_message(queue).0
    }

    pub(crate) fn recv(&mut self, queue: Queue) -> (Option<usize>, Option<Queue>) {
        assert!(self.current.is_some(), "recv from outside a coroutine");
        assert!(self.queues.contains(queue.0), "recv on a destroyed queue");

        self.recv_message(queue)
    }

    pub(crate) fn read(&mut self, queue: Queue) -> Option<usize> {
        assert!(self.queues.contains(queue.0), "read from a destroyed queue");

        if self.pending_messages(queue) {
            self.recv_message(queue).0
        } else {
            None
        }
    }

    /// Primitive send. With a receiver parked on the queue, this is a
    /// rendezvous: the message is delivered and control handed to the
    /// receiver before the caller runs again. Otherwise the message queues
    /// up, and a named sender blocks on it until it is consumed.
    fn send_message(
        &mut self,
        queue: Queue,
        payload: usize,
        sender: Option<Handle>,
        reply: Option<Queue>,
    ) {
        let receiver = {
            let mut receivers = self.queues[queue].receivers;
            let receiver = list::pop_front(&mut self.coros, &mut receivers);
            self.queues[queue].receivers = receivers;
            receiver
        };

        match receiver {
            Some(receiver) => {
                // The receiver is woken right here; the message carries no
                // sender for it to wake again at the dequeue.
                self.enqueue_message(queue, payload, None, reply);
                self.transfer(Some(Park::Ready), State::Running, Some(receiver));
            }
            None => self.enqueue_message(queue, payload, sender, reply),
        }
    }

    /// Primitive receive. Parks until a message is pending, then delivers
    /// the head message and wakes its sender if one is still blocked on it.
    /// Delivers nothing if the wakeup was the queue being destroyed or this
    /// coroutine being forcibly suspended.
    fn recv_message(&mut self, queue: Queue) -> (Option<usize>, Option<Queue>) {
        if !self.pending_messages(queue) {
            self.transfer(Some(Park::Recv(queue)), State::BlockedRecv, None);

            if !self.queues.contains(queue.0) {
                return (None, None);
            }
        }

        self.dequeue_message(queue)
    }

    fn pending_messages(&self, queue: Queue) -> bool {
        !self.queues[queue].messages.is_empty()
    }

    fn enqueue_message(
        &mut self,
        queue: Queue,
        payload: usize,
        sender: Option<Handle>,
        reply: Option<Queue>,
    ) {
        let message = self.messages.insert(Message {
            payload,
            sender,
            reply,
        });
        self.queues[queue].messages.push_back(message);

        if let Some(sender) = sender {
            // Blocked senders are reachable only through the message record.
            self.coros[sender].sent = Some(message);
            self.transfer(None, State::BlockedSend, None);
        }
    }

    fn dequeue_message(&mut self, queue: Queue) -> (Option<usize>, Option<Queue>) {
        let Some(message) = self.queues[queue].messages.pop_front() else {
            return (None, None);
        };
        let Message {
            payload,
            sender,
            reply,
        } = self.messages.remove(message);

        if let Some(sender) = sender {
            self.coros[sender].sent = None;
            self.resume(sender);
        }

        (Some(payload), reply)
    }
}

/// First frame of every coroutine, entered once on its fresh stack.
extern "C" fn routine_entry() {
    let rt = Runtime::current();
    let id = rt.current.expect("routine entry without a current coroutine");
    trace!("entering coroutine {:?} ({})", id, rt.coros[id].name());

    let task = rt.coros[id].task.take().expect("coroutine entered twice");
    if let Err(cause) = panic::catch_unwind(AssertUnwindSafe(task)) {
        let msg = match cause.downcast_ref::<&'static str>() {
            Some(s) => *s,
            None => match cause.downcast_ref::<String>() {
                Some(s) => &s[..],
                None => "Box<Any>",
            },
        };
        let rt = Runtime::current();
        error!("coroutine '{}' panicked at '{}'", rt.coros[id].name(), msg);
    }

    let rt = Runtime::current();
    rt.drain_joiners(id);

    debug!("coroutine {:?} ({}) completed", id, rt.coros[id].name());
    rt.coros[id].state = State::Completed;
    rt.exited = Some(id);

    let next = rt.ready_pop();
    rt.current = next;
    let jump = match next {
        Some(next) => {
            let coro = &mut rt.coros[next];
            coro.state = State::Running;
            coro.context.ptr()
        }
        None => rt.root_context.ptr(),
    };

    // This frame's stack stays in use until the jump lands; the other side
    // releases it through the exited slot.
    unsafe { Context::set(jump) }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::Runtime;
    use crate::coroutine::State;

    #[test]
    fn spawn_enters_immediately() {
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        let coro = crate::spawn(move || flag.set(true));

        // The new coroutine ran to completion before spawn returned.
        assert!(ran.get());
        assert_eq!(crate::state(coro), State::Completed);
        crate::destroy(coro);
    }

    #[test]
    fn current_is_none_on_the_host() {
        assert_eq!(crate::current(), None);
        let observed = Rc::new(Cell::new(None));
        let inner = Rc::clone(&observed);
        let coro = crate::spawn(move || inner.set(crate::current()));
        assert_eq!(observed.get(), Some(coro));
        assert_eq!(crate::current(), None);
        crate::destroy(coro);
    }

    #[test]
    fn sched_on_an_idle_host_is_a_no_op() {
        crate::sched();
    }

    #[test]
    fn stacks_are_recycled_across_spawns() {
        for _ in 0..5 {
            let coro = crate::spawn(|| {});
            crate::destroy(coro);
        }
        // Five sequential coroutines never need more than the one stack.
        assert_eq!(Runtime::current().stack_pool.cached(), 1);
    }

    #[test]
    fn runtime_is_lazily_initialized_from_either_side() {
        // First touch from the host is queue creation, not spawn.
        let queue = Runtime::current().queue_create();
        crate::signal(queue, 7);
        assert_eq!(crate::read(queue), Some(7));
        crate::queue_destroy(queue);
    }
}
