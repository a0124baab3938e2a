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

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::{
    call, current, destroy, join, queue_create, queue_destroy, read, recv, resume, sched, send,
    signal, spawn, state, suspend, suspend_self, wait, Queue, State,
};

#[test]
fn yield_round_robin_is_fifo_fair() {
    let log: Rc<RefCell<Vec<&str>>> = Rc::new(RefCell::new(Vec::new()));

    let mut coros = Vec::new();
    for id in ["A", "B", "C"] {
        let log = Rc::clone(&log);
        coros.push(spawn(move || {
            suspend_self();
            for _ in 0..4 {
                log.borrow_mut().push(id);
                sched();
            }
        }));
    }

    // All three parked themselves immediately; line them up and run them.
    for &coro in &coros {
        resume(coro);
    }
    sched();

    assert_eq!(
        *log.borrow(),
        ["A", "B", "C", "A", "B", "C", "A", "B", "C", "A", "B", "C"]
    );
    for coro in coros {
        assert_eq!(state(coro), State::Completed);
        destroy(coro);
    }
}

#[test]
fn yield_with_nothing_else_ready_continues() {
    let laps = Rc::new(Cell::new(0));
    let counter = Rc::clone(&laps);
    let coro = spawn(move || {
        for _ in 0..3 {
            counter.set(counter.get() + 1);
            sched();
        }
    });

    // With an empty ready queue every yield came straight back.
    assert_eq!(laps.get(), 3);
    assert_eq!(state(coro), State::Completed);
    destroy(coro);
}

#[test]
fn ping_pong_two_clients() {
    const NUM_CLIENTS: usize = 2;
    const NUM_PINGS: usize = 5;

    let requests = queue_create();
    let served: Rc<RefCell<Vec<usize>>> = Rc::new(RefCell::new(Vec::new()));
    let pongs = Rc::new(Cell::new(0usize));

    let client_logs: Vec<Rc<RefCell<Vec<usize>>>> = (0..NUM_CLIENTS)
        .map(|_| Rc::new(RefCell::new(Vec::new())))
        .collect();

    let mut clients = Vec::new();
    for id in 0..NUM_CLIENTS {
        let log = Rc::clone(&client_logs[id]);
        clients.push(spawn(move || {
            let replies = queue_create();
            for _ in 0..NUM_PINGS {
                let pong = call(requests, id, replies).expect("server reply");
                log.borrow_mut().push(pong);
            }
            queue_destroy(replies);
        }));
    }

    let served_log = Rc::clone(&served);
    let pong_count = Rc::clone(&pongs);
    let server = spawn(move || loop {
        let (msg, reply) = recv(requests);
        let Some(client) = msg else { break };
        pong_count.set(pong_count.get() + 1);
        served_log.borrow_mut().push(client);
        signal(reply.expect("ping carries a reply queue"), pong_count.get());
    });

    // The whole exchange ran during the spawns; only the server is left,
    // parked on its queue.
    for &client in &clients {
        assert_eq!(state(client), State::Completed);
    }
    assert_eq!(pongs.get(), NUM_CLIENTS * NUM_PINGS);

    {
        let served = served.borrow();
        for id in 0..NUM_CLIENTS {
            assert_eq!(served.iter().filter(|&&c| c == id).count(), NUM_PINGS);
            // Each client saw its replies in order, with the shared pong
            // counter strictly increasing.
            let log = client_logs[id].borrow();
            assert_eq!(log.len(), NUM_PINGS);
            assert!(log.windows(2).all(|w| w[0] < w[1]));
        }
        // Service alternated between the two clients.
        assert!(served.windows(2).all(|w| w[0] != w[1]));
    }

    queue_destroy(requests);
    sched();
    assert_eq!(state(server), State::Completed);
    destroy(server);
    for client in clients {
        destroy(client);
    }
}

#[test]
fn rendezvous_hands_off_to_the_receiver() {
    let queue = queue_create();
    let seen = Rc::new(Cell::new(None));

    let observed = Rc::clone(&seen);
    let receiver = spawn(move || observed.set(wait(queue)));
    assert_eq!(state(receiver), State::BlockedRecv);

    signal(queue, 0xC0FFEE);

    // The hand-off ran the receiver before signal returned.
    assert_eq!(seen.get(), Some(0xC0FFEE));
    assert_eq!(state(receiver), State::Completed);

    destroy(receiver);
    queue_destroy(queue);
}

#[test]
fn blocking_send_unblocks_when_received() {
    let queue = queue_create();
    let log: Rc<RefCell<Vec<&str>>> = Rc::new(RefCell::new(Vec::new()));

    let sender_log = Rc::clone(&log);
    let sender = spawn(move || {
        send(queue, 42);
        sender_log.borrow_mut().push("send returned");
    });
    assert_eq!(state(sender), State::BlockedSend);

    let receiver_log = Rc::clone(&log);
    let receiver = spawn(move || {
        assert_eq!(state(sender), State::BlockedSend);
        let got = wait(queue);
        receiver_log.borrow_mut().push("received");
        assert_eq!(got, Some(42));
        // Consuming the message made the sender ready again.
        assert_eq!(state(sender), State::Running);
    });

    // The send returned only after the receive dequeued its message.
    assert_eq!(*log.borrow(), ["received", "send returned"]);
    assert_eq!(state(sender), State::Completed);
    assert_eq!(state(receiver), State::Completed);

    destroy(sender);
    destroy(receiver);
    queue_destroy(queue);
}

#[test]
fn queue_destruction_wakes_receivers() {
    let queue = queue_create();
    let observed = Rc::new(Cell::new(None));

    let seen = Rc::clone(&observed);
    let receiver = spawn(move || seen.set(Some(wait(queue))));
    assert_eq!(state(receiver), State::BlockedRecv);

    queue_destroy(queue);
    assert_eq!(state(receiver), State::Running);
    sched();

    // Woken with no message to show for it.
    assert_eq!(observed.get(), Some(None));
    assert_eq!(state(receiver), State::Completed);
    destroy(receiver);
}

#[test]
fn force_suspend_during_receive_delivers_nothing() {
    let queue = queue_create();
    let observed: Rc<Cell<Option<(Option<usize>, Option<Queue>)>>> = Rc::new(Cell::new(None));

    let seen = Rc::clone(&observed);
    let receiver = spawn(move || seen.set(Some(recv(queue))));
    assert_eq!(state(receiver), State::BlockedRecv);

    suspend(receiver);
    assert_eq!(state(receiver), State::Suspended);
    resume(receiver);
    assert_eq!(state(receiver), State::Running);
    sched();

    assert_eq!(observed.get(), Some((None, None)));

    // The queue survived and was left empty of receivers.
    signal(queue, 5);
    assert_eq!(read(queue), Some(5));

    destroy(receiver);
    queue_destroy(queue);
}

#[test]
fn messages_are_delivered_in_send_order() {
    let queue = queue_create();
    signal(queue, 1);
    signal(queue, 2);
    signal(queue, 3);

    let got: Rc<RefCell<Vec<usize>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&got);
    let receiver = spawn(move || {
        for _ in 0..3 {
            sink.borrow_mut().push(wait(queue).unwrap());
        }
    });

    assert_eq!(*got.borrow(), [1, 2, 3]);
    destroy(receiver);
    queue_destroy(queue);
}

#[test]
fn receivers_are_woken_in_park_order() {
    let queue = queue_create();
    let got: Rc<RefCell<Vec<(&str, usize)>>> = Rc::new(RefCell::new(Vec::new()));

    let mut receivers = Vec::new();
    for name in ["first", "second"] {
        let sink = Rc::clone(&got);
        receivers.push(spawn(move || {
            let msg = wait(queue).unwrap();
            sink.borrow_mut().push((name, msg));
        }));
    }

    signal(queue, 10);
    signal(queue, 20);

    assert_eq!(*got.borrow(), [("first", 10), ("second", 20)]);
    for receiver in receivers {
        destroy(receiver);
    }
    queue_destroy(queue);
}

#[test]
fn read_never_blocks() {
    let queue = queue_create();
    assert_eq!(read(queue), None);
    signal(queue, 9);
    assert_eq!(read(queue), Some(9));
    assert_eq!(read(queue), None);
    queue_destroy(queue);
}

#[test]
fn call_round_trip() {
    let requests = queue_create();
    let server = spawn(move || {
        while let (Some(n), Some(reply)) = recv(requests) {
            signal(reply, n + 1);
        }
    });

    let answer = Rc::new(Cell::new(None));
    let got = Rc::clone(&answer);
    let client = spawn(move || {
        let replies = queue_create();
        got.set(call(requests, 41, replies));
        queue_destroy(replies);
    });

    assert_eq!(answer.get(), Some(42));
    assert_eq!(state(client), State::Completed);

    queue_destroy(requests);
    sched();
    assert_eq!(state(server), State::Completed);
    destroy(server);
    destroy(client);
}

#[test]
fn join_parks_until_completion() {
    let queue = queue_create();
    let log: Rc<RefCell<Vec<&str>>> = Rc::new(RefCell::new(Vec::new()));

    let a_log = Rc::clone(&log);
    let a = spawn(move || {
        a_log.borrow_mut().push("a:start");
        wait(queue);
        a_log.borrow_mut().push("a:end");
    });

    let b_log = Rc::clone(&log);
    let b = spawn(move || {
        b_log.borrow_mut().push("b:joining");
        join(a);
        b_log.borrow_mut().push("b:joined");
        assert_eq!(state(a), State::Completed);
    });
    assert_eq!(state(b), State::BlockedJoin);

    signal(queue, 0);

    assert_eq!(*log.borrow(), ["a:start", "b:joining", "a:end", "b:joined"]);
    destroy(a);
    destroy(b);
    queue_destroy(queue);
}

#[test]
fn destroy_resumes_every_joiner_once() {
    let queue = queue_create();
    let log: Rc<RefCell<Vec<&str>>> = Rc::new(RefCell::new(Vec::new()));

    let a = spawn(move || {
        wait(queue);
    });

    let mut joiners = Vec::new();
    for name in ["b", "c"] {
        let sink = Rc::clone(&log);
        joiners.push(spawn(move || {
            join(a);
            sink.borrow_mut().push(name);
        }));
    }
    assert_eq!(state(joiners[0]), State::BlockedJoin);
    assert_eq!(state(joiners[1]), State::BlockedJoin);

    destroy(a);
    assert_eq!(state(joiners[0]), State::Running);
    assert_eq!(state(joiners[1]), State::Running);
    sched();

    assert_eq!(*log.borrow(), ["b", "c"]);
    for joiner in joiners {
        destroy(joiner);
    }
    queue_destroy(queue);
}

#[test]
fn suspend_turns_a_blocking_send_into_a_signal() {
    let queue = queue_create();
    let log: Rc<RefCell<Vec<&str>>> = Rc::new(RefCell::new(Vec::new()));

    let sender_log = Rc::clone(&log);
    let sender = spawn(move || {
        send(queue, 7);
        sender_log.borrow_mut().push("send returned");
    });
    assert_eq!(state(sender), State::BlockedSend);

    suspend(sender);
    assert_eq!(state(sender), State::Suspended);

    // The message stayed behind, now owned by nobody.
    assert_eq!(read(queue), Some(7));
    assert_eq!(state(sender), State::Suspended);

    resume(sender);
    sched();
    assert_eq!(*log.borrow(), ["send returned"]);
    assert_eq!(state(sender), State::Completed);

    destroy(sender);
    queue_destroy(queue);
}

#[test]
fn spawn_inside_a_coroutine() {
    let log: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));

    let outer_log = Rc::clone(&log);
    let outer = spawn(move || {
        outer_log.borrow_mut().push(1);
        let inner_log = Rc::clone(&outer_log);
        let inner = spawn(move || inner_log.borrow_mut().push(2));
        // The child ran to completion before spawn returned here.
        assert_eq!(state(inner), State::Completed);
        outer_log.borrow_mut().push(3);
        destroy(inner);
    });

    assert_eq!(*log.borrow(), [1, 2, 3]);
    destroy(outer);
}

#[test]
fn handle_and_queue_methods_mirror_the_free_functions() {
    let queue = queue_create();
    let seen = Rc::new(Cell::new(None));

    let observed = Rc::clone(&seen);
    let receiver = spawn(move || observed.set(Some(queue.wait())));
    assert_eq!(receiver.state(), State::BlockedRecv);

    receiver.suspend();
    receiver.resume();
    sched();
    assert_eq!(seen.get(), Some(None));

    queue.signal(3);
    assert_eq!(queue.read(), Some(3));

    queue.destroy();
    receiver.destroy();
}

#[test]
fn panicking_task_completes_without_poisoning_the_runtime() {
    let coro = spawn(|| panic!("Panic inside a coroutine!!"));
    assert_eq!(state(coro), State::Completed);
    destroy(coro);

    let after = spawn(|| {});
    assert_eq!(state(after), State::Completed);
    destroy(after);
    assert_eq!(current(), None);
}

#[test]
#[should_panic(expected = "resume of a completed coroutine")]
fn resume_after_completion_panics() {
    let coro = spawn(|| {});
    resume(coro);
}

#[test]
fn join_of_a_completed_coroutine_is_rejected() {
    let target = spawn(|| {});
    assert_eq!(state(target), State::Completed);

    let progressed = Rc::new(Cell::new(false));
    let witness = Rc::clone(&progressed);
    let joiner = spawn(move || {
        // Rejected with a panic, contained at the coroutine's entry frame.
        join(target);
        witness.set(true);
    });

    assert_eq!(state(joiner), State::Completed);
    assert!(!progressed.get());
    destroy(joiner);
    destroy(target);
}

#[test]
#[should_panic(expected = "state of a destroyed coroutine")]
fn stale_handle_panics() {
    let coro = spawn(|| {});
    destroy(coro);
    let _ = state(coro);
}

#[test]
#[should_panic(expected = "wait from outside a coroutine")]
fn blocking_receive_from_the_host_panics() {
    let queue = queue_create();
    let _ = wait(queue);
}

#[test]
#[should_panic(expected = "send from outside a coroutine")]
fn blocking_send_from_the_host_panics() {
    let queue = queue_create();
    send(queue, 1);
}
