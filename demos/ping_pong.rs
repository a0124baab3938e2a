//! Ping-pong between client coroutines and a server coroutine.
//!
//! Clients `call` the server's queue with their id and park until the reply
//! lands on a private reply queue; the server `recv`s each ping together
//! with that reply queue, bumps the client's pong count, and `signal`s the
//! reply back.

use std::cell::RefCell;
use std::rc::Rc;

use routines::{
    call, destroy, queue_create, queue_destroy, recv, sched, signal, spawn, state, Queue, State,
};

const NUM_CLIENTS: usize = 2;
const NUM_PINGS: u32 = 5;

#[derive(Clone, Copy, Default)]
struct ClientStats {
    pings: u32,
    pongs: u32,
}

fn main() {
    let stats = Rc::new(RefCell::new([ClientStats::default(); NUM_CLIENTS]));
    let pings = queue_create();

    let mut clients = Vec::new();
    for id in 0..NUM_CLIENTS {
        println!("[root] starting client {id}");
        let stats = Rc::clone(&stats);
        clients.push(spawn(move || client_task(id, pings, &stats)));
    }

    println!("[root] starting server");
    let server_stats = Rc::clone(&stats);
    let server = spawn(move || server_task(pings, &server_stats));

    while clients.iter().any(|&c| state(c) != State::Completed) {
        sched();
    }
    println!("[root] all clients completed");

    // The server is parked in recv; destroying its queue lets it run off the
    // end of its loop.
    queue_destroy(pings);
    sched();

    destroy(server);
    for client in clients {
        destroy(client);
    }
}

fn server_task(pings: Queue, stats: &RefCell<[ClientStats; NUM_CLIENTS]>) {
    loop {
        println!("[server] waiting for message");
        let (msg, reply) = recv(pings);
        let Some(client) = msg else { break };
        let pongs = {
            let mut stats = stats.borrow_mut();
            stats[client].pongs += 1;
            stats[client].pongs
        };
        println!("[server] pong #{pongs} for client #{client}");
        signal(reply.expect("ping carries a reply queue"), client);
    }
}

fn client_task(id: usize, pings: Queue, stats: &RefCell<[ClientStats; NUM_CLIENTS]>) {
    let replies = queue_create();
    for _ in 0..NUM_PINGS {
        let ping = {
            let mut stats = stats.borrow_mut();
            stats[id].pings += 1;
            stats[id].pings
        };
        println!("[client #{id}] ping #{ping}");
        let response = call(pings, id, replies).expect("server reply");
        let pongs = stats.borrow()[response].pongs;
        println!("[client #{id}] pong #{pongs} from server for client #{response}");
    }
    queue_destroy(replies);
}
