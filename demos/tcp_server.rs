//! Single-threaded TCP echo server.
//!
//! One coroutine per connection, plus one accepting new connections. A
//! coroutine that needs a file descriptor to become ready registers it with
//! the epoll instance and waits on a fresh queue; the host thread's poll
//! loop signals that queue when the event arrives. Lines are echoed back
//! with an `ECHO: ` prefix; a line starting with `exit` closes the
//! connection. Try it with `nc 127.0.0.1 1234`.

#[cfg(target_os = "linux")]
fn main() {
    server::run();
}

#[cfg(not(target_os = "linux"))]
fn main() {
    eprintln!("the tcp_server demo drives epoll and only runs on Linux");
}

#[cfg(target_os = "linux")]
mod server {
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::os::unix::io::{AsRawFd, RawFd};
    use std::ptr;
    use std::rc::Rc;

    use routines::{
        destroy, queue_create, queue_destroy, sched, signal, spawn, state, wait, Handle, Queue,
        State,
    };

    const LISTEN_ADDR: &str = "127.0.0.1:1234";

    /// Readiness notification for coroutines: each registered fd has a queue
    /// the poll loop signals when the interest triggers.
    struct Poller {
        epoll_fd: RawFd,
        wakers: RefCell<HashMap<RawFd, Queue>>,
    }

    impl Poller {
        fn new() -> Poller {
            let epoll_fd = unsafe { libc::epoll_create1(0) };
            assert!(epoll_fd >= 0, "epoll_create1 failed");
            Poller {
                epoll_fd,
                wakers: RefCell::new(HashMap::new()),
            }
        }

        /// Park the calling coroutine until `events` trigger on `fd`.
        fn wait_for(&self, fd: RawFd, events: u32) {
            let waker = queue_create();
            self.wakers.borrow_mut().insert(fd, waker);

            let mut event = libc::epoll_event {
                events,
                u64: fd as u64,
            };
            let rc = unsafe { libc::epoll_ctl(self.epoll_fd, libc::EPOLL_CTL_ADD, fd, &mut event) };
            assert_eq!(rc, 0, "epoll_ctl add failed");

            wait(waker);
            queue_destroy(waker);
        }

        /// Block for events, then run every coroutine whose fd fired.
        fn poll_once(&self) {
            let mut events = [libc::epoll_event { events: 0, u64: 0 }; 32];
            let count = unsafe {
                libc::epoll_wait(self.epoll_fd, events.as_mut_ptr(), events.len() as i32, -1)
            };
            assert!(count >= 0, "epoll_wait failed");

            for event in &events[..count as usize] {
                let fd = event.u64 as RawFd;
                unsafe {
                    libc::epoll_ctl(self.epoll_fd, libc::EPOLL_CTL_DEL, fd, ptr::null_mut());
                }
                let waker = self.wakers.borrow_mut().remove(&fd);
                if let Some(waker) = waker {
                    signal(waker, event.events as usize);
                }
            }
        }
    }

    pub fn run() {
        let listener = TcpListener::bind(LISTEN_ADDR).expect("bind");
        println!("[root] listening on {LISTEN_ADDR}");

        let poller = Rc::new(Poller::new());
        let connections: Rc<RefCell<Vec<Handle>>> = Rc::new(RefCell::new(Vec::new()));

        let accept_poller = Rc::clone(&poller);
        let accept_conns = Rc::clone(&connections);
        let _listener_coro =
            spawn(move || listen_for_connections(listener, &accept_poller, &accept_conns));

        loop {
            poller.poll_once();
            sched();

            // Reap connection coroutines that have finished.
            connections.borrow_mut().retain(|&conn| {
                if state(conn) == State::Completed {
                    destroy(conn);
                    false
                } else {
                    true
                }
            });
        }
    }

    fn listen_for_connections(
        listener: TcpListener,
        poller: &Rc<Poller>,
        connections: &RefCell<Vec<Handle>>,
    ) {
        loop {
            poller.wait_for(listener.as_raw_fd(), libc::EPOLLIN as u32);
            let (stream, peer) = listener.accept().expect("accept");
            println!("[conn] new connection from {peer}");

            let conn_poller = Rc::clone(poller);
            let coro = spawn(move || handle_connection(&conn_poller, stream));
            connections.borrow_mut().push(coro);
        }
    }

    fn handle_connection(poller: &Poller, mut stream: TcpStream) {
        let fd = stream.as_raw_fd();
        let mut buf = [0u8; 4096];
        println!("[client #{fd}] listening");

        loop {
            poller.wait_for(fd, libc::EPOLLIN as u32);
            let n = match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) => {
                    eprintln!("[client #{fd}] read failed: {err}");
                    break;
                }
            };
            let line = &buf[..n];

            poller.wait_for(fd, libc::EPOLLOUT as u32);
            if stream
                .write_all(b"ECHO: ")
                .and_then(|()| stream.write_all(line))
                .is_err()
            {
                break;
            }

            if line.starts_with(b"exit") {
                break;
            }
        }

        println!("[client #{fd}] closing");
    }
}
