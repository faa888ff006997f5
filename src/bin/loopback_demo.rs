//! Sends a short message across a pair of connections wired directly to
//! each other in-process, with a slice of outbound datagrams dropped to
//! exercise retransmission. No real socket or TUN device involved (§1 is a
//! non-goal); this just demonstrates the engine end to end.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::rc::Rc;
use std::time::{Duration, Instant};

use ctcp::{AppIo, Config, Datagram, Engine};

/// A datagram channel between two `Peer`s that silently drops every Nth
/// outbound segment, standing in for the unreliable network (§1).
struct LossyLink {
    outbox: Rc<RefCell<VecDeque<Vec<u8>>>>,
    sent: u32,
    drop_every: u32,
}

impl Datagram for LossyLink {
    fn send(&mut self, bytes: &[u8]) {
        self.sent += 1;
        if self.drop_every != 0 && self.sent % self.drop_every == 0 {
            println!("   (dropped outbound segment #{})", self.sent);
            return;
        }
        self.outbox.borrow_mut().push_back(bytes.to_vec());
    }
}

/// The application side: a fixed source buffer to read from, and a sink to
/// collect what comes out.
struct Peer {
    link: LossyLink,
    to_send: VecDeque<u8>,
    eof_sent: bool,
    received: Vec<u8>,
}

impl Read for Peer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.to_send.is_empty() {
            if self.eof_sent {
                return Ok(0);
            }
            self.eof_sent = true;
            return Ok(0);
        }
        let n = buf.len().min(self.to_send.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.to_send.pop_front().unwrap();
        }
        Ok(n)
    }
}

impl Write for Peer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.received.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl AppIo for Peer {
    fn buffer_space(&self) -> io::Result<usize> {
        Ok(4096)
    }
}

impl Datagram for Peer {
    fn send(&mut self, bytes: &[u8]) {
        self.link.send(bytes);
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let a_to_b = Rc::new(RefCell::new(VecDeque::new()));
    let b_to_a = Rc::new(RefCell::new(VecDeque::new()));

    let client = Peer {
        link: LossyLink {
            outbox: a_to_b.clone(),
            sent: 0,
            drop_every: 3,
        },
        to_send: b"hello from the loopback demo".iter().copied().collect(),
        eof_sent: false,
        received: Vec::new(),
    };
    let server = Peer {
        link: LossyLink {
            outbox: b_to_a.clone(),
            sent: 0,
            drop_every: 0,
        },
        to_send: VecDeque::new(),
        eof_sent: false,
        received: Vec::new(),
    };

    let mut engine = Engine::new();
    engine.add_connection(1, client, Config::default());
    engine.add_connection(2, server, Config::default());

    let mut now = Instant::now();
    println!(">>> Starting loopback transfer");
    for _ in 0..2_000 {
        engine.on_readable(1);
        engine.on_readable(2);

        while let Some(bytes) = a_to_b.borrow_mut().pop_front() {
            engine.on_segment(2, &bytes);
        }
        while let Some(bytes) = b_to_a.borrow_mut().pop_front() {
            engine.on_segment(1, &bytes);
        }

        now += Duration::from_millis(10);
        if engine.on_timer(now) {
            break;
        }
    }

    println!(">>> Transfer complete, {} connection(s) remain", engine.len());
    if let Some(server) = engine.conn(2) {
        println!(">>> Server received: {:?}", String::from_utf8_lossy(&server.received));
    }
}
