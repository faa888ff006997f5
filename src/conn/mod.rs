//! Per-connection protocol engine (§3): the state machine the rest of this
//! crate exists to support.

use std::collections::VecDeque;
use std::time::Instant;

use crate::config::Config;
use crate::io::Conn;
use crate::segment::Segment;

mod receiver;
mod sender;
mod teardown;
mod timer;

pub use teardown::DestroyReason;

bitflags::bitflags! {
    /// `flags` bitset tracked by the teardown coordinator (§3, §4.5).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ConnFlags: u8 {
        const FIN_SENT = 0b001;
        const FIN_RECEIVED = 0b010;
        const EOF_READ = 0b100;
    }
}

/// An entry in `unacked_buffer` (§3): a transmitted segment still awaiting
/// acknowledgment, plus the bookkeeping the retransmission timer needs.
#[derive(Debug)]
pub(crate) struct Unacked {
    pub segment: Segment,
    pub last_sent_time: Instant,
    pub retransmit_count: u32,
}

/// Per-connection state (§3). Generic over the host-provided transport and
/// application handle (`C: Conn`), so tests can plug in an in-memory stub.
#[derive(Debug)]
pub struct ConnState<C> {
    conn: C,
    cfg: Config,

    seqno_next: u32,
    send_window_lo: u32,
    recv_window_lo: u32,

    send_buffer: VecDeque<Segment>,
    unacked_buffer: VecDeque<Unacked>,
    /// Sorted by `seqno`, accepted-but-out-of-order segments (§3, §4.2).
    reassembly_buffer: VecDeque<Segment>,
    output_buffer: VecDeque<Segment>,
    /// The most recently computed cumulative ack not yet sent. A single
    /// slot is enough: later values subsume earlier ones (§4.3, §9).
    pending_ack: Option<u32>,

    flags: ConnFlags,
    destroy_reason: Option<DestroyReason>,
}

/// The sequence number the original source's `ctcp_init` assigns to the
/// first byte of a freshly opened connection (§9 open question).
const INITIAL_SEQNO: u32 = 1;

impl<C: Conn> ConnState<C> {
    pub fn new(conn: C, cfg: Config) -> Self {
        ConnState {
            conn,
            cfg,
            seqno_next: INITIAL_SEQNO,
            send_window_lo: INITIAL_SEQNO,
            recv_window_lo: INITIAL_SEQNO,
            send_buffer: VecDeque::new(),
            unacked_buffer: VecDeque::new(),
            reassembly_buffer: VecDeque::new(),
            output_buffer: VecDeque::new(),
            pending_ack: None,
            flags: ConnFlags::empty(),
            destroy_reason: None,
        }
    }

    /// Whether this connection's teardown condition has been reached and it
    /// is ready for `Engine` to drop it from the registry.
    pub fn is_destroyed(&self) -> bool {
        self.destroy_reason.is_some()
    }

    pub fn destroy_reason(&self) -> Option<DestroyReason> {
        self.destroy_reason
    }

    /// The host-provided transport/application handle, for callers that
    /// need to inspect it directly (e.g. a demo reading back what arrived).
    pub fn host(&self) -> &C {
        &self.conn
    }

    /// The window advertised to the peer. Fixed for the life of the
    /// connection (dynamic window sizing is a non-goal, §1).
    fn recv_window(&self) -> u16 {
        self.cfg.recv_window.min(u16::MAX as u32) as u16
    }

    /// Tears down the underlying transport endpoint. Buffers drop along with
    /// `self` (§5: "on connection destruction all four buffers are drained
    /// and released").
    pub(crate) fn teardown(&mut self) {
        self.conn.remove();
    }
}
