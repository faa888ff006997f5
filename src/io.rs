//! The two external collaborators named in §6: the datagram transport and
//! the application stream. Out of scope to implement (§1); the engine only
//! consumes their primitives through these traits.

use std::io::{Read, Write};

/// `conn_send` / `conn_remove` (§6): fire-and-forget datagram delivery.
pub trait Datagram {
    /// Best-effort send. A transport failure is transient (§7) and is never
    /// surfaced past a log line; the retransmission timer is the recovery
    /// path.
    fn send(&mut self, bytes: &[u8]);

    /// Tears down the underlying transport endpoint on connection teardown.
    fn remove(&mut self) {}
}

/// `conn_input` / `conn_output` / `conn_bufspace` (§6).
///
/// `Read`/`Write` already express the first two idiomatically: `Ok(0)` from
/// `read` is end-of-stream, `ErrorKind::WouldBlock` is "no data available
/// right now," and a short `write` is ordinary back-pressure. Only
/// `buffer_space` needs a dedicated method.
pub trait AppIo: Read + Write {
    /// Bytes currently writable downstream. `Err` stands in for the
    /// `bufspace < 0` fatal sentinel (§7).
    fn buffer_space(&self) -> std::io::Result<usize>;
}

/// A connection's opaque handle to the host (§3: `conn`), bundling both
/// collaborators a `ConnState` needs.
pub trait Conn: Datagram + AppIo {}

impl<T: Datagram + AppIo> Conn for T {}
