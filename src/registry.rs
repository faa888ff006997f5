//! The process-wide connection registry (§5): owns every `ConnState` and
//! drives the two host-facing entry points, `on_timer` and `on_segment`,
//! across all of them.

use std::collections::HashMap;
use std::time::Instant;

use crate::config::Config;
use crate::conn::ConnState;
use crate::io::Conn;

/// Opaque handle a host uses to address a connection across calls. The
/// registry itself never inspects the value; callers choose one and must
/// keep it unique.
pub type ConnId = u64;

/// Owns every live `ConnState` and the order they were inserted in.
///
/// Iteration for `on_timer` walks connections **most-recently-inserted
/// first** (§5), so `insertion_order` is a stack, not just a hash map's
/// arbitrary order.
#[derive(Debug, Default)]
pub struct Engine<C> {
    conns: HashMap<ConnId, ConnState<C>>,
    insertion_order: Vec<ConnId>,
}

impl<C: Conn> Engine<C> {
    pub fn new() -> Self {
        Engine {
            conns: HashMap::new(),
            insertion_order: Vec::new(),
        }
    }

    /// Registers a freshly accepted or opened connection (§4, §5).
    pub fn add_connection(&mut self, id: ConnId, conn: C, cfg: Config) {
        tracing::debug!(?id, "connection registered");
        self.conns.insert(id, ConnState::new(conn, cfg));
        self.insertion_order.push(id);
    }

    /// `conn_input` trigger (§6): the application has bytes ready to send.
    pub fn on_readable(&mut self, id: ConnId) {
        if let Some(conn) = self.conns.get_mut(&id) {
            conn.on_readable();
        }
    }

    /// A segment arrived from the transport addressed to `id`; decoding and
    /// validation happen inside `ConnState` (§4.2, §6).
    pub fn on_segment(&mut self, id: ConnId, bytes: &[u8]) {
        if let Some(conn) = self.conns.get_mut(&id) {
            conn.on_segment(bytes);
        }
    }

    /// Drives the periodic timer (§4.4) across every registered connection,
    /// in last-inserted-first order (§5), tearing down and removing any
    /// connection whose `destroy_reason` gets set this pass.
    ///
    /// Returns `true` once the registry is empty, signalling the host may
    /// shut the process down (§4.5).
    pub fn on_timer(&mut self, now: Instant) -> bool {
        for id in self.insertion_order.iter().rev() {
            if let Some(conn) = self.conns.get_mut(id) {
                conn.on_timer(now);
            }
        }

        let mut to_be_deleted = Vec::new();
        for id in &self.insertion_order {
            if self.conns.get(id).is_some_and(ConnState::is_destroyed) {
                to_be_deleted.push(*id);
            }
        }
        for id in to_be_deleted {
            if let Some(mut conn) = self.conns.remove(&id) {
                tracing::debug!(?id, reason = ?conn.destroy_reason(), "connection destroyed");
                conn.teardown();
            }
            self.insertion_order.retain(|existing| *existing != id);
        }

        self.conns.is_empty()
    }

    /// Exposes the host-provided handle of a still-registered connection,
    /// e.g. so a caller can inspect what the application side received.
    pub fn conn(&self, id: ConnId) -> Option<&C> {
        self.conns.get(&id).map(ConnState::host)
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::test_support::StubConn;
    use std::time::Duration;

    fn cfg() -> Config {
        Config::new(4096, 4096, Duration::from_millis(100), Duration::from_millis(10))
    }

    #[test]
    fn timer_drains_readable_data_and_drops_finished_connections() {
        let mut engine = Engine::new();
        let mut stub = StubConn::with_input(b"hi");
        stub.eof = true;
        engine.add_connection(1, stub, cfg());

        engine.on_readable(1);
        assert_eq!(engine.len(), 1);

        let t0 = Instant::now();
        engine.on_timer(t0);

        // Peer acks everything (including the FIN's phantom byte) and
        // closes its own side in the same segment.
        let close = crate::segment::Segment::new(
            1,
            4,
            crate::segment::Flags::ACK | crate::segment::Flags::FIN,
            4096,
            Vec::new(),
        );
        engine.on_segment(1, &close.encode());

        let empty = engine.on_timer(t0 + Duration::from_millis(20));
        assert!(empty);
        assert_eq!(engine.len(), 0);
    }

    #[test]
    fn timer_order_is_most_recently_inserted_first() {
        let mut engine = Engine::new();
        engine.add_connection(1, StubConn::default(), cfg());
        engine.add_connection(2, StubConn::default(), cfg());
        assert_eq!(engine.insertion_order, vec![1, 2]);
    }
}
