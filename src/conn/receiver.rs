//! Receiver path (§4.2): validates arriving segments, reassembles them in
//! order, and drains the result to the application as buffer space allows.

use std::io::{self, Write};

use crate::io::Conn;
use crate::segment::{Flags, Segment};
use crate::seqno::{wrapping_le, wrapping_lt};

use super::{ConnFlags, ConnState, DestroyReason};

impl<C: Conn> ConnState<C> {
    /// Inbound delivery (§6): `host invokes on_segment(state, segment, len)`.
    /// Decoding and checksum verification happen here, inside the engine.
    pub(crate) fn on_segment(&mut self, bytes: &[u8]) {
        let segment = match Segment::decode(bytes) {
            Ok(segment) => segment,
            Err(e) => {
                tracing::debug!(error = %e, "dropping malformed segment");
                return;
            }
        };

        self.apply_ack(segment.header.ackno);

        let payload_len = segment.payload_len();
        if payload_len == 0 && !segment.header.flags.contains(Flags::FIN) {
            tracing::trace!(ackno = segment.header.ackno, "pure ack");
            return;
        }

        let seqno = segment.header.seqno;

        // Already-delivered data, or a segment we already hold out of
        // order: an exact duplicate. Still acked so the peer converges
        // (§4.2 step 3, §7).
        if wrapping_lt(seqno, self.recv_window_lo) || self.already_buffered(seqno) {
            tracing::trace!(seqno, "duplicate segment");
            self.pending_ack = Some(self.recv_window_lo);
            return;
        }

        if !self.fits_recv_window(seqno, payload_len) {
            tracing::debug!(seqno, payload_len, "out-of-window segment; resyncing peer");
            self.pending_ack = Some(self.recv_window_lo);
            return;
        }

        self.insert_reassembly(segment);
        self.drain_contiguous();
        self.pending_ack = Some(self.recv_window_lo);
    }

    /// Upper-bound check only: by the time this runs, the duplicate check
    /// above has already ruled out `seqno < recv_window_lo`.
    fn fits_recv_window(&self, seqno: u32, payload_len: usize) -> bool {
        let hi = self.recv_window_lo.wrapping_add(self.cfg.recv_window);
        let end = seqno.wrapping_add(payload_len as u32);
        wrapping_le(end, hi)
    }

    fn already_buffered(&self, seqno: u32) -> bool {
        self.reassembly_buffer
            .binary_search_by_key(&seqno, |s| s.header.seqno)
            .is_ok()
    }

    fn insert_reassembly(&mut self, segment: Segment) {
        match self
            .reassembly_buffer
            .binary_search_by_key(&segment.header.seqno, |s| s.header.seqno)
        {
            Ok(i) => self.reassembly_buffer[i] = segment,
            Err(i) => self.reassembly_buffer.insert(i, segment),
        }
    }

    /// §4.2 steps 5-7: moves the contiguous prefix into `output_buffer`,
    /// advancing `recv_window_lo` past each segment (plus the FIN phantom
    /// byte, §9).
    fn drain_contiguous(&mut self) {
        while let Some(front) = self.reassembly_buffer.front() {
            if front.header.seqno != self.recv_window_lo {
                break;
            }
            let segment = self.reassembly_buffer.pop_front().unwrap();
            let advance = segment.payload_len() as u32
                + if segment.header.flags.contains(Flags::FIN) {
                    1
                } else {
                    0
                };
            self.recv_window_lo = self.recv_window_lo.wrapping_add(advance);
            self.output_buffer.push_back(segment);
        }
        self.drain_output();
    }

    /// Output to application (§4.2): writes in-order payloads while
    /// downstream buffer space allows, deferring otherwise.
    pub(crate) fn drain_output(&mut self) {
        loop {
            let Some(head) = self.output_buffer.front() else {
                return;
            };
            let needed = head.payload_len();

            let space = match self.conn.buffer_space() {
                Ok(space) => space,
                Err(e) => {
                    tracing::warn!(error = %e, "application buffer space fatal; tearing down");
                    self.destroy_reason = Some(DestroyReason::ApplicationFatal);
                    return;
                }
            };
            if space < needed {
                return;
            }

            let segment = self.output_buffer.pop_front().unwrap();
            match self.conn.write(&segment.payload) {
                Ok(n) if n == segment.payload_len() => {
                    if segment.header.flags.contains(Flags::FIN) {
                        tracing::debug!("delivered end-of-stream to application");
                        self.flags.insert(ConnFlags::FIN_RECEIVED);
                    }
                }
                Ok(n) => {
                    tracing::warn!(
                        wrote = n,
                        expected = segment.payload_len(),
                        "application accepted fewer bytes than it advertised space for"
                    );
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    // Host reported space but isn't ready; retry next tick.
                    self.output_buffer.push_front(segment);
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "application output failed; tearing down");
                    self.destroy_reason = Some(DestroyReason::ApplicationFatal);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::conn::test_support::StubConn;
    use std::time::Duration;

    fn cfg() -> Config {
        Config::new(4096, 4096, Duration::from_millis(100), Duration::from_millis(10))
    }

    fn data_segment(seqno: u32, ackno: u32, payload: &[u8]) -> Vec<u8> {
        Segment::new(seqno, ackno, Flags::ACK, 4096, payload.to_vec()).encode()
    }

    #[test]
    fn clean_single_segment_is_delivered() {
        let mut conn = ConnState::new(StubConn::default(), cfg());
        conn.on_segment(&data_segment(1, 1, b"hello"));

        assert_eq!(conn.conn.delivered, b"hello");
        assert_eq!(conn.recv_window_lo, 6);
        assert_eq!(conn.pending_ack, Some(6));
    }

    #[test]
    fn out_of_order_segment_waits_for_prefix() {
        let mut conn = ConnState::new(StubConn::default(), cfg());
        conn.on_segment(&data_segment(6, 1, b"world"));
        assert!(conn.conn.delivered.is_empty());
        assert_eq!(conn.reassembly_buffer.len(), 1);

        conn.on_segment(&data_segment(1, 1, b"hello"));
        assert_eq!(conn.conn.delivered, b"helloworld");
        assert_eq!(conn.recv_window_lo, 11);
    }

    #[test]
    fn duplicate_segment_is_delivered_once_but_still_acked() {
        let mut conn = ConnState::new(StubConn::default(), cfg());
        conn.on_segment(&data_segment(1, 1, b"hello"));
        conn.on_segment(&data_segment(1, 1, b"hello"));

        assert_eq!(conn.conn.delivered, b"hello");
        assert_eq!(conn.pending_ack, Some(6));
    }

    #[test]
    fn segment_at_window_edge_is_accepted_one_byte_further_is_not() {
        // recv_window_lo starts at 1, recv_window = 5, so the edge is 6.
        let mut cfg = cfg();
        cfg.recv_window = 5;

        let mut at_edge = ConnState::new(StubConn::default(), cfg);
        at_edge.on_segment(&data_segment(5, 1, b"x")); // end = 6, accepted
        assert_eq!(at_edge.reassembly_buffer.len(), 1);

        let mut past_edge = ConnState::new(StubConn::default(), cfg);
        past_edge.on_segment(&data_segment(6, 1, b"x")); // end = 7, rejected
        assert_eq!(past_edge.reassembly_buffer.len(), 0);
    }

    #[test]
    fn fin_sets_fin_received_and_advances_phantom_byte() {
        let mut conn = ConnState::new(StubConn::default(), cfg());
        let fin = Segment::new(1, 1, Flags::ACK | Flags::FIN, 4096, Vec::new()).encode();
        conn.on_segment(&fin);

        assert!(conn.flags.contains(ConnFlags::FIN_RECEIVED));
        assert_eq!(conn.recv_window_lo, 2);
        assert_eq!(conn.pending_ack, Some(2));
    }

    #[test]
    fn backpressure_defers_delivery() {
        let mut stub = StubConn::default();
        stub.bufspace = 0;
        let mut conn = ConnState::new(stub, cfg());
        conn.on_segment(&data_segment(1, 1, b"hello"));

        assert!(conn.conn.delivered.is_empty());
        assert_eq!(conn.output_buffer.len(), 1);

        conn.conn.bufspace = 10;
        conn.drain_output();
        assert_eq!(conn.conn.delivered, b"hello");
    }
}
