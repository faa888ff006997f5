//! Periodic timer entry point (§4.4): the host calls this on a fixed
//! cadence (`cfg.timer_interval`) to drive retransmission, window-gated
//! promotion, and standalone acks.

use std::time::Instant;

use crate::config::RETRANSMIT_LIMIT;
use crate::io::Conn;
use crate::segment::Segment;

use super::{ConnState, DestroyReason};

impl<C: Conn> ConnState<C> {
    /// §4.4: on every tick, promote what the window now allows, retransmit
    /// anything overdue, flush a standalone ack if nothing else carried one
    /// piggybacked, and retry delivering anything still stuck behind
    /// application back-pressure.
    pub fn on_timer(&mut self, now: Instant) {
        if self.is_destroyed() {
            return;
        }

        while let Some(segment) = self.promote_window_gated_head(now) {
            self.finalize_and_send(segment, now);
        }

        if self.retransmit_if_due(now) {
            return;
        }

        self.emit_pending_ack();
        self.drain_output();
        self.check_teardown();
    }

    /// Stamps the piggybacked ack (if any) and hands the segment to the
    /// transport (§4.3). Consumes `pending_ack` so `emit_pending_ack` below
    /// becomes a no-op this tick.
    fn finalize_and_send(&mut self, segment: Segment, now: Instant) {
        let to_send = match self.pending_ack.take() {
            Some(ackno) => segment.with_ack(ackno),
            None => segment,
        };
        self.last_sent(now, &to_send);
        self.conn.send(&to_send.encode());
    }

    fn last_sent(&mut self, now: Instant, segment: &Segment) {
        if let Some(unacked) = self
            .unacked_buffer
            .iter_mut()
            .find(|u| u.segment.header.seqno == segment.header.seqno)
        {
            unacked.segment = segment.clone();
            unacked.last_sent_time = now;
        }
    }

    /// §4.1, §8: retransmits the oldest unacked segment once `rt_timeout`
    /// has elapsed, destroying the connection once `RETRANSMIT_LIMIT` is
    /// exceeded. Returns `true` if the connection was destroyed this tick.
    fn retransmit_if_due(&mut self, now: Instant) -> bool {
        let Some(unacked) = self.unacked_buffer.front_mut() else {
            return false;
        };

        if now.duration_since(unacked.last_sent_time) < self.cfg.rt_timeout {
            return false;
        }

        if unacked.retransmit_count >= RETRANSMIT_LIMIT {
            tracing::warn!(
                seqno = unacked.segment.header.seqno,
                "retransmit cap exceeded; tearing down"
            );
            self.destroy_reason = Some(DestroyReason::RetransmitCapExceeded);
            return true;
        }

        unacked.retransmit_count += 1;
        unacked.last_sent_time = now;
        let segment = match self.pending_ack.take() {
            Some(ackno) => unacked.segment.with_ack(ackno),
            None => unacked.segment.clone(),
        };
        tracing::debug!(
            seqno = segment.header.seqno,
            attempt = self.unacked_buffer.front().unwrap().retransmit_count,
            "retransmitting"
        );
        self.conn.send(&segment.encode());
        false
    }

    /// §4.3: a standalone ack is only needed when nothing piggybacked it.
    fn emit_pending_ack(&mut self) {
        if let Some(ackno) = self.pending_ack.take() {
            let ack = Segment::new(self.seqno_next, ackno, crate::segment::Flags::ACK, self.recv_window(), Vec::new());
            self.conn.send(&ack.encode());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::conn::test_support::StubConn;
    use crate::segment::Flags;
    use std::time::Duration;

    fn cfg() -> Config {
        Config::new(4096, 4096, Duration::from_millis(100), Duration::from_millis(10))
    }

    #[test]
    fn readable_data_is_sent_on_tick() {
        let mut conn = ConnState::new(StubConn::with_input(b"hello"), cfg());
        conn.on_readable();
        conn.on_timer(Instant::now());

        assert_eq!(conn.conn.sent.len(), 1);
        let sent = Segment::decode(&conn.conn.sent[0]).unwrap();
        assert_eq!(sent.payload, b"hello");
    }

    #[test]
    fn unacked_segment_is_retransmitted_after_timeout() {
        let mut conn = ConnState::new(StubConn::with_input(b"hi"), cfg());
        conn.on_readable();

        let t0 = Instant::now();
        conn.on_timer(t0);
        assert_eq!(conn.conn.sent.len(), 1);

        conn.on_timer(t0 + Duration::from_millis(50));
        assert_eq!(conn.conn.sent.len(), 1, "not yet due");

        conn.on_timer(t0 + Duration::from_millis(150));
        assert_eq!(conn.conn.sent.len(), 2, "retransmitted once due");
        assert_eq!(conn.unacked_buffer[0].retransmit_count, 1);
    }

    #[test]
    fn exceeding_retransmit_limit_destroys_connection() {
        let mut conn = ConnState::new(StubConn::with_input(b"hi"), cfg());
        conn.on_readable();

        let mut t = Instant::now();
        conn.on_timer(t);
        for _ in 0..RETRANSMIT_LIMIT {
            t += Duration::from_millis(150);
            conn.on_timer(t);
        }

        assert!(conn.is_destroyed());
        assert_eq!(conn.destroy_reason(), Some(DestroyReason::RetransmitCapExceeded));
    }

    #[test]
    fn pure_ack_is_piggybacked_on_outgoing_data() {
        let mut conn = ConnState::new(StubConn::with_input(b"hi"), cfg());
        conn.on_readable();
        conn.pending_ack = Some(42);
        conn.on_timer(Instant::now());

        let sent = Segment::decode(&conn.conn.sent[0]).unwrap();
        assert!(sent.header.flags.contains(Flags::ACK));
        assert_eq!(sent.header.ackno, 42);
        assert!(conn.pending_ack.is_none());
    }

    #[test]
    fn standalone_ack_sent_when_nothing_to_piggyback_on() {
        let mut conn = ConnState::new(StubConn::default(), cfg());
        conn.pending_ack = Some(7);
        conn.on_timer(Instant::now());

        assert_eq!(conn.conn.sent.len(), 1);
        let sent = Segment::decode(&conn.conn.sent[0]).unwrap();
        assert_eq!(sent.header.ackno, 7);
        assert_eq!(sent.payload_len(), 0);
    }
}
