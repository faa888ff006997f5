//! Sender path (§4.1): segments application bytes, gates transmission on the
//! peer's advertised window, and releases acknowledged segments.

use std::io::{self, Read};
use std::time::Instant;

use crate::io::Conn;
use crate::segment::{Flags, Segment, MAX_SEG_DATA_SIZE};
use crate::seqno::wrapping_lt;

use super::{ConnFlags, ConnState, DestroyReason, Unacked};

impl<C: Conn> ConnState<C> {
    /// Trigger: application has data available. Reads until the source
    /// signals no-more-data-now or end-of-stream (§4.1).
    pub(crate) fn on_readable(&mut self) {
        if self.flags.contains(ConnFlags::EOF_READ) {
            return;
        }

        loop {
            let mut buf = [0u8; MAX_SEG_DATA_SIZE];
            match self.conn.read(&mut buf) {
                Ok(0) => {
                    self.flags.insert(ConnFlags::EOF_READ);
                    self.enqueue_fin();
                    break;
                }
                Ok(n) => self.enqueue_data(&buf[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::warn!(error = %e, "application read failed; tearing down");
                    self.destroy_reason = Some(DestroyReason::ApplicationFatal);
                    break;
                }
            }
        }
    }

    fn enqueue_data(&mut self, data: &[u8]) {
        let seqno = self.seqno_next;
        self.seqno_next = self.seqno_next.wrapping_add(data.len() as u32);

        tracing::trace!(seqno, len = data.len(), "queued data segment");
        self.send_buffer.push_back(Segment::new(
            seqno,
            0,
            Flags::ACK,
            self.recv_window(),
            data.to_vec(),
        ));
    }

    /// Enqueues the FIN exactly once, consuming one sequence number, per the
    /// `EOF_READ` invariant in §4.1.
    fn enqueue_fin(&mut self) {
        let seqno = self.seqno_next;
        self.seqno_next = self.seqno_next.wrapping_add(1);

        tracing::debug!(seqno, "queued FIN segment");
        self.send_buffer.push_back(Segment::new(
            seqno,
            0,
            Flags::ACK | Flags::FIN,
            self.recv_window(),
            Vec::new(),
        ));
        self.flags.insert(ConnFlags::FIN_SENT);
    }

    /// §4.1 window gating: promotes the head of `send_buffer` into
    /// `unacked_buffer` if the peer's window allows it. Returns the
    /// promoted segment so the timer can stamp an ack and transmit it.
    pub(crate) fn promote_window_gated_head(&mut self, now: Instant) -> Option<Segment> {
        let head = self.send_buffer.front()?;
        let occupied = head
            .header
            .seqno
            .wrapping_add(head.payload_len() as u32)
            .wrapping_sub(self.send_window_lo);
        if occupied > self.cfg.send_window {
            return None;
        }

        let segment = self.send_buffer.pop_front().unwrap();
        let to_send = segment.clone();
        self.unacked_buffer.push_back(Unacked {
            segment,
            last_sent_time: now,
            retransmit_count: 0,
        });
        Some(to_send)
    }

    /// §4.1 ack handling on inbound: a cumulative ack releases every unacked
    /// segment whose `seqno` it covers.
    pub(crate) fn apply_ack(&mut self, ackno: u32) {
        if !wrapping_lt(self.send_window_lo, ackno) {
            return;
        }

        while let Some(front) = self.unacked_buffer.front() {
            if wrapping_lt(front.segment.header.seqno, ackno) {
                self.unacked_buffer.pop_front();
            } else {
                break;
            }
        }
        self.send_window_lo = ackno;
    }
}
