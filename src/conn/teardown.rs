//! Teardown coordinator (§4.5).

use crate::io::Conn;

use super::{ConnFlags, ConnState};

/// Why a connection left the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyReason {
    /// FIN sent and received, input EOF, all data resolved.
    Teardown,
    /// A segment was retransmitted 5 times with no ack (§4.1, §8).
    RetransmitCapExceeded,
    /// The application's output side reported a fatal condition (§7).
    ApplicationFatal,
}

impl<C: Conn> ConnState<C> {
    fn teardown_condition_met(&self) -> bool {
        let required = ConnFlags::FIN_SENT | ConnFlags::FIN_RECEIVED | ConnFlags::EOF_READ;
        self.flags.contains(required)
            && self.send_buffer.is_empty()
            && self.unacked_buffer.is_empty()
    }

    pub(crate) fn check_teardown(&mut self) {
        if self.destroy_reason.is_none() && self.teardown_condition_met() {
            tracing::debug!("teardown condition met: fin/fin/eof and buffers drained");
            self.destroy_reason = Some(DestroyReason::Teardown);
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

    #[test]
    fn not_torn_down_until_all_three_flags_and_empty_buffers() {
        let mut conn = ConnState::new(StubConn::default(), cfg());
        conn.check_teardown();
        assert!(!conn.is_destroyed());

        conn.flags = ConnFlags::FIN_SENT | ConnFlags::FIN_RECEIVED | ConnFlags::EOF_READ;
        conn.check_teardown();
        assert!(conn.is_destroyed());
        assert_eq!(conn.destroy_reason(), Some(DestroyReason::Teardown));
    }
}
