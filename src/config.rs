use std::time::Duration;

/// Immutable per-connection configuration (§3, §6), supplied at init and
/// never mutated afterward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Bytes the receive window will accept beyond `recv_window_lo`.
    pub recv_window: u32,
    /// Bytes the sender may have outstanding unacknowledged.
    pub send_window: u32,
    /// How long an unacked segment waits before retransmission.
    pub rt_timeout: Duration,
    /// Cadence of the periodic timer (§4.4).
    pub timer_interval: Duration,
}

impl Config {
    pub fn new(
        recv_window: u32,
        send_window: u32,
        rt_timeout: Duration,
        timer_interval: Duration,
    ) -> Self {
        Config {
            recv_window,
            send_window,
            rt_timeout,
            timer_interval,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            recv_window: 16 * 1024,
            send_window: 16 * 1024,
            rt_timeout: Duration::from_millis(1000),
            timer_interval: Duration::from_millis(100),
        }
    }
}

/// The fixed limit of consecutive retransmits of a segment before the
/// connection is destroyed (§4.1, §4.5, §8).
pub const RETRANSMIT_LIMIT: u32 = 5;
