//! A reliable byte-stream transport layered over an unreliable datagram
//! service: sliding-window delivery, cumulative acknowledgment, and
//! in-order reassembly, all driven by a host through a small set of entry
//! points (§1, §6).
//!
//! The host owns the datagram socket and the application's stream buffers;
//! this crate owns only the protocol state machine. See [`io::Conn`] for
//! the boundary between the two.

pub mod checksum;
pub mod config;
mod conn;
pub mod error;
pub mod io;
pub mod registry;
pub mod segment;
mod seqno;

pub use config::Config;
pub use conn::{ConnState, DestroyReason};
pub use error::SegmentError;
pub use io::{AppIo, Conn, Datagram};
pub use registry::{ConnId, Engine};
pub use segment::{Flags, Segment};
