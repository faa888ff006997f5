/// Errors from decoding a segment off the wire.
///
/// These never reach a caller of the engine (§7): they are logged and the
/// offending segment is discarded.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SegmentError {
    #[error("segment shorter than the {0}-byte header")]
    TooShort(usize),

    #[error("header `len` field ({len}) does not match the {actual} bytes received")]
    LengthMismatch { len: u16, actual: usize },

    #[error("checksum mismatch: expected {expected:#06x}, computed {actual:#06x}")]
    ChecksumMismatch { expected: u16, actual: u16 },
}
