//! The wire record (§3): a fixed header followed by a variable-length
//! payload.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::checksum;
use crate::error::SegmentError;

bitflags::bitflags! {
    /// `flags` bitmask (§3, §6). Values must match what the peer uses.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flags: u32 {
        const ACK = 0x01;
        const FIN = 0x02;
    }
}

/// Header size in bytes: `seqno`(4) + `ackno`(4) + `len`(2) + `flags`(4) +
/// `window`(2) + `cksum`(2).
pub const HEADER_LEN: usize = 18;

/// The largest payload the sender path will stuff into a single segment
/// (§4.1).
pub const MAX_SEG_DATA_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub seqno: u32,
    pub ackno: u32,
    pub len: u16,
    pub flags: Flags,
    pub window: u16,
    pub cksum: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Segment {
    pub fn new(seqno: u32, ackno: u32, flags: Flags, window: u16, payload: Vec<u8>) -> Self {
        let len = (HEADER_LEN + payload.len()) as u16;
        Segment {
            header: Header {
                seqno,
                ackno,
                len,
                flags,
                window,
                cksum: 0,
            },
            payload,
        }
    }

    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Returns a copy stamped with `ackno` and the `ACK` flag set (§4.3
    /// piggybacking). The checksum is recomputed by `encode`.
    pub fn with_ack(&self, ackno: u32) -> Segment {
        let mut segment = self.clone();
        segment.header.ackno = ackno;
        segment.header.flags.insert(Flags::ACK);
        segment
    }

    /// Sequence number one past the last byte (or control bit) this segment
    /// occupies. A bare FIN occupies one sequence number of its own.
    pub fn seq_end(&self) -> u32 {
        let occupied = self.payload.len() as u32 + if self.header.flags.contains(Flags::FIN) {
            1
        } else {
            0
        };
        self.header.seqno.wrapping_add(occupied)
    }

    /// Encodes the segment with the checksum field computed and stamped in.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = self.encode_with_cksum(0);
        let cksum = checksum::compute(&bytes);
        bytes[16] = (cksum >> 8) as u8;
        bytes[17] = (cksum & 0xff) as u8;
        bytes
    }

    fn encode_with_cksum(&self, cksum: u16) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.header.len as usize);
        bytes.write_u32::<BigEndian>(self.header.seqno).unwrap();
        bytes.write_u32::<BigEndian>(self.header.ackno).unwrap();
        bytes.write_u16::<BigEndian>(self.header.len).unwrap();
        bytes
            .write_u32::<BigEndian>(self.header.flags.bits())
            .unwrap();
        bytes.write_u16::<BigEndian>(self.header.window).unwrap();
        bytes.write_u16::<BigEndian>(cksum).unwrap();
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    /// Decodes and checksum-verifies `bytes` (§4.2 step 1).
    pub fn decode(bytes: &[u8]) -> Result<Self, SegmentError> {
        if bytes.len() < HEADER_LEN {
            return Err(SegmentError::TooShort(HEADER_LEN));
        }

        let mut cursor = Cursor::new(bytes);
        let seqno = cursor.read_u32::<BigEndian>().unwrap();
        let ackno = cursor.read_u32::<BigEndian>().unwrap();
        let len = cursor.read_u16::<BigEndian>().unwrap();
        let flags = Flags::from_bits_truncate(cursor.read_u32::<BigEndian>().unwrap());
        let window = cursor.read_u16::<BigEndian>().unwrap();
        let on_wire_cksum = cursor.read_u16::<BigEndian>().unwrap();

        if len as usize != bytes.len() {
            return Err(SegmentError::LengthMismatch {
                len,
                actual: bytes.len(),
            });
        }

        let mut zeroed = bytes.to_vec();
        zeroed[16] = 0;
        zeroed[17] = 0;
        let computed = checksum::compute(&zeroed);
        if computed != on_wire_cksum {
            return Err(SegmentError::ChecksumMismatch {
                expected: on_wire_cksum,
                actual: computed,
            });
        }

        let payload = bytes[HEADER_LEN..].to_vec();
        Ok(Segment {
            header: Header {
                seqno,
                ackno,
                len,
                flags,
                window,
                cksum: on_wire_cksum,
            },
            payload,
        })
    }
}
