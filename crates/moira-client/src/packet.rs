//! Packet framing.
//!
//! Every frame starts with a 16-byte header, all integers big-endian:
//!
//! ```text
//! +--------------+--------------+-------------------+--------------+
//! | length (u32) | version (u32)| opcode/status i32 | fields (u32) |
//! +--------------+--------------+-------------------+--------------+
//! ```
//!
//! The length counts the header itself. Each field follows as a 4-byte
//! unpadded length and the field bytes zero-padded to a 4-byte boundary.
//! Outgoing values are zero-terminated; incoming values are cut at their
//! first zero byte, so a value with an embedded zero does not survive a
//! round trip past that byte.

use bytes::{Buf, BufMut, BytesMut};
use moira_core::status::PROTOCOL_VERSION;
use moira_core::Error;

use crate::Result;

/// Size of the fixed packet header.
pub const HEADER_LEN: usize = 16;

/// Upper bound on an incoming frame.
pub const MAX_PACKET_LEN: usize = 16 * 1024 * 1024;

/// A decoded packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Framing version from the header
    pub version: u32,
    /// Request opcode or response status
    pub status: i32,
    /// Field values with their terminators and padding removed
    pub fields: Vec<Vec<u8>>,
}

impl Packet {
    /// Returns the fields as strings, replacing invalid UTF-8.
    #[must_use]
    pub fn string_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|field| String::from_utf8_lossy(field).into_owned())
            .collect()
    }
}

const fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

/// Encodes a request frame.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the frame would not fit the 32-bit length.
pub fn encode<F>(opcode: i32, fields: &[F]) -> Result<BytesMut>
where
    F: AsRef<[u8]>,
{
    let body_len: usize = fields
        .iter()
        .map(|field| 4 + padded_len(field.as_ref().len() + 1))
        .sum();
    let total = HEADER_LEN + body_len;
    let total_u32 = u32::try_from(total)
        .map_err(|_| Error::Protocol(format!("request of {total} bytes is too large")))?;
    let count = u32::try_from(fields.len())
        .map_err(|_| Error::Protocol("too many request fields".to_string()))?;

    let mut buf = BytesMut::with_capacity(total);
    buf.put_u32(total_u32);
    buf.put_u32(PROTOCOL_VERSION);
    buf.put_i32(opcode);
    buf.put_u32(count);

    for field in fields {
        let value = field.as_ref();
        let unpadded = value.len() + 1;
        // Bounded by the total length check above.
        buf.put_u32(unpadded as u32);
        buf.put_slice(value);
        buf.put_bytes(0, padded_len(unpadded) - value.len());
    }

    Ok(buf)
}

/// Decodes a complete frame, header included.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the frame is truncated, misaligned, carries
/// an unsupported version, or has bytes beyond its declared fields.
pub fn decode(frame: &[u8]) -> Result<Packet> {
    if frame.len() < HEADER_LEN {
        return Err(Error::Protocol(format!(
            "packet of {} bytes is shorter than its header",
            frame.len()
        )));
    }

    let mut buf = frame;
    let length = buf.get_u32() as usize;
    let version = buf.get_u32();
    let status = buf.get_i32();
    let count = buf.get_u32();

    if length % 4 != 0 {
        return Err(Error::Protocol(format!(
            "packet length {length} is not a multiple of four"
        )));
    }
    if version != PROTOCOL_VERSION {
        return Err(Error::Protocol(format!(
            "protocol version mismatch: expected {PROTOCOL_VERSION}, got {version}"
        )));
    }
    if length != frame.len() {
        return Err(Error::Protocol(format!(
            "packet declares {length} bytes but {} were read",
            frame.len()
        )));
    }

    let mut fields = Vec::new();
    for index in 0..count {
        if buf.remaining() < 4 {
            return Err(Error::Protocol(format!(
                "field {index} of {count} is missing its length"
            )));
        }
        let declared = buf.get_u32() as usize;
        let padded = declared.checked_add(3).map_or(usize::MAX, |len| len & !3);
        if padded > buf.remaining() {
            return Err(Error::Protocol(format!(
                "field {index} claims {declared} bytes but only {} remain",
                buf.remaining()
            )));
        }

        let raw = &buf[..padded];
        let value = raw
            .iter()
            .position(|byte| *byte == 0)
            .map_or(raw, |end| &raw[..end]);
        fields.push(value.to_vec());
        buf.advance(padded);
    }

    if buf.has_remaining() {
        return Err(Error::Protocol(format!(
            "{} bytes remain after the declared fields",
            buf.remaining()
        )));
    }

    Ok(Packet {
        version,
        status,
        fields,
    })
}
