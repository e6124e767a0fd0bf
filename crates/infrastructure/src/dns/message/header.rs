//! Fixed 12-byte DNS header, read straight off the wire.
//!
//! The exchanges only need a handful of header bits (id, QR, opcode, TC,
//! rcode) and need them before the body is trusted, so they are taken from
//! the raw bytes instead of a fully parsed message.

use ferrous_query_domain::QueryError;

pub const HEADER_LEN: usize = 12;

const QR_MASK: u8 = 0x80;
const OPCODE_MASK: u8 = 0x78;
const TC_MASK: u8 = 0x02;
const RCODE_MASK: u8 = 0x0F;

pub const OPCODE_UPDATE: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireHeader {
    pub id: u16,
    pub is_response: bool,
    pub opcode: u8,
    pub truncated: bool,
    pub rcode: u8,
    pub question_count: u16,
}

impl WireHeader {
    pub fn parse(wire: &[u8]) -> Result<Self, QueryError> {
        if wire.len() < HEADER_LEN {
            return Err(QueryError::MalformedMessage(format!(
                "DNS message too short: {} bytes (header needs {})",
                wire.len(),
                HEADER_LEN
            )));
        }

        Ok(Self {
            id: u16::from_be_bytes([wire[0], wire[1]]),
            is_response: wire[2] & QR_MASK != 0,
            opcode: (wire[2] & OPCODE_MASK) >> 3,
            truncated: wire[2] & TC_MASK != 0,
            rcode: wire[3] & RCODE_MASK,
            question_count: u16::from_be_bytes([wire[4], wire[5]]),
        })
    }
}
