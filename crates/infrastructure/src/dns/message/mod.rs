//! DNS messages as the exchanges see them.
//!
//! Encoding and decoding are delegated to `hickory-proto`; this module adds
//! the pieces the transports need around it: a query that knows its own wire
//! form, a reply stamped with round-trip latency, a decoder that reports
//! truncation as its own error, and the reply-to-query matching rule.

pub mod codec;
pub mod header;

use ferrous_query_domain::QueryError;
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{DNSClass, Name, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncodable, BinEncoder};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub use codec::{decode, DecodeOptions, ReplyDecoder};
pub use header::WireHeader;

/// Authenticates a reply against keying material held by the caller.
///
/// Implementations see the raw reply bytes and the MAC of the request they
/// answer; the exchanges never look inside either.
pub trait ResponseVerifier: Send + Sync + fmt::Debug {
    fn verify(&self, wire: &[u8], request_mac: Option<&[u8]>) -> Result<(), QueryError>;
}

/// An outbound query, encoded once when it is created.
///
/// The question section is kept as read back from the wire, the same form a
/// decoded reply carries, so replies are matched on what was actually sent.
#[derive(Debug, Clone)]
pub struct DnsQuery {
    message: Message,
    wire: Vec<u8>,
    header: WireHeader,
    questions: Vec<Query>,
    verifier: Option<Arc<dyn ResponseVerifier>>,
    request_mac: Option<Vec<u8>>,
}

impl DnsQuery {
    pub fn new(message: Message) -> Result<Self, QueryError> {
        let wire = serialize_message(&message)?;
        let header = WireHeader::parse(&wire)?;
        let questions = wire_questions(&wire)?;
        Ok(Self {
            message,
            wire,
            header,
            questions,
            verifier: None,
            request_mac: None,
        })
    }

    /// Builds a recursive query for one name and type with a random id.
    pub fn build(domain: &str, record_type: RecordType) -> Result<Self, QueryError> {
        let name = Name::from_str(domain).map_err(|e| {
            QueryError::InvalidDomainName(format!("Invalid domain '{}': {}", domain, e))
        })?;

        let mut query = Query::new();
        query.set_name(name);
        query.set_query_type(record_type);
        query.set_query_class(DNSClass::IN);

        let mut message = Message::new(fastrand::u16(..), MessageType::Query, OpCode::Query);
        message.set_recursion_desired(true);
        message.add_query(query);

        Self::new(message)
    }

    pub fn with_verifier(
        mut self,
        verifier: Arc<dyn ResponseVerifier>,
        request_mac: Option<Vec<u8>>,
    ) -> Self {
        self.verifier = Some(verifier);
        self.request_mac = request_mac;
        self
    }

    pub fn id(&self) -> u16 {
        self.header.id
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn header(&self) -> &WireHeader {
        &self.header
    }

    /// Question section as encoded on the wire.
    pub fn questions(&self) -> &[Query] {
        &self.questions
    }

    pub fn to_wire(&self) -> &[u8] {
        &self.wire
    }

    pub fn verifier(&self) -> Option<&dyn ResponseVerifier> {
        self.verifier.as_deref()
    }

    pub fn request_mac(&self) -> Option<&[u8]> {
        self.request_mac.as_deref()
    }
}

fn serialize_message(message: &Message) -> Result<Vec<u8>, QueryError> {
    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);

    message.emit(&mut encoder).map_err(|e| {
        QueryError::MalformedMessage(format!("Failed to serialize DNS message: {}", e))
    })?;

    Ok(buf)
}

fn wire_questions(wire: &[u8]) -> Result<Vec<Query>, QueryError> {
    let mut decoder = BinDecoder::new(wire);
    let message = Message::read(&mut decoder).map_err(|e| {
        QueryError::MalformedMessage(format!("Failed to read back encoded query: {}", e))
    })?;
    Ok(message.queries().to_vec())
}

/// What a send operation puts on the wire: a query still to be taken to its
/// wire form, or bytes the caller already encoded.
#[derive(Debug, Clone, Copy)]
pub enum Outgoing<'a> {
    Query(&'a DnsQuery),
    Wire(&'a [u8]),
}

impl<'a> Outgoing<'a> {
    pub fn into_wire(self) -> &'a [u8] {
        match self {
            Outgoing::Query(query) => query.to_wire(),
            Outgoing::Wire(wire) => wire,
        }
    }
}

impl<'a> From<&'a DnsQuery> for Outgoing<'a> {
    fn from(query: &'a DnsQuery) -> Self {
        Outgoing::Query(query)
    }
}

impl<'a> From<&'a [u8]> for Outgoing<'a> {
    fn from(wire: &'a [u8]) -> Self {
        Outgoing::Wire(wire)
    }
}

impl<'a> From<&'a Vec<u8>> for Outgoing<'a> {
    fn from(wire: &'a Vec<u8>) -> Self {
        Outgoing::Wire(wire.as_slice())
    }
}

/// A decoded reply.
#[derive(Debug, Clone)]
pub struct Reply {
    pub message: Message,
    pub header: WireHeader,
    /// Round trip from the start of the exchange to the reply being read.
    pub time: Duration,
    pub wire_len: usize,
}

impl Reply {
    pub fn new(message: Message, header: WireHeader, wire_len: usize) -> Self {
        Self {
            message,
            header,
            time: Duration::ZERO,
            wire_len,
        }
    }

    pub fn truncated(&self) -> bool {
        self.header.truncated
    }

    pub fn id(&self) -> u16 {
        self.header.id
    }

    pub fn is_response_to(&self, query: &DnsQuery) -> bool {
        codec::is_response(query, self)
    }
}
