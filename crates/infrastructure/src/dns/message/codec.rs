use super::header::{WireHeader, OPCODE_UPDATE};
use super::{DnsQuery, Reply, ResponseVerifier};
use ferrous_query_domain::QueryError;
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder};

/// How strictly a reply is decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Fail with [`QueryError::Truncated`] when the TC bit is set.
    pub raise_on_truncation: bool,
    /// Accept bytes left over after the message.
    pub ignore_trailing: bool,
}

/// Decodes a reply.
///
/// The TC bit is checked from the header before the body is parsed, so a
/// datagram cut off in the middle of a record still reports truncation
/// instead of a parse failure.
pub fn decode(
    wire: &[u8],
    verifier: Option<&dyn ResponseVerifier>,
    request_mac: Option<&[u8]>,
    options: DecodeOptions,
) -> Result<(Message, WireHeader), QueryError> {
    let header = WireHeader::parse(wire)?;

    if options.raise_on_truncation && header.truncated {
        return Err(QueryError::Truncated(format!(
            "{} bytes, id {}",
            wire.len(),
            header.id
        )));
    }

    let mut decoder = BinDecoder::new(wire);
    let message = Message::read(&mut decoder)
        .map_err(|e| QueryError::MalformedMessage(format!("Failed to parse DNS response: {}", e)))?;

    let leftover = decoder.len();
    if leftover > 0 && !options.ignore_trailing {
        return Err(QueryError::TrailingJunk(leftover));
    }

    if let Some(verifier) = verifier {
        verifier.verify(wire, request_mac)?;
    }

    Ok((message, header))
}

/// Decoder bound to the query whose replies it reads.
#[derive(Debug, Clone, Copy)]
pub struct ReplyDecoder<'a> {
    query: &'a DnsQuery,
    options: DecodeOptions,
}

impl<'a> ReplyDecoder<'a> {
    pub fn for_query(query: &'a DnsQuery, options: DecodeOptions) -> Self {
        Self { query, options }
    }

    pub fn options(&self) -> DecodeOptions {
        self.options
    }

    pub fn decode(&self, wire: &[u8]) -> Result<Reply, QueryError> {
        let (message, header) = decode(
            wire,
            self.query.verifier(),
            self.query.request_mac(),
            self.options,
        )?;
        Ok(Reply::new(message, header, wire.len()))
    }
}

/// Whether `reply` answers `query`.
///
/// The reply must have QR set and carry the query's id and opcode. Error
/// replies (FORMERR, SERVFAIL, NOTIMP, REFUSED) may drop the question
/// section; UPDATE replies are not compared by question. Everything else must
/// repeat the question section, compared as a set.
pub fn is_response(query: &DnsQuery, reply: &Reply) -> bool {
    let sent = query.header();
    let received = &reply.header;

    if !received.is_response || received.id != sent.id || received.opcode != sent.opcode {
        return false;
    }

    let rcode = reply.message.response_code();
    let error_without_question = matches!(
        rcode,
        ResponseCode::FormErr | ResponseCode::ServFail | ResponseCode::NotImp | ResponseCode::Refused
    ) && reply.message.queries().is_empty();
    if error_without_question {
        return true;
    }

    if sent.opcode == OPCODE_UPDATE {
        return true;
    }

    let asked = query.questions();
    let answered = reply.message.queries();
    asked.iter().all(|q| answered.contains(q)) && answered.iter().all(|q| asked.contains(q))
}
