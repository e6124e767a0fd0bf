#![allow(dead_code)]
use ferrous_query_infrastructure::dns::transport::Route;
use ferrous_query_infrastructure::dns::DnsQuery;
use hickory_proto::rr::RecordType;
use std::net::{IpAddr, SocketAddr};

pub struct QueryBuilder;

impl QueryBuilder {
    pub fn example_a() -> DnsQuery {
        DnsQuery::build("example.com", RecordType::A).unwrap()
    }

    pub fn example_aaaa() -> DnsQuery {
        DnsQuery::build("example.com", RecordType::AAAA).unwrap()
    }

    pub fn custom(name: &str, record_type: RecordType) -> DnsQuery {
        DnsQuery::build(name, record_type).unwrap()
    }
}

/// Hand-assembled replies to a query's wire bytes.
///
/// The question section is copied from the query, so the query must not carry
/// additional records.
pub struct ReplyBuilder {
    query: Vec<u8>,
    flags: [u8; 2],
    answer: Option<[u8; 4]>,
}

impl ReplyBuilder {
    pub fn to(query: &[u8]) -> Self {
        Self {
            query: query.to_vec(),
            flags: [0x81, 0x80],
            answer: None,
        }
    }

    pub fn truncated(mut self) -> Self {
        self.flags[0] |= 0x02;
        self
    }

    pub fn servfail(mut self) -> Self {
        self.flags[1] = 0x82;
        self
    }

    pub fn with_id(mut self, id: u16) -> Self {
        self.query[..2].copy_from_slice(&id.to_be_bytes());
        self
    }

    pub fn answer_a(mut self, ip: [u8; 4]) -> Self {
        self.answer = Some(ip);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut response = Vec::with_capacity(512);

        response.extend_from_slice(&self.query[0..2]);
        response.extend_from_slice(&self.flags);
        response.extend_from_slice(&self.query[4..6]);

        let answer_count: u16 = if self.answer.is_some() { 1 } else { 0 };
        response.extend_from_slice(&answer_count.to_be_bytes());
        response.extend_from_slice(&[0x00, 0x00]);
        response.extend_from_slice(&[0x00, 0x00]);

        response.extend_from_slice(&self.query[12..]);

        if let Some(ip) = self.answer {
            response.extend_from_slice(&[
                0xc0, 0x0c, // name: pointer to the question
                0x00, 0x01, // type A
                0x00, 0x01, // class IN
                0x00, 0x00, 0x00, 0x3c, // ttl 60
                0x00, 0x04,
            ]);
            response.extend_from_slice(&ip);
        }

        response
    }
}

pub fn frame(message: &[u8]) -> Vec<u8> {
    let mut framed = (message.len() as u16).to_be_bytes().to_vec();
    framed.extend_from_slice(message);
    framed
}

pub struct RouteBuilder;

impl RouteBuilder {
    pub fn to(addr: SocketAddr) -> (IpAddr, Route) {
        (addr.ip(), Route::to_port(addr.port()))
    }
}
