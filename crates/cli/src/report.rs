use crate::exchange::Protocol;
use ferrous_query_infrastructure::dns::Reply;
use std::fmt::Write;
use std::net::IpAddr;

/// Renders a reply in a dig-like layout.
pub fn render(reply: &Reply, server: IpAddr, port: u16, protocol: Protocol) -> String {
    let message = &reply.message;
    let mut out = String::new();

    let _ = writeln!(
        out,
        ";; id: {}, status: {}, truncated: {}",
        reply.id(),
        message.response_code(),
        reply.truncated()
    );

    let _ = writeln!(out, ";; QUESTION SECTION:");
    for query in message.queries() {
        let _ = writeln!(out, ";{}", query);
    }

    if !message.answers().is_empty() {
        let _ = writeln!(out, "\n;; ANSWER SECTION:");
        for record in message.answers() {
            let _ = writeln!(out, "{}", record);
        }
    }

    let _ = writeln!(out, "\n;; Query time: {} msec", reply.time.as_millis());
    let _ = writeln!(out, ";; SERVER: {}#{} ({})", server, port, protocol);
    let _ = write!(out, ";; MSG SIZE rcvd: {}", reply.wire_len);
    out
}
