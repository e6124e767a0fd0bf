use anyhow::Context;
use clap::Parser;
use ferrous_query_domain::CliOverrides;
use ferrous_query_infrastructure::dns::{default_backend, DnsQuery};
use hickory_proto::rr::RecordType;
use std::net::IpAddr;
use std::str::FromStr;
use tracing::{error, info};

mod bootstrap;
mod exchange;
mod report;

use exchange::Protocol;

#[derive(Parser)]
#[command(name = "ferrous-query")]
#[command(version)]
#[command(about = "Ferrous Query - send a DNS query over UDP, TCP or TLS")]
struct Cli {
    /// Server address (IPv4 or IPv6)
    server: IpAddr,

    /// Name to look up
    name: String,

    /// Record type
    #[arg(short = 't', long = "type", default_value = "A", value_parser = parse_record_type)]
    record_type: RecordType,

    /// Query over TCP only
    #[arg(long, conflicts_with = "tls")]
    tcp: bool,

    /// Query over DNS-over-TLS
    #[arg(long)]
    tls: bool,

    /// Server port (defaults to 53, or 853 with --tls)
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Timeout in milliseconds; 0 waits forever
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Name to verify the server certificate against
    #[arg(long, requires = "tls")]
    tls_hostname: Option<String>,

    /// Source address to send from
    #[arg(short = 's', long)]
    source: Option<IpAddr>,

    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn protocol(&self) -> Protocol {
        if self.tls {
            Protocol::Tls
        } else if self.tcp {
            Protocol::Tcp
        } else {
            Protocol::Udp
        }
    }
}

fn parse_record_type(value: &str) -> Result<RecordType, String> {
    RecordType::from_str(&value.to_ascii_uppercase()).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let protocol = cli.protocol();

    let cli_overrides = CliOverrides {
        port: cli.port,
        timeout_ms: cli.timeout_ms,
        source: cli.source,
        tls_hostname: cli.tls_hostname.clone(),
        log_level: cli.log_level.clone(),
    };
    let config = bootstrap::load_config(cli.config.as_deref(), cli_overrides)?;

    bootstrap::init_logging(&config);

    info!(
        server = %cli.server,
        name = %cli.name,
        record_type = %cli.record_type,
        %protocol,
        "Ferrous Query v{}",
        env!("CARGO_PKG_VERSION")
    );

    let query = DnsQuery::build(&cli.name, cli.record_type)
        .with_context(|| format!("Invalid query for {}", cli.name))?;

    let backend = default_backend();
    let (reply, used) =
        match exchange::run(backend.as_ref(), &config, &query, cli.server, protocol).await {
            Ok(result) => result,
            Err(e) => {
                error!(server = %cli.server, error = %e, "Query failed");
                return Err(e.into());
            }
        };

    let port = match used {
        Protocol::Udp => config.query.udp_port,
        Protocol::Tcp if protocol == Protocol::Udp => config.query.udp_port,
        Protocol::Tcp => config.query.tcp_port,
        Protocol::Tls => config.query.tls_port,
    };
    println!("{}", report::render(&reply, cli.server, port, used));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_type_parsing_is_case_insensitive() {
        assert_eq!(parse_record_type("aaaa").unwrap(), RecordType::AAAA);
        assert_eq!(parse_record_type("MX").unwrap(), RecordType::MX);
        assert!(parse_record_type("NOTATYPE").is_err());
    }

    #[test]
    fn test_protocol_selection() {
        let cli = Cli::parse_from(["ferrous-query", "192.0.2.53", "example.com"]);
        assert_eq!(cli.protocol(), Protocol::Udp);
        assert_eq!(cli.record_type, RecordType::A);

        let cli = Cli::parse_from(["ferrous-query", "--tls", "192.0.2.53", "example.com"]);
        assert_eq!(cli.protocol(), Protocol::Tls);
    }

    #[test]
    fn test_tcp_and_tls_conflict() {
        let result =
            Cli::try_parse_from(["ferrous-query", "--tcp", "--tls", "192.0.2.53", "example.com"]);
        assert!(result.is_err());
    }
}
