//! Server half of a session: count received bytes, acknowledge the sentinel.

use std::net::SocketAddr;
use std::time::Instant;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::report::{print_header, print_server_banner, total_row, Console, Side};

use super::{contains_sentinel, SessionError, ACK, CHUNK_SIZE, SENTINEL};

/// What the server observed for one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiveSummary {
    pub peer: SocketAddr,
    /// Payload bytes received, excluding the sentinel.
    pub bytes: u64,
    pub elapsed_secs: f64,
    /// Whether the peer terminated with the sentinel and was acknowledged.
    pub acknowledged: bool,
}

/// Serve one accepted connection to completion and print its result row.
pub async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    config: &ServerConfig,
    console: &Console,
) -> Result<ReceiveSummary, SessionError> {
    {
        let mut out = console.lock();
        print_server_banner(&mut out, config.port);
        out.line(format!(
            "A simpleperf client with {}:{} is connected with {}",
            peer.ip(),
            peer.port(),
            config.endpoint()
        ));
        out.blank();
    }

    let start = Instant::now();
    let mut total: u64 = 0;
    let mut acknowledged = false;
    let mut buf = [0u8; CHUNK_SIZE];
    let mut tail: Vec<u8> = Vec::with_capacity(SENTINEL.len());

    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            debug!(peer_addr = %peer, "peer closed without sentinel");
            break;
        }
        let chunk = &buf[..n];

        if contains_sentinel(&tail, chunk) {
            stream.write_all(ACK).await?;
            total = (total + n as u64).saturating_sub(SENTINEL.len() as u64);
            acknowledged = true;
            break;
        }

        total += n as u64;
        let keep = SENTINEL.len() - 1;
        tail.extend_from_slice(&chunk[n.saturating_sub(keep)..]);
        if tail.len() > keep {
            tail.drain(..tail.len() - keep);
        }
    }

    drop(stream);
    let elapsed_secs = start.elapsed().as_secs_f64();

    info!(
        peer_addr = %peer,
        bytes = total,
        elapsed_secs,
        acknowledged,
        "session finished"
    );

    {
        let mut out = console.lock();
        print_header(&mut out, Side::Server);
        out.line(total_row(&config.endpoint(), elapsed_secs, total, config.unit));
        out.blank();
        out.blank();
    }

    Ok(ReceiveSummary {
        peer,
        bytes: total,
        elapsed_secs,
        acknowledged,
    })
}
