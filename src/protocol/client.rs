//! Client half of a session: stream the payload, terminate, await the ack.

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::report::{print_rule, Console, IntervalReporter};

use super::{
    SessionError, SessionResult, TransferProgress, ACK, ACK_TIMEOUT, CHUNK_SIZE, FILLER,
    MIN_SESSION_DURATION, SENTINEL,
};

/// Run one client session against the configured server.
///
/// Returns the session's result once the server has acknowledged the
/// sentinel. Interval rows, if enabled, are printed to `console` as the
/// transfer progresses.
pub async fn run_session(
    config: &ClientConfig,
    console: &Console,
) -> Result<SessionResult, SessionError> {
    let session_id = Uuid::new_v4();
    let endpoint = config.endpoint();

    let mut stream = connect(&endpoint, config.connect_timeout).await?;
    let local = stream.local_addr()?;
    info!(session_id = %session_id, local = %local, server = %endpoint, "session connected");

    if config.parallel > 1 {
        console.line(format!(
            "Client {}:{} connected with {} port {}",
            local.ip(),
            local.port(),
            config.address,
            config.port
        ));
    } else {
        let mut out = console.lock();
        out.line(format!(
            "Client connected with {} port {}",
            config.address, config.port
        ));
        out.blank();
    }

    let reporter = IntervalReporter::new(
        config.interval,
        config.unit,
        endpoint.clone(),
        console.clone(),
    );
    let mut progress = TransferProgress::new(config.interval);

    let payload = Bytes::from(vec![FILLER; CHUNK_SIZE]);
    let mut remaining = config.byte_cap;

    loop {
        let elapsed = progress.elapsed();
        reporter.check(&mut progress, elapsed);

        if elapsed >= config.duration {
            break;
        }

        let chunk = match remaining.as_mut() {
            Some(0) => break,
            Some(left) => {
                let len = (*left).min(CHUNK_SIZE as u64) as usize;
                *left -= len as u64;
                payload.slice(..len)
            }
            None => payload.clone(),
        };

        stream.write_all(&chunk).await?;
        progress.total += chunk.len() as u64;
    }

    let elapsed = progress.elapsed();
    if elapsed < MIN_SESSION_DURATION {
        tokio::time::sleep(MIN_SESSION_DURATION - elapsed).await;
    }

    debug!(session_id = %session_id, bytes = progress.total, "payload sent, terminating");
    stream.write_all(SENTINEL).await?;

    let mut reply = Vec::with_capacity(ACK.len());
    let read = timeout(ACK_TIMEOUT, read_ack(&mut stream, &mut reply)).await;
    match read {
        Ok(read) => read?,
        // A partial reply that stalls is a wrong reply, not a missing one.
        Err(_) if !reply.is_empty() => {}
        Err(_) => {
            warn!(session_id = %session_id, "no acknowledgement within {:?}", ACK_TIMEOUT);
            return Err(SessionError::AcknowledgmentTimeout);
        }
    }

    if reporter.is_enabled() {
        print_rule(&mut console.lock());
    }

    if reply != ACK {
        return Err(SessionError::UnexpectedAcknowledgment(
            String::from_utf8_lossy(&reply).into_owned(),
        ));
    }

    let result = SessionResult::new(
        config.address.clone(),
        config.port,
        progress.elapsed(),
        progress.total,
        config.unit,
    );
    info!(
        session_id = %session_id,
        bytes = result.bytes,
        elapsed_secs = result.elapsed_secs,
        rate_mbps = result.rate_mbps,
        "session acknowledged"
    );

    Ok(result)
}

async fn connect(endpoint: &str, connect_timeout: Duration) -> Result<TcpStream, SessionError> {
    match timeout(connect_timeout, TcpStream::connect(endpoint)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(SessionError::Connect {
            endpoint: endpoint.to_string(),
            source,
        }),
        Err(_) => Err(SessionError::ConnectTimeout {
            endpoint: endpoint.to_string(),
            timeout: connect_timeout,
        }),
    }
}

/// Read into `reply` until a full acknowledgement's worth of bytes has
/// arrived, the bytes so far stop matching [`ACK`], or the server closes the
/// connection.
async fn read_ack(stream: &mut TcpStream, reply: &mut Vec<u8>) -> Result<(), SessionError> {
    let mut buf = [0u8; 1024];
    while reply.len() < ACK.len() && ACK.starts_with(&reply[..]) {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        reply.extend_from_slice(&buf[..n]);
    }
    Ok(())
}
