//! End-to-end sessions between a real server and client over loopback.

use std::time::{Duration, Instant};

use simpleperf::protocol::client::run_session;
use simpleperf::protocol::CHUNK_SIZE;
use simpleperf::{
    run_client, ClientConfig, Console, PerfServer, ServerConfig, SessionError, Unit,
};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

/// Start a server on an ephemeral port that runs for the rest of the test.
async fn start_server(unit: Unit) -> (u16, Console, simpleperf::report::CapturedOutput) {
    let (console, out) = Console::buffer();
    let server = PerfServer::bind(ServerConfig::new("127.0.0.1", 0, unit), console.clone())
        .await
        .expect("bind");
    let port = server.local_addr().unwrap().port();
    tokio::spawn(server.run_until(std::future::pending()));
    (port, console, out)
}

fn client_config(
    port: u16,
    interval: u64,
    duration: u64,
    num: &str,
    parallel: u8,
) -> ClientConfig {
    ClientConfig::new(
        "127.0.0.1",
        port,
        Unit::Bytes,
        interval,
        duration,
        num,
        parallel,
    )
    .expect("valid client config")
}

#[tokio::test]
async fn test_duration_bounded_session() {
    let (port, _server_console, _server_out) = start_server(Unit::Bytes).await;
    let (console, _out) = Console::buffer();

    let report = run_client(client_config(port, 0, 1, "", 1), console).await;

    assert_eq!(report.failures, 0);
    assert_eq!(report.results.len(), 1);
    let result = &report.results[0];
    assert!(
        result.elapsed_secs >= 1.0 && result.elapsed_secs < 1.5,
        "elapsed {}",
        result.elapsed_secs
    );
    assert!(result.bytes > 0);
    assert_eq!(result.bytes % CHUNK_SIZE as u64, 0);
    assert_eq!(result.port, port);
}

#[tokio::test]
async fn test_byte_cap_is_exact() {
    let (port, _server_console, server_out) = start_server(Unit::Bytes).await;
    let (console, out) = Console::buffer();

    let report = run_client(client_config(port, 0, 10, "5000 B", 1), console).await;

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].bytes, 5_000);
    assert_eq!(report.results[0].transferred, 5_000.0);
    assert!(out.contents().contains("5000.00 B"));

    // The server prints its row right after acknowledging; give it a moment.
    let deadline = Instant::now() + Duration::from_secs(2);
    while !server_out.contents().contains("5000.00 B") && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(server_out.contents().contains("5000.00 B"));
}

#[tokio::test]
async fn test_byte_cap_not_a_chunk_multiple() {
    let (port, _server_console, _server_out) = start_server(Unit::Bytes).await;
    let (console, _out) = Console::buffer();

    let report = run_client(client_config(port, 0, 10, "3 KB", 1), console).await;
    assert_eq!(report.results[0].bytes, 3_000);

    let (console, _out) = Console::buffer();
    let report = run_client(client_config(port, 0, 10, "1234 B", 1), console).await;
    assert_eq!(report.results[0].bytes, 1_234);
}

#[tokio::test]
async fn test_parallel_sessions_all_reported() {
    let (port, _server_console, _server_out) = start_server(Unit::Bytes).await;
    let (console, out) = Console::buffer();

    let report = run_client(client_config(port, 0, 5, "20 KB", 5), console).await;

    assert_eq!(report.failures, 0);
    assert_eq!(report.results.len(), 5);
    assert!(report.results.iter().all(|r| r.bytes == 20_000));

    let text = out.contents();
    assert_eq!(text.matches("connected with 127.0.0.1 port").count(), 5);
    assert_eq!(text.matches("20000.00 B").count(), 5);
}

#[tokio::test]
async fn test_interval_rows_are_printed() {
    let (port, _server_console, _server_out) = start_server(Unit::Bytes).await;
    let (console, out) = Console::buffer();

    let report = run_client(client_config(port, 1, 2, "", 1), console).await;
    assert_eq!(report.results.len(), 1);

    let text = out.contents();
    assert!(text.contains("0.00 - 1.00"), "{text}");
    assert!(text.contains("1.00 - 2.00"), "{text}");
    assert!(text.contains("0.0 - 2."), "{text}");
}

#[tokio::test]
async fn test_silent_server_times_out() {
    // Accepts and drains, but never acknowledges.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; CHUNK_SIZE];
        while let Ok(n) = stream.read(&mut buf).await {
            if n == 0 {
                break;
            }
        }
    });

    let (console, out) = Console::buffer();
    let started = Instant::now();
    let report = run_client(client_config(port, 0, 1, "1 KB", 1), console).await;

    assert!(started.elapsed() >= Duration::from_secs(5));
    assert!(report.results.is_empty());
    assert_eq!(report.failures, 1);
    assert!(out
        .contents()
        .contains("timeout while waiting for acknowledgement"));
}

#[tokio::test]
async fn test_silent_server_session_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; CHUNK_SIZE];
        while let Ok(n) = stream.read(&mut buf).await {
            if n == 0 {
                break;
            }
        }
    });

    let (console, _out) = Console::buffer();
    let err = run_session(&client_config(port, 0, 1, "10 B", 1), &console)
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::AcknowledgmentTimeout), "{err:?}");
}
