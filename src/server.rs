//! Server acceptor.
//!
//! `PerfServer` binds a TCP listener and hands every accepted connection to
//! its own task running [`handle_connection`]. Handlers share nothing but the
//! console. The accept loop runs until its shutdown future resolves (Ctrl-C
//! for the binary); in-flight sessions are left to finish on their own.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::protocol::server::handle_connection;
use crate::report::{print_server_banner, Console};

pub struct PerfServer {
    listener: TcpListener,
    config: Arc<ServerConfig>,
    console: Console,
}

impl PerfServer {
    /// Bind the listening socket. A configured port of 0 is replaced with the
    /// port the OS assigned.
    pub async fn bind(config: ServerConfig, console: Console) -> Result<Self> {
        let endpoint = config.endpoint();
        let listener = TcpListener::bind(&endpoint)
            .await
            .with_context(|| format!("failed to bind TCP listener on {}", endpoint))?;
        let local = listener.local_addr()?;

        let config = ServerConfig {
            port: local.port(),
            ..config
        };
        info!(addr = %local, "simpleperf server listening");
        print_server_banner(&mut console.lock(), config.port);

        Ok(Self {
            listener,
            config: Arc::new(config),
            console,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until Ctrl-C.
    pub async fn run(self) -> Result<()> {
        let console = self.console.clone();
        self.run_until(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            console.line("Keyboard interrupt: Stopping server.");
        })
        .await
    }

    /// Accept connections until `shutdown` resolves. The listener is closed on
    /// return.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let (stream, peer_addr) = tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("accept loop stopped");
                    break;
                }

                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!(error = %e, "failed to accept TCP connection");
                        continue;
                    }
                },
            };

            debug!(peer_addr = %peer_addr, "accepted TCP connection");

            let config = Arc::clone(&self.config);
            let console = self.console.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, &config, &console).await {
                    warn!(peer_addr = %peer_addr, error = %e, "session aborted");
                }
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::Unit;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    #[tokio::test]
    async fn test_bind_ephemeral_port_and_stop() {
        let (console, out) = Console::buffer();
        let server = PerfServer::bind(ServerConfig::new("127.0.0.1", 0, Unit::Bytes), console)
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(server.run_until(async move {
            let _ = stop_rx.await;
        }));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"000BYE").await.unwrap();
        let mut reply = [0u8; 8];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply, b"ACK: BYE");

        stop_tx.send(()).unwrap();
        task.await.unwrap().unwrap();

        // The listener is gone once the loop returns.
        assert!(TcpStream::connect(addr).await.is_err());
        assert!(out
            .contents()
            .contains(&format!("listening on port {}", addr.port())));
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let (console, _out) = Console::buffer();
        let first = PerfServer::bind(
            ServerConfig::new("127.0.0.1", 0, Unit::Bytes),
            console.clone(),
        )
        .await
        .unwrap();
        let port = first.local_addr().unwrap().port();
        let err = PerfServer::bind(ServerConfig::new("127.0.0.1", port, Unit::Bytes), console)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("failed to bind"));
    }
}
