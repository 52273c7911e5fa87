use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;

use simpleperf::config::{
    DEFAULT_ADDRESS, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_DURATION_SECS, DEFAULT_PORT,
};
use simpleperf::{ClientConfig, Console, PerfServer, ServerConfig, Unit};

#[derive(Parser)]
#[command(
    name = "simpleperf",
    about = "Simpleperf network throughput measurement tool",
    version,
    long_about = None
)]
struct Cli {
    /// Enable server mode
    #[arg(short = 's', long, conflicts_with = "client")]
    server: bool,

    /// Enable client mode
    #[arg(short = 'c', long)]
    client: bool,

    /// IP address of the server interface to listen on
    #[arg(short = 'b', long, default_value = DEFAULT_ADDRESS, env = "SIMPLEPERF_BIND")]
    bind: String,

    /// IP address of the server to connect to (client mode)
    #[arg(short = 'I', long, default_value = DEFAULT_ADDRESS, env = "SIMPLEPERF_SERVER_IP")]
    serverip: String,

    /// Port the server listens on, in [1024, 65535]
    #[arg(
        short = 'p',
        long,
        default_value_t = DEFAULT_PORT,
        env = "SIMPLEPERF_PORT",
        value_parser = clap::value_parser!(u16).range(1024..)
    )]
    port: u16,

    /// Unit for reported sizes
    #[arg(short = 'f', long, value_enum, default_value = "MB", env = "SIMPLEPERF_FORMAT")]
    format: Unit,

    /// Total duration in seconds to send data for; must be > 0
    #[arg(
        short = 't',
        long,
        default_value_t = DEFAULT_DURATION_SECS as i64,
        allow_negative_numbers = true,
        env = "SIMPLEPERF_TIME"
    )]
    time: i64,

    /// Print statistics every N seconds (0 disables)
    #[arg(short = 'i', long, default_value_t = 0, env = "SIMPLEPERF_INTERVAL")]
    interval: u64,

    /// Number of parallel connections, 1 to 5
    #[arg(
        short = 'P',
        long,
        default_value_t = 1,
        env = "SIMPLEPERF_PARALLEL",
        value_parser = clap::value_parser!(u8).range(1..=5)
    )]
    parallel: u8,

    /// Number of bytes to transfer, e.g. "20000 B", "3000 KB", "200 MB"
    #[arg(short = 'n', long, default_value = "", env = "SIMPLEPERF_NUM")]
    num: String,

    /// Print client results as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Seconds to wait for each client connection to be established; must be > 0
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "SIMPLEPERF_CONNECT_TIMEOUT",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    connect_timeout: u64,

    /// Emit logs as JSON lines instead of human-readable text
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the result table.
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let logs = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        logs.json().init();
    } else {
        logs.init();
    }

    if cli.server {
        let config = ServerConfig::new(cli.bind, cli.port, cli.format);
        tracing::info!(bind = %config.endpoint(), "Starting simpleperf server");
        let server = PerfServer::bind(config, Console::stdout()).await?;
        server.run().await?;
    } else if cli.client {
        let duration = u64::try_from(cli.time).unwrap_or(0);
        let config = ClientConfig::new(
            cli.serverip,
            cli.port,
            cli.format,
            cli.interval,
            duration,
            &cli.num,
            cli.parallel,
        )?
        .with_connect_timeout(Duration::from_secs(cli.connect_timeout));

        let console = if cli.json {
            Console::new(std::io::sink())
        } else {
            Console::stdout()
        };
        let report = simpleperf::run_client(config, console).await;

        if cli.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        if report.all_failed() {
            bail!("all {} client sessions failed", report.failures);
        }
    } else {
        bail!("you must run either in server or client mode");
    }

    Ok(())
}
