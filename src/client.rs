//! Client orchestrator: run N sessions in parallel and report them together.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info};

use crate::config::ClientConfig;
use crate::protocol::{client::run_session, SessionResult};
use crate::report::{print_client_banner, print_header, result_row, Console, Side};

// ---------------------------------------------------------------------------
// ResultCollection
// ---------------------------------------------------------------------------

/// Append-only, thread-safe list of finished sessions, in completion order.
#[derive(Debug, Clone, Default)]
pub struct ResultCollection {
    inner: Arc<Mutex<Vec<SessionResult>>>,
}

impl ResultCollection {
    pub fn push(&self, result: SessionResult) {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(result);
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current entries in insertion order.
    pub fn snapshot(&self) -> Vec<SessionResult> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

// ---------------------------------------------------------------------------
// ClientReport
// ---------------------------------------------------------------------------

/// Everything a client run produced.
#[derive(Debug, Clone, Serialize)]
pub struct ClientReport {
    pub generated_at: DateTime<Utc>,
    pub config: ClientConfig,
    /// Successful sessions in the order they finished.
    pub results: Vec<SessionResult>,
    /// Sessions that ended without a result.
    pub failures: usize,
}

impl ClientReport {
    pub fn all_failed(&self) -> bool {
        self.results.is_empty() && self.failures > 0
    }
}

/// Run `config.parallel` sessions concurrently, wait for all of them, then
/// print the consolidated result table.
///
/// A failing session is reported on `console` as it happens and leaves no
/// entry; its siblings carry on.
pub async fn run_client(config: ClientConfig, console: Console) -> ClientReport {
    let config = Arc::new(config);
    let results = ResultCollection::default();

    print_client_banner(&mut console.lock(), &config.address, config.port);
    info!(
        server = %config.endpoint(),
        parallel = config.parallel,
        duration_secs = config.duration.as_secs(),
        byte_cap = ?config.byte_cap,
        "starting client sessions"
    );

    let handles: Vec<_> = (0..config.parallel)
        .map(|index| {
            let config = Arc::clone(&config);
            let results = results.clone();
            let console = console.clone();
            tokio::spawn(async move {
                match run_session(&config, &console).await {
                    Ok(result) => {
                        results.push(result);
                        true
                    }
                    Err(e) => {
                        error!(session = index, error = %e, "client session failed");
                        console.line(format!("Error: {}", e));
                        false
                    }
                }
            })
        })
        .collect();

    let mut failures = 0;
    for (index, outcome) in join_all(handles).await.into_iter().enumerate() {
        match outcome {
            Ok(true) => {}
            Ok(false) => failures += 1,
            Err(e) => {
                failures += 1;
                error!(session = index, error = %e, "client session task aborted");
                console.line(format!("Error: client session {} aborted: {}", index, e));
            }
        }
    }

    let results = results.snapshot();
    {
        let mut out = console.lock();
        if config.parallel > 1 {
            out.blank();
            out.blank();
        }
        print_header(&mut out, Side::Client);
        for result in &results {
            out.line(result_row(result));
        }
    }

    info!(succeeded = results.len(), failures, "client run finished");

    ClientReport {
        generated_at: Utc::now(),
        config: (*config).clone(),
        results,
        failures,
    }
}
