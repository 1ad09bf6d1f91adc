use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stayline::config::Config;
use stayline::context::RequestContext;
use stayline::coordinator::BookingCoordinator;
use stayline::handlers::Handlers;
use stayline::store::Store;
use stayline::{catalog, compactor, driver};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout carries responses.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env();
    stayline::observability::init(config.metrics_port)?;

    let store = if config.in_memory {
        Store::in_memory()
    } else {
        std::fs::create_dir_all(&config.data_dir)?;
        let store = Store::open(config.wal_path())?;
        tokio::spawn(compactor::run_compactor(
            store.clone(),
            config.compact_threshold,
            config.compact_interval,
        ));
        store
    };
    if let Some(path) = &config.catalog {
        catalog::seed(&store, catalog::load_catalog(path)?).await?;
    }

    let coordinator = BookingCoordinator::with_policy(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        config.retry,
    );
    let handlers = Handlers::new(Arc::new(coordinator));

    info!("stayline ready");
    let storage = if store.is_durable() {
        config.wal_path().display().to_string()
    } else {
        "in-memory".to_string()
    };
    info!("  storage: {storage}");
    info!(
        "  properties: {}, active bookings: {}",
        store.property_count(),
        store.active_booking_count()
    );
    info!("  max_in_flight: {}", config.max_in_flight);
    let metrics = config
        .metrics_port
        .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"));
    info!("  metrics: {metrics}");

    // Responses complete out of order; a single task owns stdout.
    let (out_tx, mut out_rx) = mpsc::channel::<String>(1024);
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = out_rx.recv().await {
            if stdout.write_all(line.as_bytes()).await.is_err()
                || stdout.write_all(b"\n").await.is_err()
                || stdout.flush().await.is_err()
            {
                break;
            }
        }
    });

    // Graceful shutdown: stop reading on SIGTERM/ctrl-c or EOF, drain in-flight requests
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(_) => {
                    ctrl_c.await.ok();
                }
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
        }
    };
    tokio::pin!(shutdown);

    let root = CancellationToken::new();
    let semaphore = Arc::new(Semaphore::new(config.max_in_flight));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        info!("end of input");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("reading input: {e}");
                        break;
                    }
                };
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };

                let mut ctx = RequestContext::background().with_cancellation(root.child_token());
                if let Some(timeout) = config.request_timeout {
                    ctx = ctx.deadline_at(tokio::time::Instant::now() + timeout);
                }
                let handlers = handlers.clone();
                let out_tx = out_tx.clone();
                tokio::spawn(async move {
                    let _permit = permit; // held until the response is queued
                    if let Some(reply) = driver::dispatch_line(&handlers, &ctx, &line).await {
                        let _ = out_tx.send(reply).await;
                    }
                });
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, no longer reading input");
                break;
            }
        }
    }

    // Wait for in-flight requests to finish (up to 10s), then cancel the rest
    info!("draining requests...");
    let drain_deadline = tokio::time::sleep(Duration::from_secs(10));
    tokio::pin!(drain_deadline);

    loop {
        if semaphore.available_permits() == config.max_in_flight {
            info!("all requests drained");
            break;
        }
        tokio::select! {
            _ = &mut drain_deadline => {
                let remaining = config.max_in_flight - semaphore.available_permits();
                tracing::warn!("drain timeout, cancelling {remaining} requests");
                root.cancel();
                break;
            }
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
    }

    drop(out_tx);
    let _ = tokio::time::timeout(Duration::from_secs(1), writer).await;
    info!("stayline stopped");
    Ok(())
}
