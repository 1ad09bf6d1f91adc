use std::io;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::model::Event;
use crate::observability;
use crate::wal::Wal;

/// Most commands taken off the channel per wakeup.
const MAX_BATCH: usize = 512;

type Reply<T> = oneshot::Sender<io::Result<T>>;

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: Reply<()>,
    },
    Compact {
        events: Vec<Event>,
        response: Reply<()>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
    #[cfg(test)]
    FailNextWrite { kind: io::ErrorKind },
}

/// Owns the log. Every wakeup drains whatever commands are queued; appends
/// are staged and share one fsync, and any other command first commits the
/// appends queued ahead of it so ordering is kept.
pub(super) async fn run_wal_writer(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    let mut inbox = Vec::with_capacity(MAX_BATCH);
    let mut waiting: Vec<Reply<()>> = Vec::new();

    while rx.recv_many(&mut inbox, MAX_BATCH).await > 0 {
        for cmd in inbox.drain(..) {
            match cmd {
                WalCommand::Append { event, response } => {
                    wal.stage(&event);
                    waiting.push(response);
                }
                WalCommand::Compact { events, response } => {
                    commit_staged(&mut wal, &mut waiting);
                    let _ = response.send(wal.compact(&events));
                }
                WalCommand::AppendsSinceCompact { response } => {
                    commit_staged(&mut wal, &mut waiting);
                    let _ = response.send(wal.appends_since_compact());
                }
                #[cfg(test)]
                WalCommand::FailNextWrite { kind } => {
                    commit_staged(&mut wal, &mut waiting);
                    wal.fail_next_write(kind);
                }
            }
        }
        commit_staged(&mut wal, &mut waiting);
    }
    debug!("WAL writer for {} stopped", wal.path().display());
}

/// Commit the staged events and answer everyone waiting on them with the
/// same outcome. Memory is only updated by callers that see `Ok`.
fn commit_staged(wal: &mut Wal, waiting: &mut Vec<Reply<()>>) {
    if waiting.is_empty() {
        return;
    }
    metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(waiting.len() as f64);
    let started = Instant::now();
    let result = wal.commit();
    metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());

    if let Err(e) = &result {
        let recovery = if wal.is_poisoned() { "poisoned" } else { "rolled_back" };
        metrics::counter!(observability::WAL_COMMIT_FAILURES_TOTAL, "recovery" => recovery)
            .increment(1);
        error!("WAL commit of {} events failed ({recovery}): {e}", waiting.len());
    }
    for response in waiting.drain(..) {
        let reply = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = response.send(reply);
    }
}
