//! The concrete repository: per-property booking ledgers, a property catalog with
//! search indexes, and an optional group-committed write-ahead log.

mod bookings;
mod conflict;
mod index;
mod properties;
mod writer;

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tracing::{info, warn};

use crate::model::*;
use crate::observability;
use crate::repository::{StoreError, StoreResult};
use crate::wal::Wal;

use self::index::SearchIndexes;
use self::writer::{run_wal_writer, WalCommand};

type SharedLedger = Arc<RwLock<PropertyLedger>>;

/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

pub(crate) struct StoreInner {
    properties: DashMap<PropertyId, Property>,
    ledgers: DashMap<PropertyId, SharedLedger>,
    /// Reverse lookup: booking id → property id.
    booking_index: DashMap<BookingId, PropertyId>,
    search: SearchIndexes,
    /// Commits hold this shared; compaction holds it exclusively so nothing is
    /// appended between the snapshot and the WAL swap.
    commit_gate: RwLock<()>,
    registration: Mutex<()>,
    wal_tx: Option<mpsc::Sender<WalCommand>>,
}

impl Store {
    /// A store with no durability. State lives as long as the value.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(StoreInner::new(None)),
        }
    }

    /// Open a WAL-backed store, replaying any existing log at `wal_path`.
    /// Must be called inside a tokio runtime: the WAL writer runs as a task.
    pub fn open(wal_path: PathBuf) -> io::Result<Self> {
        let (wal, events) = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(run_wal_writer(wal, wal_rx));

        let inner = StoreInner::new(Some(wal_tx));
        inner.replay(&events);
        info!(
            "opened store {}: {} properties, {} active bookings ({} events replayed)",
            wal_path.display(),
            inner.properties.len(),
            inner.booking_index.len(),
            events.len()
        );
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn is_durable(&self) -> bool {
        self.inner.wal_tx.is_some()
    }

    pub fn property_count(&self) -> usize {
        self.inner.properties.len()
    }

    pub fn active_booking_count(&self) -> usize {
        self.inner.booking_index.len()
    }

    /// Add a property to the catalog.
    pub async fn register_property(&self, property: Property) -> StoreResult<()> {
        self.detached(move |inner| inner.commit_property(property)).await
    }

    /// Rewrite the WAL with only the events needed to rebuild the current state.
    pub async fn compact_wal(&self) -> StoreResult<()> {
        let Some(wal_tx) = &self.inner.wal_tx else {
            return Ok(());
        };
        let _gate = self.inner.commit_gate.write().await;
        let events = self.inner.snapshot().await;
        let count = events.len();

        let (tx, rx) = oneshot::channel();
        wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| StoreError::Fatal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Fatal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::from_io(&e))?;
        info!("compacted WAL to {count} events");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let Some(wal_tx) = &self.inner.wal_tx else {
            return 0;
        };
        let (tx, rx) = oneshot::channel();
        if wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Make the WAL writer fail its next commit halfway through.
    #[cfg(test)]
    async fn fail_next_wal_write(&self, kind: io::ErrorKind) {
        if let Some(wal_tx) = &self.inner.wal_tx {
            wal_tx.send(WalCommand::FailNextWrite { kind }).await.unwrap();
        }
    }

    /// Run a commit to completion even if the caller stops waiting for it,
    /// so the ledger and the WAL never disagree.
    async fn detached<T, F, Fut>(&self, commit: F) -> StoreResult<T>
    where
        F: FnOnce(Arc<StoreInner>) -> Fut,
        Fut: Future<Output = StoreResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        tokio::spawn(commit(self.inner.clone()))
            .await
            .map_err(|e| StoreError::Fatal(format!("commit task failed: {e}")))?
    }
}

impl StoreInner {
    fn new(wal_tx: Option<mpsc::Sender<WalCommand>>) -> Self {
        Self {
            properties: DashMap::new(),
            ledgers: DashMap::new(),
            booking_index: DashMap::new(),
            search: SearchIndexes::default(),
            commit_gate: RwLock::new(()),
            registration: Mutex::new(()),
            wal_tx,
        }
    }

    fn ledger(&self, property_id: PropertyId) -> Option<SharedLedger> {
        self.ledgers.get(&property_id).map(|e| e.value().clone())
    }

    fn index_property(&self, property: Property) {
        self.search.insert(&property);
        self.properties.insert(property.id, property);
    }

    /// Append an event to the WAL via the group-commit writer. No-op when in memory.
    async fn persist(&self, event: &Event) -> StoreResult<()> {
        let Some(wal_tx) = &self.wal_tx else {
            return Ok(());
        };
        let (tx, rx) = oneshot::channel();
        wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Fatal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Fatal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::from_io(&e))
    }

    async fn commit_property(self: Arc<Self>, property: Property) -> StoreResult<()> {
        conflict::validate_property(&property)?;
        let _gate = self.commit_gate.read().await;
        let _registration = self.registration.lock().await;
        if self.properties.contains_key(&property.id) {
            return Err(StoreError::AlreadyExists(property.id));
        }

        let event = Event::PropertyRegistered {
            property: property.clone(),
        };
        self.persist(&event).await?;
        let id = property.id;
        self.ledgers
            .insert(id, Arc::new(RwLock::new(PropertyLedger::new(id))));
        self.index_property(property);
        Ok(())
    }

    /// Rebuild state from replayed events. Only called before the store is shared.
    fn replay(&self, events: &[Event]) {
        let mut ledgers: HashMap<PropertyId, PropertyLedger> = HashMap::new();
        for event in events {
            match event {
                Event::PropertyRegistered { property } => {
                    if ledgers.contains_key(&property.id) {
                        warn!(
                            "replay: property {} registered twice, keeping the first",
                            property.id
                        );
                        continue;
                    }
                    ledgers.insert(property.id, PropertyLedger::new(property.id));
                    self.index_property(property.clone());
                }
                Event::BookingConfirmed { booking } => {
                    let Some(ledger) = ledgers.get_mut(&booking.property_id()) else {
                        warn!(
                            "replay: booking {} references unknown property {}",
                            booking.id,
                            booking.property_id()
                        );
                        continue;
                    };
                    if self.booking_index.contains_key(&booking.id) {
                        warn!("replay: booking {} confirmed twice, keeping the first", booking.id);
                        continue;
                    }
                    if let Err(e) = conflict::check_no_overlap(ledger, booking) {
                        metrics::counter!(observability::REPLAY_CONFLICTS_TOTAL).increment(1);
                        warn!("replay: dropping booking {}: {e}", booking.id);
                        continue;
                    }
                    self.booking_index.insert(booking.id, booking.property_id());
                    ledger.insert_booking(booking.clone());
                }
                Event::BookingCancelled { id, property_id } => {
                    if let Some(ledger) = ledgers.get_mut(property_id) {
                        ledger.remove_booking(*id);
                    }
                    self.booking_index.remove(id);
                }
            }
        }
        for (id, ledger) in ledgers {
            self.ledgers.insert(id, Arc::new(RwLock::new(ledger)));
        }
    }

    /// Minimal event list recreating the current state. Caller holds the commit gate.
    async fn snapshot(&self) -> Vec<Event> {
        let mut properties: Vec<Property> =
            self.properties.iter().map(|e| e.value().clone()).collect();
        properties.sort_by_key(|p| p.id);

        let mut events = Vec::with_capacity(properties.len() + self.booking_index.len());
        for property in properties {
            let ledger = self.ledger(property.id);
            events.push(Event::PropertyRegistered { property });
            if let Some(ledger) = ledger {
                let guard = ledger.read().await;
                events.extend(guard.bookings.iter().map(|b| Event::BookingConfirmed {
                    booking: b.clone(),
                }));
            }
        }
        events
    }
}
