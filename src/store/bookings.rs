use std::sync::Arc;

use async_trait::async_trait;

use crate::model::*;
use crate::repository::{BookingRepository, StoreError, StoreResult};

use super::conflict::check_no_overlap;
use super::{Store, StoreInner};

#[async_trait]
impl BookingRepository for Store {
    async fn list_active(&self, property_id: PropertyId) -> StoreResult<Vec<Booking>> {
        let Some(ledger) = self.inner.ledger(property_id) else {
            return Ok(Vec::new());
        };
        let guard = ledger.read().await;
        Ok(guard.bookings.clone())
    }

    async fn insert_if_no_overlap(&self, booking: Booking) -> StoreResult<()> {
        self.detached(move |inner| inner.commit_booking(booking))
            .await
    }

    async fn get_booking(&self, id: BookingId) -> StoreResult<Option<Booking>> {
        let Some(property_id) = self.inner.booking_index.get(&id).map(|e| *e.value()) else {
            return Ok(None);
        };
        let Some(ledger) = self.inner.ledger(property_id) else {
            return Ok(None);
        };
        let guard = ledger.read().await;
        Ok(guard.get(id).cloned())
    }

    async fn delete_booking(&self, id: BookingId) -> StoreResult<Booking> {
        self.detached(move |inner| inner.commit_cancellation(id)).await
    }
}

impl StoreInner {
    /// Overlap check + WAL append + apply, all under the property's write lock.
    pub(super) async fn commit_booking(self: Arc<Self>, booking: Booking) -> StoreResult<()> {
        let property_id = booking.property_id();
        let ledger = self
            .ledger(property_id)
            .ok_or(StoreError::PropertyNotFound(property_id))?;

        let _gate = self.commit_gate.read().await;
        let mut guard = ledger.write().await;
        if self.booking_index.contains_key(&booking.id) {
            return Err(StoreError::DuplicateBooking(booking.id));
        }
        check_no_overlap(&guard, &booking)?;

        let event = Event::BookingConfirmed {
            booking: booking.clone(),
        };
        self.persist(&event).await?;
        self.booking_index.insert(booking.id, property_id);
        guard.insert_booking(booking);
        Ok(())
    }

    /// Remove a booking. Presence is re-checked under the write lock, so of two
    /// racing cancellations only the first finds it.
    pub(super) async fn commit_cancellation(
        self: Arc<Self>,
        id: BookingId,
    ) -> StoreResult<Booking> {
        let property_id = self
            .booking_index
            .get(&id)
            .map(|e| *e.value())
            .ok_or(StoreError::BookingNotFound(id))?;
        let ledger = self
            .ledger(property_id)
            .ok_or(StoreError::BookingNotFound(id))?;

        let _gate = self.commit_gate.read().await;
        let mut guard = ledger.write().await;
        if guard.get(id).is_none() {
            return Err(StoreError::BookingNotFound(id));
        }

        let event = Event::BookingCancelled { id, property_id };
        self.persist(&event).await?;
        self.booking_index.remove(&id);
        guard
            .remove_booking(id)
            .ok_or(StoreError::BookingNotFound(id))
    }
}
