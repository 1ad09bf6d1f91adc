//! Storage contracts consumed by the booking coordinator.
//!
//! The coordinator never locks anything itself. Whatever implements
//! [`BookingRepository::insert_if_no_overlap`] must make the overlap check and the
//! write a single atomic step for that property.

use std::io;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::*;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("property {0} already exists")]
    AlreadyExists(PropertyId),

    #[error("property {0} not found")]
    PropertyNotFound(PropertyId),

    #[error("booking {0} not found")]
    BookingNotFound(BookingId),

    #[error("booking {0} already exists")]
    DuplicateBooking(BookingId),

    #[error("stay {range} on property {property_id} overlaps booking {existing}")]
    Conflict {
        property_id: PropertyId,
        range: DateRange,
        existing: BookingId,
    },

    #[error("invalid property {id}: {reason}")]
    InvalidProperty { id: PropertyId, reason: &'static str },

    #[error("transient storage failure: {0}")]
    Transient(String),

    #[error("storage failure: {0}")]
    Fatal(String),
}

impl StoreError {
    /// Safe to retry: the write did not happen.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }

    pub fn from_io(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
            | io::ErrorKind::StorageFull => StoreError::Transient(err.to_string()),
            _ => StoreError::Fatal(err.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait PropertyRepository: Send + Sync {
    async fn get_property(&self, id: PropertyId) -> StoreResult<Option<Property>>;

    /// Served from the filter's primary index, post-filtered by the rest.
    /// An empty filter yields an empty result.
    async fn search_properties(&self, filter: &SearchFilter) -> StoreResult<Vec<Property>>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Active bookings for a property, in no particular order.
    async fn list_active(&self, property_id: PropertyId) -> StoreResult<Vec<Booking>>;

    /// Insert only if no active booking on the same property overlaps at write time.
    /// Fails with [`StoreError::Conflict`] otherwise.
    async fn insert_if_no_overlap(&self, booking: Booking) -> StoreResult<()>;

    async fn get_booking(&self, id: BookingId) -> StoreResult<Option<Booking>>;

    /// Remove and return the booking. Exactly one of several concurrent deletes of the
    /// same id succeeds; the others get [`StoreError::BookingNotFound`].
    async fn delete_booking(&self, id: BookingId) -> StoreResult<Booking>;
}
