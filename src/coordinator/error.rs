use thiserror::Error;

use crate::model::*;
use crate::repository::StoreError;

/// Failure classes of the booking core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-order input.
    Validation,
    /// Unknown property or booking.
    NotFound,
    /// The range is taken, either already or by a concurrent winner.
    Conflict,
    /// Storage I/O failure that may succeed if repeated.
    TransientStorage,
    Timeout,
    Cancelled,
    /// Anything unclassified. Never retried.
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BookingError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("property {0} not found")]
    PropertyNotFound(PropertyId),

    #[error("booking {0} not found")]
    BookingNotFound(BookingId),

    #[error("property {property_id} is not available for {range}")]
    PropertyNotAvailable {
        property_id: PropertyId,
        range: DateRange,
    },

    #[error("transient storage failure: {0}")]
    TransientStorage(String),

    #[error("deadline exceeded")]
    Timeout,

    #[error("request cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl BookingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingError::Validation(_) => ErrorKind::Validation,
            BookingError::PropertyNotFound(_) | BookingError::BookingNotFound(_) => {
                ErrorKind::NotFound
            }
            BookingError::PropertyNotAvailable { .. } => ErrorKind::Conflict,
            BookingError::TransientStorage(_) => ErrorKind::TransientStorage,
            BookingError::Timeout => ErrorKind::Timeout,
            BookingError::Cancelled => ErrorKind::Cancelled,
            BookingError::Internal(_) => ErrorKind::Fatal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::TransientStorage
    }
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PropertyNotFound(id) => BookingError::PropertyNotFound(id),
            StoreError::BookingNotFound(id) => BookingError::BookingNotFound(id),
            StoreError::Conflict {
                property_id, range, ..
            } => BookingError::PropertyNotAvailable { property_id, range },
            StoreError::InvalidProperty { id, reason } => {
                BookingError::Validation(format!("property {id}: {reason}"))
            }
            StoreError::Transient(msg) => BookingError::TransientStorage(msg),
            e @ (StoreError::AlreadyExists(_)
            | StoreError::DuplicateBooking(_)
            | StoreError::Fatal(_)) => BookingError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    #[test]
    fn conflict_surfaces_as_unavailable() {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 14).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 16).unwrap(),
        );
        let err: BookingError = StoreError::Conflict {
            property_id: 3,
            range,
            existing: Uuid::new_v4(),
        }
        .into();
        assert_eq!(err, BookingError::PropertyNotAvailable { property_id: 3, range });
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn store_errors_map_to_kinds() {
        let cases = [
            (StoreError::PropertyNotFound(1), ErrorKind::NotFound),
            (StoreError::BookingNotFound(Uuid::new_v4()), ErrorKind::NotFound),
            (StoreError::Transient("disk busy".into()), ErrorKind::TransientStorage),
            (StoreError::Fatal("disk gone".into()), ErrorKind::Fatal),
            (StoreError::AlreadyExists(1), ErrorKind::Fatal),
        ];
        for (store_err, kind) in cases {
            assert_eq!(BookingError::from(store_err).kind(), kind);
        }
    }

    #[test]
    fn only_storage_hiccups_are_transient() {
        assert!(BookingError::TransientStorage("x".into()).is_transient());
        assert!(!BookingError::Internal("x".into()).is_transient());
        assert!(!BookingError::Timeout.is_transient());
        assert!(!BookingError::PropertyNotFound(1).is_transient());
    }
}
