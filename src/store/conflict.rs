use crate::model::*;
use crate::repository::{StoreError, StoreResult};

/// Reject a booking that overlaps any active booking in the ledger.
/// Caller holds the ledger's write lock, which is what makes check + insert atomic.
pub(super) fn check_no_overlap(ledger: &PropertyLedger, booking: &Booking) -> StoreResult<()> {
    let range = booking.range();
    if let Some(existing) = ledger.overlapping(&range).next() {
        return Err(StoreError::Conflict {
            property_id: ledger.property_id,
            range,
            existing: existing.id,
        });
    }
    Ok(())
}

pub(super) fn validate_property(property: &Property) -> StoreResult<()> {
    if !property.nightly_rate.is_finite() {
        return Err(StoreError::InvalidProperty {
            id: property.id,
            reason: "nightly rate must be finite",
        });
    }
    if property.nightly_rate < 0.0 {
        return Err(StoreError::InvalidProperty {
            id: property.id,
            reason: "nightly rate must not be negative",
        });
    }
    Ok(())
}
