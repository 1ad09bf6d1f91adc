use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::RequestContext;
use crate::model::*;
use crate::observability;
use crate::repository::{BookingRepository, PropertyRepository, StoreError};

use super::retry::retry_transient;
use super::{BookingCoordinator, BookingError};

/// Why a single check-and-insert attempt did not produce a booking.
enum AttemptError {
    /// The conditional insert lost to a concurrent writer.
    Lost { existing: BookingId },
    Failed(BookingError),
}

impl From<BookingError> for AttemptError {
    fn from(err: BookingError) -> Self {
        AttemptError::Failed(err)
    }
}

impl From<StoreError> for AttemptError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { existing, .. } => AttemptError::Lost { existing },
            other => AttemptError::Failed(other.into()),
        }
    }
}

impl<P, B> BookingCoordinator<P, B>
where
    P: PropertyRepository,
    B: BookingRepository,
{
    /// Reserve the requested stay. Of several concurrent overlapping requests on
    /// one property at most one succeeds; the rest get `PropertyNotAvailable`.
    pub async fn book_property(
        &self,
        ctx: &RequestContext,
        request: BookingRequest,
    ) -> Result<BookingConfirmation, BookingError> {
        let started = Instant::now();
        let result = self.try_book(ctx, request).await;
        let outcome = observability::outcome_label(&result);
        metrics::counter!(observability::BOOKINGS_TOTAL, "outcome" => outcome).increment(1);
        metrics::histogram!(observability::OPERATION_DURATION_SECONDS, "operation" => "book")
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn try_book(
        &self,
        ctx: &RequestContext,
        request: BookingRequest,
    ) -> Result<BookingConfirmation, BookingError> {
        let range = request
            .range()
            .ok_or_else(|| {
                BookingError::Validation("end date should be after start date".into())
            })?;
        let property_id = request.property_id;
        let attempts = self.policy.attempts();

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt_booking(ctx, &request, &range).await {
                Ok(confirmation) => {
                    info!(
                        "booked property {property_id} {range} as {} for {:.2}",
                        confirmation.booking_id, confirmation.total_amount
                    );
                    return Ok(confirmation);
                }
                Err(AttemptError::Lost { existing }) => {
                    metrics::counter!(
                        observability::BOOKING_CONFLICTS_TOTAL,
                        "property" => property_id.to_string()
                    )
                    .increment(1);
                    if attempt >= attempts {
                        warn!(
                            "property {property_id} {range}: lost to booking {existing} \
                             after {attempt} attempts"
                        );
                        return Err(BookingError::PropertyNotAvailable { property_id, range });
                    }
                    debug!("property {property_id} {range}: conflict with {existing}, retrying");
                    metrics::counter!(
                        observability::RETRIES_TOTAL,
                        "operation" => "book",
                        "reason" => "conflict"
                    )
                    .increment(1);
                }
                Err(AttemptError::Failed(e)) if e.is_transient() && attempt < attempts => {
                    warn!("property {property_id} {range}: {e}, retrying (attempt {attempt})");
                    metrics::counter!(
                        observability::RETRIES_TOTAL,
                        "operation" => "book",
                        "reason" => "transient"
                    )
                    .increment(1);
                }
                Err(AttemptError::Failed(e)) => return Err(e),
            }
            ctx.sleep(self.policy.backoff(attempt)).await?;
        }
    }

    /// One read / decide / conditionally-write pass.
    async fn attempt_booking(
        &self,
        ctx: &RequestContext,
        request: &BookingRequest,
        range: &DateRange,
    ) -> Result<BookingConfirmation, AttemptError> {
        let property_id = request.property_id;
        let property = ctx
            .run(self.properties.get_property(property_id))
            .await??
            .ok_or(BookingError::PropertyNotFound(property_id))?;

        let availability = self.availability.compute_for(ctx, &property, range).await?;
        let total = match availability.price {
            Some(total) if availability.available => total,
            _ => {
                return Err(BookingError::PropertyNotAvailable {
                    property_id,
                    range: *range,
                }
                .into());
            }
        };

        let booking = Booking::new(Uuid::new_v4(), request.clone());
        ctx.run(self.bookings.insert_if_no_overlap(booking.clone()))
            .await??;
        Ok(BookingConfirmation::new(&booking, total))
    }

    /// Hard-delete a booking. A second cancel of the same id, concurrent or
    /// not, fails with `BookingNotFound`.
    pub async fn cancel(&self, ctx: &RequestContext, id: BookingId) -> Result<(), BookingError> {
        let started = Instant::now();
        let result =
            retry_transient(ctx, &self.policy, "cancel", move || self.try_cancel(ctx, id)).await;
        let outcome = observability::outcome_label(&result);
        metrics::counter!(observability::CANCELLATIONS_TOTAL, "outcome" => outcome).increment(1);
        metrics::histogram!(observability::OPERATION_DURATION_SECONDS, "operation" => "cancel")
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn try_cancel(&self, ctx: &RequestContext, id: BookingId) -> Result<(), BookingError> {
        ctx.run(self.bookings.get_booking(id))
            .await??
            .ok_or(BookingError::BookingNotFound(id))?;
        let removed = ctx.run(self.bookings.delete_booking(id)).await??;
        info!(
            "cancelled booking {id} on property {} {}",
            removed.property_id(),
            removed.range()
        );
        Ok(())
    }
}
