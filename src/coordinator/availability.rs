use std::sync::Arc;

use crate::context::RequestContext;
use crate::model::*;
use crate::repository::{BookingRepository, PropertyRepository};

use super::pricing::price;
use super::BookingError;

/// Read-only availability check. Advisory: it does not reserve anything, so a
/// concurrent booking can still take the range right after it answers.
pub struct AvailabilityCalculator<P, B> {
    properties: Arc<P>,
    bookings: Arc<B>,
}

impl<P, B> AvailabilityCalculator<P, B>
where
    P: PropertyRepository,
    B: BookingRepository,
{
    pub fn new(properties: Arc<P>, bookings: Arc<B>) -> Self {
        Self {
            properties,
            bookings,
        }
    }

    pub async fn compute(
        &self,
        ctx: &RequestContext,
        property_id: PropertyId,
        range: &DateRange,
    ) -> Result<Availability, BookingError> {
        let property = ctx
            .run(self.properties.get_property(property_id))
            .await??
            .ok_or(BookingError::PropertyNotFound(property_id))?;
        self.compute_for(ctx, &property, range).await
    }

    /// Same as [`compute`](Self::compute) for an already fetched property.
    pub async fn compute_for(
        &self,
        ctx: &RequestContext,
        property: &Property,
        range: &DateRange,
    ) -> Result<Availability, BookingError> {
        let active = ctx.run(self.bookings.list_active(property.id)).await??;
        Ok(evaluate(property, &active, range))
    }
}

/// Available iff no active booking overlaps `range`; priced only when available.
pub fn evaluate(property: &Property, active: &[Booking], range: &DateRange) -> Availability {
    if active.iter().any(|b| b.range().overlaps(range)) {
        Availability::taken()
    } else {
        Availability::free(price(property, range))
    }
}
