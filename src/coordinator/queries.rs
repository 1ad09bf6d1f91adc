use std::time::Instant;

use crate::context::RequestContext;
use crate::model::*;
use crate::observability;
use crate::repository::{BookingRepository, PropertyRepository};

use super::retry::retry_transient;
use super::{BookingCoordinator, BookingError};

impl<P, B> BookingCoordinator<P, B>
where
    P: PropertyRepository,
    B: BookingRepository,
{
    /// Advisory: a later `book_property` for the same range may still lose.
    pub async fn get_availability(
        &self,
        ctx: &RequestContext,
        property_id: PropertyId,
        range: DateRange,
    ) -> Result<Availability, BookingError> {
        let started = Instant::now();
        let range = &range;
        let result = retry_transient(ctx, &self.policy, "availability", move || {
            self.availability.compute(ctx, property_id, range)
        })
        .await;
        metrics::histogram!(
            observability::OPERATION_DURATION_SECONDS,
            "operation" => "availability"
        )
        .record(started.elapsed().as_secs_f64());
        result
    }

    pub async fn get_property(
        &self,
        ctx: &RequestContext,
        id: PropertyId,
    ) -> Result<Property, BookingError> {
        retry_transient(ctx, &self.policy, "get_property", move || async move {
            ctx.run(self.properties.get_property(id))
                .await??
                .ok_or(BookingError::PropertyNotFound(id))
        })
        .await
    }

    /// Properties matching every supplied filter, ordered by id. At least one
    /// filter is required.
    pub async fn search_properties(
        &self,
        ctx: &RequestContext,
        filter: &SearchFilter,
    ) -> Result<Vec<Property>, BookingError> {
        if filter.primary().is_none() {
            return Err(BookingError::Validation(
                "at least one search filter is required".into(),
            ));
        }
        let started = Instant::now();
        let result = retry_transient(ctx, &self.policy, "search", move || async move {
            ctx.run(self.properties.search_properties(filter))
                .await?
                .map_err(BookingError::from)
        })
        .await;
        metrics::histogram!(observability::OPERATION_DURATION_SECONDS, "operation" => "search")
            .record(started.elapsed().as_secs_f64());
        result
    }
}
