//! Booking coordination: availability, pricing, and the optimistic
//! read / decide / conditionally-write loop that keeps bookings on one property
//! from overlapping.

mod availability;
mod error;
mod mutations;
mod pricing;
mod queries;
mod retry;

pub use availability::{evaluate, AvailabilityCalculator};
pub use error::{BookingError, ErrorKind};
pub use pricing::price;
pub use retry::RetryPolicy;

use std::sync::Arc;

use crate::repository::{BookingRepository, PropertyRepository};

/// Built from injected repository handles. Holds no booking state of its own:
/// the repositories are the only shared state.
pub struct BookingCoordinator<P, B> {
    properties: Arc<P>,
    bookings: Arc<B>,
    availability: AvailabilityCalculator<P, B>,
    policy: RetryPolicy,
}

impl<P, B> BookingCoordinator<P, B>
where
    P: PropertyRepository,
    B: BookingRepository,
{
    pub fn new(properties: Arc<P>, bookings: Arc<B>) -> Self {
        Self::with_policy(properties, bookings, RetryPolicy::default())
    }

    pub fn with_policy(properties: Arc<P>, bookings: Arc<B>, policy: RetryPolicy) -> Self {
        let availability = AvailabilityCalculator::new(properties.clone(), bookings.clone());
        Self {
            properties,
            bookings,
            availability,
            policy,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}
