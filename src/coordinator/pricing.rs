use crate::model::*;

/// `nights × nightly rate`. The range invariant guarantees at least one night.
pub fn price(property: &Property, range: &DateRange) -> f64 {
    range.nights() as f64 * property.nightly_rate
}
