use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Externally assigned property identifier.
pub type PropertyId = i64;

/// Booking identifier, a random (v4) UUID generated at creation.
pub type BookingId = Uuid;

/// Half-open overlap predicate over `[s1, e1)` and `[s2, e2)`.
///
/// Adjacent ranges (`e1 == s2`) never overlap: a checkout day may be the next check-in day.
pub fn overlap(s1: NaiveDate, e1: NaiveDate, s2: NaiveDate, e2: NaiveDate) -> bool {
    s1 < e2 && e1 > s2
}

/// Half-open date interval `[start, end)`. `end` is the checkout day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start < end, "DateRange start must be before end");
        Self { start, end }
    }

    /// Returns `None` unless `start < end`.
    pub fn checked(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// Whole nights between check-in and checkout.
    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn overlaps(&self, other: &DateRange) -> bool {
        overlap(self.start, self.end, other.start, other.end)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// A rentable property. Only `id` and `nightly_rate` matter for booking; the rest is for search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: PropertyId,
    pub nightly_rate: f64,
    pub city: String,
    pub country: String,
    pub bedrooms: u32,
    pub guests: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub property_id: PropertyId,
    pub customer_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl BookingRequest {
    /// The requested stay, or `None` if the dates are out of order.
    pub fn range(&self) -> Option<DateRange> {
        DateRange::checked(self.start_date, self.end_date)
    }
}

/// Cancellation removes the record, so `Active` is the only persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Active,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub request: BookingRequest,
    pub status: BookingStatus,
}

impl Booking {
    pub fn new(id: BookingId, request: BookingRequest) -> Self {
        Self {
            id,
            request,
            status: BookingStatus::Active,
        }
    }

    pub fn property_id(&self) -> PropertyId {
        self.request.property_id
    }

    pub fn range(&self) -> DateRange {
        DateRange::new(self.request.start_date, self.request.end_date)
    }
}

/// Computed, never persisted. `price` is only present when `available`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

impl Availability {
    pub fn free(price: f64) -> Self {
        Self {
            available: true,
            price: Some(price),
        }
    }

    pub fn taken() -> Self {
        Self {
            available: false,
            price: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmation {
    pub booking_id: BookingId,
    pub property_id: PropertyId,
    pub customer_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_amount: f64,
}

impl BookingConfirmation {
    pub fn new(booking: &Booking, total_amount: f64) -> Self {
        Self {
            booking_id: booking.id,
            property_id: booking.request.property_id,
            customer_name: booking.request.customer_name.clone(),
            start_date: booking.request.start_date,
            end_date: booking.request.end_date,
            total_amount,
        }
    }
}

// ── Search ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilter {
    pub city: Option<String>,
    pub country: Option<String>,
    pub bedrooms: Option<u32>,
    pub guests: Option<u32>,
}

/// The lookup index a search is served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchIndex {
    City(String),
    Country(String),
    Bedrooms(u32),
    Guests(u32),
}

impl SearchFilter {
    /// Primary index by precedence `city > country > bedrooms > guests`.
    pub fn primary(&self) -> Option<SearchIndex> {
        if let Some(city) = &self.city {
            Some(SearchIndex::City(city.clone()))
        } else if let Some(country) = &self.country {
            Some(SearchIndex::Country(country.clone()))
        } else if let Some(bedrooms) = self.bedrooms {
            Some(SearchIndex::Bedrooms(bedrooms))
        } else {
            self.guests.map(SearchIndex::Guests)
        }
    }

    /// Conjunction of every supplied filter.
    pub fn matches(&self, property: &Property) -> bool {
        self.city.as_ref().is_none_or(|c| *c == property.city)
            && self.country.as_ref().is_none_or(|c| *c == property.country)
            && self.bedrooms.is_none_or(|b| b == property.bedrooms)
            && self.guests.is_none_or(|g| g == property.guests)
    }
}

// ── Per-property booking ledger ──────────────────────────────────

#[derive(Debug, Clone)]
pub struct PropertyLedger {
    pub property_id: PropertyId,
    /// Active bookings, sorted by start date.
    pub bookings: Vec<Booking>,
}

impl PropertyLedger {
    pub fn new(property_id: PropertyId) -> Self {
        Self {
            property_id,
            bookings: Vec::new(),
        }
    }

    /// Insert booking maintaining sort order by start date.
    pub fn insert_booking(&mut self, booking: Booking) {
        let start = booking.request.start_date;
        let pos = self
            .bookings
            .partition_point(|b| b.request.start_date <= start);
        self.bookings.insert(pos, booking);
    }

    pub fn remove_booking(&mut self, id: BookingId) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    pub fn get(&self, id: BookingId) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    /// Bookings overlapping the query range.
    /// Binary search skips bookings starting at or after `query.end`.
    pub fn overlapping(&self, query: &DateRange) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.request.start_date < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.request.end_date > query.start)
    }
}

/// Storage events, one per committed change. This is the WAL record vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    PropertyRegistered { property: Property },
    BookingConfirmed { booking: Booking },
    BookingCancelled { id: BookingId, property_id: PropertyId },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn booking(start: NaiveDate, end: NaiveDate) -> Booking {
        Booking::new(
            Uuid::new_v4(),
            BookingRequest {
                property_id: 1,
                customer_name: "Ada".into(),
                start_date: start,
                end_date: end,
            },
        )
    }

    fn property(city: &str, country: &str, bedrooms: u32, guests: u32) -> Property {
        Property {
            id: 1,
            nightly_rate: 50.0,
            city: city.into(),
            country: country.into(),
            bedrooms,
            guests,
        }
    }

    #[test]
    fn range_basics() {
        let r = DateRange::new(d(2024, 1, 10), d(2024, 1, 12));
        assert_eq!(r.nights(), 2);
        // Checkout day is free for the next arrival
        assert!(!r.overlaps(&DateRange::new(d(2024, 1, 12), d(2024, 1, 13))));
        assert!(r.overlaps(&DateRange::new(d(2024, 1, 11), d(2024, 1, 13))));
    }

    #[test]
    fn range_checked_rejects_empty_and_reversed() {
        assert!(DateRange::checked(d(2024, 1, 10), d(2024, 1, 10)).is_none());
        assert!(DateRange::checked(d(2024, 1, 12), d(2024, 1, 10)).is_none());
        assert!(DateRange::checked(d(2024, 1, 10), d(2024, 1, 11)).is_some());
    }

    #[test]
    fn range_overlap() {
        let a = DateRange::new(d(2024, 1, 10), d(2024, 1, 15));
        let b = DateRange::new(d(2024, 1, 14), d(2024, 1, 16));
        let c = DateRange::new(d(2024, 1, 15), d(2024, 1, 16));
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn overlap_predicate_containment() {
        // Outer fully contains inner in both argument orders
        assert!(overlap(d(2024, 1, 1), d(2024, 1, 31), d(2024, 1, 10), d(2024, 1, 11)));
        assert!(overlap(d(2024, 1, 10), d(2024, 1, 11), d(2024, 1, 1), d(2024, 1, 31)));
        // Identical ranges
        assert!(overlap(d(2024, 1, 1), d(2024, 1, 2), d(2024, 1, 1), d(2024, 1, 2)));
    }

    #[test]
    fn range_display_is_half_open() {
        let r = DateRange::new(d(2024, 1, 10), d(2024, 1, 12));
        assert_eq!(r.to_string(), "[2024-01-10, 2024-01-12)");
    }

    #[test]
    fn request_range_requires_order() {
        let mut req = booking(d(2024, 1, 10), d(2024, 1, 12)).request;
        assert!(req.range().is_some());
        req.end_date = req.start_date;
        assert!(req.range().is_none());
    }

    #[test]
    fn ledger_keeps_start_order() {
        let mut ledger = PropertyLedger::new(1);
        ledger.insert_booking(booking(d(2024, 3, 1), d(2024, 3, 5)));
        ledger.insert_booking(booking(d(2024, 1, 1), d(2024, 1, 5)));
        ledger.insert_booking(booking(d(2024, 2, 1), d(2024, 2, 5)));
        let starts: Vec<_> = ledger.bookings.iter().map(|b| b.request.start_date).collect();
        assert_eq!(starts, vec![d(2024, 1, 1), d(2024, 2, 1), d(2024, 3, 1)]);
    }

    #[test]
    fn ledger_remove() {
        let mut ledger = PropertyLedger::new(1);
        let b = booking(d(2024, 1, 1), d(2024, 1, 5));
        let id = b.id;
        ledger.insert_booking(b);
        assert!(ledger.remove_booking(Uuid::new_v4()).is_none());
        assert_eq!(ledger.remove_booking(id).map(|b| b.id), Some(id));
        assert!(ledger.bookings.is_empty());
        assert!(ledger.remove_booking(id).is_none());
    }

    #[test]
    fn overlapping_skips_past_and_future() {
        let mut ledger = PropertyLedger::new(1);
        ledger.insert_booking(booking(d(2024, 1, 1), d(2024, 1, 5)));
        ledger.insert_booking(booking(d(2024, 1, 8), d(2024, 1, 12)));
        ledger.insert_booking(booking(d(2024, 2, 1), d(2024, 2, 5)));

        let query = DateRange::new(d(2024, 1, 10), d(2024, 1, 20));
        let hits: Vec<_> = ledger.overlapping(&query).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].request.start_date, d(2024, 1, 8));
    }

    #[test]
    fn overlapping_adjacent_not_included() {
        let mut ledger = PropertyLedger::new(1);
        ledger.insert_booking(booking(d(2024, 1, 10), d(2024, 1, 15)));
        // Ends on query start
        let after = DateRange::new(d(2024, 1, 15), d(2024, 1, 16));
        assert_eq!(ledger.overlapping(&after).count(), 0);
        // Starts on query end
        let before = DateRange::new(d(2024, 1, 5), d(2024, 1, 10));
        assert_eq!(ledger.overlapping(&before).count(), 0);
    }

    #[test]
    fn overlapping_long_stay_spanning_query() {
        let mut ledger = PropertyLedger::new(1);
        ledger.insert_booking(booking(d(2024, 1, 1), d(2024, 12, 31)));
        let query = DateRange::new(d(2024, 6, 1), d(2024, 6, 2));
        assert_eq!(ledger.overlapping(&query).count(), 1);
    }

    #[test]
    fn search_primary_precedence() {
        let mut f = SearchFilter {
            city: Some("Lisbon".into()),
            country: Some("Portugal".into()),
            bedrooms: Some(2),
            guests: Some(4),
        };
        assert_eq!(f.primary(), Some(SearchIndex::City("Lisbon".into())));
        f.city = None;
        assert_eq!(f.primary(), Some(SearchIndex::Country("Portugal".into())));
        f.country = None;
        assert_eq!(f.primary(), Some(SearchIndex::Bedrooms(2)));
        f.bedrooms = None;
        assert_eq!(f.primary(), Some(SearchIndex::Guests(4)));
        f.guests = None;
        assert_eq!(f.primary(), None);
    }

    #[test]
    fn search_matches_is_conjunction() {
        let p = property("Lisbon", "Portugal", 2, 4);
        let f = SearchFilter {
            city: Some("Lisbon".into()),
            bedrooms: Some(2),
            ..Default::default()
        };
        assert!(f.matches(&p));
        let f = SearchFilter {
            city: Some("Lisbon".into()),
            guests: Some(6),
            ..Default::default()
        };
        assert!(!f.matches(&p));
        assert!(SearchFilter::default().matches(&p));
    }

    #[test]
    fn booking_request_json_shape() {
        let json = r#"{"propertyId":7,"customerName":"Ada","startDate":"2024-01-10","endDate":"2024-01-12"}"#;
        let req: BookingRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.property_id, 7);
        assert_eq!(req.start_date, d(2024, 1, 10));
        assert_eq!(req.range().unwrap().nights(), 2);
    }

    #[test]
    fn unavailable_omits_price() {
        let json = serde_json::to_value(Availability::taken()).unwrap();
        assert_eq!(json, serde_json::json!({ "available": false }));
        let json = serde_json::to_value(Availability::free(100.0)).unwrap();
        assert_eq!(json, serde_json::json!({ "available": true, "price": 100.0 }));
    }
}
