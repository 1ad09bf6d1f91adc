//! Transport-agnostic request handlers: raw string inputs in, `{status, body}` out.
//!
//! Input validation lives here; the coordinator only sees well-formed requests.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::coordinator::{BookingCoordinator, BookingError};
use crate::model::*;
use crate::repository::{BookingRepository, PropertyRepository};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub status: u16,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub body: Value,
}

impl Response {
    fn json<T: Serialize>(status: u16, body: &T) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self { status, body },
            Err(e) => {
                error!("response encoding failed: {e}");
                Self::error(500, "Internal server error")
            }
        }
    }

    fn empty(status: u16) -> Self {
        Self {
            status,
            body: Value::Null,
        }
    }

    pub fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: json!({ "error": message }),
        }
    }

    /// The `error` message, if this is an error response.
    pub fn error_message(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }
}

fn failure(err: &BookingError) -> Response {
    match err {
        BookingError::Validation(msg) => Response::error(400, msg),
        BookingError::PropertyNotFound(_) => Response::error(404, "Property not found"),
        BookingError::BookingNotFound(_) => Response::error(404, "Booking not found"),
        BookingError::PropertyNotAvailable { .. } => Response::error(409, "Property not available"),
        BookingError::Timeout => Response::error(504, "Request timed out"),
        BookingError::Cancelled => Response::error(503, "Request cancelled"),
        BookingError::TransientStorage(_) | BookingError::Internal(_) => {
            error!("request failed: {err}");
            Response::error(500, "Internal server error")
        }
    }
}

fn required<'a>(value: Option<&'a str>, missing: &str, empty: &str) -> Result<&'a str, Response> {
    match value {
        None => Err(Response::error(400, missing)),
        Some("") => Err(Response::error(400, empty)),
        Some(v) => Ok(v),
    }
}

fn property_id(raw: Option<&str>) -> Result<PropertyId, Response> {
    required(raw, "No property id found", "Empty property id")?
        .parse()
        .map_err(|_| Response::error(400, "Invalid property id"))
}

fn date(raw: Option<&str>, missing: &str, invalid: &str) -> Result<NaiveDate, Response> {
    let raw = raw.ok_or_else(|| Response::error(400, missing))?;
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| Response::error(400, invalid))
}

fn stay(start: NaiveDate, end: NaiveDate) -> Result<DateRange, Response> {
    DateRange::checked(start, end)
        .ok_or_else(|| Response::error(400, "End date should be after start date"))
}

fn body<'a>(raw: &'a str) -> Result<&'a str, Response> {
    if raw.trim().is_empty() {
        return Err(Response::error(400, "Empty body"));
    }
    Ok(raw)
}

fn into_response(result: Result<Response, Response>) -> Response {
    result.unwrap_or_else(|r| r)
}

pub struct Handlers<P, B> {
    coordinator: Arc<BookingCoordinator<P, B>>,
}

impl<P, B> Clone for Handlers<P, B> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
        }
    }
}

impl<P, B> Handlers<P, B>
where
    P: PropertyRepository,
    B: BookingRepository,
{
    pub fn new(coordinator: Arc<BookingCoordinator<P, B>>) -> Self {
        Self { coordinator }
    }

    /// `GET /properties/{propertyId}/availability?startDate=..&endDate=..`
    pub async fn availability(
        &self,
        ctx: &RequestContext,
        property: Option<&str>,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Response {
        into_response(async {
            let id = property_id(property)?;
            let start = date(start_date, "No start date found", "Invalid start date")?;
            let end = date(end_date, "No end date found", "Invalid end date")?;
            let range = stay(start, end)?;
            let availability = self
                .coordinator
                .get_availability(ctx, id, range)
                .await
                .map_err(|e| failure(&e))?;
            Ok::<_, Response>(Response::json(200, &availability))
        }
        .await)
    }

    /// `POST /bookings` with a JSON booking request.
    pub async fn book(&self, ctx: &RequestContext, raw: &str) -> Response {
        into_response(async {
            let request: BookingRequest = serde_json::from_str(body(raw)?)
                .map_err(|_| Response::error(400, "Invalid JSON"))?;
            stay(request.start_date, request.end_date)?;
            let confirmation = self
                .coordinator
                .book_property(ctx, request)
                .await
                .map_err(|e| failure(&e))?;
            Ok::<_, Response>(Response::json(202, &confirmation))
        }
        .await)
    }

    /// `DELETE /bookings/{bookingId}`
    pub async fn cancel(&self, ctx: &RequestContext, booking: Option<&str>) -> Response {
        into_response(async {
            let raw = required(booking, "No booking id found", "Empty booking id")?;
            let id = Uuid::parse_str(raw).map_err(|_| Response::error(400, "Invalid booking id"))?;
            self.coordinator
                .cancel(ctx, id)
                .await
                .map_err(|e| failure(&e))?;
            Ok::<_, Response>(Response::empty(204))
        }
        .await)
    }

    /// `GET /properties/{propertyId}`
    pub async fn property(&self, ctx: &RequestContext, property: Option<&str>) -> Response {
        into_response(async {
            let id = property_id(property)?;
            let found = self
                .coordinator
                .get_property(ctx, id)
                .await
                .map_err(|e| failure(&e))?;
            Ok::<_, Response>(Response::json(200, &found))
        }
        .await)
    }

    /// `POST /properties/search` with a JSON filter. City or country is required.
    pub async fn search(&self, ctx: &RequestContext, raw: &str) -> Response {
        into_response(async {
            let filter: SearchFilter = serde_json::from_str(body(raw)?)
                .map_err(|_| Response::error(400, "Invalid JSON"))?;
            if filter.city.is_none() && filter.country.is_none() {
                return Err(Response::error(400, "Missing city or country"));
            }
            let found = self
                .coordinator
                .search_properties(ctx, &filter)
                .await
                .map_err(|e| failure(&e))?;
            Ok::<_, Response>(Response::json(200, &found))
        }
        .await)
    }
}
