//! Explicit binary encoding for WAL payloads.
//!
//! Each entity has its own encode/decode pair so the on-disk layout is visible here
//! rather than derived. Integers are little-endian, strings are `[u32 len][utf-8]`,
//! dates are `i32` days from the common era, ids are 16 raw UUID bytes.

use bytes::{Buf, BufMut, BytesMut};
use chrono::{Datelike, NaiveDate};
use thiserror::Error;
use uuid::Uuid;

use crate::model::*;

const TAG_PROPERTY_REGISTERED: u8 = 1;
const TAG_BOOKING_CONFIRMED: u8 = 2;
const TAG_BOOKING_CANCELLED: u8 = 3;

const STATUS_ACTIVE: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("payload truncated while reading {0}")]
    Truncated(&'static str),
    #[error("unknown event tag {0}")]
    UnknownTag(u8),
    #[error("unknown booking status {0}")]
    UnknownStatus(u8),
    #[error("invalid date: {0} days from CE")]
    InvalidDate(i32),
    #[error("invalid stay: {start} is not before {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error("invalid utf-8 in {0}")]
    InvalidUtf8(&'static str),
    #[error("{0} trailing bytes after event")]
    TrailingBytes(usize),
}

// ── Primitives ───────────────────────────────────────────────────

fn need<B: Buf>(buf: &mut B, n: usize, field: &'static str) -> Result<(), CodecError> {
    if buf.remaining() < n {
        return Err(CodecError::Truncated(field));
    }
    Ok(())
}

fn put_str(buf: &mut BytesMut, s: &str) {
    buf.put_u32_le(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

fn get_str(buf: &mut impl Buf, field: &'static str) -> Result<String, CodecError> {
    need(buf, 4, field)?;
    let len = buf.get_u32_le() as usize;
    need(buf, len, field)?;
    let mut raw = vec![0u8; len];
    buf.copy_to_slice(&mut raw);
    String::from_utf8(raw).map_err(|_| CodecError::InvalidUtf8(field))
}

fn put_date(buf: &mut BytesMut, date: NaiveDate) {
    buf.put_i32_le(date.num_days_from_ce());
}

fn get_date(buf: &mut impl Buf, field: &'static str) -> Result<NaiveDate, CodecError> {
    need(buf, 4, field)?;
    let days = buf.get_i32_le();
    NaiveDate::from_num_days_from_ce_opt(days).ok_or(CodecError::InvalidDate(days))
}

fn get_u8(buf: &mut impl Buf, field: &'static str) -> Result<u8, CodecError> {
    need(buf, 1, field)?;
    Ok(buf.get_u8())
}

fn get_u32(buf: &mut impl Buf, field: &'static str) -> Result<u32, CodecError> {
    need(buf, 4, field)?;
    Ok(buf.get_u32_le())
}

fn get_i64(buf: &mut impl Buf, field: &'static str) -> Result<i64, CodecError> {
    need(buf, 8, field)?;
    Ok(buf.get_i64_le())
}

fn get_uuid(buf: &mut impl Buf, field: &'static str) -> Result<Uuid, CodecError> {
    need(buf, 16, field)?;
    let mut raw = [0u8; 16];
    buf.copy_to_slice(&mut raw);
    Ok(Uuid::from_bytes(raw))
}

// ── Entities ─────────────────────────────────────────────────────

pub fn encode_property(buf: &mut BytesMut, property: &Property) {
    buf.put_i64_le(property.id);
    buf.put_f64_le(property.nightly_rate);
    put_str(buf, &property.city);
    put_str(buf, &property.country);
    buf.put_u32_le(property.bedrooms);
    buf.put_u32_le(property.guests);
}

pub fn decode_property(buf: &mut impl Buf) -> Result<Property, CodecError> {
    let id = get_i64(buf, "property id")?;
    need(buf, 8, "nightly rate")?;
    let nightly_rate = buf.get_f64_le();
    let city = get_str(buf, "city")?;
    let country = get_str(buf, "country")?;
    let bedrooms = get_u32(buf, "bedrooms")?;
    let guests = get_u32(buf, "guests")?;
    Ok(Property {
        id,
        nightly_rate,
        city,
        country,
        bedrooms,
        guests,
    })
}

pub fn encode_booking(buf: &mut BytesMut, booking: &Booking) {
    buf.put_slice(booking.id.as_bytes());
    buf.put_i64_le(booking.request.property_id);
    put_str(buf, &booking.request.customer_name);
    put_date(buf, booking.request.start_date);
    put_date(buf, booking.request.end_date);
    buf.put_u8(match booking.status {
        BookingStatus::Active => STATUS_ACTIVE,
    });
}

pub fn decode_booking(buf: &mut impl Buf) -> Result<Booking, CodecError> {
    let id = get_uuid(buf, "booking id")?;
    let property_id = get_i64(buf, "property id")?;
    let customer_name = get_str(buf, "customer name")?;
    let start_date = get_date(buf, "start date")?;
    let end_date = get_date(buf, "end date")?;
    if start_date >= end_date {
        return Err(CodecError::InvalidRange {
            start: start_date,
            end: end_date,
        });
    }
    let status = match get_u8(buf, "status")? {
        STATUS_ACTIVE => BookingStatus::Active,
        other => return Err(CodecError::UnknownStatus(other)),
    };
    Ok(Booking {
        id,
        request: BookingRequest {
            property_id,
            customer_name,
            start_date,
            end_date,
        },
        status,
    })
}

// ── Events ───────────────────────────────────────────────────────

/// Encode an event as `[u8 tag][entity fields]`.
pub fn encode_event(event: &Event) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(64);
    match event {
        Event::PropertyRegistered { property } => {
            buf.put_u8(TAG_PROPERTY_REGISTERED);
            encode_property(&mut buf, property);
        }
        Event::BookingConfirmed { booking } => {
            buf.put_u8(TAG_BOOKING_CONFIRMED);
            encode_booking(&mut buf, booking);
        }
        Event::BookingCancelled { id, property_id } => {
            buf.put_u8(TAG_BOOKING_CANCELLED);
            buf.put_slice(id.as_bytes());
            buf.put_i64_le(*property_id);
        }
    }
    buf.to_vec()
}

/// Decode one event; the payload must be consumed exactly.
pub fn decode_event(mut payload: &[u8]) -> Result<Event, CodecError> {
    let buf = &mut payload;
    let event = match get_u8(buf, "event tag")? {
        TAG_PROPERTY_REGISTERED => Event::PropertyRegistered {
            property: decode_property(buf)?,
        },
        TAG_BOOKING_CONFIRMED => Event::BookingConfirmed {
            booking: decode_booking(buf)?,
        },
        TAG_BOOKING_CANCELLED => Event::BookingCancelled {
            id: get_uuid(buf, "booking id")?,
            property_id: get_i64(buf, "property id")?,
        },
        other => return Err(CodecError::UnknownTag(other)),
    };
    if buf.has_remaining() {
        return Err(CodecError::TrailingBytes(buf.remaining()));
    }
    Ok(event)
}
