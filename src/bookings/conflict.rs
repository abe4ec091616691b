use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::clock::calendar_day;
use crate::limits::MAX_FIELD_LEN;
use crate::model::{Booking, BookingKind, NewBooking};

use super::BookingError;

/// A booking request whose fields passed validation.
#[derive(Debug, Clone)]
pub(super) struct ValidBooking {
    pub kind: BookingKind,
    pub requester_name: String,
    pub tax_id: String,
    pub unit_number: String,
    pub event_date: DateTime<Utc>,
}

/// Trim a required text field. Blank fails with the field's name.
pub(super) fn required(field: &'static str, value: &str) -> Result<String, BookingError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BookingError::Validation { field });
    }
    if trimmed.chars().count() > MAX_FIELD_LEN {
        return Err(BookingError::LimitExceeded(field));
    }
    Ok(trimmed.to_string())
}

/// Fields are checked in form order; the first bad one is reported.
pub(super) fn validate_new_booking(input: &NewBooking) -> Result<ValidBooking, BookingError> {
    let kind = required("type", &input.kind)?;
    let requester_name = required("requesterName", &input.requester_name)?;
    let unit_number = required("unitNumber", &input.unit_number)?;
    let tax_id = required("taxId", &input.tax_id)?;
    let kind = kind
        .parse::<BookingKind>()
        .map_err(|_| BookingError::Validation { field: "type" })?;
    Ok(ValidBooking {
        kind,
        requester_name,
        tax_id,
        unit_number,
        event_date: input.event_date,
    })
}

/// Linear scan for a booking of the same kind on the same calendar day.
/// Bookings of other kinds never conflict.
pub(crate) fn check_no_conflict(
    existing: &[Booking],
    kind: BookingKind,
    day: NaiveDate,
    tz: Tz,
) -> Result<(), BookingError> {
    for booking in existing.iter().filter(|b| b.kind == kind) {
        if calendar_day(booking.event_date, tz) == day {
            tracing::debug!(existing = %booking.id, %kind, %day, "day already taken");
            return Err(BookingError::Conflict { kind, date: day });
        }
    }
    Ok(())
}
