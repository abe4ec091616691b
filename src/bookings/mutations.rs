use std::collections::BTreeMap;

use serde_json::Value;

use crate::clock::calendar_day;
use crate::limits::*;
use crate::model::{Actor, Booking, BookingRecord, Guest, GuestRecord, NewBooking, Term, TermInput, decode_guest};
use crate::observability::{BOOKING_CONFLICTS_TOTAL, BOOKINGS_CREATED_TOTAL, VALIDATION_FAILURES_TOTAL};
use crate::store::{StoreError, StoreOp};

use super::conflict::{check_no_conflict, required, validate_new_booking};
use super::queries::check_id;
use super::{BOOKINGS, BookingError, BookingManager, guest_path, guests_path, malformed, store_failed, term_path};

/// Count a rejected input on its way to the caller.
fn rejected(e: BookingError) -> BookingError {
    if let BookingError::Validation { field } | BookingError::LimitExceeded(field) = &e {
        metrics::counter!(VALIDATION_FAILURES_TOTAL, "field" => *field).increment(1);
    }
    e
}

fn encode<T: serde::Serialize>(path: &str, value: &T) -> Result<Value, BookingError> {
    serde_json::to_value(value).map_err(|e| store_failed(StoreError::new(StoreOp::Encode, path, e)))
}

/// Trim a free-text field that may be blank.
fn optional(field: &'static str, value: &str) -> Result<String, BookingError> {
    let trimmed = value.trim();
    if trimmed.chars().count() > MAX_FIELD_LEN {
        return Err(BookingError::LimitExceeded(field));
    }
    Ok(trimmed.to_string())
}

impl BookingManager {
    /// Create a booking unless one of the same kind already holds that day.
    ///
    /// Reads every booking, checks the calendar day of each same-kind
    /// booking, then pushes the new record. Nothing is written on failure.
    pub async fn create_booking(&self, actor: &Actor, input: NewBooking) -> Result<Booking, BookingError> {
        let valid = validate_new_booking(&input).map_err(rejected)?;
        let day = calendar_day(valid.event_date, self.tz);

        let _serialized = match &self.create_lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let existing = self.list_bookings().await?;
        if let Err(e) = check_no_conflict(&existing, valid.kind, day, self.tz) {
            metrics::counter!(BOOKING_CONFLICTS_TOTAL, "kind" => valid.kind.as_str()).increment(1);
            tracing::info!(%actor, kind = %valid.kind, %day, "booking rejected: day already taken");
            return Err(e);
        }

        let record = BookingRecord {
            kind: valid.kind,
            requester_name: valid.requester_name,
            tax_id: valid.tax_id,
            unit_number: valid.unit_number,
            event_date: valid.event_date,
            created_at: self.clock.now(),
            created_by: actor.role.provenance(),
            guests: BTreeMap::new(),
            liability_term: None,
        };
        let value = encode(BOOKINGS, &record)?;
        let id = self.store.push(BOOKINGS, value).await.map_err(store_failed)?;

        metrics::counter!(BOOKINGS_CREATED_TOTAL, "kind" => record.kind.as_str()).increment(1);
        tracing::info!(booking_id = %id, %actor, kind = %record.kind, %day, unit = %record.unit_number, "booking created");
        Ok(record.into_booking(id))
    }

    /// Add a guest to a booking's roster, not yet present.
    pub async fn add_guest(&self, actor: &Actor, booking_id: &str, name: &str) -> Result<Guest, BookingError> {
        let name = required("name", name).map_err(rejected)?;
        let booking = self.require_booking(booking_id).await?;
        if booking.guests.len() >= MAX_GUESTS_PER_BOOKING {
            return Err(rejected(BookingError::LimitExceeded("guests")));
        }

        let record = GuestRecord { name, present: false };
        let path = guests_path(booking_id);
        let value = encode(&path, &record)?;
        let guest_id = self.store.push(&path, value).await.map_err(store_failed)?;

        tracing::info!(%booking_id, %guest_id, %actor, "guest added");
        Ok(record.into_guest(guest_id))
    }

    /// Flip a guest's attendance flag and return the new value.
    ///
    /// Read-then-write; concurrent toggles and removals resolve as last write wins.
    pub async fn toggle_guest_presence(
        &self,
        actor: &Actor,
        booking_id: &str,
        guest_id: &str,
    ) -> Result<bool, BookingError> {
        check_id("booking", booking_id)?;
        check_id("guest", guest_id)?;
        let path = guest_path(booking_id, guest_id);
        let value = self
            .store
            .read(&path)
            .await
            .map_err(store_failed)?
            .ok_or_else(|| BookingError::NotFound {
                what: "guest",
                id: guest_id.to_string(),
            })?;
        let guest = decode_guest(guest_id, value).map_err(|e| malformed(&path, e))?;

        // Write the whole record: if the guest was removed since the read,
        // last write wins with a complete guest, never a bare flag.
        let present = !guest.present;
        let record = GuestRecord {
            name: guest.name,
            present,
        };
        let value = encode(&path, &record)?;
        self.store.write(&path, value).await.map_err(store_failed)?;

        tracing::info!(%booking_id, %guest_id, %actor, present, "guest presence toggled");
        Ok(present)
    }

    /// Remove a guest. Removing a guest that is not there is a no-op.
    pub async fn remove_guest(&self, actor: &Actor, booking_id: &str, guest_id: &str) -> Result<(), BookingError> {
        check_id("booking", booking_id)?;
        check_id("guest", guest_id)?;
        self.store
            .remove(&guest_path(booking_id, guest_id))
            .await
            .map_err(store_failed)?;
        tracing::info!(%booking_id, %guest_id, %actor, "guest removed");
        Ok(())
    }

    /// Attach the liability term, replacing any earlier one.
    pub async fn attach_term(&self, actor: &Actor, booking_id: &str, input: TermInput) -> Result<Term, BookingError> {
        let declaration_text = input.declaration_text.trim();
        if declaration_text.is_empty() {
            return Err(rejected(BookingError::Validation {
                field: "declarationText",
            }));
        }
        if declaration_text.chars().count() > MAX_DECLARATION_LEN {
            return Err(rejected(BookingError::LimitExceeded("declarationText")));
        }
        let term = Term {
            name: optional("name", &input.name).map_err(rejected)?,
            unit_number: optional("unitNumber", &input.unit_number).map_err(rejected)?,
            tax_id: optional("taxId", &input.tax_id).map_err(rejected)?,
            event_date_text: optional("eventDateText", &input.event_date_text).map_err(rejected)?,
            event_time_text: optional("eventTimeText", &input.event_time_text).map_err(rejected)?,
            submitted_at: self.clock.now(),
            declaration_text: declaration_text.to_string(),
        };

        self.require_booking(booking_id).await?;
        let path = term_path(booking_id);
        let value = encode(&path, &term)?;
        self.store.write(&path, value).await.map_err(store_failed)?;

        tracing::info!(%booking_id, %actor, "liability term attached");
        Ok(term)
    }
}
