use chrono::NaiveDate;
use futures::future::try_join_all;
use serde_json::Value;

use crate::model::{Actor, Booking, BookingKind, Guest, Term, decode_booking, decode_guest, is_orphaned_subtree};
use crate::store::Subscription;

use super::classify::{Classification, classify};
use super::{BOOKINGS, BookingError, BookingManager, booking_path, guests_path, malformed, store_failed, term_path};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PastBooking {
    pub booking: Booking,
    /// Guests marked present. Only computed for events; moves have no roster.
    pub present_guest_count: Option<usize>,
}

/// What the booking screens show: the upcoming/past split as of today.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overview {
    pub today: NaiveDate,
    pub upcoming: Vec<Booking>,
    pub past: Vec<PastBooking>,
}

/// Ids are single path segments handed out by the store.
pub(super) fn check_id(what: &'static str, id: &str) -> Result<(), BookingError> {
    if id.is_empty() || id.trim() != id || id.contains('/') {
        return Err(BookingError::NotFound {
            what,
            id: id.to_string(),
        });
    }
    Ok(())
}

impl BookingManager {
    pub async fn get_booking(&self, booking_id: &str) -> Result<Option<Booking>, BookingError> {
        check_id("booking", booking_id)?;
        let path = booking_path(booking_id);
        match self.store.read(&path).await.map_err(store_failed)? {
            None => Ok(None),
            Some(value) if is_orphaned_subtree(&value) => Ok(None),
            Some(value) => decode_booking(booking_id, value)
                .map(Some)
                .map_err(|e| malformed(&path, e)),
        }
    }

    /// Fetch a booking that must exist.
    pub(super) async fn require_booking(&self, booking_id: &str) -> Result<Booking, BookingError> {
        self.get_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::NotFound {
                what: "booking",
                id: booking_id.to_string(),
            })
    }

    /// Every booking in the store. Full scan; there is no index by date.
    pub async fn list_bookings(&self) -> Result<Vec<Booking>, BookingError> {
        let all = match self.store.read(BOOKINGS).await.map_err(store_failed)? {
            None => return Ok(Vec::new()),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(malformed(
                    BOOKINGS,
                    serde::de::Error::custom(format!("expected an object of bookings, got {other}")),
                ));
            }
        };
        all.into_iter()
            .filter(|(id, value)| {
                let orphaned = is_orphaned_subtree(value);
                if orphaned {
                    tracing::warn!(booking_id = %id, "skipping children of a deleted booking");
                }
                !orphaned
            })
            .map(|(id, value)| decode_booking(&id, value).map_err(|e| malformed(&booking_path(&id), e)))
            .collect()
    }

    /// A booking's guest roster, sorted by name.
    pub async fn guests(&self, booking_id: &str) -> Result<Vec<Guest>, BookingError> {
        check_id("booking", booking_id)?;
        let path = guests_path(booking_id);
        let roster = match self.store.read(&path).await.map_err(store_failed)? {
            None => return Ok(Vec::new()),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(malformed(
                    &path,
                    serde::de::Error::custom(format!("expected an object of guests, got {other}")),
                ));
            }
        };
        let mut guests = roster
            .into_iter()
            .map(|(id, value)| decode_guest(&id, value).map_err(|e| malformed(&path, e)))
            .collect::<Result<Vec<_>, _>>()?;
        guests.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(guests)
    }

    pub async fn term(&self, booking_id: &str) -> Result<Option<Term>, BookingError> {
        check_id("booking", booking_id)?;
        let path = term_path(booking_id);
        match self.store.read(&path).await.map_err(store_failed)? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| malformed(&path, e)),
        }
    }

    /// Classify `bookings` against today's date from the clock.
    pub fn classify_now(&self, bookings: Vec<Booking>) -> Classification {
        classify(bookings, self.today(), self.tz)
    }

    /// Upcoming and past bookings, with attendance counts for past events.
    ///
    /// Each past event costs one extra roster read.
    pub async fn overview(&self, actor: &Actor) -> Result<Overview, BookingError> {
        let today = self.today();
        let Classification { upcoming, past } = classify(self.list_bookings().await?, today, self.tz);

        let past = try_join_all(past.into_iter().map(|booking| async move {
            let present_guest_count = match booking.kind {
                BookingKind::Move => None,
                BookingKind::Event => {
                    let guests = self.guests(&booking.id).await?;
                    Some(guests.iter().filter(|g| g.present).count())
                }
            };
            Ok::<_, BookingError>(PastBooking {
                booking,
                present_guest_count,
            })
        }))
        .await?;

        tracing::debug!(%actor, %today, upcoming = upcoming.len(), past = past.len(), "overview built");
        Ok(Overview { today, upcoming, past })
    }

    /// Live feed of every change under `bookings`, for screens that refresh.
    pub fn subscribe_bookings(&self) -> Result<Subscription, BookingError> {
        self.store.subscribe(BOOKINGS).map_err(store_failed)
    }
}
