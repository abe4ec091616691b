mod classify;
mod conflict;
mod error;
mod mutations;
mod queries;

pub use classify::{Classification, classify};
pub use error::{BookingError, ErrorCategory};
pub use queries::{Overview, PastBooking};

use std::sync::Arc;

use chrono::NaiveDate;
use chrono_tz::Tz;
use tokio::sync::Mutex;

use crate::clock::{Clock, calendar_day};
use crate::config::Config;
use crate::observability::STORE_ERRORS_TOTAL;
use crate::store::{RecordStore, StoreError, StoreOp};

pub const BOOKINGS: &str = "bookings";

pub fn booking_path(booking_id: &str) -> String {
    format!("{BOOKINGS}/{booking_id}")
}

pub fn guests_path(booking_id: &str) -> String {
    format!("{BOOKINGS}/{booking_id}/guests")
}

pub fn guest_path(booking_id: &str, guest_id: &str) -> String {
    format!("{BOOKINGS}/{booking_id}/guests/{guest_id}")
}

pub fn term_path(booking_id: &str) -> String {
    format!("{BOOKINGS}/{booking_id}/liabilityTerm")
}

/// Owns the booking lifecycle on top of a record store.
///
/// The conflict check in `create_booking` reads every booking and then
/// writes; nothing in the store makes the two steps atomic. With
/// `serialize_creates` on, creations through *this* manager are run one at a
/// time. Other managers sharing the same store can still race.
pub struct BookingManager {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    tz: Tz,
    create_lock: Option<Mutex<()>>,
}

impl BookingManager {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>, tz: Tz) -> Self {
        Self {
            store,
            clock,
            tz,
            create_lock: Some(Mutex::new(())),
        }
    }

    pub fn from_config(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        Self::new(store, clock, config.timezone).with_serialized_creates(config.serialize_creates)
    }

    pub fn with_serialized_creates(mut self, on: bool) -> Self {
        self.create_lock = on.then(|| Mutex::new(()));
        self
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Today's calendar day in the building timezone.
    pub fn today(&self) -> NaiveDate {
        calendar_day(self.clock.now(), self.tz)
    }
}

/// Count and log a store failure on its way to the caller.
fn store_failed(e: StoreError) -> BookingError {
    metrics::counter!(STORE_ERRORS_TOTAL, "operation" => e.operation.as_str()).increment(1);
    tracing::warn!(operation = e.operation.as_str(), path = %e.path, "store call failed: {}", e.cause);
    BookingError::Store(e)
}

/// A stored value that does not decode into the expected shape.
fn malformed(path: &str, e: serde_json::Error) -> BookingError {
    store_failed(StoreError::new(StoreOp::Decode, path, e))
}
