use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::clock::calendar_day;
use crate::model::Booking;

/// Bookings split around today.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    /// Today or later, soonest first.
    pub upcoming: Vec<Booking>,
    /// Before today, most recent first.
    pub past: Vec<Booking>,
}

/// Partition bookings into upcoming and past.
///
/// A booking is upcoming when its calendar day in `tz` is on or after
/// `today`. There is no stored status; the split is recomputed on every call.
pub fn classify(bookings: Vec<Booking>, today: NaiveDate, tz: Tz) -> Classification {
    let (mut upcoming, mut past): (Vec<Booking>, Vec<Booking>) = bookings
        .into_iter()
        .partition(|b| calendar_day(b.event_date, tz) >= today);

    upcoming.sort_by(|a, b| a.event_date.cmp(&b.event_date).then_with(|| a.id.cmp(&b.id)));
    past.sort_by(|a, b| b.event_date.cmp(&a.event_date).then_with(|| a.id.cmp(&b.id)));

    Classification { upcoming, past }
}
