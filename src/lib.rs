//! Reservation workflow for a condominium: moves and events booked one per
//! day per kind, with guest rosters and liability terms, on top of a
//! path-addressed record store.

pub mod bookings;
pub mod clock;
pub mod config;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod store;
