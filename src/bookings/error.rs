use chrono::NaiveDate;

use crate::model::BookingKind;
use crate::store::StoreError;

/// How a failure should be presented to the person who triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Something was left blank or is too long; re-prompt.
    Input,
    /// The day is already taken for this purpose.
    Conflict,
    /// The booking or guest no longer exists.
    Missing,
    /// Talking to the store failed.
    Server,
}

#[derive(Debug)]
pub enum BookingError {
    /// A required field is blank after trimming, or not a recognized value.
    Validation { field: &'static str },
    /// A booking of the same kind already exists on that calendar day.
    Conflict { kind: BookingKind, date: NaiveDate },
    NotFound { what: &'static str, id: String },
    LimitExceeded(&'static str),
    Store(StoreError),
}

impl BookingError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BookingError::Validation { .. } | BookingError::LimitExceeded(_) => ErrorCategory::Input,
            BookingError::Conflict { .. } => ErrorCategory::Conflict,
            BookingError::NotFound { .. } => ErrorCategory::Missing,
            BookingError::Store(_) => ErrorCategory::Server,
        }
    }

    /// Message fit for showing to a resident or doorman.
    pub fn user_message(&self) -> String {
        match self {
            BookingError::Validation { field } => format!("Please fill in the {} field.", field_label(field)),
            BookingError::LimitExceeded(what) => format!("The {} is too long.", field_label(what)),
            BookingError::Conflict { kind, date } => {
                let purpose = match kind {
                    BookingKind::Move => "a move",
                    BookingKind::Event => "an event",
                };
                format!("{} is already booked for {purpose}.", date.format("%d/%m/%Y"))
            }
            BookingError::NotFound { what, .. } => format!("That {what} no longer exists."),
            BookingError::Store(_) => "Something went wrong talking to the server. Please try again.".into(),
        }
    }
}

fn field_label(field: &str) -> &str {
    match field {
        "type" => "booking type",
        "requesterName" | "name" => "name",
        "unitNumber" => "unit number",
        "taxId" => "tax id",
        "declarationText" => "declaration",
        "guests" => "guest list",
        other => other,
    }
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::Validation { field } => write!(f, "missing or invalid field: {field}"),
            BookingError::Conflict { kind, date } => {
                write!(f, "a {kind} booking already exists on {date}")
            }
            BookingError::NotFound { what, id } => write!(f, "{what} not found: {id}"),
            BookingError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            BookingError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for BookingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BookingError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for BookingError {
    fn from(e: StoreError) -> Self {
        BookingError::Store(e)
    }
}
