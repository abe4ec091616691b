use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a booking reserves the building for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingKind {
    /// Moving in or out ("mudança").
    Move,
    /// Party or gathering in the common area ("evento").
    Event,
}

impl BookingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingKind::Move => "move",
            BookingKind::Event => "event",
        }
    }
}

impl fmt::Display for BookingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for BookingKind {
    type Err = ();

    /// Accepts the canonical tags plus the Portuguese labels used on the forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "move" | "mudança" | "mudanca" => Ok(BookingKind::Move),
            "event" | "evento" => Ok(BookingKind::Event),
            _ => Err(()),
        }
    }
}

/// Who filed the booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    Resident,
    FrontDesk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Resident,
    /// Doorman ("portaria"), identified by an access code.
    FrontDesk,
    /// Building manager ("síndico").
    Manager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Resident => "resident",
            Role::FrontDesk => "front-desk",
            Role::Manager => "manager",
        }
    }

    /// Managers file requests on behalf of the administration, same as the front desk.
    pub fn provenance(&self) -> Provenance {
        match self {
            Role::Resident => Provenance::Resident,
            Role::FrontDesk | Role::Manager => Provenance::FrontDesk,
        }
    }
}

/// The user performing an operation. Passed explicitly into every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub role: Role,
    pub id: String,
}

impl Actor {
    pub fn new(role: Role, id: impl Into<String>) -> Self {
        Self { role, id: id.into() }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.role.as_str(), self.id)
    }
}

// ── Domain entities ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guest {
    pub id: String,
    pub name: String,
    pub present: bool,
}

/// Liability declaration signed by the resident for a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Term {
    pub name: String,
    pub unit_number: String,
    pub tax_id: String,
    pub event_date_text: String,
    pub event_time_text: String,
    pub submitted_at: DateTime<Utc>,
    pub declaration_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Booking {
    pub id: String,
    pub kind: BookingKind,
    pub requester_name: String,
    pub tax_id: String,
    pub unit_number: String,
    /// Full timestamp; only its calendar day in the building timezone matters.
    pub event_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub created_by: Provenance,
    /// Sorted by id, which is creation order for store-assigned ids.
    pub guests: Vec<Guest>,
    pub liability_term: Option<Term>,
}

impl Booking {
    pub fn present_guest_count(&self) -> usize {
        self.guests.iter().filter(|g| g.present).count()
    }
}

// ── Caller input ────────────────────────────────────────────────

/// Raw form input for a new booking. Text fields are trimmed and checked by the manager.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub kind: String,
    pub requester_name: String,
    pub tax_id: String,
    pub unit_number: String,
    pub event_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct TermInput {
    pub name: String,
    pub unit_number: String,
    pub tax_id: String,
    pub event_date_text: String,
    pub event_time_text: String,
    pub declaration_text: String,
}

// ── Stored shapes ───────────────────────────────────────────────
//
// Layout under the store root:
//   bookings/{bookingId}                  BookingRecord
//   bookings/{bookingId}/guests/{guestId} GuestRecord
//   bookings/{bookingId}/liabilityTerm    Term

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BookingRecord {
    #[serde(rename = "type")]
    pub kind: BookingKind,
    pub requester_name: String,
    pub tax_id: String,
    pub unit_number: String,
    pub event_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub created_by: Provenance,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub guests: BTreeMap<String, GuestRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liability_term: Option<Term>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct GuestRecord {
    pub name: String,
    #[serde(default)]
    pub present: bool,
}

impl BookingRecord {
    pub fn into_booking(self, id: String) -> Booking {
        Booking {
            id,
            kind: self.kind,
            requester_name: self.requester_name,
            tax_id: self.tax_id,
            unit_number: self.unit_number,
            event_date: self.event_date,
            created_at: self.created_at,
            created_by: self.created_by,
            guests: self
                .guests
                .into_iter()
                .map(|(id, g)| g.into_guest(id))
                .collect(),
            liability_term: self.liability_term,
        }
    }
}

impl GuestRecord {
    pub fn into_guest(self, id: String) -> Guest {
        Guest {
            id,
            name: self.name,
            present: self.present,
        }
    }
}

/// Decode a stored booking subtree. Fails on any missing or mistyped field.
pub(crate) fn decode_booking(id: &str, value: Value) -> Result<Booking, serde_json::Error> {
    let record: BookingRecord = serde_json::from_value(value)?;
    Ok(record.into_booking(id.to_string()))
}

/// A booking node that holds only children and no booking fields.
///
/// Left behind when a guest or term is written under a booking that was
/// deleted between the existence check and the write.
pub(crate) fn is_orphaned_subtree(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            !map.contains_key("type") && map.keys().all(|k| k == "guests" || k == "liabilityTerm")
        }
        _ => false,
    }
}

pub(crate) fn decode_guest(id: &str, value: Value) -> Result<Guest, serde_json::Error> {
    let record: GuestRecord = serde_json::from_value(value)?;
    Ok(record.into_guest(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_accepts_form_labels() {
        assert_eq!("move".parse::<BookingKind>(), Ok(BookingKind::Move));
        assert_eq!(" Mudança ".parse::<BookingKind>(), Ok(BookingKind::Move));
        assert_eq!("evento".parse::<BookingKind>(), Ok(BookingKind::Event));
        assert!("churrasco".parse::<BookingKind>().is_err());
    }

    #[test]
    fn provenance_uses_kebab_tags() {
        assert_eq!(serde_json::to_value(Provenance::FrontDesk).unwrap(), json!("front-desk"));
        assert_eq!(serde_json::to_value(Provenance::Resident).unwrap(), json!("resident"));
    }

    #[test]
    fn manager_files_as_front_desk() {
        assert_eq!(Role::Manager.provenance(), Provenance::FrontDesk);
        assert_eq!(Role::Resident.provenance(), Provenance::Resident);
    }

    #[test]
    fn decode_full_booking() {
        let value = json!({
            "type": "event",
            "requesterName": "Ana Silva",
            "taxId": "111",
            "unitNumber": "204",
            "eventDate": "2024-06-01T15:00:00Z",
            "createdAt": "2024-05-01T12:00:00Z",
            "createdBy": "resident",
            "guests": {
                "01B": { "name": "Bruno", "present": true },
                "01A": { "name": "Carla" }
            },
            "liabilityTerm": {
                "name": "Ana Silva",
                "unitNumber": "204",
                "taxId": "111",
                "eventDateText": "01/06/2024",
                "eventTimeText": "15:00",
                "submittedAt": "2024-05-02T10:00:00Z",
                "declarationText": "Declaro que..."
            }
        });
        let booking = decode_booking("b1", value).unwrap();
        assert_eq!(booking.id, "b1");
        assert_eq!(booking.kind, BookingKind::Event);
        assert_eq!(booking.guests.len(), 2);
        assert_eq!(booking.guests[0].id, "01A");
        assert!(!booking.guests[0].present); // defaulted
        assert_eq!(booking.present_guest_count(), 1);
        assert_eq!(booking.liability_term.unwrap().event_time_text, "15:00");
    }

    #[test]
    fn decode_rejects_missing_fields() {
        let value = json!({ "type": "move", "requesterName": "Ana" });
        assert!(decode_booking("b1", value).is_err());
    }

    #[test]
    fn decode_rejects_unknown_kind() {
        let value = json!({
            "type": "party",
            "requesterName": "Ana",
            "taxId": "1",
            "unitNumber": "1",
            "eventDate": "2024-06-01T15:00:00Z",
            "createdAt": "2024-05-01T12:00:00Z",
            "createdBy": "resident"
        });
        assert!(decode_booking("b1", value).is_err());
    }

    #[test]
    fn orphaned_subtree_is_only_children() {
        assert!(is_orphaned_subtree(&json!({"guests": {"g1": {"name": "Bia"}}})));
        assert!(is_orphaned_subtree(&json!({"liabilityTerm": {}})));
        assert!(!is_orphaned_subtree(&json!({"type": "move", "guests": {}})));
        assert!(!is_orphaned_subtree(&json!({"requesterName": "Ana"})));
        assert!(!is_orphaned_subtree(&json!("move")));
    }

    #[test]
    fn record_omits_empty_children() {
        let record = BookingRecord {
            kind: BookingKind::Move,
            requester_name: "Ana".into(),
            tax_id: "1".into(),
            unit_number: "2".into(),
            event_date: "2024-06-01T15:00:00Z".parse().unwrap(),
            created_at: "2024-05-01T12:00:00Z".parse().unwrap(),
            created_by: Provenance::Resident,
            guests: BTreeMap::new(),
            liability_term: None,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("guests").is_none());
        assert!(value.get("liabilityTerm").is_none());
        assert_eq!(value["type"], json!("move"));
    }
}
