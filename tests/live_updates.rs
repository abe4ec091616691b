use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::America::Sao_Paulo;
use tokio::time::timeout;
use ulid::Ulid;

use condobook::bookings::{BookingError, BookingManager, booking_path};
use condobook::clock::FixedClock;
use condobook::model::{Actor, BookingKind, NewBooking, Role, TermInput};
use condobook::store::{MemoryStore, RecordStore};

// ── Test infrastructure ──────────────────────────────────────

fn data_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("condobook_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn sp(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
    Sao_Paulo.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap().with_timezone(&Utc)
}

fn manager(store: Arc<dyn RecordStore>) -> BookingManager {
    let clock = Arc::new(FixedClock::new(sp(2024, 6, 15, 12)));
    BookingManager::new(store, clock, Sao_Paulo)
}

fn party(day: u32) -> NewBooking {
    NewBooking {
        kind: "evento".into(),
        requester_name: "Ana Silva".into(),
        tax_id: "111".into(),
        unit_number: "204".into(),
        event_date: sp(2024, 7, day, 20),
    }
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn second_screen_sees_booking_and_roster_changes() {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    let front_desk = manager(store.clone());
    let resident_app = manager(store);
    let doorman = Actor::new(Role::FrontDesk, "code-7781");
    let resident = Actor::new(Role::Resident, "unit-204");

    let mut screen = front_desk.subscribe_bookings().unwrap();

    let booking = resident_app.create_booking(&resident, party(6)).await.unwrap();
    let created = timeout(Duration::from_secs(1), screen.recv()).await.unwrap().unwrap();
    assert_eq!(created.path, booking_path(&booking.id));

    let guest = front_desk.add_guest(&doorman, &booking.id, "Carla").await.unwrap();
    let added = timeout(Duration::from_secs(1), screen.recv()).await.unwrap().unwrap();
    assert!(added.path.ends_with(&guest.id));

    front_desk.remove_guest(&doorman, &booking.id, &guest.id).await.unwrap();
    let removed = timeout(Duration::from_secs(1), screen.recv()).await.unwrap().unwrap();
    assert_eq!(removed.value, None);

    screen.unsubscribe();
}

#[tokio::test]
async fn bookings_survive_restart() {
    let wal = data_dir().join("records.wal");
    let resident = Actor::new(Role::Resident, "unit-204");

    let (booking_id, guest_id) = {
        let store = Arc::new(MemoryStore::open(&wal).unwrap());
        let m = manager(store);
        let booking = m.create_booking(&resident, party(6)).await.unwrap();
        let guest = m.add_guest(&resident, &booking.id, "Carla").await.unwrap();
        m.toggle_guest_presence(&resident, &booking.id, &guest.id).await.unwrap();
        m.attach_term(
            &resident,
            &booking.id,
            TermInput {
                declaration_text: "I take responsibility for the common area.".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        (booking.id, guest.id)
    };

    let store = Arc::new(MemoryStore::open(&wal).unwrap());
    assert!(store.replayed_entries() >= 4);
    let m = manager(store.clone());

    let booking = m.get_booking(&booking_id).await.unwrap().unwrap();
    assert_eq!(booking.kind, BookingKind::Event);
    assert_eq!(booking.guests.len(), 1);
    assert_eq!(booking.guests[0].id, guest_id);
    assert!(booking.guests[0].present);
    assert!(booking.liability_term.is_some());

    // The conflict check sees replayed bookings.
    let err = m.create_booking(&resident, party(6)).await.unwrap_err();
    assert!(matches!(err, BookingError::Conflict { .. }));

    // Compaction keeps the same contents.
    store.compact().await.unwrap();
    drop(m);
    drop(store);
    let store = Arc::new(MemoryStore::open(&wal).unwrap());
    assert_eq!(store.replayed_entries(), 1);
    let m = manager(store);
    assert_eq!(m.list_bookings().await.unwrap().len(), 1);
    m.create_booking(&resident, party(7)).await.unwrap();
}

#[tokio::test]
async fn bookings_after_torn_tail_survive_restart() {
    let wal = data_dir().join("records.wal");
    let resident = Actor::new(Role::Resident, "unit-204");

    {
        let m = manager(Arc::new(MemoryStore::open(&wal).unwrap()));
        m.create_booking(&resident, party(6)).await.unwrap();
    }
    {
        // Crash mid-append: a length prefix with too few bytes behind it.
        let mut f = std::fs::OpenOptions::new().append(true).open(&wal).unwrap();
        f.write_all(&[50u8, 0, 0, 0, 1, 2]).unwrap();
    }
    {
        let m = manager(Arc::new(MemoryStore::open(&wal).unwrap()));
        m.create_booking(&resident, party(7)).await.unwrap();
        assert_eq!(m.list_bookings().await.unwrap().len(), 2);
    }

    let m = manager(Arc::new(MemoryStore::open(&wal).unwrap()));
    assert_eq!(m.list_bookings().await.unwrap().len(), 2);
    let err = m.create_booking(&resident, party(7)).await.unwrap_err();
    assert!(matches!(err, BookingError::Conflict { .. }));
}
