use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use condobook::bookings::{BookingManager, Overview};
use condobook::clock::{SystemClock, calendar_day};
use condobook::config::Config;
use condobook::model::{Actor, Booking, Role};
use condobook::store::MemoryStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    condobook::observability::init(config.metrics_port)?;

    std::fs::create_dir_all(&config.data_dir)?;
    let wal_path = config.wal_path();
    let store = Arc::new(MemoryStore::open(&wal_path)?);
    info!("store: {} ({} entries replayed)", wal_path.display(), store.replayed_entries());
    info!("timezone: {}", config.timezone);

    if store.log_entries().await >= config.compact_threshold {
        store.compact().await?;
    }

    let manager = BookingManager::from_config(store, Arc::new(SystemClock), &config);
    let operator = Actor::new(Role::Manager, "condobook-cli");
    let overview = manager.overview(&operator).await?;
    print_overview(&overview, &manager);
    Ok(())
}

fn print_overview(overview: &Overview, manager: &BookingManager) {
    println!("Today: {}", overview.today.format("%d/%m/%Y"));

    println!("\nUpcoming ({})", overview.upcoming.len());
    for booking in &overview.upcoming {
        println!("  {}", line(booking, manager));
    }

    println!("\nPast ({})", overview.past.len());
    for past in &overview.past {
        match past.present_guest_count {
            Some(n) => println!("  {}  [{n} present]", line(&past.booking, manager)),
            None => println!("  {}", line(&past.booking, manager)),
        }
    }
}

fn line(booking: &Booking, manager: &BookingManager) -> String {
    let day = calendar_day(booking.event_date, manager.timezone());
    format!(
        "{}  {:<5}  unit {:<6} {}{}",
        day.format("%d/%m/%Y"),
        booking.kind,
        booking.unit_number,
        booking.requester_name,
        if booking.liability_term.is_some() { "  (term signed)" } else { "" },
    )
}
