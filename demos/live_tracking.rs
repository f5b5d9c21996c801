use geolive::prelude::*;
use geolive::record::record_for;
use std::sync::Arc;

struct Printer;

impl GeoQueryDataEventListener for Printer {
    fn on_data_entered(&self, snapshot: &Snapshot, location: Coordinate) {
        println!("   + {} entered at {}", snapshot.key, location);
    }

    fn on_data_exited(&self, snapshot: &Snapshot) {
        println!("   - {} exited", snapshot.key);
    }

    fn on_data_moved(&self, snapshot: &Snapshot, location: Coordinate) {
        println!("   > {} moved to {}", snapshot.key, location);
    }

    fn on_data_changed(&self, snapshot: &Snapshot, _location: Coordinate) {
        println!("   * {} changed: {}", snapshot.key, snapshot.value);
    }

    fn on_geo_query_ready(&self) {
        println!("   (ready)");
    }

    fn on_geo_query_error(&self, error: &StoreError) {
        println!("   ! {}", error);
    }
}

fn place(store: &MemoryStore, key: &str, lat: f64, lng: f64) -> Result<()> {
    let record = record_for(&Coordinate::new(lat, lng)?, 10)?;
    store.write(key, Some(record.to_value()?), Some(&record.geohash), None);
    Ok(())
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    println!("=== geolive - Live Tracking ===\n");

    let store = Arc::new(MemoryStore::new());
    place(&store, "truck:1", 37.7749, -122.4194)?;
    place(&store, "truck:2", 37.7760, -122.4170)?;
    place(&store, "truck:3", 37.8044, -122.2712)?; // Oakland
    println!("✓ Seeded {} vehicles\n", store.len());

    // === 1. INITIAL MATCHES ===
    println!("1. Query 1 km around downtown San Francisco");
    println!("--------------------------------------------");
    let query = GeoQuery::builder(store.clone())
        .center(Coordinate::new(37.7749, -122.4194)?)
        .radius(1_000.0)
        .build()?;
    query.add_data_listener(Arc::new(Printer))?;
    query.wait_idle(Duration::from_secs(5));
    println!(
        "   {} ranges cover the region\n",
        query.subscription_count()
    );

    // === 2. LIVE UPDATES ===
    println!("2. Vehicles moving");
    println!("------------------");
    place(&store, "truck:1", 37.7755, -122.4180)?;
    place(&store, "truck:3", 37.7770, -122.4200)?;
    place(&store, "truck:2", 37.8000, -122.4000)?;
    query.wait_idle(Duration::from_secs(5));
    println!();

    // === 3. MOVING THE REGION ===
    println!("3. Re-centering on the Ferry Building with 3 km");
    println!("------------------------------------------------");
    query.set_region(Coordinate::new(37.7955, -122.3937)?, 3_000.0)?;
    query.wait_idle(Duration::from_secs(5));
    println!();

    println!("Matched now:");
    for (key, location) in query.matched() {
        println!("   {} at {}", key, location);
    }
    println!("\nStore: {:?}", store.stats());

    Ok(())
}
