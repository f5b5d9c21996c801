#![allow(dead_code)]

use geolive::prelude::*;
use geolive::record::record_for;
use parking_lot::Mutex;
use std::time::Duration;

pub const WAIT: Duration = Duration::from_secs(5);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn coord(lat: f64, lng: f64) -> Coordinate {
    Coordinate::new(lat, lng).expect("valid coordinate")
}

/// Store a location record for `key` the way a client would.
pub fn put(store: &MemoryStore, key: &str, lat: f64, lng: f64) {
    let record = record_for(&coord(lat, lng), 10).expect("record");
    let value = record.to_value().expect("record value");
    store.write(key, Some(value), Some(&record.geohash), None);
}

pub fn delete(store: &MemoryStore, key: &str) {
    store.write(key, None, None, None);
}

/// Five keys around (37, -122); a 500 m query there matches 1, 2 and 4.
pub fn seed_dataset(store: &MemoryStore) {
    put(store, "0", 0.0, 0.0);
    put(store, "1", 37.0, -122.0);
    put(store, "2", 37.0001, -122.0001);
    put(store, "3", 37.1, -122.0);
    put(store, "4", 37.0002, -121.9998);
}

pub fn settle(query: &GeoQuery) {
    assert!(query.wait_idle(WAIT), "query did not go idle");
}

/// Records snapshot-level callbacks as short strings.
#[derive(Default)]
pub struct DataRecorder {
    events: Mutex<Vec<String>>,
}

impl DataRecorder {
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.events.lock())
    }

    fn push(&self, event: String) {
        self.events.lock().push(event);
    }
}

impl GeoQueryDataEventListener for DataRecorder {
    fn on_data_entered(&self, snapshot: &Snapshot, _location: Coordinate) {
        self.push(format!("entered {}", snapshot.key));
    }

    fn on_data_exited(&self, snapshot: &Snapshot) {
        self.push(format!("exited {}", snapshot.key));
    }

    fn on_data_moved(&self, snapshot: &Snapshot, _location: Coordinate) {
        self.push(format!("moved {}", snapshot.key));
    }

    fn on_data_changed(&self, snapshot: &Snapshot, _location: Coordinate) {
        self.push(format!("changed {}", snapshot.key));
    }

    fn on_geo_query_ready(&self) {
        self.push("ready".to_string());
    }

    fn on_geo_query_error(&self, error: &StoreError) {
        self.push(format!("error {}", error));
    }
}

/// Records key-level callbacks as short strings.
#[derive(Default)]
pub struct KeyRecorder {
    events: Mutex<Vec<String>>,
}

impl KeyRecorder {
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.events.lock())
    }

    fn push(&self, event: String) {
        self.events.lock().push(event);
    }
}

impl GeoQueryEventListener for KeyRecorder {
    fn on_key_entered(&self, key: &str, _location: Coordinate) {
        self.push(format!("entered {}", key));
    }

    fn on_key_exited(&self, key: &str) {
        self.push(format!("exited {}", key));
    }

    fn on_key_moved(&self, key: &str, _location: Coordinate) {
        self.push(format!("moved {}", key));
    }

    fn on_geo_query_ready(&self) {
        self.push("ready".to_string());
    }

    fn on_geo_query_error(&self, error: &StoreError) {
        self.push(format!("error {}", error));
    }
}

/// Entered keys in `events`, sorted.
pub fn entered(events: &[String]) -> Vec<String> {
    let mut keys: Vec<String> = events
        .iter()
        .filter_map(|e| e.strip_prefix("entered ").map(str::to_string))
        .collect();
    keys.sort();
    keys
}
