mod common;

use common::*;
use geolive::prelude::*;
use serde_json::json;
use std::sync::Arc;

fn query_over(store: &Arc<MemoryStore>, lat: f64, lng: f64, radius: f64) -> GeoQuery {
    GeoQuery::new(store.clone(), coord(lat, lng), radius).expect("query")
}

#[test]
fn test_dataset_enters_expected_keys() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    seed_dataset(&store);

    let query = query_over(&store, 37.0, -122.0, 500.0);
    let recorder = Arc::new(DataRecorder::default());
    query.add_data_listener(recorder.clone()).unwrap();
    settle(&query);

    let events = recorder.take();
    assert_eq!(entered(&events), vec!["1", "2", "4"]);
    assert_eq!(events.last().map(String::as_str), Some("ready"));
    assert_eq!(events.iter().filter(|e| *e == "ready").count(), 1);

    assert!(query.is_ready());
    assert_eq!(
        query.matched().keys().cloned().collect::<Vec<_>>(),
        vec!["1", "2", "4"]
    );
    assert!((1..=9).contains(&query.subscription_count()));
}

#[test]
fn test_no_subscriptions_without_listeners() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    seed_dataset(&store);

    let query = query_over(&store, 37.0, -122.0, 500.0);
    settle(&query);
    assert_eq!(query.subscription_count(), 0);
    assert_eq!(store.stats().open_ranges, 0);
    assert!(query.matched().is_empty());
}

#[test]
fn test_move_out_and_back() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    seed_dataset(&store);

    let query = query_over(&store, 37.0, -122.0, 500.0);
    let recorder = Arc::new(KeyRecorder::default());
    query.add_key_listener(recorder.clone()).unwrap();
    settle(&query);
    recorder.take();

    put(&store, "1", 37.1, -122.0);
    settle(&query);
    assert_eq!(recorder.take(), vec!["exited 1"]);

    put(&store, "1", 37.0, -122.0);
    settle(&query);
    assert_eq!(recorder.take(), vec!["entered 1"]);
}

#[test]
fn test_moved_and_changed_inside_region() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    seed_dataset(&store);

    let query = query_over(&store, 37.0, -122.0, 500.0);
    let data = Arc::new(DataRecorder::default());
    let keys = Arc::new(KeyRecorder::default());
    query.add_data_listener(data.clone()).unwrap();
    query.add_key_listener(keys.clone()).unwrap();
    settle(&query);
    data.take();
    keys.take();

    put(&store, "1", 37.0003, -122.0);
    settle(&query);
    assert_eq!(data.take(), vec!["moved 1", "changed 1"]);
    assert_eq!(keys.take(), vec!["moved 1"]);

    // Same location, extra payload: only data listeners hear about it.
    let record = geolive::record::record_for(&coord(37.0003, -122.0), 10).unwrap();
    let mut value = record.to_value().unwrap();
    value["status"] = json!("loading");
    store.write("1", Some(value), Some(&record.geohash), None);
    settle(&query);
    assert_eq!(data.take(), vec!["changed 1"]);
    assert!(keys.take().is_empty());

    // Identical write.
    put(&store, "2", 37.0001, -122.0001);
    settle(&query);
    assert!(data.take().is_empty());
}

#[test]
fn test_delete_exits_key() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    seed_dataset(&store);

    let query = query_over(&store, 37.0, -122.0, 500.0);
    let recorder = Arc::new(DataRecorder::default());
    query.add_data_listener(recorder.clone()).unwrap();
    settle(&query);
    recorder.take();

    delete(&store, "2");
    delete(&store, "3");
    settle(&query);
    assert_eq!(recorder.take(), vec!["exited 2"]);
    assert!(!query.matched().contains_key("2"));
}

#[test]
fn test_cross_range_move_is_single_move() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    put(&store, "a", 0.001, 0.001);

    // Four top-level cells meet at the origin.
    let query = query_over(&store, 0.0, 0.0, 1000.0);
    let data = Arc::new(DataRecorder::default());
    let keys = Arc::new(KeyRecorder::default());
    query.add_data_listener(data.clone()).unwrap();
    query.add_key_listener(keys.clone()).unwrap();
    settle(&query);
    assert!(query.subscription_count() >= 4);
    data.take();
    keys.take();

    for (lat, lng) in [(0.001, -0.001), (-0.001, -0.001), (-0.001, 0.001), (0.001, 0.001)] {
        put(&store, "a", lat, lng);
        settle(&query);
        assert_eq!(data.take(), vec!["moved a", "changed a"]);
        assert_eq!(keys.take(), vec!["moved a"]);
        assert_eq!(query.matched()["a"], coord(lat, lng));
    }
}

#[test]
fn test_remove_single_listener() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    seed_dataset(&store);

    let query = query_over(&store, 37.0, -122.0, 500.0);
    let kept = Arc::new(KeyRecorder::default());
    let removed = Arc::new(KeyRecorder::default());
    query.add_key_listener(kept.clone()).unwrap();
    let id = query.add_key_listener(removed.clone()).unwrap();
    settle(&query);
    kept.take();
    removed.take();

    let subscriptions = query.subscription_count();
    assert!(query.remove_listener(id));
    assert!(!query.remove_listener(id));
    assert_eq!(query.listener_count(), 1);

    put(&store, "5", 37.0, -121.9999);
    settle(&query);
    assert_eq!(kept.take(), vec!["entered 5"]);
    assert!(removed.take().is_empty());
    assert_eq!(query.subscription_count(), subscriptions);
}

#[test]
fn test_remove_last_listener_keeps_subscriptions() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    seed_dataset(&store);

    let query = query_over(&store, 37.0, -122.0, 500.0);
    let first = Arc::new(KeyRecorder::default());
    let id = query.add_key_listener(first.clone()).unwrap();
    settle(&query);
    assert!(query.remove_listener(id));

    put(&store, "5", 37.0, -121.9999);
    settle(&query);
    assert!(query.subscription_count() > 0);
    assert!(query.matched().contains_key("5"));

    let second = Arc::new(KeyRecorder::default());
    query.add_key_listener(second.clone()).unwrap();
    settle(&query);
    assert_eq!(
        second.take(),
        vec!["entered 1", "entered 2", "entered 4", "entered 5", "ready"]
    );
}

#[test]
fn test_remove_all_listeners_resets() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    seed_dataset(&store);

    let query = query_over(&store, 37.0, -122.0, 500.0);
    let a = Arc::new(DataRecorder::default());
    let b = Arc::new(KeyRecorder::default());
    query.add_data_listener(a.clone()).unwrap();
    query.add_key_listener(b.clone()).unwrap();
    settle(&query);
    a.take();
    b.take();

    query.remove_all_listeners();
    assert_eq!(query.subscription_count(), 0);
    assert_eq!(query.listener_count(), 0);
    assert_eq!(store.stats().open_ranges, 0);
    assert!(query.matched().is_empty());
    assert!(!query.is_ready());

    put(&store, "5", 37.0, -121.9999);
    delete(&store, "1");
    settle(&query);
    assert!(a.take().is_empty());
    assert!(b.take().is_empty());

    // The same listener may come back and starts from scratch.
    query.add_data_listener(a.clone()).unwrap();
    settle(&query);
    let events = a.take();
    assert_eq!(entered(&events), vec!["2", "4", "5"]);
    assert_eq!(events.last().map(String::as_str), Some("ready"));
}

#[test]
fn test_recentering_keeps_retained_keys_quiet() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    seed_dataset(&store);

    let query = query_over(&store, 37.0, -122.0, 500.0);
    let recorder = Arc::new(DataRecorder::default());
    query.add_data_listener(recorder.clone()).unwrap();
    settle(&query);
    recorder.take();

    // ~355 m east: 1, 2 and 4 all stay inside.
    query.set_center(coord(37.0, -121.996)).unwrap();
    settle(&query);
    assert_eq!(recorder.take(), vec!["ready"]);
    assert_eq!(query.center(), coord(37.0, -121.996));

    // ~890 m east of the original center: everything leaves.
    query.set_center(coord(37.0, -121.99)).unwrap();
    settle(&query);
    assert_eq!(
        recorder.take(),
        vec!["exited 1", "exited 2", "exited 4", "ready"]
    );
    assert!(query.matched().is_empty());
}

#[test]
fn test_set_radius() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    seed_dataset(&store);

    let query = query_over(&store, 37.0, -122.0, 500.0);
    let recorder = Arc::new(KeyRecorder::default());
    query.add_key_listener(recorder.clone()).unwrap();
    settle(&query);
    recorder.take();

    query.set_radius(20_000.0).unwrap();
    settle(&query);
    assert_eq!(recorder.take(), vec!["entered 3", "ready"]);

    query.set_radius(20.0).unwrap();
    settle(&query);
    assert_eq!(recorder.take(), vec!["exited 3", "exited 4", "ready"]);
    assert_eq!(
        query.matched().keys().cloned().collect::<Vec<_>>(),
        vec!["1", "2"]
    );

    assert!(matches!(
        query.set_radius(-1.0),
        Err(GeoliveError::InvalidRadius(_))
    ));
    assert!(query.set_radius(f64::NAN).is_err());
    assert_eq!(query.radius(), 20.0);
}

#[test]
fn test_late_listener_gets_replay_and_ready() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    seed_dataset(&store);

    let query = query_over(&store, 37.0, -122.0, 500.0);
    let early = Arc::new(KeyRecorder::default());
    query.add_key_listener(early.clone()).unwrap();
    settle(&query);
    early.take();

    let late = Arc::new(KeyRecorder::default());
    query.add_key_listener(late.clone()).unwrap();
    settle(&query);
    assert_eq!(
        late.take(),
        vec!["entered 1", "entered 2", "entered 4", "ready"]
    );
    assert!(early.take().is_empty());
}

#[test]
fn test_store_errors_reach_every_listener() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    seed_dataset(&store);

    let query = query_over(&store, 37.0, -122.0, 500.0);
    let a = Arc::new(KeyRecorder::default());
    let b = Arc::new(DataRecorder::default());
    query.add_key_listener(a.clone()).unwrap();
    query.add_data_listener(b.clone()).unwrap();
    settle(&query);
    a.take();
    b.take();

    store.revoke_ranges(StoreError::Unavailable("maintenance".into()));
    settle(&query);

    for events in [a.take(), b.take()] {
        assert!(events.contains(&"error Store unavailable: maintenance".to_string()));
        assert_eq!(entered(&events), Vec::<String>::new());
        let mut exited: Vec<&String> = events.iter().filter(|e| e.starts_with("exited")).collect();
        exited.sort();
        assert_eq!(exited, vec!["exited 1", "exited 2", "exited 4"]);
    }
    assert!(query.matched().is_empty());
}

#[test]
fn test_permission_denied_never_becomes_ready() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    seed_dataset(&store);
    store.set_access_denied(true);

    let query = query_over(&store, 37.0, -122.0, 500.0);
    let recorder = Arc::new(KeyRecorder::default());
    query.add_key_listener(recorder.clone()).unwrap();
    settle(&query);

    let events = recorder.take();
    assert!(!events.is_empty());
    assert!(events.iter().all(|e| e.starts_with("error Permission denied")));
    assert!(!query.is_ready());
}

#[test]
fn test_malformed_records_are_ignored() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    seed_dataset(&store);

    let token = geolive::encode(&coord(37.0, -122.0), 10).unwrap();
    store.write(
        "broken",
        Some(json!({ "g": token.as_str(), "l": [37.0] })),
        Some(token.as_str()),
        None,
    );

    let query = query_over(&store, 37.0, -122.0, 500.0);
    let recorder = Arc::new(DataRecorder::default());
    query.add_data_listener(recorder.clone()).unwrap();
    settle(&query);
    let events = recorder.take();
    assert_eq!(entered(&events), vec!["1", "2", "4"]);
    assert_eq!(events.last().map(String::as_str), Some("ready"));

    // A matched key whose record turns malformed exits.
    store.write(
        "1",
        Some(json!({ "g": token.as_str(), "l": ["north", "west"] })),
        Some(token.as_str()),
        None,
    );
    settle(&query);
    assert_eq!(recorder.take(), vec!["exited 1"]);
}

#[test]
fn test_duplicate_listener_rejected() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    let query = query_over(&store, 37.0, -122.0, 500.0);

    let recorder = Arc::new(KeyRecorder::default());
    query.add_key_listener(recorder.clone()).unwrap();
    assert!(matches!(
        query.add_key_listener(recorder.clone()),
        Err(GeoliveError::DuplicateListener)
    ));
    assert_eq!(query.listener_count(), 1);
}

#[test]
fn test_event_filter() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    seed_dataset(&store);

    let query = query_over(&store, 37.0, -122.0, 500.0);
    let recorder = Arc::new(DataRecorder::default());
    query
        .add_listener_with_filter(
            geolive::QueryListener::Data(recorder.clone()),
            EventFilter::only(&[EventKind::Exited]),
        )
        .unwrap();
    settle(&query);
    assert_eq!(recorder.take(), vec!["ready"]);

    put(&store, "1", 37.0003, -122.0);
    put(&store, "2", 37.1, -122.0);
    settle(&query);
    assert_eq!(recorder.take(), vec!["exited 2"]);
}

#[test]
fn test_drop_closes_ranges() {
    init_logging();
    let store = Arc::new(MemoryStore::new());
    seed_dataset(&store);

    let query = query_over(&store, 37.0, -122.0, 500.0);
    query.add_key_listener(Arc::new(KeyRecorder::default())).unwrap();
    settle(&query);
    assert!(store.stats().open_ranges > 0);

    drop(query);
    assert_eq!(store.stats().open_ranges, 0);
}
