//! Live region queries.
//!
//! A [`GeoQuery`] keeps the set of keys whose stored location lies inside a
//! circle up to date while records move and while the circle itself moves. It
//! covers the circle with at most nine hash ranges, subscribes to each range
//! on the [`RecordStore`], filters what the ranges report by exact distance
//! and tells its listeners about keys entering, leaving and moving inside the
//! circle.
//!
//! # Threading
//!
//! Each query owns one worker thread. Store notifications and mutating calls
//! are queued and processed one at a time on that thread; listener callbacks
//! run there too. Removing listeners is synchronous: once
//! [`GeoQuery::remove_listener`] or [`GeoQuery::remove_all_listeners`]
//! returns, the removed listeners receive nothing more.
//!
//! ```rust
//! use geolive::query::{GeoQuery, GeoQueryEventListener};
//! use geolive::record::record_for;
//! use geolive::store::{MemoryStore, RecordStore};
//! use geolive::Coordinate;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct Print;
//!
//! impl GeoQueryEventListener for Print {
//!     fn on_key_entered(&self, key: &str, location: Coordinate) {
//!         println!("{} entered at {}", key, location);
//!     }
//! }
//!
//! # fn main() -> geolive::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let here = Coordinate::new(37.7749, -122.4194)?;
//! let record = record_for(&here, 10)?;
//! store.write("truck-1", Some(record.to_value()?), Some(&record.geohash), None);
//!
//! let query = GeoQuery::new(store.clone(), here, 1_000.0)?;
//! query.add_key_listener(Arc::new(Print))?;
//! assert!(query.wait_idle(Duration::from_secs(5)));
//! assert!(query.matched().contains_key("truck-1"));
//! # Ok(())
//! # }
//! ```

mod engine;
pub mod listener;
mod queue;

pub use listener::{
    EventFilter, EventKind, GeoQueryDataEventListener, GeoQueryEventListener, ListenerId,
    QueryEvent, QueryListener,
};

use crate::builder::GeoQueryBuilder;
use crate::compute::distance::Region;
use crate::compute::planner::RegionBound;
use crate::config::Config;
use crate::error::{GeoliveError, Result};
use crate::store::RecordStore;
use engine::{Delivery, QueryState, Task};
use geolive_types::Coordinate;
use listener::Registration;
use parking_lot::{Mutex, ReentrantMutex};
use queue::TaskQueue;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

struct Shared {
    state: Mutex<QueryState>,
    queue: Arc<TaskQueue<Task>>,
    /// Held while listener callbacks run
    delivery: ReentrantMutex<()>,
    /// Bumped by resets; batches computed under an older value are dropped
    epoch: AtomicU64,
}

impl Shared {
    fn run(&self) {
        while let Some(task) = self.queue.pop() {
            let (epoch, batch) = {
                let mut state = self.state.lock();
                let epoch = self.epoch.load(Ordering::SeqCst);
                let mut out = engine::Outbox::default();
                state.handle(task, &mut out);
                (epoch, state.resolve(out))
            };
            self.deliver(epoch, batch);
            self.queue.finish();
        }
        log::debug!("Query worker exiting");
    }

    fn deliver(&self, epoch: u64, batch: Vec<Delivery>) {
        if batch.is_empty() {
            return;
        }
        let _delivery = self.delivery.lock();
        for delivery in batch {
            // A callback may have reset the query or detached a listener.
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return;
            }
            if !self.state.lock().listeners.contains_key(&delivery.id) {
                continue;
            }
            delivery.dispatch();
        }
    }
}

/// A live query over a circular region.
///
/// Dropping the query closes its subscriptions and stops its worker.
pub struct GeoQuery {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl GeoQuery {
    /// Create a query with the default configuration.
    pub fn new(store: Arc<dyn RecordStore>, center: Coordinate, radius: f64) -> Result<Self> {
        Self::with_config(store, center, radius, Config::default())
    }

    /// Create a query with a custom configuration.
    pub fn with_config(
        store: Arc<dyn RecordStore>,
        center: Coordinate,
        radius: f64,
        config: Config,
    ) -> Result<Self> {
        config.validate().map_err(GeoliveError::Config)?;
        let region = Region::new(center, radius, config.max_radius_meters)?;
        let worker_name = config.worker_name.clone();

        let queue = Arc::new(TaskQueue::new());
        let state = QueryState::new(region, config, store, Arc::downgrade(&queue));
        let shared = Arc::new(Shared {
            state: Mutex::new(state),
            queue,
            delivery: ReentrantMutex::new(()),
            epoch: AtomicU64::new(0),
        });

        let worker = {
            let shared = shared.clone();
            std::thread::Builder::new()
                .name(worker_name)
                .spawn(move || shared.run())?
        };

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Start building a query over `store`.
    pub fn builder(store: Arc<dyn RecordStore>) -> GeoQueryBuilder {
        GeoQueryBuilder::new(store)
    }

    // ===== Region =====

    pub fn center(&self) -> Coordinate {
        self.shared.state.lock().region().center()
    }

    /// Radius in meters, after capping.
    pub fn radius(&self) -> f64 {
        self.shared.state.lock().region().radius()
    }

    pub fn config(&self) -> Config {
        self.shared.state.lock().config().clone()
    }

    /// Move the region. Keys are re-evaluated on the worker.
    pub fn set_center(&self, center: Coordinate) -> Result<()> {
        let radius = self.radius();
        self.set_region(center, radius)
    }

    /// Resize the region.
    pub fn set_radius(&self, radius: f64) -> Result<()> {
        let center = self.center();
        self.set_region(center, radius)
    }

    /// Move and resize the region at once.
    pub fn set_region(&self, center: Coordinate, radius: f64) -> Result<()> {
        let replan = self.shared.state.lock().set_region(center, radius)?;
        if replan {
            self.enqueue(Task::Replan)?;
        }
        Ok(())
    }

    // ===== Listeners =====

    /// Attach a listener receiving every event.
    ///
    /// The first listener opens the query's subscriptions. A listener attached
    /// later first receives an entered event for every matched key, then a
    /// ready event if the query is already ready.
    pub fn add_listener(&self, listener: QueryListener) -> Result<ListenerId> {
        self.add_listener_with_filter(listener, EventFilter::all())
    }

    /// Attach a listener receiving only the membership events `filter`
    /// accepts.
    pub fn add_listener_with_filter(
        &self,
        listener: QueryListener,
        filter: EventFilter,
    ) -> Result<ListenerId> {
        let id = self
            .shared
            .state
            .lock()
            .register(Registration::new(listener, filter))
            .ok_or(GeoliveError::DuplicateListener)?;
        self.enqueue(Task::Attach(id))?;
        Ok(id)
    }

    pub fn add_key_listener(&self, listener: Arc<dyn GeoQueryEventListener>) -> Result<ListenerId> {
        self.add_listener(QueryListener::Keys(listener))
    }

    pub fn add_data_listener(
        &self,
        listener: Arc<dyn GeoQueryDataEventListener>,
    ) -> Result<ListenerId> {
        self.add_listener(QueryListener::Data(listener))
    }

    /// Detach one listener. Subscriptions stay open even when it was the last
    /// one. Returns false for unknown ids.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let _delivery = self.shared.delivery.lock();
        let removed = self.shared.state.lock().detach(id);
        if removed {
            log::debug!("Detached {}", id);
        }
        removed
    }

    /// Detach every listener and reset the query: subscriptions are closed,
    /// matched keys forgotten and queued store notifications discarded. The
    /// next listener starts from scratch.
    pub fn remove_all_listeners(&self) {
        let _delivery = self.shared.delivery.lock();
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        self.shared.state.lock().reset();
    }

    pub fn listener_count(&self) -> usize {
        self.shared.state.lock().listener_count()
    }

    // ===== Introspection =====

    /// Matched keys and their last known locations.
    pub fn matched(&self) -> BTreeMap<String, Coordinate> {
        self.shared.state.lock().matched()
    }

    /// True once every current subscription has finished its initial load.
    pub fn is_ready(&self) -> bool {
        self.shared.state.lock().is_ready()
    }

    pub fn subscription_count(&self) -> usize {
        self.shared.state.lock().subscription_count()
    }

    /// Bounds of the open subscriptions, sorted.
    pub fn bounds(&self) -> Vec<RegionBound> {
        self.shared.state.lock().bounds()
    }

    /// Block until every queued task has been processed and its events
    /// delivered. Returns false on timeout. Calling this from a listener
    /// callback always times out.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.shared.queue.wait_idle(timeout)
    }

    fn enqueue(&self, task: Task) -> Result<()> {
        if self.shared.queue.push(task) {
            Ok(())
        } else {
            Err(GeoliveError::Closed)
        }
    }
}

impl std::fmt::Debug for GeoQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("GeoQuery")
            .field("center", &state.region().center())
            .field("radius", &state.region().radius())
            .field("subscriptions", &state.subscription_count())
            .field("listeners", &state.listener_count())
            .field("ready", &state.is_ready())
            .finish()
    }
}

impl Drop for GeoQuery {
    fn drop(&mut self) {
        self.shared.queue.close();
        {
            let _delivery = self.shared.delivery.lock();
            self.shared.epoch.fetch_add(1, Ordering::SeqCst);
            self.shared.state.lock().reset();
        }

        if let Some(worker) = self.worker.take() {
            if worker.thread().id() == std::thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                log::warn!("Query worker panicked");
            }
        }
    }
}
