//! Query state and the processing of one task at a time.
//!
//! Everything here runs under the query's state lock. Handlers never call
//! listeners; they append events to an [`Outbox`] that the worker delivers
//! once the lock is released.

use super::listener::{ListenerId, QueryEvent, Registration};
use super::queue::TaskQueue;
use crate::compute::distance::Region;
use crate::compute::geohash::{BITS_PER_CHAR, GeoHash};
use crate::compute::planner::{RegionBound, bounds_with_max_bits};
use crate::config::Config;
use crate::error::Result;
use crate::record::parse_location;
use crate::store::{
    RangeHandle, RangeSink, RecordStore, Snapshot, StoreError, StoreNotification, StoreResult,
};
use geolive_types::Coordinate;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Identifies one range subscription for the lifetime of a query. Never
/// reused, so notifications for a retired subscription are recognisable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One unit of work for the worker.
pub(crate) enum Task {
    Store {
        subscription: SubscriptionId,
        notification: StoreNotification,
    },
    RemovalChecked {
        key: String,
        generation: u64,
        result: StoreResult<Option<Snapshot>>,
    },
    Replan,
    Attach(ListenerId),
}

/// Forwards range notifications into the query's task queue.
struct QuerySink {
    queue: Weak<TaskQueue<Task>>,
    subscription: SubscriptionId,
}

impl RangeSink for QuerySink {
    fn notify(&self, notification: StoreNotification) {
        if let Some(queue) = self.queue.upgrade() {
            queue.push(Task::Store {
                subscription: self.subscription,
                notification,
            });
        }
    }
}

/// Who an event goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Target {
    All,
    Listener(ListenerId),
}

/// Events produced during one turn, in order.
#[derive(Default)]
pub(crate) struct Outbox {
    events: Vec<(Target, QueryEvent)>,
}

impl Outbox {
    fn all(&mut self, event: QueryEvent) {
        self.events.push((Target::All, event));
    }

    fn to(&mut self, id: ListenerId, event: QueryEvent) {
        self.events.push((Target::Listener(id), event));
    }

    #[cfg(test)]
    pub(crate) fn events(&self) -> &[(Target, QueryEvent)] {
        &self.events
    }
}

/// An event bound to one listener, ready to be delivered.
pub(crate) struct Delivery {
    pub(crate) id: ListenerId,
    pub(crate) registration: Registration,
    pub(crate) event: QueryEvent,
}

impl Delivery {
    pub(crate) fn dispatch(&self) {
        self.event
            .dispatch(self.registration.listener.as_ref(), self.registration.filter);
    }
}

struct Subscription {
    id: SubscriptionId,
    handle: RangeHandle,
    /// Keys this range currently holds, with their parsed locations
    entries: FxHashMap<String, Coordinate>,
    /// Tracked keys whose cached hash falls in this bound and which no live
    /// subscription held when it opened; settled on initial load
    awaiting: FxHashSet<String>,
    ready: bool,
    failed: bool,
}

/// What the engine knows about a key seen in any subscription.
struct Tracked {
    snapshot: Snapshot,
    location: Coordinate,
    /// Hash at the stored precision, compared against bounds
    hash: String,
    /// Inside the region: the key is part of the matched set
    inside: bool,
}

pub(crate) struct QueryState {
    region: Region,
    config: Config,
    store: Arc<dyn RecordStore>,
    queue: Weak<TaskQueue<Task>>,
    subscriptions: BTreeMap<RegionBound, Subscription>,
    by_id: FxHashMap<SubscriptionId, RegionBound>,
    tracked: FxHashMap<String, Tracked>,
    pub(crate) listeners: BTreeMap<ListenerId, Registration>,
    pending: BTreeMap<ListenerId, Registration>,
    /// Keys with a removal read in flight that readiness waits for
    unconfirmed: FxHashSet<String>,
    /// Subscriptions are open (a listener has been attached since the last
    /// reset)
    active: bool,
    all_ready_fired: bool,
    replan_pending: bool,
    next_subscription: u64,
    next_listener: u64,
    /// Bumped on every reset; removal checks issued before it are ignored
    generation: u64,
}

impl QueryState {
    pub(crate) fn new(
        region: Region,
        config: Config,
        store: Arc<dyn RecordStore>,
        queue: Weak<TaskQueue<Task>>,
    ) -> Self {
        Self {
            region,
            config,
            store,
            queue,
            subscriptions: BTreeMap::new(),
            by_id: FxHashMap::default(),
            tracked: FxHashMap::default(),
            listeners: BTreeMap::new(),
            pending: BTreeMap::new(),
            unconfirmed: FxHashSet::default(),
            active: false,
            all_ready_fired: false,
            replan_pending: false,
            next_subscription: 0,
            next_listener: 0,
            generation: 0,
        }
    }

    // ===== Synchronous API =====

    pub(crate) fn region(&self) -> Region {
        self.region
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    /// Replace the region. Returns true when a re-plan task must be queued.
    pub(crate) fn set_region(&mut self, center: Coordinate, radius: f64) -> Result<bool> {
        self.region = Region::new(center, radius, self.config.max_radius_meters)?;
        log::debug!(
            "Region set to {} with radius {} m",
            center,
            self.region.radius()
        );
        if self.active && !self.replan_pending {
            self.replan_pending = true;
            return Ok(true);
        }
        Ok(false)
    }

    /// Register a listener to be attached on the next turn.
    pub(crate) fn register(&mut self, registration: Registration) -> Option<ListenerId> {
        let duplicate = self
            .listeners
            .values()
            .chain(self.pending.values())
            .any(|r| r.identity == registration.identity);
        if duplicate {
            return None;
        }
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.pending.insert(id, registration);
        Some(id)
    }

    pub(crate) fn detach(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some() || self.pending.remove(&id).is_some()
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.len() + self.pending.len()
    }

    /// Close every subscription and forget all state and listeners.
    pub(crate) fn reset(&mut self) {
        for (bound, subscription) in std::mem::take(&mut self.subscriptions) {
            log::debug!("Closing subscription {} for {}", subscription.id, bound);
            self.store.close_range(subscription.handle);
        }
        self.by_id.clear();
        self.tracked.clear();
        self.listeners.clear();
        self.pending.clear();
        self.unconfirmed.clear();
        self.active = false;
        self.all_ready_fired = false;
        self.replan_pending = false;
        self.generation += 1;
        log::debug!("Query reset (generation {})", self.generation);
    }

    pub(crate) fn matched(&self) -> BTreeMap<String, Coordinate> {
        self.tracked
            .iter()
            .filter(|(_, t)| t.inside)
            .map(|(key, t)| (key.clone(), t.location))
            .collect()
    }

    pub(crate) fn bounds(&self) -> Vec<RegionBound> {
        self.subscriptions.keys().cloned().collect()
    }

    pub(crate) fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.all_ready_fired
    }

    // ===== Worker turns =====

    pub(crate) fn handle(&mut self, task: Task, out: &mut Outbox) {
        match task {
            Task::Store {
                subscription,
                notification,
            } => self.on_notification(subscription, notification, out),
            Task::RemovalChecked {
                key,
                generation,
                result,
            } => self.on_removal_checked(&key, generation, result, out),
            Task::Replan => {
                self.replan_pending = false;
                if self.active {
                    self.setup_subscriptions(out);
                }
            }
            Task::Attach(id) => self.attach(id, out),
        }
    }

    /// Expand targets into per-listener deliveries, in event order.
    pub(crate) fn resolve(&self, out: Outbox) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        for (target, event) in out.events {
            match target {
                Target::All => {
                    for (id, registration) in &self.listeners {
                        deliveries.push(Delivery {
                            id: *id,
                            registration: registration.clone(),
                            event: event.clone(),
                        });
                    }
                }
                Target::Listener(id) => {
                    if let Some(registration) = self.listeners.get(&id) {
                        deliveries.push(Delivery {
                            id,
                            registration: registration.clone(),
                            event,
                        });
                    }
                }
            }
        }
        deliveries
    }

    fn attach(&mut self, id: ListenerId, out: &mut Outbox) {
        let Some(registration) = self.pending.remove(&id) else {
            return;
        };
        self.listeners.insert(id, registration);
        log::debug!("Attached {}", id);

        if !self.active {
            self.active = true;
            self.setup_subscriptions(out);
        }

        let mut matched: Vec<(&String, &Tracked)> =
            self.tracked.iter().filter(|(_, t)| t.inside).collect();
        matched.sort_by(|a, b| a.0.cmp(b.0));
        let replay: Vec<QueryEvent> = matched
            .into_iter()
            .map(|(_, t)| QueryEvent::Entered {
                snapshot: t.snapshot.clone(),
                location: t.location,
            })
            .collect();
        for event in replay {
            out.to(id, event);
        }

        if self.all_ready_fired {
            out.to(id, QueryEvent::Ready);
        }
    }

    fn on_notification(
        &mut self,
        subscription: SubscriptionId,
        notification: StoreNotification,
        out: &mut Outbox,
    ) {
        let Some(bound) = self.by_id.get(&subscription).cloned() else {
            log::trace!("Dropping notification for retired subscription {}", subscription);
            return;
        };
        if self.subscriptions.get(&bound).is_none_or(|s| s.failed) {
            return;
        }
        log::trace!("Subscription {} {}: {:?}", subscription, bound, notification);

        match notification {
            StoreNotification::ChildAdded(snapshot) | StoreNotification::ChildChanged(snapshot) => {
                self.on_upsert(&bound, snapshot, out)
            }
            StoreNotification::ChildRemoved(snapshot) => self.on_removed(&bound, snapshot, out),
            StoreNotification::ChildMoved(_) => {}
            StoreNotification::InitialLoadComplete => {
                let awaiting = match self.subscriptions.get_mut(&bound) {
                    Some(sub) => {
                        sub.ready = true;
                        std::mem::take(&mut sub.awaiting)
                    }
                    None => FxHashSet::default(),
                };
                self.settle_awaiting(awaiting, out);
                self.check_and_fire_ready(out);
            }
            StoreNotification::Cancelled(error) => self.on_cancelled(&bound, error, out),
        }
    }

    fn on_upsert(&mut self, bound: &RegionBound, snapshot: Snapshot, out: &mut Outbox) {
        match parse_location(&snapshot.value) {
            Ok(location) => {
                if let Some(sub) = self.subscriptions.get_mut(bound) {
                    sub.entries.insert(snapshot.key.clone(), location);
                }
                self.update_location(snapshot, location, out);
            }
            Err(reason) => {
                log::warn!(
                    "Ignoring malformed location record for key {:?}: {}",
                    snapshot.key,
                    reason
                );
                for sub in self.subscriptions.values_mut() {
                    sub.entries.remove(&snapshot.key);
                }
                let key = snapshot.key.clone();
                self.finalize_removal(&key, Some(snapshot), out);
            }
        }
    }

    fn on_removed(&mut self, bound: &RegionBound, snapshot: Snapshot, out: &mut Outbox) {
        let key = snapshot.key;
        if let Some(sub) = self.subscriptions.get_mut(bound) {
            sub.entries.remove(&key);
        }
        if self.supported(&key) || !self.tracked.contains_key(&key) {
            return;
        }

        if self.config.confirm_removals {
            self.request_confirmation(key);
        } else {
            self.finalize_removal(&key, None, out);
        }
    }

    /// Read the key once before exiting it, so a hop into a neighbouring range
    /// surfaces as a move rather than an exit and an entry.
    fn request_confirmation(&self, key: String) {
        let queue = self.queue.clone();
        let generation = self.generation;
        let store_key = key.clone();
        self.store.read_once(
            &store_key,
            Box::new(move |result| {
                if let Some(queue) = queue.upgrade() {
                    queue.push(Task::RemovalChecked {
                        key,
                        generation,
                        result,
                    });
                }
            }),
        );
    }

    /// Keys kept through a re-plan that the new subscription's initial load
    /// did not contain were deleted or moved in the meantime.
    fn settle_awaiting(&mut self, awaiting: FxHashSet<String>, out: &mut Outbox) {
        let mut keys: Vec<String> = awaiting
            .into_iter()
            .filter(|key| self.tracked.contains_key(key) && !self.supported(key))
            .collect();
        keys.sort();

        for key in keys {
            if self.config.confirm_removals {
                self.unconfirmed.insert(key.clone());
                self.request_confirmation(key);
            } else {
                self.finalize_removal(&key, None, out);
            }
        }
    }

    fn on_removal_checked(
        &mut self,
        key: &str,
        generation: u64,
        result: StoreResult<Option<Snapshot>>,
        out: &mut Outbox,
    ) {
        if generation != self.generation {
            return;
        }
        let awaited = self.unconfirmed.remove(key);
        self.confirm_removal(key, result, out);
        if awaited {
            self.check_and_fire_ready(out);
        }
    }

    fn confirm_removal(
        &mut self,
        key: &str,
        result: StoreResult<Option<Snapshot>>,
        out: &mut Outbox,
    ) {
        if self.supported(key) || !self.tracked.contains_key(key) {
            return;
        }

        let fresh = match result {
            Ok(snapshot) => snapshot,
            Err(error) => {
                log::warn!("Could not confirm removal of key {:?}: {}", key, error);
                None
            }
        };

        let still_covered = fresh
            .as_ref()
            .and_then(|s| parse_location(&s.value).ok())
            .is_some_and(|location| self.covers(&self.hash_of(&location)));
        if still_covered {
            // Another range will report the key.
            return;
        }

        self.finalize_removal(key, fresh, out);
    }

    fn on_cancelled(&mut self, bound: &RegionBound, error: StoreError, out: &mut Outbox) {
        let Some(sub) = self.subscriptions.get_mut(bound) else {
            return;
        };
        log::warn!("Subscription {} for {} cancelled: {}", sub.id, bound, error);
        sub.failed = true;
        let mut keys: Vec<String> = sub.entries.drain().map(|(key, _)| key).collect();
        keys.extend(sub.awaiting.drain());
        keys.sort();
        keys.dedup();

        out.all(QueryEvent::Error(error));
        for key in keys {
            if !self.supported(&key) {
                self.finalize_removal(&key, None, out);
            }
        }
    }

    /// Classify a fresh observation of a key against the region.
    fn update_location(&mut self, snapshot: Snapshot, location: Coordinate, out: &mut Outbox) {
        let inside = self.region.contains(&location, self.config.distance_metric);
        let hash = self.hash_of(&location);
        let previous = self.tracked.insert(
            snapshot.key.clone(),
            Tracked {
                snapshot: snapshot.clone(),
                location,
                hash,
                inside,
            },
        );

        match previous {
            None if inside => out.all(QueryEvent::Entered { snapshot, location }),
            None => {}
            Some(previous) => match (previous.inside, inside) {
                (false, true) => out.all(QueryEvent::Entered { snapshot, location }),
                (true, false) => out.all(QueryEvent::Exited { snapshot }),
                (true, true) if previous.location != location => {
                    out.all(QueryEvent::Moved {
                        snapshot: snapshot.clone(),
                        location,
                    });
                    out.all(QueryEvent::Changed { snapshot, location });
                }
                (true, true) if previous.snapshot.value != snapshot.value => {
                    out.all(QueryEvent::Changed { snapshot, location });
                }
                _ => {}
            },
        }
    }

    /// Forget a key, exiting it if it was matched.
    fn finalize_removal(&mut self, key: &str, fresh: Option<Snapshot>, out: &mut Outbox) {
        if let Some(tracked) = self.tracked.remove(key) {
            if tracked.inside {
                let snapshot = fresh.filter(Snapshot::exists).unwrap_or(tracked.snapshot);
                out.all(QueryEvent::Exited { snapshot });
            }
        }
    }

    /// Bring the open subscriptions in line with the current region.
    fn setup_subscriptions(&mut self, out: &mut Outbox) {
        let max_bits = self.config.geohash_precision as u32 * BITS_PER_CHAR;
        let center = self.region.center();
        let bounds = match bounds_with_max_bits(&center, self.region.radius(), max_bits) {
            Ok(bounds) => bounds,
            Err(e) => {
                log::warn!("Could not plan ranges around {}: {}", center, e);
                return;
            }
        };
        log::debug!(
            "Planning {} ranges around {} ({} m)",
            bounds.len(),
            center,
            self.region.radius()
        );

        let vanished: Vec<RegionBound> = self
            .subscriptions
            .keys()
            .filter(|bound| !bounds.contains(bound))
            .cloned()
            .collect();
        for bound in vanished {
            if let Some(sub) = self.subscriptions.remove(&bound) {
                log::debug!("Closing subscription {} for {}", sub.id, bound);
                self.by_id.remove(&sub.id);
                self.store.close_range(sub.handle);
            }
        }

        for bound in bounds {
            if !self.subscriptions.contains_key(&bound) {
                self.open_subscription(bound);
            }
        }

        self.reclassify_tracked(out);

        // Keys no live subscription holds either wait for the loading range
        // covering their last hash, or leave now.
        let mut uncovered = Vec::new();
        let mut awaiting = Vec::new();
        for (key, tracked) in &self.tracked {
            if self.supported(key) {
                continue;
            }
            let covering = self
                .subscriptions
                .iter()
                .find(|(bound, s)| !s.failed && bound.contains(&tracked.hash));
            match covering {
                None => uncovered.push(key.clone()),
                Some((bound, s)) if !s.ready => awaiting.push((bound.clone(), key.clone())),
                Some(_) => {}
            }
        }
        for (bound, key) in awaiting {
            if let Some(sub) = self.subscriptions.get_mut(&bound) {
                sub.awaiting.insert(key);
            }
        }
        uncovered.sort();
        for key in uncovered {
            self.finalize_removal(&key, None, out);
        }

        self.all_ready_fired = false;
        self.check_and_fire_ready(out);
    }

    fn open_subscription(&mut self, bound: RegionBound) {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        let sink = Arc::new(QuerySink {
            queue: self.queue.clone(),
            subscription: id,
        });
        let handle = self.store.open_range(&bound, sink);
        log::debug!("Opened subscription {} for {}", id, bound);

        self.by_id.insert(id, bound.clone());
        self.subscriptions.insert(
            bound,
            Subscription {
                id,
                handle,
                entries: FxHashMap::default(),
                awaiting: FxHashSet::default(),
                ready: false,
                failed: false,
            },
        );
    }

    /// Re-test every tracked key against the current region.
    fn reclassify_tracked(&mut self, out: &mut Outbox) {
        let region = self.region;
        let metric = self.config.distance_metric;

        let mut keys: Vec<&String> = self.tracked.keys().collect();
        keys.sort();
        let keys: Vec<String> = keys.into_iter().cloned().collect();

        for key in keys {
            let Some(tracked) = self.tracked.get_mut(&key) else {
                continue;
            };
            let inside = region.contains(&tracked.location, metric);
            if inside == tracked.inside {
                continue;
            }
            tracked.inside = inside;
            let event = if inside {
                QueryEvent::Entered {
                    snapshot: tracked.snapshot.clone(),
                    location: tracked.location,
                }
            } else {
                QueryEvent::Exited {
                    snapshot: tracked.snapshot.clone(),
                }
            };
            out.all(event);
        }
    }

    fn check_and_fire_ready(&mut self, out: &mut Outbox) {
        if self.all_ready_fired
            || self.subscriptions.is_empty()
            || !self.unconfirmed.is_empty()
        {
            return;
        }
        if self.subscriptions.values().all(|s| s.ready && !s.failed) {
            self.all_ready_fired = true;
            log::debug!("Query ready with {} matched keys", self.matched_count());
            out.all(QueryEvent::Ready);
        }
    }

    /// True when a live subscription holds `key`.
    fn supported(&self, key: &str) -> bool {
        self.subscriptions
            .values()
            .any(|s| !s.failed && s.entries.contains_key(key))
    }

    /// True when `hash` falls in the bound of a live subscription.
    fn covers(&self, hash: &str) -> bool {
        self.subscriptions
            .iter()
            .any(|(bound, s)| !s.failed && bound.contains(hash))
    }

    /// Hash at the stored precision. An empty hash is covered by no bound.
    fn hash_of(&self, location: &Coordinate) -> String {
        match GeoHash::encode(location, self.config.geohash_precision) {
            Ok(hash) => hash.into_string(),
            Err(e) => {
                log::warn!("Could not hash {}: {}", location, e);
                String::new()
            }
        }
    }

    fn matched_count(&self) -> usize {
        self.tracked.values().filter(|t| t.inside).count()
    }
}
