//! Listener traits and the events delivered to them.

use crate::store::{Snapshot, StoreError};
use geolive_types::Coordinate;
use std::fmt;
use std::sync::Arc;

/// Key-level callbacks of a live query.
///
/// All methods default to doing nothing. Callbacks run on the query's worker
/// thread, one at a time, in the order the engine produced them.
pub trait GeoQueryEventListener: Send + Sync {
    /// `key` entered the region at `location`.
    fn on_key_entered(&self, _key: &str, _location: Coordinate) {}

    /// `key` left the region or was removed from the store.
    fn on_key_exited(&self, _key: &str) {}

    /// `key` moved to `location` and is still inside the region.
    fn on_key_moved(&self, _key: &str, _location: Coordinate) {}

    /// Every record present when the current ranges opened has been seen.
    fn on_geo_query_ready(&self) {}

    /// The store cancelled one of the query's ranges.
    fn on_geo_query_error(&self, _error: &StoreError) {}
}

/// Snapshot-level callbacks of a live query.
pub trait GeoQueryDataEventListener: Send + Sync {
    fn on_data_entered(&self, _snapshot: &Snapshot, _location: Coordinate) {}

    /// Carries the freshest snapshot the engine holds for the key.
    fn on_data_exited(&self, _snapshot: &Snapshot) {}

    fn on_data_moved(&self, _snapshot: &Snapshot, _location: Coordinate) {}

    /// The record of a matched key changed. Follows `on_data_moved` when the
    /// location changed too.
    fn on_data_changed(&self, _snapshot: &Snapshot, _location: Coordinate) {}

    fn on_geo_query_ready(&self) {}

    fn on_geo_query_error(&self, _error: &StoreError) {}
}

/// Drives a key-level listener from the snapshot-level stream.
struct KeyEventAdapter(Arc<dyn GeoQueryEventListener>);

impl GeoQueryDataEventListener for KeyEventAdapter {
    fn on_data_entered(&self, snapshot: &Snapshot, location: Coordinate) {
        self.0.on_key_entered(&snapshot.key, location);
    }

    fn on_data_exited(&self, snapshot: &Snapshot) {
        self.0.on_key_exited(&snapshot.key);
    }

    fn on_data_moved(&self, snapshot: &Snapshot, location: Coordinate) {
        self.0.on_key_moved(&snapshot.key, location);
    }

    fn on_geo_query_ready(&self) {
        self.0.on_geo_query_ready();
    }

    fn on_geo_query_error(&self, error: &StoreError) {
        self.0.on_geo_query_error(error);
    }
}

/// A listener of either kind.
#[derive(Clone)]
pub enum QueryListener {
    Keys(Arc<dyn GeoQueryEventListener>),
    Data(Arc<dyn GeoQueryDataEventListener>),
}

impl QueryListener {
    /// Address of the listener object, used to refuse attaching it twice.
    pub(crate) fn identity(&self) -> usize {
        match self {
            Self::Keys(listener) => Arc::as_ptr(listener) as *const () as usize,
            Self::Data(listener) => Arc::as_ptr(listener) as *const () as usize,
        }
    }

    pub(crate) fn into_data(self) -> Arc<dyn GeoQueryDataEventListener> {
        match self {
            Self::Keys(listener) => Arc::new(KeyEventAdapter(listener)),
            Self::Data(listener) => listener,
        }
    }
}

impl fmt::Debug for QueryListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Keys(_) => write!(f, "QueryListener::Keys({:#x})", self.identity()),
            Self::Data(_) => write!(f, "QueryListener::Data({:#x})", self.identity()),
        }
    }
}

impl From<Arc<dyn GeoQueryEventListener>> for QueryListener {
    fn from(listener: Arc<dyn GeoQueryEventListener>) -> Self {
        Self::Keys(listener)
    }
}

impl From<Arc<dyn GeoQueryDataEventListener>> for QueryListener {
    fn from(listener: Arc<dyn GeoQueryDataEventListener>) -> Self {
        Self::Data(listener)
    }
}

/// Handle returned when a listener is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub(crate) u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Membership events a listener can opt out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Entered,
    Exited,
    Moved,
    Changed,
}

/// Selects which membership events reach a listener. Ready and error
/// notifications are always delivered.
///
/// ```
/// use geolive::query::{EventFilter, EventKind};
///
/// let filter = EventFilter::only(&[EventKind::Entered, EventKind::Exited]);
/// assert!(filter.accepts(EventKind::Entered));
/// assert!(!filter.accepts(EventKind::Moved));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventFilter {
    pub entered: bool,
    pub exited: bool,
    pub moved: bool,
    pub changed: bool,
}

impl EventFilter {
    pub const fn all() -> Self {
        Self {
            entered: true,
            exited: true,
            moved: true,
            changed: true,
        }
    }

    pub fn only(kinds: &[EventKind]) -> Self {
        Self {
            entered: kinds.contains(&EventKind::Entered),
            exited: kinds.contains(&EventKind::Exited),
            moved: kinds.contains(&EventKind::Moved),
            changed: kinds.contains(&EventKind::Changed),
        }
    }

    pub fn accepts(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::Entered => self.entered,
            EventKind::Exited => self.exited,
            EventKind::Moved => self.moved,
            EventKind::Changed => self.changed,
        }
    }
}

impl Default for EventFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// An event produced by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryEvent {
    Entered {
        snapshot: Snapshot,
        location: Coordinate,
    },
    Exited {
        snapshot: Snapshot,
    },
    Moved {
        snapshot: Snapshot,
        location: Coordinate,
    },
    Changed {
        snapshot: Snapshot,
        location: Coordinate,
    },
    Ready,
    Error(StoreError),
}

impl QueryEvent {
    /// Membership kind, `None` for ready and error notifications.
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            Self::Entered { .. } => Some(EventKind::Entered),
            Self::Exited { .. } => Some(EventKind::Exited),
            Self::Moved { .. } => Some(EventKind::Moved),
            Self::Changed { .. } => Some(EventKind::Changed),
            Self::Ready | Self::Error(_) => None,
        }
    }

    /// Key the event is about.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Entered { snapshot, .. }
            | Self::Exited { snapshot }
            | Self::Moved { snapshot, .. }
            | Self::Changed { snapshot, .. } => Some(&snapshot.key),
            Self::Ready | Self::Error(_) => None,
        }
    }

    pub(crate) fn dispatch(&self, listener: &dyn GeoQueryDataEventListener, filter: EventFilter) {
        if self.kind().is_some_and(|kind| !filter.accepts(kind)) {
            return;
        }
        match self {
            Self::Entered { snapshot, location } => listener.on_data_entered(snapshot, *location),
            Self::Exited { snapshot } => listener.on_data_exited(snapshot),
            Self::Moved { snapshot, location } => listener.on_data_moved(snapshot, *location),
            Self::Changed { snapshot, location } => listener.on_data_changed(snapshot, *location),
            Self::Ready => listener.on_geo_query_ready(),
            Self::Error(error) => listener.on_geo_query_error(error),
        }
    }
}

/// An attached (or attaching) listener.
#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) identity: usize,
    pub(crate) filter: EventFilter,
    pub(crate) listener: Arc<dyn GeoQueryDataEventListener>,
}

impl Registration {
    pub(crate) fn new(listener: QueryListener, filter: EventFilter) -> Self {
        Self {
            identity: listener.identity(),
            filter,
            listener: listener.into_data(),
        }
    }
}
