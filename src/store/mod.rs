//! Record store abstraction.
//!
//! The query engine never owns data; it talks to a keyed record store through
//! [`RecordStore`]. A store offers point writes carrying a sort token, one-shot
//! point reads, and live range subscriptions over the sort token that push
//! [`StoreNotification`]s into a [`RangeSink`].
//!
//! [`memory::MemoryStore`] is an in-process implementation.

pub mod memory;

pub use memory::MemoryStore;

use crate::compute::planner::RegionBound;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by a record store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A key together with its stored value. A `Null` value means the key holds
/// nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub key: String,
    pub value: Value,
}

impl Snapshot {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    /// True when the key holds a value.
    #[inline]
    pub fn exists(&self) -> bool {
        !self.value.is_null()
    }
}

/// A change pushed by a live range subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreNotification {
    /// A record entered the range, or was already in it when the range opened.
    ChildAdded(Snapshot),
    /// A record in the range got a new value.
    ChildChanged(Snapshot),
    /// A record's position within the range's ordering changed.
    ChildMoved(Snapshot),
    /// A record left the range or was deleted. Carries the last value seen.
    ChildRemoved(Snapshot),
    /// Every record present at open time has been delivered.
    InitialLoadComplete,
    /// The subscription was terminated by the store. Nothing follows.
    Cancelled(StoreError),
}

/// Identifies an open range subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RangeHandle(pub u64);

/// Receiver of range notifications.
///
/// Stores may call `notify` from any thread, including the thread that is
/// inside a [`RecordStore`] method. Implementations must not block.
pub trait RangeSink: Send + Sync {
    fn notify(&self, notification: StoreNotification);
}

/// Completion callback of [`RecordStore::read_once`].
pub type ReadCallback = Box<dyn FnOnce(StoreResult<Option<Snapshot>>) + Send>;

/// Completion callback of [`RecordStore::write`].
pub type WriteCallback = Box<dyn FnOnce(StoreResult<()>) + Send>;

/// A keyed record store with ordered live range subscriptions.
pub trait RecordStore: Send + Sync {
    /// Write `value` under `key` with the given sort token. `None` deletes
    /// the key.
    fn write(
        &self,
        key: &str,
        value: Option<Value>,
        sort_token: Option<&str>,
        on_complete: Option<WriteCallback>,
    );

    /// Read the current value of `key` once.
    fn read_once(&self, key: &str, callback: ReadCallback);

    /// Subscribe to every record whose sort token lies in `bound`.
    ///
    /// The sink first receives a `ChildAdded` per existing record, then
    /// `InitialLoadComplete`, then live changes until the range is closed or
    /// cancelled.
    fn open_range(&self, bound: &RegionBound, sink: Arc<dyn RangeSink>) -> RangeHandle;

    /// Stop a subscription. Unknown handles are ignored.
    fn close_range(&self, handle: RangeHandle);
}
