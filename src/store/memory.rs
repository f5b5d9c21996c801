//! In-process record store with live range subscriptions.

use super::{
    RangeHandle, RangeSink, ReadCallback, RecordStore, Snapshot, StoreError, StoreNotification,
    WriteCallback,
};
use crate::compute::planner::RegionBound;
use parking_lot::{ReentrantMutex, RwLock};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    sort_token: Option<String>,
}

impl Entry {
    fn in_range(&self, bound: &RegionBound) -> bool {
        self.sort_token
            .as_deref()
            .is_some_and(|token| bound.contains(token))
    }
}

struct Range {
    bound: RegionBound,
    sink: Arc<dyn RangeSink>,
}

#[derive(Default)]
struct Inner {
    records: BTreeMap<String, Entry>,
    ranges: BTreeMap<RangeHandle, Range>,
    next_handle: u64,
    access_denied: bool,
    operations_count: u64,
}

impl Inner {
    fn allocate_handle(&mut self) -> RangeHandle {
        self.next_handle += 1;
        RangeHandle(self.next_handle)
    }
}

/// Store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of stored keys
    pub key_count: usize,
    /// Number of open range subscriptions
    pub open_ranges: usize,
    /// Writes and reads served
    pub operations_count: u64,
}

/// In-memory [`RecordStore`] ordered by sort token.
///
/// Notifications are delivered on the calling thread after the change is
/// committed. Deliveries from concurrent writers are serialized, so every sink
/// observes changes in commit order.
///
/// ```rust
/// use geolive::store::{MemoryStore, RecordStore};
/// use serde_json::json;
///
/// let store = MemoryStore::new();
/// store.write("truck-1", Some(json!({ "g": "9q8yy", "l": [37.77, -122.41] })), Some("9q8yy"), None);
/// assert_eq!(store.len(), 1);
/// ```
pub struct MemoryStore {
    inner: RwLock<Inner>,
    delivery: ReentrantMutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            delivery: ReentrantMutex::new(()),
        }
    }

    /// Deny every following read, write and range open with
    /// `PermissionDenied`. Ranges that are already open stay open.
    pub fn set_access_denied(&self, denied: bool) {
        self.inner.write().access_denied = denied;
    }

    /// Cancel every open range with `error`.
    pub fn revoke_ranges(&self, error: StoreError) {
        let _delivery = self.delivery.lock();
        let revoked = std::mem::take(&mut self.inner.write().ranges);
        for (handle, range) in revoked {
            log::debug!("Revoking range {:?} {}", handle, range.bound);
            range
                .sink
                .notify(StoreNotification::Cancelled(error.clone()));
        }
    }

    /// Current value of `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().records.get(key).map(|e| e.value.clone())
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.read();
        StoreStats {
            key_count: inner.records.len(),
            open_ranges: inner.ranges.len(),
            operations_count: inner.operations_count,
        }
    }

    fn denied() -> StoreError {
        StoreError::PermissionDenied("access to the store was denied".to_string())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for MemoryStore {
    fn write(
        &self,
        key: &str,
        value: Option<Value>,
        sort_token: Option<&str>,
        on_complete: Option<WriteCallback>,
    ) {
        let _delivery = self.delivery.lock();

        let outgoing = {
            let mut inner = self.inner.write();
            if inner.access_denied {
                drop(inner);
                if let Some(callback) = on_complete {
                    callback(Err(Self::denied()));
                }
                return;
            }
            inner.operations_count += 1;

            let after = value.filter(|v| !v.is_null()).map(|value| Entry {
                value,
                sort_token: sort_token.map(str::to_owned),
            });
            let before = match &after {
                Some(entry) => inner.records.insert(key.to_string(), entry.clone()),
                None => inner.records.remove(key),
            };

            let mut outgoing = Vec::new();
            for range in inner.ranges.values() {
                let was_in = before.as_ref().is_some_and(|e| e.in_range(&range.bound));
                let is_in = after.as_ref().is_some_and(|e| e.in_range(&range.bound));

                match (&before, &after) {
                    (_, Some(now)) if is_in && !was_in => {
                        let snapshot = Snapshot::new(key, now.value.clone());
                        outgoing.push((range.sink.clone(), StoreNotification::ChildAdded(snapshot)));
                    }
                    (Some(old), Some(now)) if is_in && was_in => {
                        if old.value != now.value {
                            let snapshot = Snapshot::new(key, now.value.clone());
                            outgoing.push((
                                range.sink.clone(),
                                StoreNotification::ChildChanged(snapshot.clone()),
                            ));
                            if old.sort_token != now.sort_token {
                                outgoing.push((
                                    range.sink.clone(),
                                    StoreNotification::ChildMoved(snapshot),
                                ));
                            }
                        }
                    }
                    (Some(old), _) if was_in && !is_in => {
                        let snapshot = Snapshot::new(key, old.value.clone());
                        outgoing.push((range.sink.clone(), StoreNotification::ChildRemoved(snapshot)));
                    }
                    _ => {}
                }
            }
            outgoing
        };

        for (sink, notification) in outgoing {
            sink.notify(notification);
        }
        if let Some(callback) = on_complete {
            callback(Ok(()));
        }
    }

    fn read_once(&self, key: &str, callback: ReadCallback) {
        let result = {
            let mut inner = self.inner.write();
            if inner.access_denied {
                Err(Self::denied())
            } else {
                inner.operations_count += 1;
                Ok(inner
                    .records
                    .get(key)
                    .map(|entry| Snapshot::new(key, entry.value.clone())))
            }
        };
        callback(result);
    }

    fn open_range(&self, bound: &RegionBound, sink: Arc<dyn RangeSink>) -> RangeHandle {
        let _delivery = self.delivery.lock();

        let (handle, initial) = {
            let mut inner = self.inner.write();
            let handle = inner.allocate_handle();
            if inner.access_denied {
                drop(inner);
                sink.notify(StoreNotification::Cancelled(Self::denied()));
                return handle;
            }

            let mut initial: Vec<(&str, &str, &Value)> = inner
                .records
                .iter()
                .filter_map(|(key, entry)| {
                    let token = entry.sort_token.as_deref()?;
                    bound
                        .contains(token)
                        .then_some((token, key.as_str(), &entry.value))
                })
                .collect();
            initial.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
            let initial: Vec<Snapshot> = initial
                .into_iter()
                .map(|(_, key, value)| Snapshot::new(key, value.clone()))
                .collect();

            inner.ranges.insert(
                handle,
                Range {
                    bound: bound.clone(),
                    sink: sink.clone(),
                },
            );
            (handle, initial)
        };

        log::trace!("Opened range {:?} {} with {} records", handle, bound, initial.len());
        for snapshot in initial {
            sink.notify(StoreNotification::ChildAdded(snapshot));
        }
        sink.notify(StoreNotification::InitialLoadComplete);
        handle
    }

    fn close_range(&self, handle: RangeHandle) {
        let _delivery = self.delivery.lock();
        self.inner.write().ranges.remove(&handle);
    }
}
