//! Keyed observable state container backing one screen or relation panel.
//!
//! Each concern lives in its own [`StateCell`]; writing a cell notifies only
//! that cell's subscribers. [`ModelStore::batch`] defers notifications so a
//! logical operation (a settled query writing ids, count and cached items)
//! becomes visible to observers as one unit. Derived figures such as page
//! counts are never stored; consumers recompute them on read.

use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::RuntimeConfig;
use crate::model::{Id, Item, ModelSchema, QueryOption, Wheres};

/// Names of the per-operation loading flags.
pub mod ops {
    pub const ITEMS: &str = "items";
    pub const GET: &str = "get";
    pub const SAVE: &str = "save";
    pub const DELETE: &str = "delete";
}

trait FlushCell: Send + Sync {
    fn flush(&self);
}

/// Shared notification gate. While a batch is open, cell notifications queue
/// up (deduplicated) and fire when the last guard drops.
#[derive(Default)]
struct NotifyHub {
    depth: Mutex<usize>,
    pending: Mutex<Vec<Arc<dyn FlushCell>>>,
}

impl NotifyHub {
    fn enter(&self) {
        *self.depth.lock() += 1;
    }

    fn exit(&self) {
        let pending = {
            let mut depth = self.depth.lock();
            *depth -= 1;
            if *depth > 0 {
                return;
            }
            std::mem::take(&mut *self.pending.lock())
        };
        for cell in pending {
            cell.flush();
        }
    }

    fn notify(&self, cell: Arc<dyn FlushCell>) {
        let deferred = *self.depth.lock() > 0;
        if deferred {
            let mut pending = self.pending.lock();
            if !pending.iter().any(|queued| Arc::ptr_eq(queued, &cell)) {
                pending.push(cell);
            }
        } else {
            cell.flush();
        }
    }
}

struct CellInner<T> {
    value: RwLock<T>,
    default: T,
    subscribers: Mutex<Vec<(u64, Arc<dyn Fn(&T) + Send + Sync>)>>,
    next_token: AtomicU64,
    hub: Arc<NotifyHub>,
}

impl<T: Clone + Send + Sync + 'static> FlushCell for CellInner<T> {
    fn flush(&self) {
        let value = self.value.read().clone();
        // Snapshot first; callbacks may write or subscribe to this very
        // cell, which must not find the subscriber list locked.
        let subscribers: Vec<Arc<dyn Fn(&T) + Send + Sync>> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, subscriber)| subscriber.clone())
            .collect();
        for subscriber in subscribers {
            subscriber(&value);
        }
    }
}

/// One observable store key. Cheap to clone; clones share state and
/// subscribers.
pub struct StateCell<T>(Arc<CellInner<T>>);

impl<T> Clone for StateCell<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Clone + Send + Sync + 'static> StateCell<T> {
    fn new(hub: Arc<NotifyHub>, default: T) -> Self {
        Self(Arc::new(CellInner {
            value: RwLock::new(default.clone()),
            default,
            subscribers: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(0),
            hub,
        }))
    }

    pub fn get(&self) -> T {
        self.0.value.read().clone()
    }

    pub fn set(&self, value: T) {
        *self.0.value.write() = value;
        let cell: Arc<dyn FlushCell> = self.0.clone();
        self.0.hub.notify(cell);
    }

    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.0.value.write());
        let cell: Arc<dyn FlushCell> = self.0.clone();
        self.0.hub.notify(cell);
    }

    /// Restore the construction-time default. Used on error to leave a
    /// defined empty state instead of stale data.
    pub fn reset(&self) {
        self.set(self.0.default.clone());
    }

    /// Observe writes to this cell only. Dropping the returned handle
    /// unsubscribes.
    pub fn subscribe(&self, f: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let token = self.0.next_token.fetch_add(1, Ordering::Relaxed);
        self.0.subscribers.lock().push((token, Arc::new(f)));
        let weak = Arc::downgrade(&self.0);
        Subscription(Some(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.subscribers.lock().retain(|(t, _)| *t != token);
            }
        })))
    }
}

/// Handle for an active subscription; unsubscribes on drop.
pub struct Subscription(Option<Box<dyn FnOnce() + Send>>);

impl Subscription {
    /// Keep the subscription alive for the lifetime of the cell.
    pub fn forget(mut self) {
        self.0 = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(unsubscribe) = self.0.take() {
            unsubscribe();
        }
    }
}

/// Guard for an atomic multi-cell write; notifications fire when it drops.
pub struct Batch {
    hub: Arc<NotifyHub>,
}

impl Drop for Batch {
    fn drop(&mut self) {
        self.hub.exit();
    }
}

/// State container for one screen tree. Constructed per screen or relation
/// panel and torn down with it; relation panels never share a store with
/// their parent.
pub struct ModelStore {
    hub: Arc<NotifyHub>,
    /// Current list: item ids in server-query order.
    pub ids: StateCell<Vec<Id>>,
    /// Server-reported total, which may exceed the page size.
    pub count: StateCell<u64>,
    pub option: StateCell<QueryOption>,
    pub wheres: StateCell<Wheres>,
    /// Selected item ids in selection order.
    pub selected: StateCell<Vec<Id>>,
    /// Currently displayed column names.
    pub fields: StateCell<Vec<String>>,
    items: RwLock<HashMap<Id, StateCell<Option<Item>>>>,
    loading: RwLock<HashMap<String, StateCell<bool>>>,
}

impl ModelStore {
    pub fn new(schema: &ModelSchema, config: &RuntimeConfig) -> Self {
        let hub = Arc::new(NotifyHub::default());
        Self {
            ids: StateCell::new(hub.clone(), Vec::new()),
            count: StateCell::new(hub.clone(), 0),
            option: StateCell::new(hub.clone(), QueryOption::with_limit(config.default_limit)),
            wheres: StateCell::new(hub.clone(), Wheres::new()),
            selected: StateCell::new(hub.clone(), Vec::new()),
            fields: StateCell::new(hub.clone(), schema.list_fields.clone()),
            items: RwLock::new(HashMap::new()),
            loading: RwLock::new(HashMap::new()),
            hub,
        }
    }

    /// Cache cell for one item id, created on first use.
    pub fn item(&self, id: &Id) -> StateCell<Option<Item>> {
        if let Some(cell) = self.items.read().get(id) {
            return cell.clone();
        }
        self.items
            .write()
            .entry(id.clone())
            .or_insert_with(|| StateCell::new(self.hub.clone(), None))
            .clone()
    }

    /// Loading flag for one named operation, created on first use. Never a
    /// global flag; unrelated operations may overlap without interfering.
    pub fn loading(&self, op: &str) -> StateCell<bool> {
        if let Some(cell) = self.loading.read().get(op) {
            return cell.clone();
        }
        self.loading
            .write()
            .entry(op.to_string())
            .or_insert_with(|| StateCell::new(self.hub.clone(), false))
            .clone()
    }

    /// Open an atomic write batch.
    pub fn batch(&self) -> Batch {
        self.hub.enter();
        Batch { hub: self.hub.clone() }
    }

    /// Reset list state to the empty baseline (used on query failure).
    pub fn reset_list(&self) {
        let _batch = self.batch();
        self.ids.reset();
        self.count.reset();
    }

    pub fn is_selected(&self, id: &Id) -> bool {
        self.selected.get().iter().any(|s| s == id)
    }

    /// Select or deselect one id. Deselecting an id that is not selected is a
    /// no-op.
    pub fn select(&self, id: &Id, select: bool) {
        self.selected.update(|selected| {
            if select {
                if !selected.contains(id) {
                    selected.push(id.clone());
                }
            } else {
                selected.retain(|s| s != id);
            }
        });
    }

    pub fn select_all(&self, select: bool) {
        if select {
            self.selected.set(self.ids.get());
        } else {
            self.selected.reset();
        }
    }

    /// True iff the selection set equals the current list id set.
    pub fn all_selected(&self) -> bool {
        let ids: BTreeSet<Id> = self.ids.get().into_iter().collect();
        let selected: BTreeSet<Id> = self.selected.get().into_iter().collect();
        ids == selected
    }
}
