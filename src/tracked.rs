use crate::{
    model::{EntityKind, Record, RecordId},
    reconcile::Keyed,
    statics,
};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

/// Persistence-facing signal raised by every edit made through a [`RecordRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mutation {
    pub kind: EntityKind,
    pub id: RecordId,
    pub field: &'static str,
}

pub type MutationObserver = Arc<dyn Fn(&Mutation) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Tracked<R> {
    id: RecordId,
    data: RwLock<R>,
    observers: Mutex<Vec<(SubscriptionId, MutationObserver)>>,
    next_subscription: AtomicU64,
}

/// Shared handle to one record.
///
/// Collections, derived views and the active selection all hold clones of the
/// same handle; identity is pointer identity (see [`RecordRef::ptr_eq`]).
pub struct RecordRef<R>(Arc<Tracked<R>>);

impl<R> Clone for RecordRef<R> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<R: Record> fmt::Debug for RecordRef<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordRef")
            .field("kind", &R::KIND)
            .field("record", &*self.0.data.read())
            .finish()
    }
}

impl<R: Record> RecordRef<R> {
    pub fn new(record: R) -> Self {
        Self(Arc::new(Tracked {
            id: record.id(),
            data: RwLock::new(record),
            observers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        }))
    }

    pub fn id(&self) -> RecordId {
        self.0.id
    }

    pub fn read(&self) -> RwLockReadGuard<'_, R> {
        self.0.data.read()
    }

    pub fn name(&self) -> String {
        self.0.data.read().name().to_string()
    }

    /// Owned copy of the current record state.
    pub fn snapshot(&self) -> R {
        self.0.data.read().clone()
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Applies `edit` and raises a [`Mutation`] for `field` to every subscriber.
    ///
    /// The identifier must not change; it keys the record in its collection.
    pub fn update<T>(&self, field: &'static str, edit: impl FnOnce(&mut R) -> T) -> T {
        let out = {
            let mut data = self.0.data.write();
            let out = edit(&mut data);
            debug_assert_eq!(data.id(), self.0.id, "record id changed during update");
            out
        };

        let mutation = Mutation {
            kind: R::KIND,
            id: self.0.id,
            field,
        };
        // Observers run without any lock held so they may read this record.
        let observers: Vec<MutationObserver> = self
            .0
            .observers
            .lock()
            .iter()
            .map(|(_, o)| Arc::clone(o))
            .collect();
        for observer in observers {
            observer(&mutation);
        }
        out
    }

    pub fn set_name(&self, name: impl Into<String>) {
        let name = name.into();
        self.update(statics::FIELD_NAME, |r| r.set_name(name));
    }

    pub fn subscribe(&self, observer: MutationObserver) -> SubscriptionId {
        let id = SubscriptionId(self.0.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.0.observers.lock().push((id, observer));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.0.observers.lock();
        let before = observers.len();
        observers.retain(|(sub, _)| *sub != id);
        observers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.0.observers.lock().len()
    }
}

impl<R: Record> Keyed for RecordRef<R> {
    type Key = RecordId;

    fn key(&self) -> RecordId {
        self.id()
    }

    fn same_entry(&self, other: &Self) -> bool {
        RecordRef::ptr_eq(self, other)
    }
}
