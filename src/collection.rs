use crate::{
    CatalogStore, StoreError,
    debounce::{PersistAction, SaveDebouncer},
    model::{CatalogData, EntityKind, Record, RecordId},
    tracked::{Mutation, MutationObserver, RecordRef, SubscriptionId},
};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

type Items<R> = Arc<RwLock<IndexMap<RecordId, RecordRef<R>>>>;

/// Ordered, identifier-unique records of one kind.
///
/// Every record in the collection carries a subscription that routes its
/// persisted-field edits to the save debouncer. The subscription is installed
/// on insert and removed on removal, so records that leave the collection stop
/// scheduling saves.
pub struct Collection<R: Record> {
    items: Items<R>,
    subscriptions: HashMap<RecordId, SubscriptionId>,
    observer: MutationObserver,
    debouncer: Arc<SaveDebouncer>,
    store: Arc<dyn CatalogStore>,
}

impl<R: Record> Collection<R> {
    pub(crate) fn new(debouncer: Arc<SaveDebouncer>, store: Arc<dyn CatalogStore>) -> Self {
        let items: Items<R> = Arc::new(RwLock::new(IndexMap::new()));
        let observer = save_on_mutation::<R>(
            Arc::downgrade(&items),
            Arc::clone(&debouncer),
            Arc::clone(&store),
        );
        Self {
            items,
            subscriptions: HashMap::new(),
            observer,
            debouncer,
            store,
        }
    }

    pub fn kind(&self) -> EntityKind {
        R::KIND
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn get(&self, id: RecordId) -> Option<RecordRef<R>> {
        self.items.read().get(&id).cloned()
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.items.read().contains_key(&id)
    }

    /// Whether this exact handle (not merely its id) is in the collection.
    pub fn contains_ref(&self, handle: &RecordRef<R>) -> bool {
        self.items
            .read()
            .get(&handle.id())
            .is_some_and(|held| RecordRef::ptr_eq(held, handle))
    }

    pub fn first(&self) -> Option<RecordRef<R>> {
        self.items.read().first().map(|(_, h)| h.clone())
    }

    /// Handles in display order.
    pub fn handles(&self) -> Vec<RecordRef<R>> {
        self.items.read().values().cloned().collect()
    }

    pub fn ids(&self) -> Vec<RecordId> {
        self.items.read().keys().copied().collect()
    }

    pub fn max_id(&self) -> Option<RecordId> {
        self.items.read().keys().copied().max()
    }

    /// Owned copies of every record, in display order.
    pub fn snapshot(&self) -> Vec<R> {
        snapshot_records(&self.items)
    }

    /// Returns false (and leaves the collection untouched) if the id is taken.
    pub(crate) fn insert(&mut self, handle: RecordRef<R>) -> bool {
        let id = handle.id();
        {
            let mut items = self.items.write();
            if items.contains_key(&id) {
                return false;
            }
            items.insert(id, handle.clone());
        }
        let sub = handle.subscribe(Arc::clone(&self.observer));
        self.subscriptions.insert(id, sub);
        true
    }

    /// Removes the record, keeping the order of the rest, and drops its subscription.
    pub(crate) fn remove(&mut self, id: RecordId) -> Option<RecordRef<R>> {
        let handle = self.items.write().shift_remove(&id)?;
        self.unsubscribe(&handle);
        Some(handle)
    }

    pub(crate) fn clear(&mut self) -> Vec<RecordRef<R>> {
        let removed: Vec<RecordRef<R>> = {
            let mut items = self.items.write();
            items.drain(..).map(|(_, h)| h).collect()
        };
        for handle in &removed {
            self.unsubscribe(handle);
        }
        removed
    }

    /// Replaces the whole collection. Later duplicates of an id are dropped.
    pub(crate) fn replace_all(&mut self, records: Vec<R>) -> usize {
        self.clear();
        let mut duplicates = 0;
        for record in records {
            let id = record.id();
            if !self.insert(RecordRef::new(record)) {
                tracing::warn!(kind = %R::KIND, id, "duplicate id in loaded data; keeping the first");
                duplicates += 1;
            }
        }
        duplicates
    }

    pub(crate) fn sort_by_name(&mut self) {
        self.items.write().sort_by(|_, a, _, b| {
            let (a, b) = (a.read(), b.read());
            a.name()
                .to_lowercase()
                .cmp(&b.name().to_lowercase())
                .then(a.id().cmp(&b.id()))
        });
    }

    pub(crate) fn schedule_save(&self) {
        let action = persist_action::<R>(Arc::downgrade(&self.items), Arc::clone(&self.store));
        self.debouncer.schedule(R::KIND, action);
    }

    pub(crate) fn save_now(&self) -> Result<(), StoreError> {
        self.debouncer.cancel(R::KIND);
        self.store.save_collection(&R::into_data(self.snapshot()))
    }

    fn unsubscribe(&mut self, handle: &RecordRef<R>) {
        if let Some(sub) = self.subscriptions.remove(&handle.id()) {
            handle.unsubscribe(sub);
        }
    }

    #[cfg(test)]
    pub(crate) fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

fn snapshot_records<R: Record>(items: &RwLock<IndexMap<RecordId, RecordRef<R>>>) -> Vec<R> {
    items.read().values().map(RecordRef::snapshot).collect()
}

fn persist_action<R: Record>(
    items: Weak<RwLock<IndexMap<RecordId, RecordRef<R>>>>,
    store: Arc<dyn CatalogStore>,
) -> PersistAction {
    Box::new(move || {
        // The registry is gone; its shutdown flush owns the final write.
        let Some(items) = items.upgrade() else {
            return Ok(());
        };
        // Membership and each record are read under their locks; a burst of
        // edits spanning several records may land across two saves.
        let data: CatalogData = R::into_data(snapshot_records(&items));
        store.save_collection(&data)
    })
}

fn save_on_mutation<R: Record>(
    items: Weak<RwLock<IndexMap<RecordId, RecordRef<R>>>>,
    debouncer: Arc<SaveDebouncer>,
    store: Arc<dyn CatalogStore>,
) -> MutationObserver {
    Arc::new(move |mutation: &Mutation| {
        if !R::is_persisted_field(mutation.field) {
            return;
        }
        tracing::trace!(kind = %mutation.kind, id = mutation.id, field = mutation.field, "record changed");
        debouncer.schedule(R::KIND, persist_action::<R>(items.clone(), Arc::clone(&store)));
    })
}
