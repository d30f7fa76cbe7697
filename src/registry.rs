use crate::{
    CatalogError, CatalogStore, StoreError,
    collection::Collection,
    debounce::SaveDebouncer,
    model::{
        Bait, CatalogData, CatchEvent, Creature, EntityKind, Location, Lure, Recipe, Record,
        RecordId,
    },
    selection::{CatalogView, ObserverId, SelectionState},
    tracked::RecordRef,
};
use std::{sync::Arc, time::Duration};

/// Records the registry keeps a collection for.
pub trait Stored: Record {
    fn collection(registry: &Registry) -> &Collection<Self>;
    fn collection_mut(registry: &mut Registry) -> &mut Collection<Self>;
}

macro_rules! impl_stored {
    ($($ty:ident => $field:ident),+ $(,)?) => {
        $(
            impl Stored for $ty {
                fn collection(registry: &Registry) -> &Collection<Self> {
                    &registry.$field
                }

                fn collection_mut(registry: &mut Registry) -> &mut Collection<Self> {
                    &mut registry.$field
                }
            }
        )+
    };
}

impl_stored!(
    Creature => creatures,
    Bait => baits,
    Lure => lures,
    Location => locations,
    CatchEvent => catch_events,
    Recipe => recipes,
);

/// Runs `$body` with `$c` bound to the collection for `$kind`.
macro_rules! with_collection {
    ($registry:expr, $kind:expr, |$c:ident| $body:expr) => {
        match $kind {
            EntityKind::Creature => {
                let $c = &$registry.creatures;
                $body
            }
            EntityKind::Bait => {
                let $c = &$registry.baits;
                $body
            }
            EntityKind::Lure => {
                let $c = &$registry.lures;
                $body
            }
            EntityKind::Location => {
                let $c = &$registry.locations;
                $body
            }
            EntityKind::CatchEvent => {
                let $c = &$registry.catch_events;
                $body
            }
            EntityKind::Recipe => {
                let $c = &$registry.recipes;
                $body
            }
        }
    };
}

macro_rules! with_collection_mut {
    ($registry:expr, $kind:expr, |$c:ident| $body:expr) => {
        match $kind {
            EntityKind::Creature => {
                let $c = &mut $registry.creatures;
                $body
            }
            EntityKind::Bait => {
                let $c = &mut $registry.baits;
                $body
            }
            EntityKind::Lure => {
                let $c = &mut $registry.lures;
                $body
            }
            EntityKind::Location => {
                let $c = &mut $registry.locations;
                $body
            }
            EntityKind::CatchEvent => {
                let $c = &mut $registry.catch_events;
                $body
            }
            EntityKind::Recipe => {
                let $c = &mut $registry.recipes;
                $body
            }
        }
    };
}

/// Owner of every collection for one session.
///
/// Collections start empty, are filled once by [`Registry::load`], and are
/// written back either by the save debouncer after edits settle or by
/// [`Registry::save`]/[`Registry::save_all`]. Call [`Registry::shutdown`]
/// before exiting; pending debounced saves are not run on drop.
pub struct Registry {
    store: Arc<dyn CatalogStore>,
    debouncer: Arc<SaveDebouncer>,
    creatures: Collection<Creature>,
    baits: Collection<Bait>,
    lures: Collection<Lure>,
    locations: Collection<Location>,
    catch_events: Collection<CatchEvent>,
    recipes: Collection<Recipe>,
    selection: SelectionState,
    loaded: bool,
    shut_down: bool,
}

impl Registry {
    pub fn new(store: Arc<dyn CatalogStore>, quiet_period: Duration) -> Result<Self, CatalogError> {
        let debouncer = Arc::new(SaveDebouncer::new(quiet_period)?);
        Ok(Self {
            creatures: Collection::new(Arc::clone(&debouncer), Arc::clone(&store)),
            baits: Collection::new(Arc::clone(&debouncer), Arc::clone(&store)),
            lures: Collection::new(Arc::clone(&debouncer), Arc::clone(&store)),
            locations: Collection::new(Arc::clone(&debouncer), Arc::clone(&store)),
            catch_events: Collection::new(Arc::clone(&debouncer), Arc::clone(&store)),
            recipes: Collection::new(Arc::clone(&debouncer), Arc::clone(&store)),
            selection: SelectionState::new(),
            loaded: false,
            shut_down: false,
            store,
            debouncer,
        })
    }

    /// Replaces every collection with what the store holds.
    ///
    /// Absent or empty data gives an empty collection; anything else the store
    /// fails on is returned. Only one successful load per session is allowed.
    pub fn load(&mut self) -> Result<(), CatalogError> {
        if self.loaded {
            return Err(CatalogError::AlreadyLoaded);
        }

        for kind in EntityKind::ALL {
            let data = match self.store.load_collection(kind) {
                Ok(Some(data)) => data,
                Ok(None) | Err(StoreError::Missing { .. }) => {
                    tracing::debug!(%kind, "no stored data; starting empty");
                    CatalogData::empty(kind)
                }
                Err(source) => return Err(CatalogError::Load { kind, source }),
            };
            if data.kind() != kind {
                return Err(CatalogError::Load {
                    kind,
                    source: StoreError::Rejected {
                        kind,
                        reason: format!("store returned {} data", data.kind()),
                    },
                });
            }
            self.replace(data);
        }

        self.loaded = true;
        self.refresh_selection();
        tracing::info!(
            creatures = self.creatures.len(),
            baits = self.baits.len(),
            lures = self.lures.len(),
            locations = self.locations.len(),
            catch_events = self.catch_events.len(),
            recipes = self.recipes.len(),
            "catalog loaded"
        );
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn replace(&mut self, data: CatalogData) {
        match data {
            CatalogData::Creatures(v) => self.creatures.replace_all(v),
            CatalogData::Baits(v) => self.baits.replace_all(v),
            CatalogData::Lures(v) => self.lures.replace_all(v),
            CatalogData::Locations(v) => self.locations.replace_all(v),
            CatalogData::CatchEvents(v) => self.catch_events.replace_all(v),
            CatalogData::Recipes(v) => self.recipes.replace_all(v),
        };
    }

    /// Persists `kind` right away, replacing any pending debounced save.
    pub fn save(&self, kind: EntityKind) -> Result<(), CatalogError> {
        with_collection!(self, kind, |c| c.save_now())
            .map_err(|source| CatalogError::Save { kind, source })?;
        tracing::debug!(%kind, "collection saved");
        Ok(())
    }

    /// Persists every kind, even after earlier ones fail. All failures are returned.
    pub fn save_all(&self) -> Result<(), CatalogError> {
        let failures: Vec<CatalogError> = EntityKind::ALL
            .into_iter()
            .filter_map(|kind| self.save(kind).err())
            .collect();
        if failures.is_empty() {
            tracing::info!("all collections saved");
            Ok(())
        } else {
            for failure in &failures {
                tracing::error!(error = %failure, "flush failed");
            }
            Err(CatalogError::Flush(failures))
        }
    }

    /// Stops debounced saving and writes every collection synchronously.
    ///
    /// Later calls do nothing. Edits made after shutdown are no longer saved
    /// automatically.
    pub fn shutdown(&mut self) -> Result<(), CatalogError> {
        if self.shut_down {
            return Ok(());
        }
        let discarded = self.debouncer.cancel_all();
        if !discarded.is_empty() {
            tracing::debug!(?discarded, "pending saves replaced by shutdown flush");
        }
        self.debouncer.shutdown();
        self.shut_down = true;
        self.save_all()
    }

    pub fn pending_saves(&self) -> Vec<EntityKind> {
        self.debouncer.pending_kinds()
    }

    pub fn quiet_period(&self) -> Duration {
        self.debouncer.quiet_period()
    }

    pub fn collection<R: Stored>(&self) -> &Collection<R> {
        R::collection(self)
    }

    pub fn get<R: Stored>(&self, id: RecordId) -> Option<RecordRef<R>> {
        R::collection(self).get(id)
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        with_collection!(self, kind, |c| c.len())
    }

    /// One past the largest id of `R` (at least 1).
    pub fn next_id<R: Stored>(&self) -> Result<RecordId, CatalogError> {
        match R::collection(self).max_id() {
            None => Ok(1),
            Some(max) => max
                .max(0)
                .checked_add(1)
                .ok_or(CatalogError::IdsExhausted { kind: R::KIND, max }),
        }
    }

    /// Adds a record at the end of its collection and schedules a save.
    pub fn insert<R: Stored>(&mut self, record: R) -> Result<RecordRef<R>, CatalogError> {
        let id = record.id();
        let handle = RecordRef::new(record);
        let collection = R::collection_mut(self);
        if !collection.insert(handle.clone()) {
            return Err(CatalogError::DuplicateId { kind: R::KIND, id });
        }
        collection.schedule_save();
        self.refresh_selection();
        Ok(handle)
    }

    /// Removes a record, schedules a save and clears any selection pointing at it.
    ///
    /// The returned handle is detached: editing it no longer schedules saves.
    pub fn remove<R: Stored>(&mut self, id: RecordId) -> Option<RecordRef<R>> {
        let collection = R::collection_mut(self);
        let handle = collection.remove(id)?;
        collection.schedule_save();
        self.refresh_selection();
        Some(handle)
    }

    /// Empties a collection, clearing any selection into it.
    pub fn clear(&mut self, kind: EntityKind) -> usize {
        let removed = with_collection_mut!(self, kind, |c| {
            let removed = c.clear().len();
            if removed > 0 {
                c.schedule_save();
            }
            removed
        });
        self.refresh_selection();
        removed
    }

    /// Edits a record through its handle, then re-derives the selection views.
    ///
    /// Use this for edits that can change derived lists (relation ids, bite
    /// activity); plain [`RecordRef::update`] is enough for anything else.
    pub fn edit<R: Stored, T>(
        &mut self,
        id: RecordId,
        field: &'static str,
        edit: impl FnOnce(&mut R) -> T,
    ) -> Option<T> {
        let handle = R::collection(self).get(id)?;
        let out = handle.update(field, edit);
        self.refresh_selection();
        Some(out)
    }

    /// Reorders a collection by name. Derived lists keep their own order.
    pub fn sort_by_name(&mut self, kind: EntityKind) {
        with_collection_mut!(self, kind, |c| c.sort_by_name());
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn on_selection_changed(&mut self, observer: impl FnMut() + Send + 'static) -> ObserverId {
        self.selection.subscribe(observer)
    }

    pub fn remove_selection_observer(&mut self, id: ObserverId) -> bool {
        self.selection.unsubscribe(id)
    }

    pub fn set_active_creature(&mut self, creature: Option<RecordRef<Creature>>) -> bool {
        let (selection, view) = self.selection_and_view();
        selection.set_active_creature(creature, view)
    }

    pub fn set_active_location(&mut self, location: Option<RecordRef<Location>>) -> bool {
        let (selection, view) = self.selection_and_view();
        selection.set_active_location(location, view)
    }

    pub fn set_active_catch_event(&mut self, event: Option<RecordRef<CatchEvent>>) -> bool {
        let (selection, view) = self.selection_and_view();
        selection.set_active_catch_event(event, view)
    }

    /// Selects by id. An unknown id clears the selection.
    pub fn select_creature(&mut self, id: Option<RecordId>) -> bool {
        let creature = id.and_then(|id| self.creatures.get(id));
        self.set_active_creature(creature)
    }

    pub fn select_location(&mut self, id: Option<RecordId>) -> bool {
        let location = id.and_then(|id| self.locations.get(id));
        self.set_active_location(location)
    }

    pub fn select_catch_event(&mut self, id: Option<RecordId>) -> bool {
        let event = id.and_then(|id| self.catch_events.get(id));
        self.set_active_catch_event(event)
    }

    pub fn refresh_selection(&mut self) -> bool {
        let (selection, view) = self.selection_and_view();
        selection.refresh(view)
    }

    fn selection_and_view(&mut self) -> (&mut SelectionState, CatalogView<'_>) {
        (
            &mut self.selection,
            CatalogView {
                creatures: &self.creatures,
                baits: &self.baits,
                lures: &self.lures,
                locations: &self.locations,
                catch_events: &self.catch_events,
            },
        )
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        if !self.shut_down {
            let discarded = self.debouncer.cancel_all();
            if !discarded.is_empty() {
                tracing::warn!(?discarded, "registry dropped without shutdown; pending saves lost");
            }
        }
        self.debouncer.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::Registry;
    use crate::{CatalogError, EntityKind, MemoryStore, model::Creature};
    use std::{sync::Arc, time::Duration};

    fn registry() -> (Registry, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let registry = Registry::new(store.clone(), Duration::from_secs(60)).unwrap();
        (registry, store)
    }

    #[test]
    fn next_id_starts_at_one_and_follows_max() {
        let (mut registry, _store) = registry();
        assert_eq!(registry.next_id::<Creature>().unwrap(), 1);
        registry
            .insert(Creature {
                id: 41,
                name: "Catfish".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(registry.next_id::<Creature>().unwrap(), 42);
    }

    #[test]
    fn next_id_after_largest_possible_id_is_an_error() {
        let (mut registry, _store) = registry();
        registry
            .insert(Creature {
                id: i64::MAX,
                name: "Leviathan".into(),
                ..Default::default()
            })
            .unwrap();
        assert!(matches!(
            registry.next_id::<Creature>(),
            Err(CatalogError::IdsExhausted {
                kind: EntityKind::Creature,
                max: i64::MAX
            })
        ));
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let (mut registry, _store) = registry();
        registry.insert(Creature { id: 1, ..Default::default() }).unwrap();
        let err = registry
            .insert(Creature { id: 1, ..Default::default() })
            .unwrap_err();
        assert!(matches!(
            err,
            CatalogError::DuplicateId {
                kind: EntityKind::Creature,
                id: 1
            }
        ));
    }

    #[test]
    fn second_load_is_rejected() {
        let (mut registry, _store) = registry();
        registry.load().unwrap();
        assert!(matches!(registry.load(), Err(CatalogError::AlreadyLoaded)));
    }

    #[test]
    fn shutdown_twice_saves_once() {
        let (mut registry, store) = registry();
        registry.shutdown().unwrap();
        registry.shutdown().unwrap();
        assert_eq!(store.save_count(EntityKind::Creature), 1);
    }
}
