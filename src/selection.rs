//! The user's current selection and the display lists derived from it.
//!
//! Every setter runs all of its dependent recomputation before it notifies,
//! and notifies exactly once. Setting the reference that is already active
//! does nothing at all.

use crate::{
    collection::Collection,
    model::{Applicable, Bait, BiteSummary, CatchEvent, Creature, Location, Lure, Record, RecordId},
    reconcile::reconcile,
    statics,
    tracked::RecordRef,
};
use indexmap::IndexSet;
use std::collections::HashSet;

/// Borrowed collections the derived lists are resolved against.
#[derive(Clone, Copy)]
pub struct CatalogView<'a> {
    pub creatures: &'a Collection<Creature>,
    pub baits: &'a Collection<Bait>,
    pub lures: &'a Collection<Lure>,
    pub locations: &'a Collection<Location>,
    pub catch_events: &'a Collection<CatchEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type SelectionObserver = Box<dyn FnMut() + Send>;

#[derive(Default)]
pub struct SelectionState {
    creature: Option<RecordRef<Creature>>,
    location: Option<RecordRef<Location>>,
    catch_event: Option<RecordRef<CatchEvent>>,

    creatures_here: Vec<RecordRef<Creature>>,
    applicable_baits: Vec<RecordRef<Bait>>,
    applicable_lures: Vec<RecordRef<Lure>>,
    best_lures: Vec<RecordRef<Lure>>,
    bite_summary: BiteSummary,

    observers: Vec<(ObserverId, SelectionObserver)>,
    next_observer: u64,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_creature(&self) -> Option<&RecordRef<Creature>> {
        self.creature.as_ref()
    }

    pub fn active_location(&self) -> Option<&RecordRef<Location>> {
        self.location.as_ref()
    }

    pub fn active_catch_event(&self) -> Option<&RecordRef<CatchEvent>> {
        self.catch_event.as_ref()
    }

    /// Creatures found at the active location, or every creature when none is active.
    pub fn creatures_at_location(&self) -> &[RecordRef<Creature>] {
        &self.creatures_here
    }

    pub fn applicable_baits(&self) -> &[RecordRef<Bait>] {
        &self.applicable_baits
    }

    pub fn applicable_lures(&self) -> &[RecordRef<Lure>] {
        &self.applicable_lures
    }

    /// The active catch event's best lures, or the active creature's when the
    /// event has none (or no event is active).
    pub fn best_lures(&self) -> &[RecordRef<Lure>] {
        &self.best_lures
    }

    pub fn bite_summary(&self) -> &BiteSummary {
        &self.bite_summary
    }

    pub fn subscribe(&mut self, observer: impl FnMut() + Send + 'static) -> ObserverId {
        self.next_observer += 1;
        let id = ObserverId(self.next_observer);
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(o, _)| *o != id);
        self.observers.len() != before
    }

    /// Returns whether the selection changed.
    pub fn set_active_creature(
        &mut self,
        creature: Option<RecordRef<Creature>>,
        view: CatalogView<'_>,
    ) -> bool {
        if same(&self.creature, &creature) || !belongs(&creature, view.creatures) {
            return false;
        }
        self.creature = creature;
        self.recompute_creature_views(view);
        self.notify();
        true
    }

    /// Also narrows the creature list; an active creature that is not found at
    /// the new location is replaced by the first one that is (or cleared).
    pub fn set_active_location(
        &mut self,
        location: Option<RecordRef<Location>>,
        view: CatalogView<'_>,
    ) -> bool {
        if same(&self.location, &location) || !belongs(&location, view.locations) {
            return false;
        }
        self.location = location;
        self.recompute_location_filter(view);
        if !self.creature_is_here() {
            self.fall_back_to_first_here(view);
        }
        self.notify();
        true
    }

    pub fn set_active_catch_event(
        &mut self,
        event: Option<RecordRef<CatchEvent>>,
        view: CatalogView<'_>,
    ) -> bool {
        if same(&self.catch_event, &event) || !belongs(&event, view.catch_events) {
            return false;
        }
        self.catch_event = event;
        self.recompute_best_lures(view);
        self.notify();
        true
    }

    /// Re-derives every list from the current collections.
    ///
    /// Active references whose record left its collection are cleared. An active
    /// creature that is no longer found at the active location is replaced the
    /// same way [`SelectionState::set_active_location`] replaces it. Notifies
    /// once if anything changed.
    pub fn refresh(&mut self, view: CatalogView<'_>) -> bool {
        let mut changed = false;
        changed |= drop_dangling(&mut self.creature, view.creatures);
        changed |= drop_dangling(&mut self.location, view.locations);
        changed |= drop_dangling(&mut self.catch_event, view.catch_events);

        changed |= self.recompute_location_filter(view);
        if self.creature.is_some() && !self.creature_is_here() {
            changed |= self.fall_back_to_first_here(view);
        }
        changed |= self.recompute_creature_views(view);

        if changed {
            self.notify();
        }
        changed
    }

    fn notify(&mut self) {
        for (_, observer) in &mut self.observers {
            observer();
        }
    }

    fn creature_is_here(&self) -> bool {
        self.creature.as_ref().is_some_and(|active| {
            self.creatures_here
                .iter()
                .any(|c| RecordRef::ptr_eq(c, active))
        })
    }

    /// Makes the first creature at the location active (or none when the list
    /// is empty). Returns whether the active creature changed.
    fn fall_back_to_first_here(&mut self, view: CatalogView<'_>) -> bool {
        let fallback = self.creatures_here.first().cloned();
        if same(&self.creature, &fallback) {
            return false;
        }
        tracing::debug!(
            creature = fallback.as_ref().map(RecordRef::id),
            "active creature replaced by location filter"
        );
        self.creature = fallback;
        self.recompute_creature_views(view);
        true
    }

    fn recompute_location_filter(&mut self, view: CatalogView<'_>) -> bool {
        let desired: IndexSet<RecordId> = match &self.location {
            Some(location) => {
                let location_id = location.id();
                view.creatures
                    .handles()
                    .iter()
                    .filter(|c| c.read().location_ids.contains(&location_id))
                    .map(RecordRef::id)
                    .collect()
            }
            None => view.creatures.ids().into_iter().collect(),
        };
        reconcile(&mut self.creatures_here, &desired, |id| view.creatures.get(id)).changed()
    }

    fn recompute_creature_views(&mut self, view: CatalogView<'_>) -> bool {
        let (bait_ids, lure_ids, summary): (IndexSet<RecordId>, IndexSet<RecordId>, BiteSummary) =
            match &self.creature {
                Some(creature) => {
                    let creature = creature.read();
                    (
                        creature.bait_ids.iter().copied().collect(),
                        creature.lure_ids.iter().copied().collect(),
                        BiteSummary::from_activity(&creature.bite_activity),
                    )
                }
                None => (IndexSet::new(), IndexSet::new(), BiteSummary::default()),
            };

        let mut changed = false;
        changed |=
            reconcile(&mut self.applicable_baits, &bait_ids, |id| view.baits.get(id)).changed();
        changed |=
            reconcile(&mut self.applicable_lures, &lure_ids, |id| view.lures.get(id)).changed();
        mark_applicable(view.baits, &self.applicable_baits);
        mark_applicable(view.lures, &self.applicable_lures);

        if self.bite_summary != summary {
            self.bite_summary = summary;
            changed = true;
        }

        changed |= self.recompute_best_lures(view);
        changed
    }

    fn recompute_best_lures(&mut self, view: CatalogView<'_>) -> bool {
        let from_event = self
            .catch_event
            .as_ref()
            .map(|event| event.read().best_lure_ids.clone())
            .filter(|ids| !ids.is_empty());
        let ids = from_event
            .or_else(|| {
                self.creature
                    .as_ref()
                    .map(|creature| creature.read().best_lure_ids.clone())
            })
            .unwrap_or_default();

        let desired: IndexSet<RecordId> = ids.into_iter().collect();
        reconcile(&mut self.best_lures, &desired, |id| view.lures.get(id)).changed()
    }
}

fn same<R: Record>(a: &Option<RecordRef<R>>, b: &Option<RecordRef<R>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => RecordRef::ptr_eq(a, b),
        _ => false,
    }
}

/// Only handles held by the owning collection may become active.
fn belongs<R: Record>(candidate: &Option<RecordRef<R>>, collection: &Collection<R>) -> bool {
    let ok = candidate
        .as_ref()
        .is_none_or(|handle| collection.contains_ref(handle));
    if !ok {
        tracing::warn!(kind = %R::KIND, "ignoring selection of a record outside its collection");
    }
    ok
}

fn drop_dangling<R: Record>(active: &mut Option<RecordRef<R>>, collection: &Collection<R>) -> bool {
    if active
        .as_ref()
        .is_some_and(|handle| !collection.contains_ref(handle))
    {
        tracing::debug!(kind = %R::KIND, "clearing selection of a removed record");
        *active = None;
        return true;
    }
    false
}

/// Brings every record's transient marker in line with the derived list.
fn mark_applicable<R: Record + Applicable>(all: &Collection<R>, applicable: &[RecordRef<R>]) {
    let ids: HashSet<RecordId> = applicable.iter().map(RecordRef::id).collect();
    for handle in all.handles() {
        let want = ids.contains(&handle.id());
        let current = handle.read().is_applicable();
        if current != want {
            handle.update(statics::FIELD_APPLICABLE, |r| r.set_applicable(want));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CatalogView, SelectionState};
    use crate::{
        MemoryStore, RecordRef,
        collection::Collection,
        statics,
        debounce::SaveDebouncer,
        model::{Bait, CatchEvent, Creature, Location, Lure, Record},
    };
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    struct Fixture {
        creatures: Collection<Creature>,
        baits: Collection<Bait>,
        lures: Collection<Lure>,
        locations: Collection<Location>,
        catch_events: Collection<CatchEvent>,
        _debouncer: Arc<SaveDebouncer>,
    }

    impl Fixture {
        fn new() -> Self {
            let debouncer = Arc::new(SaveDebouncer::new(Duration::from_secs(60)).unwrap());
            let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
            let mut f = Self {
                creatures: Collection::new(Arc::clone(&debouncer), store.clone()),
                baits: Collection::new(Arc::clone(&debouncer), store.clone()),
                lures: Collection::new(Arc::clone(&debouncer), store.clone()),
                locations: Collection::new(Arc::clone(&debouncer), store.clone()),
                catch_events: Collection::new(Arc::clone(&debouncer), store),
                _debouncer: debouncer,
            };

            f.baits.replace_all(vec![
                Bait::new_named(1, "Worm".into()),
                Bait::new_named(2, "Maggot".into()),
                Bait::new_named(3, "Corn".into()),
            ]);
            f.lures.replace_all(vec![
                Lure::new_named(10, "Spinner".into()),
                Lure::new_named(11, "Wobbler".into()),
                Lure::new_named(12, "Jig".into()),
            ]);
            f.locations.replace_all(vec![
                Location::new_named(100, "Lake".into()),
                Location::new_named(101, "River".into()),
            ]);
            f.creatures.replace_all(vec![
                Creature {
                    id: 1,
                    name: "Pike".into(),
                    bait_ids: vec![1],
                    lure_ids: vec![10, 11],
                    location_ids: vec![100, 101],
                    best_lure_ids: vec![11],
                    ..Default::default()
                },
                Creature {
                    id: 2,
                    name: "Carp".into(),
                    bait_ids: vec![2, 3, 99],
                    location_ids: vec![100],
                    ..Default::default()
                },
            ]);
            f.catch_events.replace_all(vec![
                CatchEvent {
                    id: 500,
                    name: "Evening pike".into(),
                    creature_id: Some(1),
                    best_lure_ids: vec![12],
                    ..Default::default()
                },
                CatchEvent::new_named(501, "No lure notes".into()),
            ]);
            f
        }

        fn view(&self) -> CatalogView<'_> {
            CatalogView {
                creatures: &self.creatures,
                baits: &self.baits,
                lures: &self.lures,
                locations: &self.locations,
                catch_events: &self.catch_events,
            }
        }
    }

    fn ids<R: Record>(handles: &[RecordRef<R>]) -> Vec<i64> {
        handles.iter().map(RecordRef::id).collect()
    }

    fn counted(selection: &mut SelectionState) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        selection.subscribe(move || {
            sink.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    #[test]
    fn setting_same_creature_twice_notifies_once() {
        let f = Fixture::new();
        let mut selection = SelectionState::new();
        let count = counted(&mut selection);
        let carp = f.creatures.get(2);

        assert!(selection.set_active_creature(carp.clone(), f.view()));
        assert!(!selection.set_active_creature(carp, f.view()));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn creature_drives_applicable_lists_and_markers() {
        let f = Fixture::new();
        let mut selection = SelectionState::new();
        selection.set_active_creature(f.creatures.get(2), f.view());

        // 99 has no backing bait and is dropped.
        assert_eq!(ids(selection.applicable_baits()), vec![2, 3]);
        assert!(selection.applicable_lures().is_empty());
        assert!(f.baits.get(2).unwrap().read().applicable);
        assert!(!f.baits.get(1).unwrap().read().applicable);

        let maggot = selection.applicable_baits()[0].clone();
        selection.set_active_creature(f.creatures.get(1), f.view());
        assert_eq!(ids(selection.applicable_baits()), vec![1]);
        assert_eq!(ids(selection.applicable_lures()), vec![10, 11]);
        assert!(!maggot.read().applicable);
        assert!(f.baits.get(1).unwrap().read().applicable);
    }

    #[test]
    fn location_filters_and_falls_back_to_first_creature() {
        let f = Fixture::new();
        let mut selection = SelectionState::new();
        let count = counted(&mut selection);
        selection.set_active_creature(f.creatures.get(2), f.view());

        selection.set_active_location(f.locations.get(101), f.view());

        assert_eq!(ids(selection.creatures_at_location()), vec![1]);
        assert_eq!(selection.active_creature().map(RecordRef::id), Some(1));
        // Creature views follow the fallback within the same call.
        assert_eq!(ids(selection.applicable_baits()), vec![1]);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn location_keeps_creature_found_there() {
        let f = Fixture::new();
        let mut selection = SelectionState::new();
        selection.set_active_creature(f.creatures.get(2), f.view());
        let carp = selection.active_creature().cloned().unwrap();

        selection.set_active_location(f.locations.get(100), f.view());

        assert_eq!(ids(selection.creatures_at_location()), vec![1, 2]);
        assert!(RecordRef::ptr_eq(selection.active_creature().unwrap(), &carp));
    }

    #[test]
    fn catch_event_best_lures_override_creature() {
        let f = Fixture::new();
        let mut selection = SelectionState::new();
        selection.set_active_creature(f.creatures.get(1), f.view());
        assert_eq!(ids(selection.best_lures()), vec![11]);

        selection.set_active_catch_event(f.catch_events.get(500), f.view());
        assert_eq!(ids(selection.best_lures()), vec![12]);

        // An event without its own lures falls back to the creature's.
        selection.set_active_catch_event(f.catch_events.get(501), f.view());
        assert_eq!(ids(selection.best_lures()), vec![11]);
    }

    #[test]
    fn foreign_handle_is_not_selected() {
        let f = Fixture::new();
        let mut selection = SelectionState::new();
        let count = counted(&mut selection);
        let stranger = RecordRef::new(Creature::new_named(1, "Pike".into()));

        assert!(!selection.set_active_creature(Some(stranger), f.view()));
        assert!(selection.active_creature().is_none());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn refresh_clears_removed_selection() {
        let mut f = Fixture::new();
        let mut selection = SelectionState::new();
        selection.set_active_creature(f.creatures.get(1), f.view());
        let count = counted(&mut selection);

        f.creatures.remove(1);
        assert!(selection.refresh(f.view()));

        assert!(selection.active_creature().is_none());
        assert!(selection.applicable_baits().is_empty());
        assert_eq!(ids(selection.creatures_at_location()), vec![2]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!selection.refresh(f.view()));
    }

    #[test]
    fn refresh_moves_creature_that_left_the_location() {
        let f = Fixture::new();
        let mut selection = SelectionState::new();
        selection.set_active_location(f.locations.get(100), f.view());
        selection.set_active_creature(f.creatures.get(1), f.view());
        let count = counted(&mut selection);

        f.creatures
            .get(1)
            .unwrap()
            .update(statics::FIELD_LOCATION_IDS, |c| c.location_ids.clear());
        assert!(selection.refresh(f.view()));

        assert_eq!(ids(selection.creatures_at_location()), vec![2]);
        assert_eq!(selection.active_creature().map(RecordRef::id), Some(2));
        assert_eq!(ids(selection.applicable_baits()), vec![2, 3]);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn refresh_drops_removed_records_from_derived_lists() {
        let mut f = Fixture::new();
        let mut selection = SelectionState::new();
        selection.set_active_creature(f.creatures.get(1), f.view());
        assert_eq!(ids(selection.applicable_lures()), vec![10, 11]);

        f.lures.remove(11);
        assert!(selection.refresh(f.view()));

        assert_eq!(ids(selection.applicable_lures()), vec![10]);
        assert!(selection.best_lures().is_empty());
    }

    #[test]
    fn unsubscribed_observer_stops_receiving() {
        let f = Fixture::new();
        let mut selection = SelectionState::new();
        let count = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&count);
        let id = selection.subscribe(move || {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        assert!(selection.unsubscribe(id));
        selection.set_active_location(f.locations.get(100), f.view());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
