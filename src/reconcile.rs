//! In-place reconciliation of derived display lists.
//!
//! Views bound to a list keep scroll position and row selection as long as the
//! entries they show are not replaced, so derived lists are edited rather than
//! rebuilt: entries that stay keep their identity and relative order, missing
//! ones are appended.

use indexmap::IndexSet;
use std::{collections::HashSet, hash::Hash};

/// An entry that can be matched against a desired identifier set.
pub trait Keyed {
    type Key: Copy + Eq + Hash;

    fn key(&self) -> Self::Key;

    /// Whether `self` is the very entry `other` is, not merely one with the same key.
    fn same_entry(&self, other: &Self) -> bool;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub removed: usize,
    pub appended: usize,
}

impl ReconcileOutcome {
    pub fn changed(&self) -> bool {
        self.removed != 0 || self.appended != 0
    }
}

/// Edits `existing` so its key set equals `desired` restricted to keys `lookup` resolves.
///
/// An entry is retained only while `lookup` still resolves its key to that same
/// entry; retained entries are never removed and re-inserted. New entries are
/// appended in the iteration order of `desired`. Keys `lookup` cannot resolve
/// are skipped, and entries whose key no longer resolves are dropped.
pub fn reconcile<T, F>(existing: &mut Vec<T>, desired: &IndexSet<T::Key>, mut lookup: F) -> ReconcileOutcome
where
    T: Keyed,
    F: FnMut(T::Key) -> Option<T>,
{
    let before = existing.len();

    // Single order-preserving pass. Later duplicates of a key are dropped too.
    let mut present: HashSet<T::Key> = HashSet::with_capacity(existing.len().min(desired.len()));
    existing.retain(|entry| {
        let key = entry.key();
        if !desired.contains(&key) || present.contains(&key) {
            return false;
        }
        // Stale handles are dropped here; the current one is appended below.
        let canonical = lookup(key).is_some_and(|current| entry.same_entry(&current));
        if canonical {
            present.insert(key);
        }
        canonical
    });
    let removed = before - existing.len();

    let mut appended = 0;
    for key in desired {
        if present.contains(key) {
            continue;
        }
        if let Some(entry) = lookup(*key) {
            existing.push(entry);
            present.insert(*key);
            appended += 1;
        }
    }

    ReconcileOutcome { removed, appended }
}

#[cfg(test)]
mod tests {
    use super::{Keyed, ReconcileOutcome, reconcile};
    use indexmap::IndexSet;
    use std::rc::Rc;

    #[derive(Debug)]
    struct Row {
        id: i64,
        name: &'static str,
    }

    impl Keyed for Rc<Row> {
        type Key = i64;

        fn key(&self) -> i64 {
            self.id
        }

        fn same_entry(&self, other: &Self) -> bool {
            Rc::ptr_eq(self, other)
        }
    }

    fn row(id: i64, name: &'static str) -> Rc<Row> {
        Rc::new(Row { id, name })
    }

    fn ids(rows: &[Rc<Row>]) -> Vec<i64> {
        rows.iter().map(|r| r.id).collect()
    }

    fn resolve_from(table: &[Rc<Row>]) -> impl FnMut(i64) -> Option<Rc<Row>> + '_ {
        move |id| table.iter().find(|r| r.id == id).cloned()
    }

    #[test]
    fn pike_carp_bream_scenario() {
        let pike = row(1, "Pike");
        let carp = row(2, "Carp");
        let bream = row(3, "Bream");
        let mut existing = vec![Rc::clone(&pike), Rc::clone(&carp)];
        let desired: IndexSet<i64> = [2, 3].into_iter().collect();

        let table = [Rc::clone(&pike), Rc::clone(&carp), Rc::clone(&bream)];
        let outcome = reconcile(&mut existing, &desired, resolve_from(&table));

        assert_eq!(ids(&existing), vec![2, 3]);
        assert_eq!(existing[0].name, "Carp");
        assert_eq!(existing[1].name, "Bream");
        assert!(Rc::ptr_eq(&existing[0], &carp));
        assert_eq!(
            outcome,
            ReconcileOutcome {
                removed: 1,
                appended: 1
            }
        );
    }

    #[test]
    fn unresolvable_ids_are_dropped() {
        let mut existing = Vec::new();
        let desired: IndexSet<i64> = [5, 6].into_iter().collect();
        let outcome = reconcile(&mut existing, &desired, |id| (id == 6).then(|| row(6, "Roach")));
        assert_eq!(ids(&existing), vec![6]);
        assert_eq!(outcome.appended, 1);
    }

    #[test]
    fn retained_entries_keep_relative_order() {
        let mut existing = vec![row(4, "d"), row(1, "a"), row(9, "x"), row(2, "b")];
        let originals: Vec<_> = existing.iter().map(Rc::clone).collect();
        let mut table = originals.clone();
        table.push(row(7, "g"));
        // Desired order differs from display order; display order wins for retained rows.
        let desired: IndexSet<i64> = [2, 1, 4, 7].into_iter().collect();

        reconcile(&mut existing, &desired, resolve_from(&table));

        assert_eq!(ids(&existing), vec![4, 1, 2, 7]);
        assert!(Rc::ptr_eq(&existing[0], &originals[0]));
        assert!(Rc::ptr_eq(&existing[1], &originals[1]));
        assert!(Rc::ptr_eq(&existing[2], &originals[3]));
    }

    #[test]
    fn matching_sets_are_untouched() {
        let table = [row(1, "a"), row(2, "b")];
        let mut existing = table.to_vec();
        let desired: IndexSet<i64> = [1, 2].into_iter().collect();
        let outcome = reconcile(&mut existing, &desired, resolve_from(&table));
        assert!(!outcome.changed());
        assert!(Rc::ptr_eq(&existing[0], &table[0]));
        assert!(Rc::ptr_eq(&existing[1], &table[1]));
    }

    #[test]
    fn entry_whose_record_is_gone_is_dropped() {
        let mut existing = vec![row(1, "a")];
        let desired: IndexSet<i64> = [1].into_iter().collect();
        let outcome = reconcile(&mut existing, &desired, |_| None);
        assert!(existing.is_empty());
        assert_eq!(
            outcome,
            ReconcileOutcome {
                removed: 1,
                appended: 0
            }
        );
    }

    #[test]
    fn stale_entry_is_replaced_by_the_current_one() {
        let stale = row(1, "old");
        let current = row(1, "new");
        let mut existing = vec![Rc::clone(&stale), row(2, "b")];
        let table = [Rc::clone(&current), Rc::clone(&existing[1])];
        let desired: IndexSet<i64> = [1, 2].into_iter().collect();

        reconcile(&mut existing, &desired, resolve_from(&table));

        assert_eq!(ids(&existing), vec![2, 1]);
        assert!(Rc::ptr_eq(&existing[1], &current));
    }

    #[test]
    fn empty_desired_set_clears_everything() {
        let mut existing = vec![row(1, "a"), row(2, "b")];
        let outcome = reconcile(&mut existing, &IndexSet::new(), |_| None);
        assert!(existing.is_empty());
        assert_eq!(outcome.removed, 2);
    }

    #[test]
    fn duplicate_keys_collapse_to_first_occurrence() {
        let first = row(1, "first");
        let mut existing = vec![Rc::clone(&first), row(1, "second")];
        let table = [Rc::clone(&first)];
        let desired: IndexSet<i64> = [1].into_iter().collect();
        reconcile(&mut existing, &desired, resolve_from(&table));
        assert_eq!(existing.len(), 1);
        assert!(Rc::ptr_eq(&existing[0], &first));
    }
}
