//! Core library for Tackle Box, a fishing-game companion catalog.
//! Owns the catalog collections, the user's current selection and the views
//! derived from it, and the debounced write-back of edits to catalog files.

mod collection;
mod debounce;
mod error;
mod model;
mod reconcile;
mod registry;
mod selection;
mod settings;
pub mod statics;
mod store;
mod tracked;

pub use collection::Collection;
pub use debounce::{PersistAction, SaveDebouncer};
pub use error::{CatalogError, StoreError};
pub use model::{
    Applicable, Bait, BiteSummary, CatalogData, CatchEvent, Creature, EntityKind, Location, Lure,
    Recipe, Record, RecordId,
};
pub use reconcile::{Keyed, ReconcileOutcome, reconcile};
pub use registry::{Registry, Stored};
pub use selection::{CatalogView, ObserverId, SelectionState};
pub use settings::Settings;
pub use store::{CatalogStore, FileFormat, FileStore, LineEnding, MemoryStore, encode_records};
pub use tracked::{Mutation, MutationObserver, RecordRef, SubscriptionId};
