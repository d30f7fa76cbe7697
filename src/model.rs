use crate::statics;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;

/// Identifier of a record. Unique within a kind, not across kinds.
pub type RecordId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Creature,
    Bait,
    Lure,
    Location,
    CatchEvent,
    Recipe,
}

impl EntityKind {
    /// Every kind, in the order collections are loaded and flushed.
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Creature,
        EntityKind::Bait,
        EntityKind::Lure,
        EntityKind::Location,
        EntityKind::CatchEvent,
        EntityKind::Recipe,
    ];

    pub fn file_stem(self) -> &'static str {
        match self {
            EntityKind::Creature => statics::FILE_STEM_CREATURES,
            EntityKind::Bait => statics::FILE_STEM_BAITS,
            EntityKind::Lure => statics::FILE_STEM_LURES,
            EntityKind::Location => statics::FILE_STEM_LOCATIONS,
            EntityKind::CatchEvent => statics::FILE_STEM_CATCH_EVENTS,
            EntityKind::Recipe => statics::FILE_STEM_RECIPES,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Creature => statics::EN_KIND_CREATURE,
            EntityKind::Bait => statics::EN_KIND_BAIT,
            EntityKind::Lure => statics::EN_KIND_LURE,
            EntityKind::Location => statics::EN_KIND_LOCATION,
            EntityKind::CatchEvent => statics::EN_KIND_CATCH_EVENT,
            EntityKind::Recipe => statics::EN_KIND_RECIPE,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A catalog entity stored in one of the registry's collections.
///
/// Field edits go through [`crate::RecordRef::update`], which names the field
/// it touched so the registry can decide whether a save is needed.
pub trait Record:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: EntityKind;

    fn id(&self) -> RecordId;
    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);

    /// A blank record, used when the user adds a new entry.
    fn new_named(id: RecordId, name: String) -> Self;

    /// Whether edits to `field` change what ends up on disk.
    fn is_persisted_field(_field: &str) -> bool {
        true
    }

    fn into_data(records: Vec<Self>) -> CatalogData;
    fn from_data(data: CatalogData) -> Option<Vec<Self>>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Creature {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub bait_ids: Vec<RecordId>,
    #[serde(default)]
    pub lure_ids: Vec<RecordId>,
    #[serde(default)]
    pub location_ids: Vec<RecordId>,
    #[serde(default)]
    pub best_lure_ids: Vec<RecordId>,
    /// Hourly bite intensity (0..=100). Missing hours count as zero.
    #[serde(default)]
    pub bite_activity: Vec<u8>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bait {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub notes: String,
    /// Set while the active creature accepts this bait.
    #[serde(skip)]
    pub applicable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lure {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub notes: String,
    /// Set while the active creature accepts this lure.
    #[serde(skip)]
    pub applicable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatchEvent {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub creature_id: Option<RecordId>,
    #[serde(default)]
    pub location_id: Option<RecordId>,
    #[serde(default)]
    pub best_lure_ids: Vec<RecordId>,
    #[serde(default)]
    pub weight_grams: Option<u32>,
    #[serde(default)]
    pub caught_at: String,
    #[serde(default)]
    pub notes: String,
}

/// A composite bait mixed from other baits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub ingredient_ids: Vec<RecordId>,
    #[serde(default)]
    pub notes: String,
}

/// A whole collection in transit to or from the persistence port.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogData {
    Creatures(Vec<Creature>),
    Baits(Vec<Bait>),
    Lures(Vec<Lure>),
    Locations(Vec<Location>),
    CatchEvents(Vec<CatchEvent>),
    Recipes(Vec<Recipe>),
}

impl CatalogData {
    pub fn kind(&self) -> EntityKind {
        match self {
            CatalogData::Creatures(_) => EntityKind::Creature,
            CatalogData::Baits(_) => EntityKind::Bait,
            CatalogData::Lures(_) => EntityKind::Lure,
            CatalogData::Locations(_) => EntityKind::Location,
            CatalogData::CatchEvents(_) => EntityKind::CatchEvent,
            CatalogData::Recipes(_) => EntityKind::Recipe,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CatalogData::Creatures(v) => v.len(),
            CatalogData::Baits(v) => v.len(),
            CatalogData::Lures(v) => v.len(),
            CatalogData::Locations(v) => v.len(),
            CatalogData::CatchEvents(v) => v.len(),
            CatalogData::Recipes(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// An empty collection of the given kind.
    pub fn empty(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Creature => CatalogData::Creatures(Vec::new()),
            EntityKind::Bait => CatalogData::Baits(Vec::new()),
            EntityKind::Lure => CatalogData::Lures(Vec::new()),
            EntityKind::Location => CatalogData::Locations(Vec::new()),
            EntityKind::CatchEvent => CatalogData::CatchEvents(Vec::new()),
            EntityKind::Recipe => CatalogData::Recipes(Vec::new()),
        }
    }
}

macro_rules! impl_record {
    ($ty:ident, $kind:ident, $variant:ident $(, transient: [$($field:path),+])?) => {
        impl Record for $ty {
            const KIND: EntityKind = EntityKind::$kind;

            fn id(&self) -> RecordId {
                self.id
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn set_name(&mut self, name: String) {
                self.name = name;
            }

            fn new_named(id: RecordId, name: String) -> Self {
                Self {
                    id,
                    name,
                    ..Default::default()
                }
            }

            $(
                fn is_persisted_field(field: &str) -> bool {
                    !matches!(field, $($field)|+)
                }
            )?

            fn into_data(records: Vec<Self>) -> CatalogData {
                CatalogData::$variant(records)
            }

            fn from_data(data: CatalogData) -> Option<Vec<Self>> {
                match data {
                    CatalogData::$variant(records) => Some(records),
                    _ => None,
                }
            }
        }
    };
}

impl_record!(Creature, Creature, Creatures);
impl_record!(Bait, Bait, Baits, transient: [statics::FIELD_APPLICABLE]);
impl_record!(Lure, Lure, Lures, transient: [statics::FIELD_APPLICABLE]);
impl_record!(Location, Location, Locations);
impl_record!(CatchEvent, CatchEvent, CatchEvents);
impl_record!(Recipe, Recipe, Recipes);

/// Records carrying the transient "usable with the active creature" marker.
pub trait Applicable {
    fn is_applicable(&self) -> bool;
    fn set_applicable(&mut self, applicable: bool);
}

impl Applicable for Bait {
    fn is_applicable(&self) -> bool {
        self.applicable
    }

    fn set_applicable(&mut self, applicable: bool) {
        self.applicable = applicable;
    }
}

impl Applicable for Lure {
    fn is_applicable(&self) -> bool {
        self.applicable
    }

    fn set_applicable(&mut self, applicable: bool) {
        self.applicable = applicable;
    }
}

/// Condensed view of a creature's hourly bite activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BiteSummary {
    pub peak: u8,
    /// Hours (0..=23) at which `peak` is reached. Empty when there is no activity.
    pub peak_hours: Vec<u8>,
    pub mean: u8,
}

impl BiteSummary {
    pub fn from_activity(activity: &[u8]) -> Self {
        let hours = &activity[..activity.len().min(statics::HOURS_PER_DAY)];
        let clamp = |v: u8| v.min(statics::MAX_BITE_INTENSITY);

        let peak = hours.iter().copied().map(clamp).max().unwrap_or(0);
        if peak == 0 {
            return Self::default();
        }

        let peak_hours = hours
            .iter()
            .enumerate()
            .filter(|(_, v)| clamp(**v) == peak)
            .map(|(hour, _)| hour as u8)
            .collect();

        // Missing trailing hours count as zero.
        let total: u32 = hours.iter().copied().map(|v| u32::from(clamp(v))).sum();
        let mean = (total / statics::HOURS_PER_DAY as u32) as u8;

        Self {
            peak,
            peak_hours,
            mean,
        }
    }
}
