// Central place for file names, field names and other non-localized constants.
// Keep these out of store.rs/registry.rs to reduce duplication and make tweaks safer.

// Persistence timing.
pub const DEFAULT_QUIET_PERIOD_MS: u64 = 800;

// Save worker thread name (shows up in debuggers and panic messages).
pub const SAVE_WORKER_THREAD: &str = "tackle-save";

// Catalog files (FILE_ prefix). One file per entity kind.
pub const FILE_EXT_JSON5: &str = "json5";
pub const FILE_EXT_GZ: &str = "gz";
pub const FILE_SETTINGS: &str = "tackle.json5";

pub const FILE_STEM_CREATURES: &str = "creatures";
pub const FILE_STEM_BAITS: &str = "baits";
pub const FILE_STEM_LURES: &str = "lures";
pub const FILE_STEM_LOCATIONS: &str = "locations";
pub const FILE_STEM_CATCH_EVENTS: &str = "catch_events";
pub const FILE_STEM_RECIPES: &str = "recipes";

// Newline constants (used for catalog formatting; keep out of store code).
pub const NL_LF: &str = "\n";
pub const NL_CRLF: &str = "\r\n";

// Record field names carried by mutation signals (FIELD_ prefix).
pub const FIELD_NAME: &str = "name";
pub const FIELD_NOTES: &str = "notes";
pub const FIELD_BAIT_IDS: &str = "bait_ids";
pub const FIELD_LURE_IDS: &str = "lure_ids";
pub const FIELD_LOCATION_IDS: &str = "location_ids";
pub const FIELD_BEST_LURE_IDS: &str = "best_lure_ids";
pub const FIELD_BITE_ACTIVITY: &str = "bite_activity";
pub const FIELD_REGION: &str = "region";
pub const FIELD_CREATURE_ID: &str = "creature_id";
pub const FIELD_LOCATION_ID: &str = "location_id";
pub const FIELD_WEIGHT_GRAMS: &str = "weight_grams";
pub const FIELD_CAUGHT_AT: &str = "caught_at";
pub const FIELD_INGREDIENT_IDS: &str = "ingredient_ids";
// Transient: derived from the active creature, never persisted.
pub const FIELD_APPLICABLE: &str = "applicable";

// Bite activity is recorded per hour of the in-game day.
pub const HOURS_PER_DAY: usize = 24;
pub const MAX_BITE_INTENSITY: u8 = 100;

// English CLI strings (EN_ prefix to make future localization easier).
pub const EN_KIND_CREATURE: &str = "creature";
pub const EN_KIND_BAIT: &str = "bait";
pub const EN_KIND_LURE: &str = "lure";
pub const EN_KIND_LOCATION: &str = "location";
pub const EN_KIND_CATCH_EVENT: &str = "catch event";
pub const EN_KIND_RECIPE: &str = "recipe";

pub const EN_HEADING_ACTIVE: &str = "Active selection";
pub const EN_HEADING_CREATURES_HERE: &str = "Creatures at location";
pub const EN_HEADING_APPLICABLE_BAITS: &str = "Applicable baits";
pub const EN_HEADING_APPLICABLE_LURES: &str = "Applicable lures";
pub const EN_HEADING_BEST_LURES: &str = "Best lures";
pub const EN_HEADING_BITE_ACTIVITY: &str = "Bite activity";

pub const EN_LABEL_NONE: &str = "<none>";
pub const EN_LABEL_PEAK: &str = "peak";
pub const EN_LABEL_AT_HOURS: &str = "at hours";
pub const EN_LABEL_MEAN: &str = "mean";
