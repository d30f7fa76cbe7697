use crate::model::{EntityKind, RecordId};
use std::{io, path::PathBuf};

/// Failures reported by a [`crate::CatalogStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing data for a kind does not exist. Recovered by the registry.
    #[error("no backing data for {kind} collection")]
    Missing { kind: EntityKind },

    #[error("reading {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{kind} data in {path:?} is malformed: {reason}")]
    Malformed {
        kind: EntityKind,
        path: PathBuf,
        reason: String,
    },

    #[error("serializing {kind} collection")]
    Serialize {
        kind: EntityKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("writing {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{kind} collection rejected by store: {reason}")]
    Rejected { kind: EntityKind, reason: String },
}

/// Errors surfaced by the registry to its caller.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("loading {kind} collection")]
    Load {
        kind: EntityKind,
        #[source]
        source: StoreError,
    },

    #[error("saving {kind} collection")]
    Save {
        kind: EntityKind,
        #[source]
        source: StoreError,
    },

    /// Every kind that failed during a full flush, in kind order.
    #[error("{} collection(s) failed to save: {}", .0.len(), flush_kinds(.0))]
    Flush(Vec<CatalogError>),

    #[error("{kind} #{id} already exists")]
    DuplicateId { kind: EntityKind, id: RecordId },

    #[error("no {kind} ids left after #{max}")]
    IdsExhausted { kind: EntityKind, max: RecordId },

    #[error("catalog was already loaded this session")]
    AlreadyLoaded,

    #[error("starting save worker")]
    Worker(#[source] io::Error),
}

impl CatalogError {
    /// Kind the error refers to, if it concerns a single collection.
    pub fn kind(&self) -> Option<EntityKind> {
        match self {
            CatalogError::Load { kind, .. }
            | CatalogError::Save { kind, .. }
            | CatalogError::DuplicateId { kind, .. }
            | CatalogError::IdsExhausted { kind, .. } => Some(*kind),
            CatalogError::Flush(_) | CatalogError::AlreadyLoaded | CatalogError::Worker(_) => {
                None
            }
        }
    }
}

fn flush_kinds(errors: &[CatalogError]) -> String {
    errors
        .iter()
        .filter_map(CatalogError::kind)
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
