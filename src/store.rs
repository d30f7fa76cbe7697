use crate::{
    StoreError,
    model::{Bait, CatalogData, CatchEvent, Creature, EntityKind, Location, Lure, Recipe, Record},
    statics,
};
use flate2::{Compression, GzBuilder, read::GzDecoder};
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    fs,
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

/// Load/save port used by the registry. Implementations must be callable from
/// the save worker thread.
pub trait CatalogStore: Send + Sync {
    /// `Ok(None)` when there is no data (or only whitespace) for `kind`.
    fn load_collection(&self, kind: EntityKind) -> Result<Option<CatalogData>, StoreError>;

    fn save_collection(&self, data: &CatalogData) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFormat {
    #[default]
    Json5,
    GzipJson5,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

/// One JSON5 file per entity kind inside a data directory.
///
/// Files are read as JSON5 so hand edits (comments, trailing commas) are
/// accepted, and written back as pretty JSON in the line-ending style the file
/// had when it was loaded.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    format: FileFormat,
    line_endings: Mutex<HashMap<EntityKind, LineEnding>>,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>, format: FileFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
            line_endings: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// Path written for `kind` in the configured format.
    pub fn path_for(&self, kind: EntityKind) -> PathBuf {
        self.path_in_format(kind, self.format)
    }

    fn path_in_format(&self, kind: EntityKind, format: FileFormat) -> PathBuf {
        let name = match format {
            FileFormat::Json5 => format!("{}.{}", kind.file_stem(), statics::FILE_EXT_JSON5),
            FileFormat::GzipJson5 => format!(
                "{}.{}.{}",
                kind.file_stem(),
                statics::FILE_EXT_JSON5,
                statics::FILE_EXT_GZ
            ),
        };
        self.dir.join(name)
    }

    /// Configured format first, then the other one.
    fn candidates(&self, kind: EntityKind) -> [PathBuf; 2] {
        let other = match self.format {
            FileFormat::Json5 => FileFormat::GzipJson5,
            FileFormat::GzipJson5 => FileFormat::Json5,
        };
        [self.path_for(kind), self.path_in_format(kind, other)]
    }

    pub fn line_ending(&self, kind: EntityKind) -> LineEnding {
        self.line_endings
            .lock()
            .get(&kind)
            .copied()
            .unwrap_or_default()
    }

    pub fn load_records<R: Record>(&self) -> Result<Option<Vec<R>>, StoreError> {
        let kind = R::KIND;
        for path in self.candidates(kind) {
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => return Err(StoreError::Read { path, source }),
            };

            let malformed = |reason: String| StoreError::Malformed {
                kind,
                path: path.clone(),
                reason,
            };

            let text_bytes = match detect_format(&path, &bytes) {
                FileFormat::Json5 => bytes,
                FileFormat::GzipJson5 => {
                    let mut decoder = GzDecoder::new(&bytes[..]);
                    let mut out = Vec::new();
                    decoder
                        .read_to_end(&mut out)
                        .map_err(|e| malformed(format!("gzip decompress: {e}")))?;
                    out
                }
            };

            let text = std::str::from_utf8(&text_bytes)
                .map_err(|_| malformed("file is not valid UTF-8".to_string()))?;
            if text.trim().is_empty() {
                tracing::debug!(%kind, ?path, "catalog file is empty");
                return Ok(None);
            }

            self.line_endings
                .lock()
                .insert(kind, detect_line_ending(&text_bytes));

            let records = json5::from_str::<Vec<R>>(text).map_err(|e| malformed(e.to_string()))?;
            tracing::debug!(%kind, ?path, count = records.len(), "catalog file loaded");
            return Ok(Some(records));
        }
        Ok(None)
    }

    pub fn save_records<R: Record>(&self, records: &[R]) -> Result<(), StoreError> {
        let kind = R::KIND;
        let bytes = encode_records(records, self.line_ending(kind), self.format)?;
        let path = self.path_for(kind);
        write_atomic(&self.dir, &path, &bytes)?;
        tracing::debug!(%kind, ?path, count = records.len(), "catalog file written");
        Ok(())
    }
}

impl CatalogStore for FileStore {
    fn load_collection(&self, kind: EntityKind) -> Result<Option<CatalogData>, StoreError> {
        Ok(match kind {
            EntityKind::Creature => self.load_records::<Creature>()?.map(CatalogData::Creatures),
            EntityKind::Bait => self.load_records::<Bait>()?.map(CatalogData::Baits),
            EntityKind::Lure => self.load_records::<Lure>()?.map(CatalogData::Lures),
            EntityKind::Location => self.load_records::<Location>()?.map(CatalogData::Locations),
            EntityKind::CatchEvent => {
                self.load_records::<CatchEvent>()?.map(CatalogData::CatchEvents)
            }
            EntityKind::Recipe => self.load_records::<Recipe>()?.map(CatalogData::Recipes),
        })
    }

    fn save_collection(&self, data: &CatalogData) -> Result<(), StoreError> {
        match data {
            CatalogData::Creatures(v) => self.save_records(v),
            CatalogData::Baits(v) => self.save_records(v),
            CatalogData::Lures(v) => self.save_records(v),
            CatalogData::Locations(v) => self.save_records(v),
            CatalogData::CatchEvents(v) => self.save_records(v),
            CatalogData::Recipes(v) => self.save_records(v),
        }
    }
}

/// Serialize records for disk. Gzip output uses a zero mtime so identical
/// collections produce identical bytes.
pub fn encode_records<R: Record>(
    records: &[R],
    line_ending: LineEnding,
    format: FileFormat,
) -> Result<Vec<u8>, StoreError> {
    let mut text = serde_json::to_string_pretty(records).map_err(|source| StoreError::Serialize {
        kind: R::KIND,
        source,
    })?;
    text.push_str(statics::NL_LF);
    if line_ending == LineEnding::CrLf {
        text = text.replace(statics::NL_LF, statics::NL_CRLF);
    }

    match format {
        FileFormat::Json5 => Ok(text.into_bytes()),
        FileFormat::GzipJson5 => {
            let compress = || -> io::Result<Vec<u8>> {
                let mut encoder = GzBuilder::new()
                    .mtime(0)
                    .write(Vec::new(), Compression::default());
                encoder.write_all(text.as_bytes())?;
                encoder.finish()
            };
            compress().map_err(|e| StoreError::Rejected {
                kind: R::KIND,
                reason: format!("gzip compress: {e}"),
            })
        }
    }
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let write_err = |source: io::Error| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    fs::create_dir_all(dir).map_err(write_err)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

fn detect_line_ending(text_bytes: &[u8]) -> LineEnding {
    // Count actual newline terminators; a few stray CRLF lines in a mostly-LF
    // file should not flip the whole file.
    let mut lf_count = 0usize;
    let mut crlf_count = 0usize;

    for (i, b) in text_bytes.iter().enumerate() {
        if *b != b'\n' {
            continue;
        }
        if i > 0 && text_bytes[i - 1] == b'\r' {
            crlf_count += 1;
        } else {
            lf_count += 1;
        }
    }

    if crlf_count > lf_count {
        LineEnding::CrLf
    } else {
        LineEnding::Lf
    }
}

fn detect_format(path: &Path, bytes: &[u8]) -> FileFormat {
    if path.extension().and_then(|e| e.to_str()) == Some(statics::FILE_EXT_GZ) {
        return FileFormat::GzipJson5;
    }
    // Gzip magic: 1F 8B
    if bytes.len() >= 2 && bytes[0] == 0x1F && bytes[1] == 0x8B {
        return FileFormat::GzipJson5;
    }
    FileFormat::Json5
}

/// Keeps collections in memory. Counts saves per kind and can be told to fail.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<EntityKind, CatalogData>>,
    save_counts: Mutex<HashMap<EntityKind, usize>>,
    failing_saves: Mutex<HashSet<EntityKind>>,
    malformed_loads: Mutex<HashSet<EntityKind>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed data returned by the next loads. Does not count as a save.
    pub fn put(&self, data: CatalogData) {
        self.collections.lock().insert(data.kind(), data);
    }

    /// Last data held for `kind` (seeded or saved).
    pub fn get(&self, kind: EntityKind) -> Option<CatalogData> {
        self.collections.lock().get(&kind).cloned()
    }

    pub fn save_count(&self, kind: EntityKind) -> usize {
        self.save_counts.lock().get(&kind).copied().unwrap_or(0)
    }

    pub fn total_saves(&self) -> usize {
        self.save_counts.lock().values().sum()
    }

    pub fn fail_saves(&self, kind: EntityKind, fail: bool) {
        let mut failing = self.failing_saves.lock();
        if fail {
            failing.insert(kind);
        } else {
            failing.remove(&kind);
        }
    }

    pub fn fail_loads(&self, kind: EntityKind) {
        self.malformed_loads.lock().insert(kind);
    }
}

impl CatalogStore for MemoryStore {
    fn load_collection(&self, kind: EntityKind) -> Result<Option<CatalogData>, StoreError> {
        if self.malformed_loads.lock().contains(&kind) {
            return Err(StoreError::Malformed {
                kind,
                path: PathBuf::from(kind.file_stem()),
                reason: "unparseable test data".to_string(),
            });
        }
        Ok(self
            .collections
            .lock()
            .get(&kind)
            .filter(|data| !data.is_empty())
            .cloned())
    }

    fn save_collection(&self, data: &CatalogData) -> Result<(), StoreError> {
        let kind = data.kind();
        *self.save_counts.lock().entry(kind).or_insert(0) += 1;
        if self.failing_saves.lock().contains(&kind) {
            return Err(StoreError::Rejected {
                kind,
                reason: "save failure requested".to_string(),
            });
        }
        self.collections.lock().insert(kind, data.clone());
        Ok(())
    }
}
