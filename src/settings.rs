use crate::{FileFormat, FileStore, Registry, statics};
use anyhow::Context;
use serde::Deserialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

/// Per-catalog settings, read from `tackle.json5` inside the data directory.
/// Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Not read from the file; always the directory the file was found in.
    #[serde(skip)]
    pub data_dir: PathBuf,
    pub quiet_period_ms: u64,
    /// Write `.json5.gz` instead of `.json5`.
    pub compress: bool,
    /// Sort every collection by name right after loading.
    pub sort_by_name: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            quiet_period_ms: statics::DEFAULT_QUIET_PERIOD_MS,
            compress: false,
            sort_by_name: false,
        }
    }
}

impl Settings {
    pub fn load(data_dir: &Path) -> anyhow::Result<Self> {
        let path = data_dir.join(statics::FILE_SETTINGS);
        let mut settings = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Settings::default(),
            Ok(text) => json5::from_str::<Settings>(&text)
                .with_context(|| format!("parsing {path:?}"))?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Settings::default(),
            Err(err) => return Err(err).with_context(|| format!("reading {path:?}")),
        };
        settings.data_dir = data_dir.to_path_buf();
        Ok(settings)
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn file_format(&self) -> FileFormat {
        if self.compress {
            FileFormat::GzipJson5
        } else {
            FileFormat::Json5
        }
    }

    /// A registry backed by the catalog files in `data_dir`. Not loaded yet.
    pub fn open_registry(&self) -> anyhow::Result<Registry> {
        let store = Arc::new(FileStore::new(&self.data_dir, self.file_format()));
        Registry::new(store, self.quiet_period()).context("creating registry")
    }
}
