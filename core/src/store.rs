//! On-disk cache of plugin (NVT) metadata.
//!
//! Parsing every plugin script at start-up is slow, so the metadata of each
//! script is kept next to it in a cache directory. An entry is only trusted
//! while it is at least as new as the script and its signature.
//!
//! Layout: `<cache_dir>/<file>.nvti`, JSON wrapping the metadata with a format
//! magic. Scripts are looked up as `<source_dir>/<file>`, their signatures as
//! `<source_dir>/<file>.asc`.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const CACHE_MAGIC: &str = "vigil-nvti-cache/1";
const ENTRY_SUFFIX: &str = ".nvti";
const SIGNATURE_SUFFIX: &str = ".asc";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache directory {0} does not exist")]
    MissingDirectory(PathBuf),
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NvtPreference {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub default: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NvtMetadata {
    pub oid: String,
    pub name: String,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub category: u8,
    #[serde(default)]
    pub preferences: Vec<NvtPreference>,
}

impl NvtMetadata {
    /// Preference keys in the `"<nvt name>[<type>]:<pref name>"` form, each
    /// with its default value. Trailing spaces of the preference name are
    /// dropped.
    pub fn preference_keys(&self) -> Vec<(String, String)> {
        self.preferences
            .iter()
            .map(|pref| {
                let key = format!(
                    "{}[{}]:{}",
                    self.name,
                    pref.kind,
                    pref.name.trim_end_matches(' ')
                );
                (key, pref.default.clone())
            })
            .collect()
    }

    /// Adds this plugin's preferences to `prefs`, keeping values already set.
    pub fn merge_preferences(&self, prefs: &mut BTreeMap<String, String>) {
        for (key, default) in self.preference_keys() {
            prefs.entry(key).or_insert(default);
        }
    }
}

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    magic: String,
    nvti: NvtMetadata,
}

#[derive(Debug, Clone)]
pub struct NvtCache {
    cache_dir: PathBuf,
    source_dir: PathBuf,
}

impl NvtCache {
    /// Both directories must already exist.
    pub fn init(
        cache_dir: impl Into<PathBuf>,
        source_dir: impl Into<PathBuf>,
    ) -> Result<Self, StoreError> {
        let cache_dir = cache_dir.into();
        let source_dir = source_dir.into();
        for dir in [&cache_dir, &source_dir] {
            match fs::metadata(dir) {
                Ok(meta) if meta.is_dir() => {}
                Ok(_) => return Err(StoreError::NotADirectory(dir.clone())),
                Err(_) => return Err(StoreError::MissingDirectory(dir.clone())),
            }
        }
        Ok(Self {
            cache_dir,
            source_dir,
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn entry_path(&self, file: &str) -> PathBuf {
        with_suffix(self.cache_dir.join(file), ENTRY_SUFFIX)
    }

    /// Cached metadata for `file`, or `None` when the entry is missing, stale
    /// or unreadable. Every failure is a cache miss.
    pub fn load(&self, file: &str) -> Option<NvtMetadata> {
        let entry_path = self.entry_path(file);
        let entry_mtime = modified(&entry_path)?;

        let script = self.source_dir.join(file);
        let Some(script_mtime) = modified(&script) else {
            debug!(script = %script.display(), "cache miss: script is gone");
            return None;
        };
        let signature_mtime = modified(&with_suffix(script.clone(), SIGNATURE_SUFFIX));

        let now = SystemTime::now();
        for source_mtime in std::iter::once(script_mtime).chain(signature_mtime) {
            if source_mtime > now {
                debug!(file, "cache miss: source timestamp in the future");
                return None;
            }
            if source_mtime > entry_mtime {
                debug!(file, "cache miss: entry is stale");
                return None;
            }
        }

        let raw = fs::read(&entry_path).ok()?;
        match serde_json::from_slice::<CacheEntry>(&raw) {
            Ok(entry) if entry.magic == CACHE_MAGIC => Some(entry.nvti),
            Ok(_) => {
                debug!(file, "cache miss: foreign entry format");
                None
            }
            Err(e) => {
                debug!(file, error = %e, "cache miss: unreadable entry");
                None
            }
        }
    }

    /// Writes the entry for `file`, replacing any previous one.
    pub fn store(&self, nvti: &NvtMetadata, file: &str) -> Result<(), StoreError> {
        let path = self.entry_path(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let entry = CacheEntry {
            magic: CACHE_MAGIC.to_string(),
            nvti: nvti.clone(),
        };
        let encoded = serde_json::to_vec_pretty(&entry)?;
        fs::write(&path, encoded).map_err(|source| StoreError::Io { path, source })
    }
}

fn with_suffix(path: PathBuf, suffix: &str) -> PathBuf {
    let mut name: OsString = path.into_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
