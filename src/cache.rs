//! Incremental archive cache.
//!
//! `archive_index.json` lives beside the finished archives and records, per
//! bundle, the content hash plus a fingerprint of everything else that must
//! match for the archive to be reused: compression settings and the
//! dependency name list. Matching entry plus an existing archive file means
//! archival is skipped; changing only compression settings changes the
//! fingerprint and re-runs archival while the content hash stays put.

use pak_model::{CompressionSettings, Hash128};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Index file name, relative to the archive output directory.
pub const INDEX_FILE: &str = "archive_index.json";

/// Schema version for archive_index.json.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors for cache index operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JCS canonicalization error: {0}")]
    Jcs(String),
}

/// One cached archival result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub content_hash: Hash128,
    pub layout_hash: Hash128,
    pub settings_fingerprint: String,
    pub archive_file: String,
}

/// The on-disk index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveIndex {
    pub schema_version: u32,
    pub entries: BTreeMap<String, IndexEntry>,
}

impl Default for ArchiveIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveIndex {
    pub fn new() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            entries: BTreeMap::new(),
        }
    }

    /// Loads the index from an output directory. A missing file or an index
    /// written by an incompatible schema yields an empty index; the worst
    /// that costs is a full re-archive.
    pub fn load(dir: &Path) -> Result<Self, CacheError> {
        let path = dir.join(INDEX_FILE);
        if !path.exists() {
            return Ok(Self::new());
        }
        let contents = fs::read_to_string(&path)?;
        let index: ArchiveIndex = match serde_json::from_str(&contents) {
            Ok(index) => index,
            Err(_) => return Ok(Self::new()),
        };
        if index.schema_version != SCHEMA_VERSION {
            return Ok(Self::new());
        }
        Ok(index)
    }

    pub fn save(&self, dir: &Path) -> Result<(), CacheError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(dir.join(INDEX_FILE), json)?;
        Ok(())
    }

    pub fn record(&mut self, bundle: &str, entry: IndexEntry) {
        self.entries.insert(bundle.to_string(), entry);
    }

    pub fn get(&self, bundle: &str) -> Option<&IndexEntry> {
        self.entries.get(bundle)
    }

    /// True when the recorded archive for `bundle` is still valid for the
    /// given content hash and fingerprint, and the file is still on disk.
    pub fn is_current(
        &self,
        dir: &Path,
        bundle: &str,
        content_hash: Hash128,
        settings_fingerprint: &str,
    ) -> bool {
        match self.entries.get(bundle) {
            Some(entry) => {
                entry.content_hash == content_hash
                    && entry.settings_fingerprint == settings_fingerprint
                    && dir.join(&entry.archive_file).is_file()
            }
            None => false,
        }
    }
}

/// Canonical-JSON fingerprint over compression settings and the dependency
/// name list.
pub fn settings_fingerprint(
    settings: &CompressionSettings,
    dependencies: &[String],
) -> Result<String, CacheError> {
    let doc = serde_json::json!({
        "settings": settings,
        "dependencies": dependencies,
    });
    let jcs = serde_json_canonicalizer::to_vec(&doc).map_err(|e| CacheError::Jcs(e.to_string()))?;

    let mut hasher = Sha256::new();
    hasher.update(&jcs);
    Ok(hex::encode(hasher.finalize()))
}
