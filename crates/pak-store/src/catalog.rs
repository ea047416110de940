//! JSON asset catalog adapter.
//!
//! A catalog file is a self-contained dump of an asset database, scoped to
//! one build target: assets, their objects, object payloads (base64), and
//! the reference edges between objects. Loading one yields an
//! `InMemoryAssetStore`.

use crate::memory::InMemoryAssetStore;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use pak_model::{Guid, ObjectIdentifier, ObjectPayload};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

/// Schema version for catalog files.
pub const SCHEMA_VERSION: u32 = 1;

/// Errors loading a catalog file.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("unsupported catalog schema version {0}")]
    UnsupportedSchema(u32),

    #[error("duplicate object {0}")]
    DuplicateObject(ObjectIdentifier),

    #[error("object {from} references unknown object {to}")]
    DanglingReference {
        from: ObjectIdentifier,
        to: ObjectIdentifier,
    },
}

/// One object record in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogObject {
    pub local_id: i64,

    pub type_tag: i32,

    /// Content bytes, base64.
    pub data: String,

    /// Streaming payload bytes, base64, if the object has any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub streaming_data: Option<String>,

    /// Objects this object reads from.
    #[serde(default)]
    pub references: Vec<ObjectIdentifier>,
}

/// One asset record in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogAsset {
    pub guid: Guid,
    pub objects: Vec<CatalogObject>,
}

/// On-disk catalog document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetCatalog {
    pub schema_version: u32,
    pub assets: Vec<CatalogAsset>,
}

impl AssetCatalog {
    /// Load and parse a catalog file.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Parse a catalog from a JSON string.
    pub fn from_json(s: &str) -> Result<Self, CatalogError> {
        let catalog: AssetCatalog = serde_json::from_str(s)?;
        if catalog.schema_version != SCHEMA_VERSION {
            return Err(CatalogError::UnsupportedSchema(catalog.schema_version));
        }
        Ok(catalog)
    }

    /// Materialize the catalog into an in-memory store, validating that
    /// object identifiers are unique and every reference edge resolves.
    pub fn into_store(self) -> Result<InMemoryAssetStore, CatalogError> {
        let mut store = InMemoryAssetStore::new();
        let mut seen: BTreeSet<ObjectIdentifier> = BTreeSet::new();
        let mut edges: Vec<(ObjectIdentifier, ObjectIdentifier)> = Vec::new();

        for asset in &self.assets {
            for object in &asset.objects {
                let id = ObjectIdentifier::new(asset.guid, object.local_id, object.type_tag);
                if !seen.insert(id) {
                    return Err(CatalogError::DuplicateObject(id));
                }

                let mut payload = ObjectPayload::new(BASE64.decode(&object.data)?);
                if let Some(streaming) = &object.streaming_data {
                    payload = payload.with_streaming(BASE64.decode(streaming)?);
                }
                store.add_object_payload(id, payload);

                for target in &object.references {
                    edges.push((id, *target));
                }
            }
        }

        // Edges go in after all objects exist so a forward reference within
        // the file is fine but a dangling one is caught.
        for (from, to) in edges {
            if !seen.contains(&to) {
                return Err(CatalogError::DanglingReference { from, to });
            }
            store.add_reference(from, to);
        }

        Ok(store)
    }

    /// Load a catalog file straight into a store.
    pub fn load_store(path: &Path) -> Result<InMemoryAssetStore, CatalogError> {
        Self::from_file(path)?.into_store()
    }
}
