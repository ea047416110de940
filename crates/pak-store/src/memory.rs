//! In-memory asset store.
//!
//! Holds a full object/reference graph in memory. Backs the JSON catalog
//! adapter and the integration tests; small content sets can also build one
//! programmatically.

use pak_model::{AssetGraphSource, Guid, ObjectIdentifier, ObjectPayload, SourceError};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
struct StoredObject {
    references: BTreeSet<ObjectIdentifier>,
    payload: ObjectPayload,
}

/// A complete asset graph held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAssetStore {
    assets: BTreeMap<Guid, Vec<ObjectIdentifier>>,
    objects: BTreeMap<ObjectIdentifier, StoredObject>,
}

impl InMemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object with its content bytes. The containing asset is
    /// created on first use; objects keep insertion order within the asset.
    pub fn add_object(&mut self, id: ObjectIdentifier, data: impl Into<Vec<u8>>) -> &mut Self {
        self.add_object_payload(id, ObjectPayload::new(data))
    }

    /// Register an object with a full payload (content + streaming bytes).
    pub fn add_object_payload(&mut self, id: ObjectIdentifier, payload: ObjectPayload) -> &mut Self {
        let asset_objects = self.assets.entry(id.guid).or_default();
        if !asset_objects.contains(&id) {
            asset_objects.push(id);
        }
        self.objects.insert(
            id,
            StoredObject {
                references: BTreeSet::new(),
                payload,
            },
        );
        self
    }

    /// Record a directed reference edge. Both endpoints must already be
    /// registered; a dangling edge would make closure results unresolvable.
    pub fn add_reference(&mut self, from: ObjectIdentifier, to: ObjectIdentifier) -> &mut Self {
        debug_assert!(self.objects.contains_key(&from), "unknown edge source {from}");
        debug_assert!(self.objects.contains_key(&to), "unknown edge target {to}");
        if let Some(object) = self.objects.get_mut(&from) {
            object.references.insert(to);
        }
        self
    }

    /// Number of registered assets.
    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    /// Number of registered objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    fn lookup(&self, id: &ObjectIdentifier) -> Result<&StoredObject, SourceError> {
        match self.objects.get(id) {
            Some(object) => Ok(object),
            // Distinguish a missing object in a known asset from a missing
            // asset altogether; callers report them differently.
            None if self.assets.contains_key(&id.guid) => {
                Err(SourceError::UnresolvedObject(*id))
            }
            None => Err(SourceError::UnresolvedAsset(id.guid)),
        }
    }
}

impl AssetGraphSource for InMemoryAssetStore {
    fn objects_in_asset(&self, asset: &Guid) -> Result<Vec<ObjectIdentifier>, SourceError> {
        self.assets
            .get(asset)
            .cloned()
            .ok_or(SourceError::UnresolvedAsset(*asset))
    }

    fn dependencies_for_objects(
        &self,
        ids: &[ObjectIdentifier],
    ) -> Result<BTreeMap<ObjectIdentifier, BTreeSet<ObjectIdentifier>>, SourceError> {
        let mut out = BTreeMap::new();
        for id in ids {
            let object = self.lookup(id)?;
            out.insert(*id, object.references.clone());
        }
        Ok(out)
    }

    fn object_payload(&self, id: &ObjectIdentifier) -> Result<ObjectPayload, SourceError> {
        Ok(self.lookup(id)?.payload.clone())
    }
}
