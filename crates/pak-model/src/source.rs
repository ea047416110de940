//! Boundary to the asset database.
//!
//! The resolution engine never talks to asset storage directly; it goes
//! through `AssetGraphSource`, a narrow read-only trait an adapter implements
//! over whatever backend holds the assets. Implementations are assumed to be
//! build-target-scoped already.

use crate::identity::{Guid, ObjectIdentifier};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Content bytes of one object, as the serializer collaborator supplies them.
///
/// `streaming_data` is the part that belongs in a side-by-side streaming
/// resource file (audio/video payloads) rather than the structured container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPayload {
    pub data: Vec<u8>,
    pub streaming_data: Option<Vec<u8>>,
}

impl ObjectPayload {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            streaming_data: None,
        }
    }

    pub fn with_streaming(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.streaming_data = Some(data.into());
        self
    }
}

/// Errors from an asset store adapter.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no asset registered for guid {0}")]
    UnresolvedAsset(Guid),

    #[error("object {0} is not present in its source asset")]
    UnresolvedObject(ObjectIdentifier),

    #[error("asset store error: {0}")]
    Backend(String),
}

/// Read-only view of the asset database's object and reference data.
///
/// Queries are pure; the batched dependency lookup exists so the closure
/// builder can resolve a whole traversal frontier in one call, and so
/// implementations backed by a remote or out-of-process database can
/// amortize the boundary cost. Implementations must tolerate concurrent
/// queries: closure computation for independent bundles fans out.
pub trait AssetGraphSource: Sync {
    /// All objects contained in the asset, in the asset's own order.
    fn objects_in_asset(&self, asset: &Guid) -> Result<Vec<ObjectIdentifier>, SourceError>;

    /// Direct references of each queried object. The result covers every
    /// queried identifier; an object with no references maps to an empty
    /// set. The queried object itself is not part of its result.
    fn dependencies_for_objects(
        &self,
        ids: &[ObjectIdentifier],
    ) -> Result<BTreeMap<ObjectIdentifier, BTreeSet<ObjectIdentifier>>, SourceError>;

    /// Content bytes for one object.
    fn object_payload(&self, id: &ObjectIdentifier) -> Result<ObjectPayload, SourceError>;

    /// Single-object variant of the dependency lookup.
    fn dependencies_for_object(
        &self,
        id: &ObjectIdentifier,
    ) -> Result<BTreeSet<ObjectIdentifier>, SourceError> {
        let map = self.dependencies_for_objects(std::slice::from_ref(id))?;
        Ok(map.into_values().next().unwrap_or_default())
    }

    /// Direct references of every object in an asset.
    fn dependencies_for_asset(&self, asset: &Guid) -> Result<BTreeSet<ObjectIdentifier>, SourceError> {
        let objects = self.objects_in_asset(asset)?;
        let map = self.dependencies_for_objects(&objects)?;
        Ok(map.into_values().flatten().collect())
    }

    /// Direct references of every object in each of the assets.
    fn dependencies_for_assets(
        &self,
        assets: &[Guid],
    ) -> Result<BTreeSet<ObjectIdentifier>, SourceError> {
        let mut out = BTreeSet::new();
        for asset in assets {
            out.extend(self.dependencies_for_asset(asset)?);
        }
        Ok(out)
    }
}
