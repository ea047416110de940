//! Bundle and build-command shapes.
//!
//! These are the values that flow between the phases of a build: user bundle
//! definitions in, bundle assignments out of the resolver, build commands
//! into the raw serialization phase, and archive artifacts out of the
//! archival phase. All collections are ordered so that serialized build
//! plans are byte-stable across runs.

use crate::hash::Hash128;
use crate::identity::{Guid, ObjectIdentifier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// One named bundle as defined by the user, read once at the start of a
/// build and immutable for its duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleDefinition {
    /// Unique across the whole definition set.
    pub name: String,

    /// Assets whose objects this bundle explicitly carries.
    pub explicit_assets: BTreeSet<Guid>,

    /// Editor-only bundles are skipped unless the build asks for them.
    #[serde(default)]
    pub editor_only: bool,
}

/// Resolver output for one bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleAssignment {
    pub name: String,

    /// Objects whose canonical home is this bundle. Disjoint across all
    /// bundles of a build.
    pub owned_objects: BTreeSet<ObjectIdentifier>,

    /// Objects this bundle's content needs but does not own; each is owned
    /// by exactly one other bundle.
    pub referenced_foreign_objects: BTreeSet<ObjectIdentifier>,

    /// Names of the bundles owning the foreign references. Acyclic across
    /// the whole assignment set.
    pub depends_on: BTreeSet<String>,
}

/// Why an owned object is in its bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectOrigin {
    /// Directly part of an explicitly assigned asset.
    Explicit,
    /// Pulled in by dependency traversal.
    Included,
}

/// One owned object paired with its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandObject {
    pub id: ObjectIdentifier,
    pub origin: ObjectOrigin,
}

/// Per-explicit-asset load view: what a runtime needs resident to load this
/// asset out of the bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLoadInfo {
    pub asset: Guid,

    /// The asset's own objects, in asset order.
    pub included_objects: Vec<ObjectIdentifier>,

    /// Everything else that must be resident beyond the asset's own objects.
    pub referenced_objects: Vec<ObjectIdentifier>,
}

/// Defines a single bundle to be serialized and archived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildCommand {
    /// Desired bundle file name.
    pub bundle_name: String,

    /// Assets a client can directly request from this bundle.
    pub explicit_assets: Vec<AssetLoadInfo>,

    /// The actual contents of the bundle, sorted, each tagged with whether
    /// it was explicitly assigned or pulled in by traversal.
    pub objects: Vec<CommandObject>,

    /// Bundles a client must have open before extracting content from this
    /// one. Sorted.
    pub dependencies: Vec<String>,

    /// Skipped by the raw phase unless the build includes editor bundles.
    #[serde(default)]
    pub editor_only: bool,
}

impl BuildCommand {
    /// Just the object identifiers, in command order.
    pub fn object_ids(&self) -> impl Iterator<Item = &ObjectIdentifier> {
        self.objects.iter().map(|o| &o.id)
    }
}

/// Settings for the raw resource-file phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSettings {
    /// Where per-bundle resource files are written.
    pub output_folder: PathBuf,

    /// Platform tag the asset store was scoped to. Informational; recorded
    /// in build artifacts.
    pub build_target: String,

    /// Write side-by-side streaming resource files for objects that carry
    /// streaming payloads.
    pub include_streaming_resources: bool,

    /// Also build bundles marked editor-only.
    pub include_editor_only_bundles: bool,
}

/// One member file of a raw bundle, to be handed to the archiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceFile {
    pub file_name: String,

    /// True for the structured container, false for raw streaming data.
    pub serialized_file: bool,
}

/// Raw-phase output for one bundle: the resource files on disk plus an
/// informational mirror of what went into them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutput {
    pub bundle_name: String,

    /// Member files to be passed to the archiver, in archive order.
    pub resource_files: Vec<ResourceFile>,

    pub explicit_assets: Vec<Guid>,
    pub objects: Vec<ObjectIdentifier>,
    pub dependencies: Vec<String>,

    /// Sorted distinct type tags of the structured content; input to the
    /// layout hash.
    pub included_types: Vec<i32>,
}

/// Final archival output for one bundle. The durable metadata an external
/// build cache persists, keyed by `(bundle_name, content_hash)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveArtifact {
    pub bundle_name: String,

    /// Hash of the owned objects and their byte content; invariant under
    /// compression settings.
    pub content_hash: Hash128,

    /// Hash of the structured content's type layout; a loader checks this
    /// independently of content changes.
    pub layout_hash: Hash128,

    pub resource_files: Vec<ResourceFile>,
    pub objects: Vec<ObjectIdentifier>,
    pub dependencies: Vec<String>,
}
