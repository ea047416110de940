//! Shared data model for the paklane bundle build lane.
//!
//! Defines the object identity types, the bundle/build-command shapes passed
//! between the resolution and archival phases, compression settings, and the
//! `AssetGraphSource` boundary to the asset database.

pub mod bundle;
pub mod compression;
pub mod hash;
pub mod identity;
pub mod source;

pub use bundle::{
    ArchiveArtifact, AssetLoadInfo, BuildCommand, BuildOutput, BuildSettings, BundleAssignment,
    BundleDefinition, CommandObject, ObjectOrigin, ResourceFile,
};
pub use compression::{
    CompressionLevel, CompressionSettings, CompressionType, SettingsError, DEFAULT_BLOCK_SIZE,
};
pub use hash::{Hash128, HashParseError, Hasher128};
pub use identity::{Guid, ObjectIdentifier};
pub use source::{AssetGraphSource, ObjectPayload, SourceError};
