//! paklane - content bundle build lane
//!
//! Packs game content into distributable, versioned bundle archives. The
//! lane resolves each bundle's transitive object closure, assigns every
//! object to exactly one owning bundle, emits build commands for the raw
//! serialization phase, and compresses the result into self-describing
//! archive files with content and layout hashes for incremental rebuilds.

pub mod archive;
pub mod cache;
pub mod closure;
pub mod command;
pub mod config;
pub mod pipeline;
pub mod rawbuild;
pub mod resolve;
pub mod signal;

pub use archive::{archive_and_compress, ArchiveError, ArchiveReader};
pub use closure::compute_closure;
pub use command::emit_commands;
pub use config::{BundleManifest, ConfigError};
pub use pipeline::{BuildPipeline, BuildSummary, PipelineConfig, PipelineError};
pub use resolve::{resolve_bundles, OwnershipPolicy, ResolveError, ResolveErrors, ResolvedBundles};
