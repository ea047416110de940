//! Asset store adapters for the paklane bundle build lane.
//!
//! Provides concrete `AssetGraphSource` implementations: an in-memory store
//! with a builder API, and a JSON catalog file adapter on top of it.

pub mod catalog;
pub mod memory;

pub use catalog::{AssetCatalog, CatalogError};
pub use memory::InMemoryAssetStore;
