//! Bundle manifest configuration (.paklane/bundles.toml).
//!
//! The manifest is the user's whole input to a build: the named bundles with
//! their explicit asset lists, the ownership policy for implicitly pulled-in
//! objects, and default compression settings. Read once at the start of a
//! build, immutable for its duration.

use crate::resolve::OwnershipPolicy;
use pak_model::{
    BundleDefinition, CompressionLevel, CompressionSettings, CompressionType, Guid,
    DEFAULT_BLOCK_SIZE,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

/// Default manifest location, relative to the project root.
pub const DEFAULT_MANIFEST_PATH: &str = ".paklane/bundles.toml";

/// Errors for manifest operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read manifest: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// One `[[bundle]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleEntry {
    /// Bundle name; becomes the archive file name.
    pub name: String,

    /// GUIDs of the assets explicitly assigned to this bundle.
    #[serde(default)]
    pub assets: Vec<String>,

    /// Built only when the build includes editor bundles.
    #[serde(default)]
    pub editor_only: bool,
}

/// `[ownership]` table: what happens to objects no bundle lists explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnershipConfig {
    /// "first-claimant" or "shared-bundle".
    #[serde(default = "default_policy")]
    pub policy: String,

    /// Name of the synthesized bundle under the shared-bundle policy.
    #[serde(default = "default_shared_name")]
    pub shared_bundle_name: String,
}

fn default_policy() -> String {
    "first-claimant".to_string()
}

fn default_shared_name() -> String {
    "shared".to_string()
}

impl Default for OwnershipConfig {
    fn default() -> Self {
        Self {
            policy: default_policy(),
            shared_bundle_name: default_shared_name(),
        }
    }
}

/// `[compression]` table: default archival settings, overridable per build
/// on the command line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    #[serde(default = "default_codec")]
    pub codec: CompressionType,

    #[serde(default)]
    pub level: CompressionLevel,

    #[serde(default = "default_block_size")]
    pub block_size: u32,

    #[serde(default)]
    pub streamed: bool,
}

fn default_codec() -> CompressionType {
    CompressionType::Lz4
}

fn default_block_size() -> u32 {
    DEFAULT_BLOCK_SIZE
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            codec: default_codec(),
            level: CompressionLevel::default(),
            block_size: default_block_size(),
            streamed: false,
        }
    }
}

fn default_strict() -> bool {
    true
}

/// The bundle manifest.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BundleManifest {
    #[serde(default, rename = "bundle")]
    pub bundles: Vec<BundleEntry>,

    #[serde(default)]
    pub ownership: OwnershipConfig,

    #[serde(default)]
    pub compression: CompressionConfig,

    /// In strict mode an unresolved asset fails the whole build; otherwise
    /// the affected bundles are skipped with a warning.
    #[serde(default = "default_strict")]
    pub strict: bool,
}

impl BundleManifest {
    /// Load and parse a manifest from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_str(&contents)
    }

    /// Parse a manifest from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let manifest: BundleManifest = toml::from_str(s)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Validate the manifest.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bundles.is_empty() {
            return Err(ConfigError::Validation(
                "At least one [[bundle]] must be defined".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for bundle in &self.bundles {
            if !valid_name(&bundle.name) {
                return Err(ConfigError::Validation(format!(
                    "Invalid bundle name '{}': use letters, digits, '.', '_' or '-'",
                    bundle.name
                )));
            }
            if !seen.insert(bundle.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Duplicate bundle name '{}'",
                    bundle.name
                )));
            }
            for asset in &bundle.assets {
                if Guid::parse(asset).is_err() {
                    return Err(ConfigError::Validation(format!(
                        "Bundle '{}': '{}' is not a valid asset GUID",
                        bundle.name, asset
                    )));
                }
            }
        }

        match self.ownership.policy.as_str() {
            "first-claimant" => {}
            "shared-bundle" => {
                if !valid_name(&self.ownership.shared_bundle_name) {
                    return Err(ConfigError::Validation(format!(
                        "Invalid shared bundle name '{}'",
                        self.ownership.shared_bundle_name
                    )));
                }
                if seen.contains(self.ownership.shared_bundle_name.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "Shared bundle name '{}' collides with a defined bundle",
                        self.ownership.shared_bundle_name
                    )));
                }
            }
            other => {
                return Err(ConfigError::Validation(format!(
                    "Unknown ownership policy '{}' (expected 'first-claimant' or 'shared-bundle')",
                    other
                )));
            }
        }

        self.settings()
            .validate()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;

        Ok(())
    }

    /// Bundle definitions with parsed GUIDs, for the resolver.
    pub fn definitions(&self) -> Result<Vec<BundleDefinition>, ConfigError> {
        self.bundles
            .iter()
            .map(|bundle| {
                let explicit_assets = bundle
                    .assets
                    .iter()
                    .map(|asset| {
                        Guid::parse(asset).map_err(|_| {
                            ConfigError::Validation(format!(
                                "Bundle '{}': '{}' is not a valid asset GUID",
                                bundle.name, asset
                            ))
                        })
                    })
                    .collect::<Result<BTreeSet<Guid>, ConfigError>>()?;
                Ok(BundleDefinition {
                    name: bundle.name.clone(),
                    explicit_assets,
                    editor_only: bundle.editor_only,
                })
            })
            .collect()
    }

    /// The configured ownership policy.
    pub fn policy(&self) -> OwnershipPolicy {
        match self.ownership.policy.as_str() {
            "shared-bundle" => OwnershipPolicy::SharedBundle {
                name: self.ownership.shared_bundle_name.clone(),
            },
            _ => OwnershipPolicy::FirstClaimant,
        }
    }

    /// The configured compression settings.
    pub fn settings(&self) -> CompressionSettings {
        CompressionSettings {
            compression: self.compression.codec,
            level: self.compression.level,
            block_size: self.compression.block_size,
            streamed: self.compression.streamed,
        }
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}
