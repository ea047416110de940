//! Build pipeline orchestration.
//!
//! Drives a build end to end: manifest → resolution → build commands →
//! `build_plan.json` → raw resource files → per-bundle archival →
//! `build_summary.json`. The two phases are deliberately decoupled through
//! `raw_manifest.json`, so raw output can be produced once and re-archived
//! repeatedly with different compression settings without re-resolving
//! anything.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::archive::{self, ArchiveError};
use crate::cache::{settings_fingerprint, ArchiveIndex, CacheError, IndexEntry};
use crate::command::emit_commands;
use crate::config::{BundleManifest, ConfigError, DEFAULT_MANIFEST_PATH};
use crate::rawbuild::{self, RawBuildError};
use crate::resolve::{resolve_bundles, ResolveErrors, ResolvedBundles};
use crate::signal::CancelToken;
use pak_model::{
    AssetGraphSource, BuildCommand, BuildOutput, BuildSettings, BundleAssignment,
    CompressionSettings, Hash128,
};

pub const BUILD_PLAN_FILE: &str = "build_plan.json";
pub const BUILD_SUMMARY_FILE: &str = "build_summary.json";
pub const RAW_MANIFEST_FILE: &str = "raw_manifest.json";

/// Subdirectory of the output folder holding raw resource files.
pub const RAW_DIR: &str = "raw";

/// Subdirectory of the output folder holding finished archives.
pub const BUNDLES_DIR: &str = "bundles";

/// Pipeline errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("resolution failed: {0}")]
    Resolve(#[from] ResolveErrors),

    #[error("raw build error: {0}")]
    RawBuild(#[from] RawBuildError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Stable process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            PipelineError::Config(_) => 1,
            PipelineError::Resolve(_) => 10,
            PipelineError::RawBuild(_) => 40,
            PipelineError::Cache(_) => 40,
            PipelineError::Io(_) => 1,
            PipelineError::Serialization(_) => 1,
            PipelineError::Cancelled => 80,
        }
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Path to the bundle manifest.
    pub manifest_path: PathBuf,

    /// Root output folder; raw files and archives go to subdirectories.
    pub output_folder: PathBuf,

    /// Platform tag recorded in build artifacts.
    pub build_target: String,

    /// Write side-by-side streaming resource files.
    pub include_streaming_resources: bool,

    /// Also build bundles marked editor-only.
    pub include_editor_only_bundles: bool,

    /// Overrides the manifest's compression settings when set.
    pub compression_override: Option<CompressionSettings>,

    /// Skip archival for bundles whose content, dependencies, and settings
    /// are unchanged.
    pub incremental: bool,

    /// Verbose progress output on stderr.
    pub verbose: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            manifest_path: PathBuf::from(DEFAULT_MANIFEST_PATH),
            output_folder: PathBuf::from("build/pak"),
            build_target: "standalone".to_string(),
            include_streaming_resources: false,
            include_editor_only_bundles: false,
            compression_override: None,
            incremental: true,
            verbose: false,
        }
    }
}

/// Outcome of one bundle's archival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleStatus {
    /// Archive written this run.
    Archived,
    /// Cache hit; the existing archive was reused.
    UpToDate,
    /// Archival failed; other bundles proceeded.
    Failed,
    /// Not started because the build was cancelled.
    Cancelled,
}

/// Per-bundle entry of the build summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleReport {
    pub bundle_name: String,
    pub status: BundleStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<Hash128>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout_hash: Option<Hash128>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_file: Option<String>,

    pub dependencies: Vec<String>,
    pub duration_ms: u64,
}

impl BundleReport {
    fn failed(output: &BuildOutput, error: &ArchiveError, duration_ms: u64) -> Self {
        Self {
            bundle_name: output.bundle_name.clone(),
            status: BundleStatus::Failed,
            error: Some(error.to_string()),
            content_hash: None,
            layout_hash: None,
            archive_file: None,
            dependencies: output.dependencies.clone(),
            duration_ms,
        }
    }
}

/// build_summary.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildSummary {
    pub schema_version: u32,
    pub schema_id: String,
    pub build_id: String,
    pub created_at: DateTime<Utc>,
    pub build_target: String,
    pub bundles: Vec<BundleReport>,
    pub duration_ms: u64,
}

impl BuildSummary {
    pub fn has_failures(&self) -> bool {
        self.bundles
            .iter()
            .any(|b| b.status == BundleStatus::Failed)
    }
}

/// build_plan.json: the resolved assignments and the commands derived from
/// them, written before any resource file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildPlan {
    pub schema_version: u32,
    pub schema_id: String,
    pub build_id: String,
    pub created_at: DateTime<Utc>,
    pub build_target: String,
    pub assignments: Vec<BundleAssignment>,
    pub commands: Vec<BuildCommand>,
}

/// raw_manifest.json: what the raw phase produced, enough for a later
/// standalone re-archive run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawManifest {
    pub schema_version: u32,
    pub schema_id: String,
    pub build_id: String,
    pub created_at: DateTime<Utc>,
    pub build_target: String,
    pub outputs: Vec<BuildOutput>,
}

impl RawManifest {
    pub fn load(raw_dir: &Path) -> PipelineResult<Self> {
        let contents = fs::read_to_string(raw_dir.join(RAW_MANIFEST_FILE))?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Pipeline execution context.
pub struct BuildPipeline<'a> {
    source: &'a dyn AssetGraphSource,
    config: PipelineConfig,
}

impl<'a> BuildPipeline<'a> {
    pub fn new(source: &'a dyn AssetGraphSource, config: PipelineConfig) -> Self {
        Self { source, config }
    }

    /// Resolution only: validate the manifest and produce the build plan
    /// without touching the filesystem.
    pub fn resolve(&self) -> PipelineResult<(ResolvedBundles, Vec<BuildCommand>)> {
        let manifest = BundleManifest::from_file(&self.config.manifest_path)?;
        self.resolve_manifest(&manifest)
    }

    fn resolve_manifest(
        &self,
        manifest: &BundleManifest,
    ) -> PipelineResult<(ResolvedBundles, Vec<BuildCommand>)> {
        let definitions = manifest.definitions()?;
        let policy = manifest.policy();

        let resolved = match resolve_bundles(self.source, &definitions, &policy) {
            Ok(resolved) => resolved,
            Err(errors) => {
                // Lenient mode recovers from unresolved assets by dropping
                // the affected bundles; anything else is always fatal.
                if manifest.strict || !errors.0.iter().all(|e| e.is_unresolved_asset()) {
                    return Err(errors.into());
                }

                let failed: BTreeSet<String> = errors
                    .0
                    .iter()
                    .filter_map(|e| e.bundle_name().map(str::to_string))
                    .collect();
                for error in &errors.0 {
                    eprintln!("Warning: skipping bundle: {}", error);
                }

                let remaining: Vec<_> = definitions
                    .into_iter()
                    .filter(|d| !failed.contains(&d.name))
                    .collect();
                if remaining.is_empty() {
                    return Err(errors.into());
                }
                resolve_bundles(self.source, &remaining, &policy)?
            }
        };

        let commands = emit_commands(&resolved);
        Ok((resolved, commands))
    }

    /// Full two-phase build.
    pub fn run(&self, cancel: &CancelToken) -> PipelineResult<BuildSummary> {
        let started = Instant::now();
        let build_id = ulid::Ulid::new().to_string();

        let manifest = BundleManifest::from_file(&self.config.manifest_path)?;
        let settings = self
            .config
            .compression_override
            .unwrap_or_else(|| manifest.settings());

        if self.config.verbose {
            eprintln!("Resolving {} bundle(s)...", manifest.bundles.len());
        }
        let (resolved, commands) = self.resolve_manifest(&manifest)?;

        let raw_dir = self.config.output_folder.join(RAW_DIR);
        let bundles_dir = self.config.output_folder.join(BUNDLES_DIR);
        fs::create_dir_all(&raw_dir)?;
        fs::create_dir_all(&bundles_dir)?;

        let plan = BuildPlan {
            schema_version: 1,
            schema_id: "paklane/build_plan@1".to_string(),
            build_id: build_id.clone(),
            created_at: Utc::now(),
            build_target: self.config.build_target.clone(),
            assignments: resolved
                .bundles
                .iter()
                .map(|b| b.assignment.clone())
                .collect(),
            commands: commands.clone(),
        };
        let plan_path = self.config.output_folder.join(BUILD_PLAN_FILE);
        fs::write(&plan_path, serde_json::to_string_pretty(&plan)?)?;
        if self.config.verbose {
            eprintln!("Wrote: {}", plan_path.display());
        }

        if self.config.verbose {
            eprintln!("Writing resource files for {} bundle(s)...", commands.len());
        }
        let build_settings = BuildSettings {
            output_folder: raw_dir.clone(),
            build_target: self.config.build_target.clone(),
            include_streaming_resources: self.config.include_streaming_resources,
            include_editor_only_bundles: self.config.include_editor_only_bundles,
        };
        let outputs = rawbuild::write_resource_files(self.source, &commands, &build_settings)?;

        let raw_manifest = RawManifest {
            schema_version: 1,
            schema_id: "paklane/raw_manifest@1".to_string(),
            build_id: build_id.clone(),
            created_at: Utc::now(),
            build_target: self.config.build_target.clone(),
            outputs: outputs.clone(),
        };
        fs::write(
            raw_dir.join(RAW_MANIFEST_FILE),
            serde_json::to_string_pretty(&raw_manifest)?,
        )?;

        if self.config.verbose {
            eprintln!("Archiving {} bundle(s)...", outputs.len());
        }
        let reports = archive_outputs(
            &outputs,
            &raw_dir,
            &bundles_dir,
            &settings,
            self.config.incremental,
            self.config.verbose,
            cancel,
        )?;

        let summary = BuildSummary {
            schema_version: 1,
            schema_id: "paklane/build_summary@1".to_string(),
            build_id,
            created_at: Utc::now(),
            build_target: self.config.build_target.clone(),
            bundles: reports,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        fs::write(
            self.config.output_folder.join(BUILD_SUMMARY_FILE),
            serde_json::to_string_pretty(&summary)?,
        )?;

        Ok(summary)
    }
}

/// Archival fan-out over a set of raw bundle outputs.
///
/// Bundle archival is independent and runs in parallel; cancellation is
/// honored between bundles, never mid-file, and the archive index is saved
/// before a cancellation error propagates so finished work is kept.
pub fn archive_outputs(
    outputs: &[BuildOutput],
    raw_root: &Path,
    bundles_dir: &Path,
    settings: &CompressionSettings,
    incremental: bool,
    verbose: bool,
    cancel: &CancelToken,
) -> PipelineResult<Vec<BundleReport>> {
    let mut index = if incremental {
        ArchiveIndex::load(bundles_dir)?
    } else {
        ArchiveIndex::new()
    };

    let reports: Vec<BundleReport> = outputs
        .par_iter()
        .map(|output| {
            if cancel.is_cancelled() {
                return BundleReport {
                    bundle_name: output.bundle_name.clone(),
                    status: BundleStatus::Cancelled,
                    error: None,
                    content_hash: None,
                    layout_hash: None,
                    archive_file: None,
                    dependencies: output.dependencies.clone(),
                    duration_ms: 0,
                };
            }
            archive_one(output, raw_root, bundles_dir, settings, incremental, &index)
        })
        .collect();

    for report in &reports {
        if let (Some(content_hash), Some(layout_hash), Some(archive_file)) = (
            report.content_hash,
            report.layout_hash,
            report.archive_file.as_deref(),
        ) {
            if let Ok(fingerprint) = settings_fingerprint(settings, &report.dependencies) {
                index.record(
                    &report.bundle_name,
                    IndexEntry {
                        content_hash,
                        layout_hash,
                        settings_fingerprint: fingerprint,
                        archive_file: archive_file.to_string(),
                    },
                );
            }
        }
    }
    index.save(bundles_dir)?;

    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    if verbose {
        for report in &reports {
            match report.status {
                BundleStatus::Archived => eprintln!(
                    "  {}: archived ({} ms)",
                    report.bundle_name, report.duration_ms
                ),
                BundleStatus::UpToDate => {
                    eprintln!("  {}: up to date", report.bundle_name)
                }
                BundleStatus::Failed => eprintln!(
                    "  {}: failed: {}",
                    report.bundle_name,
                    report.error.as_deref().unwrap_or("unknown")
                ),
                BundleStatus::Cancelled => {
                    eprintln!("  {}: cancelled", report.bundle_name)
                }
            }
        }
    }

    Ok(reports)
}

fn archive_one(
    output: &BuildOutput,
    raw_root: &Path,
    bundles_dir: &Path,
    settings: &CompressionSettings,
    incremental: bool,
    index: &ArchiveIndex,
) -> BundleReport {
    let started = Instant::now();
    let raw_dir = raw_root.join(&output.bundle_name);
    let archive_file = format!("{}.pak", output.bundle_name);

    let (content_hash, layout_hash) = match archive::content_and_layout_hashes(output, &raw_dir) {
        Ok(hashes) => hashes,
        Err(e) => return BundleReport::failed(output, &e, started.elapsed().as_millis() as u64),
    };

    let fingerprint = match settings_fingerprint(settings, &output.dependencies) {
        Ok(fingerprint) => fingerprint,
        Err(e) => {
            return BundleReport {
                bundle_name: output.bundle_name.clone(),
                status: BundleStatus::Failed,
                error: Some(e.to_string()),
                content_hash: None,
                layout_hash: None,
                archive_file: None,
                dependencies: output.dependencies.clone(),
                duration_ms: started.elapsed().as_millis() as u64,
            }
        }
    };

    if incremental
        && index.is_current(bundles_dir, &output.bundle_name, content_hash, &fingerprint)
    {
        return BundleReport {
            bundle_name: output.bundle_name.clone(),
            status: BundleStatus::UpToDate,
            error: None,
            content_hash: Some(content_hash),
            layout_hash: Some(layout_hash),
            archive_file: Some(archive_file),
            dependencies: output.dependencies.clone(),
            duration_ms: started.elapsed().as_millis() as u64,
        };
    }

    match archive::archive_and_compress(
        output,
        &raw_dir,
        &bundles_dir.join(&archive_file),
        settings,
    ) {
        Ok(artifact) => BundleReport {
            bundle_name: output.bundle_name.clone(),
            status: BundleStatus::Archived,
            error: None,
            content_hash: Some(artifact.content_hash),
            layout_hash: Some(artifact.layout_hash),
            archive_file: Some(archive_file),
            dependencies: output.dependencies.clone(),
            duration_ms: started.elapsed().as_millis() as u64,
        },
        Err(e) => BundleReport::failed(output, &e, started.elapsed().as_millis() as u64),
    }
}
