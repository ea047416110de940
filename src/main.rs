//! paklane CLI.
//!
//! Entry point for the `paklane` command-line tool.

use clap::{Parser, Subcommand};
use pak_model::{CompressionLevel, CompressionSettings, CompressionType, DEFAULT_BLOCK_SIZE};
use pak_store::{AssetCatalog, InMemoryAssetStore};
use paklane::archive::ArchiveReader;
use paklane::config::DEFAULT_MANIFEST_PATH;
use paklane::pipeline::{archive_outputs, BuildPipeline, BundleStatus, PipelineConfig, RawManifest};
use paklane::signal::{self, CancelToken};
use std::path::{Path, PathBuf};
use std::process;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "paklane")]
#[command(about = "Content bundle build lane", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the bundle manifest and print the resolved build plan
    Resolve {
        /// Path to the bundle manifest (default: .paklane/bundles.toml)
        #[arg(long, short = 'm')]
        manifest: Option<PathBuf>,

        /// Path to the asset catalog file
        #[arg(long, short = 'c')]
        catalog: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Run the full build: resolve, write resource files, archive
    Build {
        /// Path to the bundle manifest (default: .paklane/bundles.toml)
        #[arg(long, short = 'm')]
        manifest: Option<PathBuf>,

        /// Path to the asset catalog file
        #[arg(long, short = 'c')]
        catalog: PathBuf,

        /// Output folder (default: build/pak)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,

        /// Build target tag recorded in artifacts
        #[arg(long)]
        target: Option<String>,

        /// Override the manifest's codec (none, lzma, lz4, lz4hc)
        #[arg(long)]
        codec: Option<CompressionType>,

        /// Compression level for the codec override
        #[arg(long)]
        level: Option<CompressionLevel>,

        /// Block-compress so readers can stream one block at a time
        #[arg(long)]
        streamed: bool,

        /// Block size in bytes for streamed compression
        #[arg(long)]
        block_size: Option<u32>,

        /// Write side-by-side streaming resource files
        #[arg(long)]
        streaming_resources: bool,

        /// Also build bundles marked editor-only
        #[arg(long)]
        editor_bundles: bool,

        /// Archive every bundle even when the cache says it is current
        #[arg(long)]
        no_incremental: bool,

        /// Verbose progress output
        #[arg(long, short = 'v')]
        verbose: bool,
    },

    /// Re-archive an existing raw output directory with new settings
    Archive {
        /// Raw directory containing raw_manifest.json
        #[arg(long)]
        raw: PathBuf,

        /// Directory receiving the archives
        #[arg(long, short = 'o')]
        out: PathBuf,

        /// Codec (none, lzma, lz4, lz4hc)
        #[arg(long, default_value = "lz4")]
        codec: CompressionType,

        /// Compression level
        #[arg(long)]
        level: Option<CompressionLevel>,

        /// Block-compress so readers can stream one block at a time
        #[arg(long)]
        streamed: bool,

        /// Block size in bytes for streamed compression
        #[arg(long)]
        block_size: Option<u32>,

        /// Archive every bundle even when the cache says it is current
        #[arg(long)]
        no_incremental: bool,

        /// Verbose progress output
        #[arg(long, short = 'v')]
        verbose: bool,
    },

    /// Print an archive's directory and layout from its header
    Inspect {
        /// Archive file, or a directory to scan for archives
        path: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Resolve {
            manifest,
            catalog,
            json,
        } => run_resolve(manifest, &catalog, json),
        Commands::Build {
            manifest,
            catalog,
            out,
            target,
            codec,
            level,
            streamed,
            block_size,
            streaming_resources,
            editor_bundles,
            no_incremental,
            verbose,
        } => {
            let compression_override =
                codec.map(|codec| settings_from_flags(codec, level, streamed, block_size));
            run_build(BuildOptions {
                manifest,
                catalog,
                out,
                target,
                compression_override,
                streaming_resources,
                editor_bundles,
                no_incremental,
                verbose,
            });
        }
        Commands::Archive {
            raw,
            out,
            codec,
            level,
            streamed,
            block_size,
            no_incremental,
            verbose,
        } => {
            let settings = settings_from_flags(codec, level, streamed, block_size);
            run_archive(&raw, &out, &settings, no_incremental, verbose);
        }
        Commands::Inspect { path, json } => run_inspect(&path, json),
    }
}

struct BuildOptions {
    manifest: Option<PathBuf>,
    catalog: PathBuf,
    out: Option<PathBuf>,
    target: Option<String>,
    compression_override: Option<CompressionSettings>,
    streaming_resources: bool,
    editor_bundles: bool,
    no_incremental: bool,
    verbose: bool,
}

fn settings_from_flags(
    codec: CompressionType,
    level: Option<CompressionLevel>,
    streamed: bool,
    block_size: Option<u32>,
) -> CompressionSettings {
    let level = match codec {
        CompressionType::None => CompressionLevel::None,
        _ => level.unwrap_or(CompressionLevel::Normal),
    };
    CompressionSettings {
        compression: codec,
        level,
        block_size: block_size.unwrap_or(DEFAULT_BLOCK_SIZE),
        streamed,
    }
}

fn load_catalog(path: &Path) -> InMemoryAssetStore {
    match AssetCatalog::load_store(path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error loading asset catalog: {}", e);
            process::exit(1);
        }
    }
}

fn cancel_token() -> CancelToken {
    match signal::install_ctrlc_handler() {
        Ok(token) => token,
        Err(e) => {
            eprintln!("Warning: could not install Ctrl-C handler: {}", e);
            CancelToken::new()
        }
    }
}

fn run_resolve(manifest: Option<PathBuf>, catalog: &Path, json: bool) {
    let store = load_catalog(catalog);

    let config = PipelineConfig {
        manifest_path: manifest.unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST_PATH)),
        ..PipelineConfig::default()
    };
    let pipeline = BuildPipeline::new(&store, config);

    let (resolved, commands) = match pipeline.resolve() {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Resolution failed: {}", e);
            process::exit(e.exit_code());
        }
    };

    if json {
        let doc = serde_json::json!({
            "assignments": resolved.bundles.iter().map(|b| &b.assignment).collect::<Vec<_>>(),
            "commands": commands,
        });
        match serde_json::to_string_pretty(&doc) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
    } else {
        println!("Resolved {} bundle(s):\n", resolved.bundles.len());
        for bundle in &resolved.bundles {
            let a = &bundle.assignment;
            println!("  {}", a.name);
            println!("    Owned objects: {}", a.owned_objects.len());
            println!(
                "    Foreign references: {}",
                a.referenced_foreign_objects.len()
            );
            if !a.depends_on.is_empty() {
                let deps: Vec<&str> = a.depends_on.iter().map(|s| s.as_str()).collect();
                println!("    Depends on: {}", deps.join(", "));
            }
            println!();
        }
    }
}

fn run_build(options: BuildOptions) {
    let store = load_catalog(&options.catalog);

    let mut config = PipelineConfig {
        include_streaming_resources: options.streaming_resources,
        include_editor_only_bundles: options.editor_bundles,
        compression_override: options.compression_override,
        incremental: !options.no_incremental,
        verbose: options.verbose,
        ..PipelineConfig::default()
    };
    if let Some(manifest) = options.manifest {
        config.manifest_path = manifest;
    }
    if let Some(out) = options.out {
        config.output_folder = out;
    }
    if let Some(target) = options.target {
        config.build_target = target;
    }

    let cancel = cancel_token();
    let pipeline = BuildPipeline::new(&store, config);

    match pipeline.run(&cancel) {
        Ok(summary) => {
            println!("Build {} ({})", summary.build_id, summary.build_target);
            for report in &summary.bundles {
                let status = match report.status {
                    BundleStatus::Archived => "archived",
                    BundleStatus::UpToDate => "up to date",
                    BundleStatus::Failed => "FAILED",
                    BundleStatus::Cancelled => "cancelled",
                };
                match (&report.content_hash, &report.error) {
                    (Some(hash), _) => {
                        println!("  {:<24} {:<10} {}", report.bundle_name, status, hash)
                    }
                    (None, Some(error)) => {
                        println!("  {:<24} {:<10} {}", report.bundle_name, status, error)
                    }
                    (None, None) => println!("  {:<24} {}", report.bundle_name, status),
                }
            }
            if summary.has_failures() {
                process::exit(50);
            }
        }
        Err(e) => {
            eprintln!("Build failed: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn run_archive(
    raw: &Path,
    out: &Path,
    settings: &CompressionSettings,
    no_incremental: bool,
    verbose: bool,
) {
    let manifest = match RawManifest::load(raw) {
        Ok(manifest) => manifest,
        Err(e) => {
            eprintln!("Error loading raw manifest: {}", e);
            process::exit(e.exit_code());
        }
    };

    if let Err(e) = std::fs::create_dir_all(out) {
        eprintln!("Error creating output directory: {}", e);
        process::exit(1);
    }

    let cancel = cancel_token();
    match archive_outputs(
        &manifest.outputs,
        raw,
        out,
        settings,
        !no_incremental,
        verbose,
        &cancel,
    ) {
        Ok(reports) => {
            let failed = reports
                .iter()
                .filter(|r| r.status == BundleStatus::Failed)
                .count();
            println!(
                "Archived {} bundle(s), {} failed",
                reports.len() - failed,
                failed
            );
            if failed > 0 {
                process::exit(50);
            }
        }
        Err(e) => {
            eprintln!("Archival failed: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn run_inspect(path: &Path, json: bool) {
    let archives: Vec<PathBuf> = if path.is_dir() {
        let mut found: Vec<PathBuf> = WalkDir::new(path)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry.file_type().is_file()
                    && entry.path().extension().is_some_and(|ext| ext == "pak")
            })
            .map(|entry| entry.into_path())
            .collect();
        found.sort();
        found
    } else {
        vec![path.to_path_buf()]
    };

    if archives.is_empty() {
        eprintln!("No archives found under {}", path.display());
        process::exit(1);
    }

    let mut docs = Vec::new();
    for archive_path in &archives {
        let reader = match ArchiveReader::open(archive_path) {
            Ok(reader) => reader,
            Err(e) => {
                eprintln!("Error opening {}: {}", archive_path.display(), e);
                process::exit(1);
            }
        };

        if json {
            docs.push(serde_json::json!({
                "path": archive_path.display().to_string(),
                "codec": reader.codec().to_string(),
                "streamed": reader.is_streamed(),
                "block_size": reader.block_size(),
                "block_count": reader.block_count(),
                "payload_len": reader.payload_len(),
                "members": reader.members().iter().map(|m| serde_json::json!({
                    "name": m.name,
                    "offset": m.offset,
                    "size": m.size,
                    "serialized_file": m.serialized_file,
                })).collect::<Vec<_>>(),
            }));
        } else {
            println!("{}", archive_path.display());
            if reader.is_streamed() {
                println!(
                    "  codec: {} (streamed, {} blocks of {} bytes)",
                    reader.codec(),
                    reader.block_count(),
                    reader.block_size()
                );
            } else {
                println!("  codec: {}", reader.codec());
            }
            println!("  payload: {} bytes", reader.payload_len());
            println!("  members:");
            for member in reader.members() {
                println!(
                    "    {:<28} {:<10} offset {:<10} size {}",
                    member.name,
                    if member.serialized_file {
                        "serialized"
                    } else {
                        "raw"
                    },
                    member.offset,
                    member.size
                );
            }
            println!();
        }
    }

    if json {
        match serde_json::to_string_pretty(&docs) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
    }
}
