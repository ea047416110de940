//! Compression & archival engine.
//!
//! Turns one bundle's raw resource files into a single self-describing
//! archive: a header with a member directory (names, offsets, sizes) and an
//! optional block table, followed by the payload, stored verbatim,
//! compressed as one unit, or compressed in independent blocks a reader can
//! decode one at a time. Alongside the file the engine computes the content
//! hash (invariant under compression settings) and the type-layout hash that
//! drive incremental rebuilds and loader compatibility checks.
//!
//! Each call is independent and idempotent for identical inputs. Output is
//! written to a temporary file and atomically finalized; a failure never
//! leaves a partial file at the destination path.

mod codec;
mod format;
mod reader;

pub use format::MemberEntry;
pub use reader::ArchiveReader;

use format::{ArchiveHeader, BlockEntry};
use pak_model::{
    ArchiveArtifact, BuildOutput, CompressionSettings, CompressionType, Hash128, Hasher128,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors from archival and archive reading.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Fatal to this bundle's archival only; other bundles proceed.
    #[error("invalid compression settings: {0}")]
    InvalidCompressionSettings(String),

    /// I/O failure finalizing the archive. Retryable; no partial file is
    /// left at the output path.
    #[error("archive write failure: {0}")]
    WriteFailure(#[source] io::Error),

    #[error("missing resource file: {0}")]
    MissingResourceFile(PathBuf),

    #[error("corrupt archive: {0}")]
    Corrupt(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("no member named '{0}' in archive")]
    MemberNotFound(String),

    #[error("archive is not block-compressed")]
    NotStreamed,

    #[error("block {index} out of range ({count} blocks)")]
    BlockOutOfRange { index: u32, count: u32 },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Archives and compresses one bundle's resource files.
///
/// `raw_dir` is the directory holding the files named by
/// `output.resource_files`; `output_path` receives the finished archive.
pub fn archive_and_compress(
    output: &BuildOutput,
    raw_dir: &Path,
    output_path: &Path,
    settings: &CompressionSettings,
) -> Result<ArchiveArtifact, ArchiveError> {
    validate_settings(settings)?;

    let members = read_members(output, raw_dir)?;
    let (content_hash, layout_hash) = hashes_over(output, &members);

    // Member directory records offsets into the uncompressed payload; the
    // archive stays self-describing whatever the codec does to the bytes.
    let mut payload = Vec::new();
    let mut entries = Vec::with_capacity(members.len());
    for (file, bytes) in &members {
        entries.push(MemberEntry {
            name: file.file_name.clone(),
            offset: payload.len() as u64,
            size: bytes.len() as u64,
            serialized_file: file.serialized_file,
        });
        payload.extend_from_slice(bytes);
    }

    let streamed = settings.streamed && settings.compression != CompressionType::None;

    let (body, blocks) = if settings.compression == CompressionType::None {
        (payload.clone(), Vec::new())
    } else if streamed {
        let mut body = Vec::new();
        let mut blocks = Vec::new();
        for chunk in payload.chunks(settings.block_size as usize) {
            let compressed = codec::compress_chunk(settings.compression, settings.level, chunk)?;
            blocks.push(BlockEntry {
                compressed_len: compressed.len() as u32,
                uncompressed_len: chunk.len() as u32,
            });
            body.extend_from_slice(&compressed);
        }
        (body, blocks)
    } else {
        let body = codec::compress_chunk(settings.compression, settings.level, &payload)?;
        (body, Vec::new())
    };

    let header = ArchiveHeader {
        codec: settings.compression,
        level: settings.level,
        streamed,
        block_size: settings.block_size,
        payload_len: payload.len() as u64,
        members: entries,
        blocks,
    };

    write_atomically(output_path, &header.encode(), &body)?;

    Ok(ArchiveArtifact {
        bundle_name: output.bundle_name.clone(),
        content_hash,
        layout_hash,
        resource_files: output.resource_files.clone(),
        objects: output.objects.clone(),
        dependencies: output.dependencies.clone(),
    })
}

/// Content and layout hashes for a bundle's raw output, without archiving.
/// The pipeline uses this for the skip-rearchive check.
pub fn content_and_layout_hashes(
    output: &BuildOutput,
    raw_dir: &Path,
) -> Result<(Hash128, Hash128), ArchiveError> {
    let members = read_members(output, raw_dir)?;
    Ok(hashes_over(output, &members))
}

fn validate_settings(settings: &CompressionSettings) -> Result<(), ArchiveError> {
    settings
        .validate()
        .map_err(|e| ArchiveError::InvalidCompressionSettings(e.to_string()))?;
    if settings.compression == CompressionType::Lzham {
        return Err(ArchiveError::InvalidCompressionSettings(
            "codec 'lzham' is not supported by this archiver".to_string(),
        ));
    }
    Ok(())
}

fn read_members(
    output: &BuildOutput,
    raw_dir: &Path,
) -> Result<Vec<(pak_model::ResourceFile, Vec<u8>)>, ArchiveError> {
    let mut members = Vec::with_capacity(output.resource_files.len());
    for file in &output.resource_files {
        let path = raw_dir.join(&file.file_name);
        if !path.is_file() {
            return Err(ArchiveError::MissingResourceFile(path));
        }
        members.push((file.clone(), std::fs::read(&path)?));
    }
    Ok(members)
}

/// Content hash: owned object identities plus raw member bytes, so codec,
/// level, and block size cannot perturb it. Layout hash: structured framing
/// version plus the distinct type tags of the structured content.
fn hashes_over(
    output: &BuildOutput,
    members: &[(pak_model::ResourceFile, Vec<u8>)],
) -> (Hash128, Hash128) {
    let mut content = Hasher128::new();
    for id in &output.objects {
        content.update(id.guid.as_bytes());
        content.update(&id.local_id.to_le_bytes());
        content.update(&id.type_tag.to_le_bytes());
    }
    for (_, bytes) in members {
        content.update(bytes);
    }

    let mut layout = Hasher128::new();
    layout.update(&crate::rawbuild::STRUCTURED_FORMAT_VERSION.to_le_bytes());
    for type_tag in &output.included_types {
        layout.update(&type_tag.to_le_bytes());
    }

    (content.finish(), layout.finish())
}

fn write_atomically(output_path: &Path, header: &[u8], body: &[u8]) -> Result<(), ArchiveError> {
    let parent = match output_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(parent).map_err(ArchiveError::WriteFailure)?;
    temp.write_all(header).map_err(ArchiveError::WriteFailure)?;
    temp.write_all(body).map_err(ArchiveError::WriteFailure)?;
    temp.flush().map_err(ArchiveError::WriteFailure)?;
    temp.persist(output_path)
        .map_err(|e| ArchiveError::WriteFailure(e.error))?;
    Ok(())
}
