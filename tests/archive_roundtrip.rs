//! Archival engine integration tests: container self-description, codec
//! round-trips, block isolation, hash stability, and write atomicity.

use pak_model::{
    BuildOutput, CompressionLevel, CompressionSettings, CompressionType, Guid, ObjectIdentifier,
    ResourceFile, DEFAULT_BLOCK_SIZE,
};
use paklane::archive::{archive_and_compress, content_and_layout_hashes, ArchiveError, ArchiveReader};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn obj(asset: u8, local_id: i64, type_tag: i32) -> ObjectIdentifier {
    ObjectIdentifier::new(Guid(uuid::Uuid::from_bytes([asset; 16])), local_id, type_tag)
}

/// Patterned, compressible, non-trivial payload.
fn sample_bytes(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| ((i / 16) as u8).wrapping_add(seed)).collect()
}

fn raw_bundle(dir: &Path, members: &[(&str, &[u8], bool)]) -> BuildOutput {
    for (name, bytes, _) in members {
        fs::write(dir.join(name), bytes).unwrap();
    }
    BuildOutput {
        bundle_name: "core".to_string(),
        resource_files: members
            .iter()
            .map(|(name, _, serialized)| ResourceFile {
                file_name: name.to_string(),
                serialized_file: *serialized,
            })
            .collect(),
        explicit_assets: vec![],
        objects: vec![obj(1, 1, 21), obj(1, 2, 28)],
        dependencies: vec![],
        included_types: vec![21, 28],
    }
}

#[test]
fn test_uncompressed_archive_is_self_describing() {
    let dir = TempDir::new().unwrap();
    let sfile = sample_bytes(4096, 0);
    let resource = sample_bytes(1024, 7);
    let output = raw_bundle(
        dir.path(),
        &[
            ("core.sfile", &sfile, true),
            ("core.resource", &resource, false),
        ],
    );

    let out = dir.path().join("core.pak");
    archive_and_compress(&output, dir.path(), &out, &CompressionSettings::uncompressed()).unwrap();

    // A fresh reader gets everything from the file alone.
    let mut reader = ArchiveReader::open(&out).unwrap();
    assert_eq!(reader.codec(), CompressionType::None);
    assert_eq!(reader.members().len(), 2);
    assert!(reader.members()[0].serialized_file);
    assert!(!reader.members()[1].serialized_file);

    assert_eq!(reader.read_member("core.sfile").unwrap(), sfile);
    assert_eq!(reader.read_member("core.resource").unwrap(), resource);
}

#[test]
fn test_lz4_whole_unit_roundtrip() {
    let dir = TempDir::new().unwrap();
    let sfile = sample_bytes(100_000, 3);
    let output = raw_bundle(dir.path(), &[("core.sfile", &sfile, true)]);

    let out = dir.path().join("core.pak");
    archive_and_compress(&output, dir.path(), &out, &CompressionSettings::lz4()).unwrap();

    let mut reader = ArchiveReader::open(&out).unwrap();
    assert!(!reader.is_streamed());
    assert_eq!(reader.read_member("core.sfile").unwrap(), sfile);
    assert_eq!(reader.read_payload().unwrap(), sfile);
}

#[test]
fn test_lzma_whole_unit_roundtrip() {
    let dir = TempDir::new().unwrap();
    let sfile = sample_bytes(50_000, 9);
    let output = raw_bundle(dir.path(), &[("core.sfile", &sfile, true)]);

    let out = dir.path().join("core.pak");
    archive_and_compress(&output, dir.path(), &out, &CompressionSettings::lzma()).unwrap();

    let mut reader = ArchiveReader::open(&out).unwrap();
    assert_eq!(reader.codec(), CompressionType::Lzma);
    assert_eq!(reader.read_member("core.sfile").unwrap(), sfile);
}

#[test]
fn test_streamed_blocks_decode_in_isolation() {
    let dir = TempDir::new().unwrap();
    // Spans three blocks at the default 131072 block size.
    let sfile = sample_bytes(300_000, 1);
    let output = raw_bundle(dir.path(), &[("core.sfile", &sfile, true)]);

    let out = dir.path().join("core.pak");
    let settings = CompressionSettings::lz4().streamed();
    archive_and_compress(&output, dir.path(), &out, &settings).unwrap();

    let mut reader = ArchiveReader::open(&out).unwrap();
    assert!(reader.is_streamed());
    assert_eq!(reader.block_count(), 3);
    assert_eq!(reader.block_size(), DEFAULT_BLOCK_SIZE);

    let whole = reader.read_payload().unwrap();
    assert_eq!(whole, sfile);

    // Each block, decoded on its own, matches the corresponding slice of
    // the whole payload; no preceding block is needed.
    for index in 0..reader.block_count() {
        let mut isolated = ArchiveReader::open(&out).unwrap();
        let block = isolated.read_block(index).unwrap();

        let start = index as usize * DEFAULT_BLOCK_SIZE as usize;
        let end = (start + DEFAULT_BLOCK_SIZE as usize).min(whole.len());
        assert_eq!(block, &whole[start..end], "block {index} differs");
    }
}

#[test]
fn test_streamed_member_crossing_block_boundary() {
    let dir = TempDir::new().unwrap();
    let first = sample_bytes(150_000, 2);
    let second = sample_bytes(60_000, 5);
    let output = raw_bundle(
        dir.path(),
        &[
            ("core.sfile", &first, true),
            ("core.resource", &second, false),
        ],
    );

    let out = dir.path().join("core.pak");
    let settings = CompressionSettings::lz4().streamed();
    archive_and_compress(&output, dir.path(), &out, &settings).unwrap();

    let mut reader = ArchiveReader::open(&out).unwrap();
    // The second member starts mid-block and ends in the next one.
    assert_eq!(reader.read_member("core.resource").unwrap(), second);
    assert_eq!(reader.read_member("core.sfile").unwrap(), first);
}

#[test]
fn test_hashes_invariant_under_compression_settings() {
    let dir = TempDir::new().unwrap();
    let sfile = sample_bytes(200_000, 4);
    let output = raw_bundle(dir.path(), &[("core.sfile", &sfile, true)]);

    let variants = [
        CompressionSettings::uncompressed(),
        CompressionSettings::lz4(),
        CompressionSettings::lz4().streamed(),
        CompressionSettings {
            block_size: 65536,
            ..CompressionSettings::lz4().streamed()
        },
        CompressionSettings::lzma(),
    ];

    let mut hashes = Vec::new();
    for (index, settings) in variants.iter().enumerate() {
        let out = dir.path().join(format!("core-{index}.pak"));
        let artifact = archive_and_compress(&output, dir.path(), &out, settings).unwrap();
        hashes.push((artifact.content_hash, artifact.layout_hash));
    }

    for pair in hashes.windows(2) {
        assert_eq!(pair[0], pair[1]);
    }
}

#[test]
fn test_content_change_changes_content_hash_only() {
    let dir = TempDir::new().unwrap();

    let before = raw_bundle(dir.path(), &[("core.sfile", &sample_bytes(4096, 0), true)]);
    let (content_before, layout_before) =
        content_and_layout_hashes(&before, dir.path()).unwrap();

    // One byte of object content changes.
    let after = raw_bundle(dir.path(), &[("core.sfile", &sample_bytes(4096, 1), true)]);
    let (content_after, layout_after) = content_and_layout_hashes(&after, dir.path()).unwrap();

    assert_ne!(content_before, content_after);
    assert_eq!(layout_before, layout_after);
}

#[test]
fn test_layout_hash_tracks_included_types() {
    let dir = TempDir::new().unwrap();
    let bytes = sample_bytes(4096, 0);

    let mut output = raw_bundle(dir.path(), &[("core.sfile", &bytes, true)]);
    let (_, layout_a) = content_and_layout_hashes(&output, dir.path()).unwrap();

    output.included_types = vec![21, 28, 43];
    let (_, layout_b) = content_and_layout_hashes(&output, dir.path()).unwrap();

    assert_ne!(layout_a, layout_b);
}

#[test]
fn test_level_none_with_codec_rejected() {
    let dir = TempDir::new().unwrap();
    let output = raw_bundle(dir.path(), &[("core.sfile", b"data", true)]);

    let settings = CompressionSettings {
        compression: CompressionType::Lz4,
        level: CompressionLevel::None,
        block_size: DEFAULT_BLOCK_SIZE,
        streamed: false,
    };
    let out = dir.path().join("core.pak");
    let err = archive_and_compress(&output, dir.path(), &out, &settings).unwrap_err();
    assert!(matches!(err, ArchiveError::InvalidCompressionSettings(_)));
    assert!(!out.exists());
}

#[test]
fn test_zero_block_size_rejected() {
    let dir = TempDir::new().unwrap();
    let output = raw_bundle(dir.path(), &[("core.sfile", b"data", true)]);

    let settings = CompressionSettings {
        block_size: 0,
        ..CompressionSettings::lz4()
    };
    let err = archive_and_compress(&output, dir.path(), &dir.path().join("core.pak"), &settings)
        .unwrap_err();
    assert!(matches!(err, ArchiveError::InvalidCompressionSettings(_)));
}

#[test]
fn test_lzham_rejected() {
    let dir = TempDir::new().unwrap();
    let output = raw_bundle(dir.path(), &[("core.sfile", b"data", true)]);

    let settings = CompressionSettings {
        compression: CompressionType::Lzham,
        ..CompressionSettings::lz4()
    };
    let err = archive_and_compress(&output, dir.path(), &dir.path().join("core.pak"), &settings)
        .unwrap_err();
    assert!(matches!(err, ArchiveError::InvalidCompressionSettings(_)));
}

#[test]
fn test_failure_leaves_no_partial_file() {
    let dir = TempDir::new().unwrap();
    let mut output = raw_bundle(dir.path(), &[("core.sfile", b"data", true)]);
    // A resource file listed but never written.
    output.resource_files.push(ResourceFile {
        file_name: "core.resource".to_string(),
        serialized_file: false,
    });

    let out = dir.path().join("core.pak");
    let err =
        archive_and_compress(&output, dir.path(), &out, &CompressionSettings::lz4()).unwrap_err();
    assert!(matches!(err, ArchiveError::MissingResourceFile(_)));
    assert!(!out.exists());
}

#[test]
fn test_archival_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let sfile = sample_bytes(10_000, 6);
    let output = raw_bundle(dir.path(), &[("core.sfile", &sfile, true)]);
    let settings = CompressionSettings::lz4().streamed();

    let out_a = dir.path().join("a.pak");
    let out_b = dir.path().join("b.pak");
    let first = archive_and_compress(&output, dir.path(), &out_a, &settings).unwrap();
    let second = archive_and_compress(&output, dir.path(), &out_b, &settings).unwrap();

    assert_eq!(first, second);
    assert_eq!(fs::read(&out_a).unwrap(), fs::read(&out_b).unwrap());
}

#[test]
fn test_unknown_member_reported() {
    let dir = TempDir::new().unwrap();
    let output = raw_bundle(dir.path(), &[("core.sfile", b"data", true)]);
    let out = dir.path().join("core.pak");
    archive_and_compress(&output, dir.path(), &out, &CompressionSettings::uncompressed()).unwrap();

    let mut reader = ArchiveReader::open(&out).unwrap();
    assert!(matches!(
        reader.read_member("nope.sfile"),
        Err(ArchiveError::MemberNotFound(_))
    ));
}
