//! Raw resource-file phase.
//!
//! Writes each bundle's owned objects into a deterministic structured
//! container file, plus a side-by-side streaming resource file when the
//! build asks for one and the content carries streaming payloads. The
//! engine-native object wire format lives behind the `AssetGraphSource`
//! payload boundary; this container only frames it. Raw output is written
//! once and can be re-archived repeatedly with different compression
//! settings.

use pak_model::{
    AssetGraphSource, BuildCommand, BuildOutput, BuildSettings, ResourceFile, SourceError,
};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use thiserror::Error;

/// Version of the structured container framing. Part of the layout hash.
pub const STRUCTURED_FORMAT_VERSION: u32 = 1;

/// Magic prefix of a structured resource file.
pub const STRUCTURED_MAGIC: &[u8; 4] = b"PKSF";

/// File extension of the structured container.
pub const STRUCTURED_EXT: &str = "sfile";

/// File extension of the streaming payload file.
pub const STREAMING_EXT: &str = "resource";

/// Errors from the raw resource-file phase.
#[derive(Debug, Error)]
pub enum RawBuildError {
    #[error("bundle '{bundle}': {source}")]
    Source {
        bundle: String,
        source: SourceError,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Writes resource files for every bundle in the command list, returning one
/// output per bundle built. Editor-only bundles are skipped unless the
/// settings include them.
pub fn write_resource_files<S: AssetGraphSource + ?Sized>(
    source: &S,
    commands: &[BuildCommand],
    settings: &BuildSettings,
) -> Result<Vec<BuildOutput>, RawBuildError> {
    let mut outputs = Vec::new();
    for command in commands {
        if command.editor_only && !settings.include_editor_only_bundles {
            continue;
        }
        outputs.push(write_bundle(source, command, settings)?);
    }
    Ok(outputs)
}

fn write_bundle<S: AssetGraphSource + ?Sized>(
    source: &S,
    command: &BuildCommand,
    settings: &BuildSettings,
) -> Result<BuildOutput, RawBuildError> {
    let bundle_dir = settings.output_folder.join(&command.bundle_name);
    fs::create_dir_all(&bundle_dir)?;

    let mut structured = Vec::new();
    structured.extend_from_slice(STRUCTURED_MAGIC);
    structured.extend_from_slice(&STRUCTURED_FORMAT_VERSION.to_le_bytes());
    structured.extend_from_slice(&(command.objects.len() as u32).to_le_bytes());

    let mut streaming = Vec::new();
    let mut included_types = BTreeSet::new();

    // Commands arrive sorted; record order is what makes the file bytes
    // reproducible for the content hash.
    for object in &command.objects {
        let payload = source
            .object_payload(&object.id)
            .map_err(|e| RawBuildError::Source {
                bundle: command.bundle_name.clone(),
                source: e,
            })?;

        structured.extend_from_slice(object.id.guid.as_bytes());
        structured.extend_from_slice(&object.id.local_id.to_le_bytes());
        structured.extend_from_slice(&object.id.type_tag.to_le_bytes());
        structured.extend_from_slice(&(payload.data.len() as u32).to_le_bytes());
        structured.extend_from_slice(&payload.data);

        included_types.insert(object.id.type_tag);

        if settings.include_streaming_resources {
            if let Some(data) = &payload.streaming_data {
                streaming.extend_from_slice(data);
            }
        }
    }

    let structured_name = format!("{}.{}", command.bundle_name, STRUCTURED_EXT);
    fs::write(bundle_dir.join(&structured_name), &structured)?;

    let mut resource_files = vec![ResourceFile {
        file_name: structured_name,
        serialized_file: true,
    }];

    if !streaming.is_empty() {
        let streaming_name = format!("{}.{}", command.bundle_name, STREAMING_EXT);
        fs::write(bundle_dir.join(&streaming_name), &streaming)?;
        resource_files.push(ResourceFile {
            file_name: streaming_name,
            serialized_file: false,
        });
    }

    Ok(BuildOutput {
        bundle_name: command.bundle_name.clone(),
        resource_files,
        explicit_assets: command.explicit_assets.iter().map(|a| a.asset).collect(),
        objects: command.object_ids().copied().collect(),
        dependencies: command.dependencies.clone(),
        included_types: included_types.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pak_model::{AssetLoadInfo, CommandObject, Guid, ObjectIdentifier, ObjectOrigin, ObjectPayload};
    use pak_store::InMemoryAssetStore;
    use tempfile::TempDir;

    fn guid(byte: u8) -> Guid {
        Guid(uuid::Uuid::from_bytes([byte; 16]))
    }

    fn obj(asset: u8, local_id: i64, type_tag: i32) -> ObjectIdentifier {
        ObjectIdentifier::new(guid(asset), local_id, type_tag)
    }

    fn command_for(objects: &[ObjectIdentifier]) -> BuildCommand {
        BuildCommand {
            bundle_name: "core".to_string(),
            explicit_assets: vec![AssetLoadInfo {
                asset: guid(1),
                included_objects: objects.to_vec(),
                referenced_objects: vec![],
            }],
            objects: objects
                .iter()
                .map(|id| CommandObject {
                    id: *id,
                    origin: ObjectOrigin::Explicit,
                })
                .collect(),
            dependencies: vec![],
            editor_only: false,
        }
    }

    fn settings(dir: &TempDir, streaming: bool) -> BuildSettings {
        BuildSettings {
            output_folder: dir.path().to_path_buf(),
            build_target: "linux64".to_string(),
            include_streaming_resources: streaming,
            include_editor_only_bundles: false,
        }
    }

    #[test]
    fn test_structured_file_layout() {
        let dir = TempDir::new().unwrap();
        let mut store = InMemoryAssetStore::new();
        let id = obj(1, 7, 21);
        store.add_object(id, "mesh bytes");

        let outputs =
            write_resource_files(&store, &[command_for(&[id])], &settings(&dir, false)).unwrap();

        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].resource_files.len(), 1);
        assert!(outputs[0].resource_files[0].serialized_file);
        assert_eq!(outputs[0].included_types, vec![21]);

        let bytes = fs::read(dir.path().join("core/core.sfile")).unwrap();
        assert_eq!(&bytes[..4], STRUCTURED_MAGIC);
        // magic + version + count + one record (16 + 8 + 4 + 4 + payload)
        assert_eq!(bytes.len(), 12 + 32 + "mesh bytes".len());
    }

    #[test]
    fn test_raw_output_is_deterministic() {
        let make = || {
            let dir = TempDir::new().unwrap();
            let mut store = InMemoryAssetStore::new();
            let a = obj(1, 1, 21);
            let b = obj(1, 2, 28);
            store.add_object(a, "one").add_object(b, "two");
            write_resource_files(&store, &[command_for(&[a, b])], &settings(&dir, false))
                .unwrap();
            fs::read(dir.path().join("core/core.sfile")).unwrap()
        };
        assert_eq!(make(), make());
    }

    #[test]
    fn test_streaming_file_written_when_requested() {
        let dir = TempDir::new().unwrap();
        let mut store = InMemoryAssetStore::new();
        let id = obj(1, 1, 83);
        store.add_object_payload(id, ObjectPayload::new("header").with_streaming("samples"));

        let outputs =
            write_resource_files(&store, &[command_for(&[id])], &settings(&dir, true)).unwrap();

        let files: Vec<_> = outputs[0]
            .resource_files
            .iter()
            .map(|f| (f.file_name.as_str(), f.serialized_file))
            .collect();
        assert_eq!(files, vec![("core.sfile", true), ("core.resource", false)]);
        assert_eq!(
            fs::read(dir.path().join("core/core.resource")).unwrap(),
            b"samples"
        );
    }

    #[test]
    fn test_streaming_file_omitted_when_not_requested() {
        let dir = TempDir::new().unwrap();
        let mut store = InMemoryAssetStore::new();
        let id = obj(1, 1, 83);
        store.add_object_payload(id, ObjectPayload::new("header").with_streaming("samples"));

        let outputs =
            write_resource_files(&store, &[command_for(&[id])], &settings(&dir, false)).unwrap();
        assert_eq!(outputs[0].resource_files.len(), 1);
        assert!(!dir.path().join("core/core.resource").exists());
    }

    #[test]
    fn test_editor_only_bundles_skipped_by_default() {
        let dir = TempDir::new().unwrap();
        let mut store = InMemoryAssetStore::new();
        let id = obj(1, 1, 21);
        store.add_object(id, "x");

        let mut command = command_for(&[id]);
        command.editor_only = true;

        let outputs =
            write_resource_files(&store, &[command.clone()], &settings(&dir, false)).unwrap();
        assert!(outputs.is_empty());

        let mut with_editor = settings(&dir, false);
        with_editor.include_editor_only_bundles = true;
        let outputs = write_resource_files(&store, &[command], &with_editor).unwrap();
        assert_eq!(outputs.len(), 1);
    }

    #[test]
    fn test_missing_object_reports_bundle() {
        let dir = TempDir::new().unwrap();
        let store = InMemoryAssetStore::new();
        let id = obj(1, 1, 21);

        let err = write_resource_files(&store, &[command_for(&[id])], &settings(&dir, false))
            .unwrap_err();
        match err {
            RawBuildError::Source { bundle, .. } => assert_eq!(bundle, "core"),
            other => panic!("expected source error, got {other:?}"),
        }
    }
}
