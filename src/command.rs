//! Build command emission.
//!
//! Flattens resolver output into the per-bundle commands the raw
//! serialization phase consumes. Pure shape conversion: this seam exists so
//! the resolver's internal representation can change without perturbing the
//! serializer contract.

use crate::resolve::{ResolvedBundle, ResolvedBundles};
use pak_model::{AssetLoadInfo, BuildCommand, CommandObject, ObjectIdentifier, ObjectOrigin};
use std::collections::BTreeSet;

/// Materializes one build command per resolved bundle, in name order.
pub fn emit_commands(resolved: &ResolvedBundles) -> Vec<BuildCommand> {
    resolved.bundles.iter().map(emit_command).collect()
}

fn emit_command(bundle: &ResolvedBundle) -> BuildCommand {
    let assignment = &bundle.assignment;

    // An object is explicit when it belongs directly to an explicitly
    // assigned asset; everything else the traversal pulled in is included.
    let explicit: BTreeSet<ObjectIdentifier> = bundle
        .explicit_objects
        .values()
        .flat_map(|objects| objects.iter().copied())
        .collect();

    let objects: Vec<CommandObject> = assignment
        .owned_objects
        .iter()
        .map(|id| CommandObject {
            id: *id,
            origin: if explicit.contains(id) {
                ObjectOrigin::Explicit
            } else {
                ObjectOrigin::Included
            },
        })
        .collect();

    let explicit_assets: Vec<AssetLoadInfo> = bundle
        .explicit_objects
        .iter()
        .map(|(asset, included_objects)| {
            let included: BTreeSet<ObjectIdentifier> =
                included_objects.iter().copied().collect();
            AssetLoadInfo {
                asset: *asset,
                included_objects: included_objects.clone(),
                // Everything beyond the asset's own objects that must be
                // resident when it loads: the rest of the bundle's closure.
                referenced_objects: bundle
                    .closure
                    .iter()
                    .filter(|id| !included.contains(id))
                    .copied()
                    .collect(),
            }
        })
        .collect();

    BuildCommand {
        bundle_name: assignment.name.clone(),
        explicit_assets,
        objects,
        dependencies: assignment.depends_on.iter().cloned().collect(),
        editor_only: bundle.editor_only,
    }
}
