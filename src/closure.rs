//! Transitive dependency closure over the object reference graph.
//!
//! Object reference cycles are legal and common in content (mutually
//! referencing materials, prefab loops), so traversal is breadth-first with
//! an explicit visited set rather than recursive. Each frontier is resolved
//! with one batched collaborator call; the batch is what lets an
//! out-of-process store amortize the boundary cost and what lets closure
//! runs for independent bundles interleave cleanly.

use pak_model::{AssetGraphSource, Guid, ObjectIdentifier, SourceError};
use std::collections::{BTreeMap, BTreeSet};

/// Computes the full set of objects reachable from `seeds`, including the
/// seeds themselves. Output is a set; membership is the only contract, so
/// the result is identical regardless of traversal order.
pub fn compute_closure<S: AssetGraphSource + ?Sized>(
    source: &S,
    seeds: &BTreeSet<ObjectIdentifier>,
) -> Result<BTreeSet<ObjectIdentifier>, SourceError> {
    let mut visited: BTreeSet<ObjectIdentifier> = seeds.clone();
    let mut frontier: Vec<ObjectIdentifier> = seeds.iter().copied().collect();

    while !frontier.is_empty() {
        let dependencies = source.dependencies_for_objects(&frontier)?;

        let mut next = Vec::new();
        for references in dependencies.into_values() {
            for id in references {
                if visited.insert(id) {
                    next.push(id);
                }
            }
        }
        frontier = next;
    }

    Ok(visited)
}

/// Closure seeded from a set of explicitly assigned assets.
///
/// Returns each asset's direct object list (the resolver needs those to tell
/// explicit content apart from pulled-in content) alongside the closure of
/// their union.
pub fn closure_for_assets<S: AssetGraphSource + ?Sized>(
    source: &S,
    assets: &BTreeSet<Guid>,
) -> Result<(BTreeMap<Guid, Vec<ObjectIdentifier>>, BTreeSet<ObjectIdentifier>), SourceError> {
    let mut asset_objects = BTreeMap::new();
    let mut seeds = BTreeSet::new();

    for guid in assets {
        let objects = source.objects_in_asset(guid)?;
        seeds.extend(objects.iter().copied());
        asset_objects.insert(*guid, objects);
    }

    let closure = compute_closure(source, &seeds)?;
    Ok((asset_objects, closure))
}
